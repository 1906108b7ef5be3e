//! Static credential table for the token endpoint.
//!
//! Credentials are keyed by client id (client_credentials grant) or
//! username (password grant); each entry carries the canonical subject
//! attributes bound into issued tokens.

use std::collections::HashMap;

/// Canonical subject attributes bound into token claims.
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectProfile {
    /// Subject identifier (`sub` claim).
    pub sub: String,
    /// Department.
    pub dept: String,
    /// Group memberships.
    pub groups: Vec<String>,
    /// Risk score in `[0, 100]`.
    pub risk_score: i64,
}

#[derive(Debug, Clone)]
struct ClientEntry {
    secret: String,
    scopes: Vec<String>,
    profile: SubjectProfile,
}

#[derive(Debug, Clone)]
struct UserEntry {
    password: String,
    scopes: Vec<String>,
    profile: SubjectProfile,
}

/// In-memory credential table.
#[derive(Debug, Clone, Default)]
pub struct CredentialsTable {
    clients: HashMap<String, ClientEntry>,
    users: HashMap<String, UserEntry>,
}

/// Default scopes for password-grant users.
const USER_SCOPES: [&str; 2] = ["read", "write"];

impl CredentialsTable {
    /// An empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in credential set used by the bundled deployment.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut table = Self::new();

        table.add_client(
            "test_client",
            "test_secret",
            &["read", "write"],
            SubjectProfile {
                sub: "test_client".to_string(),
                dept: "IT".to_string(),
                groups: vec!["API_CLIENTS".to_string()],
                risk_score: 10,
            },
        );
        table.add_client(
            "hr_app",
            "hr_secret_2024",
            &["read", "write", "hr:payroll"],
            SubjectProfile {
                sub: "hr_app".to_string(),
                dept: "HR".to_string(),
                groups: vec!["HR_READERS".to_string(), "HR_WRITERS".to_string()],
                risk_score: 15,
            },
        );

        table.add_user(
            "jdoe",
            "password123",
            SubjectProfile {
                sub: "jdoe".to_string(),
                dept: "HR".to_string(),
                groups: vec!["HR_READERS".to_string()],
                risk_score: 20,
            },
        );
        table.add_user(
            "agonzalez",
            "finance2024",
            SubjectProfile {
                sub: "agonzalez".to_string(),
                dept: "Finance".to_string(),
                groups: vec!["FIN_APPROVERS".to_string()],
                risk_score: 30,
            },
        );
        table.add_user(
            "mrios",
            "admin_pass",
            SubjectProfile {
                sub: "mrios".to_string(),
                dept: "IT".to_string(),
                groups: vec!["ADMINS".to_string()],
                risk_score: 15,
            },
        );

        table
    }

    /// Registers a client credential.
    pub fn add_client(
        &mut self,
        client_id: impl Into<String>,
        secret: impl Into<String>,
        scopes: &[&str],
        profile: SubjectProfile,
    ) {
        self.clients.insert(
            client_id.into(),
            ClientEntry {
                secret: secret.into(),
                scopes: scopes.iter().map(ToString::to_string).collect(),
                profile,
            },
        );
    }

    /// Registers a user credential with the default user scopes.
    pub fn add_user(
        &mut self,
        username: impl Into<String>,
        password: impl Into<String>,
        profile: SubjectProfile,
    ) {
        self.users.insert(
            username.into(),
            UserEntry {
                password: password.into(),
                scopes: USER_SCOPES.iter().map(ToString::to_string).collect(),
                profile,
            },
        );
    }

    /// Checks client credentials; returns the profile and allowed scopes.
    #[must_use]
    pub fn validate_client(
        &self,
        client_id: &str,
        client_secret: &str,
    ) -> Option<(&SubjectProfile, &[String])> {
        let entry = self.clients.get(client_id)?;
        if entry.secret == client_secret {
            Some((&entry.profile, &entry.scopes))
        } else {
            None
        }
    }

    /// Checks user credentials; returns the profile and allowed scopes.
    #[must_use]
    pub fn validate_user(
        &self,
        username: &str,
        password: &str,
    ) -> Option<(&SubjectProfile, &[String])> {
        let entry = self.users.get(username)?;
        if entry.password == password {
            Some((&entry.profile, &entry.scopes))
        } else {
            None
        }
    }
}
