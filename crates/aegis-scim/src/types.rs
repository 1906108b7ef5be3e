//! SCIM 2.0 resource types.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// SCIM core User schema URN.
pub const USER_SCHEMA: &str = "urn:ietf:params:scim:schemas:core:2.0:User";
/// SCIM core Group schema URN.
pub const GROUP_SCHEMA: &str = "urn:ietf:params:scim:schemas:core:2.0:Group";
/// SCIM list response schema URN.
pub const LIST_RESPONSE_SCHEMA: &str = "urn:ietf:params:scim:api:messages:2.0:ListResponse";
/// SCIM error schema URN.
pub const ERROR_SCHEMA: &str = "urn:ietf:params:scim:api:messages:2.0:Error";

/// SCIM resource metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimMeta {
    /// Resource kind ("User" or "Group").
    pub resource_type: String,
    /// Creation timestamp, RFC 3339.
    pub created: String,
    /// Last modification timestamp, RFC 3339.
    pub last_modified: String,
    /// Resource location, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl ScimMeta {
    /// Fresh metadata for a newly created resource.
    #[must_use]
    pub fn now(resource_type: &str) -> Self {
        let stamp = now_rfc3339();
        Self {
            resource_type: resource_type.to_string(),
            created: stamp.clone(),
            last_modified: stamp,
            location: None,
        }
    }

    /// Updates the modification timestamp.
    pub fn touch(&mut self) {
        self.last_modified = now_rfc3339();
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

/// SCIM name component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimName {
    /// Given name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    /// Family name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    /// Full formatted name; derived from the parts when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatted: Option<String>,
}

impl ScimName {
    /// Fills `formatted` from the name parts when it is missing.
    pub fn fill_formatted(&mut self) {
        if self.formatted.is_none() {
            let formatted = [self.given_name.as_deref(), self.family_name.as_deref()]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" ");
            if !formatted.is_empty() {
                self.formatted = Some(formatted);
            }
        }
    }
}

fn default_email_type() -> String {
    "work".to_string()
}

/// SCIM email entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScimEmail {
    /// Email address.
    pub value: String,
    /// Whether this is the primary address.
    #[serde(default)]
    pub primary: bool,
    /// Address type, defaulting to `work`.
    #[serde(default = "default_email_type", rename = "type")]
    pub email_type: String,
}

fn user_schemas() -> Vec<String> {
    vec![USER_SCHEMA.to_string()]
}

fn group_schemas() -> Vec<String> {
    vec![GROUP_SCHEMA.to_string()]
}

fn default_active() -> bool {
    true
}

/// A stored SCIM user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimUser {
    /// Schema URNs.
    #[serde(default = "user_schemas")]
    pub schemas: Vec<String>,
    /// Server-assigned identifier.
    pub id: String,
    /// Unique username.
    pub user_name: String,
    /// Name components.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<ScimName>,
    /// Whether the account is active.
    #[serde(default = "default_active")]
    pub active: bool,
    /// Email addresses.
    #[serde(default)]
    pub emails: Vec<ScimEmail>,
    /// Display names of groups the user belongs to (derived, read-only).
    #[serde(default)]
    pub groups: Vec<String>,
    /// Department attribute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dept: Option<String>,
    /// Risk score in `[0, 100]`.
    #[serde(default)]
    pub risk_score: i64,
    /// Resource metadata.
    pub meta: ScimMeta,
}

/// Payload for creating or replacing a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDraft {
    /// Unique username.
    pub user_name: String,
    /// Name components.
    #[serde(default)]
    pub name: Option<ScimName>,
    /// Whether the account is active.
    #[serde(default = "default_active")]
    pub active: bool,
    /// Email addresses.
    #[serde(default)]
    pub emails: Vec<ScimEmail>,
    /// Department attribute.
    #[serde(default)]
    pub dept: Option<String>,
    /// Risk score in `[0, 100]`.
    #[serde(default)]
    pub risk_score: i64,
}

impl UserDraft {
    /// Validates the draft against the SCIM constraints.
    ///
    /// # Errors
    ///
    /// Returns a description of the first violated constraint.
    pub fn validate(&self) -> Result<(), String> {
        let user_name = self.user_name.trim();
        if user_name.is_empty() {
            return Err("userName is required".to_string());
        }
        if user_name.len() < 2 || user_name.len() > 50 {
            return Err("userName must be between 2 and 50 characters".to_string());
        }
        if !user_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        {
            return Err(
                "userName can only contain letters, numbers, dots, hyphens and underscores"
                    .to_string(),
            );
        }

        if !(0..=100).contains(&self.risk_score) {
            return Err("riskScore must be between 0 and 100".to_string());
        }

        let primaries = self.emails.iter().filter(|e| e.primary).count();
        if primaries > 1 {
            return Err("Only one email can be marked as primary".to_string());
        }
        for email in &self.emails {
            if !is_plausible_email(&email.value) {
                return Err(format!("Invalid email format: {}", email.value));
            }
        }

        Ok(())
    }
}

fn is_plausible_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

/// Group membership entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMember {
    /// Member user id.
    pub value: String,
    /// Display hint, usually the username.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

/// A stored SCIM group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimGroup {
    /// Schema URNs.
    #[serde(default = "group_schemas")]
    pub schemas: Vec<String>,
    /// Server-assigned identifier.
    pub id: String,
    /// Unique display name.
    pub display_name: String,
    /// Member user references.
    #[serde(default)]
    pub members: Vec<GroupMember>,
    /// Resource metadata.
    pub meta: ScimMeta,
}

/// Payload for creating or replacing a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupDraft {
    /// Unique display name.
    pub display_name: String,
    /// Member user ids.
    #[serde(default)]
    pub members: Vec<GroupMember>,
}

impl GroupDraft {
    /// Validates the draft.
    ///
    /// # Errors
    ///
    /// Returns a description of the first violated constraint.
    pub fn validate(&self) -> Result<(), String> {
        if self.display_name.trim().is_empty() {
            return Err("displayName is required".to_string());
        }
        Ok(())
    }
}

/// SCIM list response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse<T> {
    /// Schema URNs.
    pub schemas: Vec<String>,
    /// Total matching resources, before pagination.
    pub total_results: usize,
    /// 1-based index of the first returned resource.
    pub start_index: usize,
    /// Number of resources in this page.
    pub items_per_page: usize,
    /// The page of resources.
    #[serde(rename = "Resources")]
    pub resources: Vec<T>,
}

impl<T> ListResponse<T> {
    /// Builds a list response for one page.
    #[must_use]
    pub fn page(total_results: usize, start_index: usize, resources: Vec<T>) -> Self {
        Self {
            schemas: vec![LIST_RESPONSE_SCHEMA.to_string()],
            total_results,
            start_index,
            items_per_page: resources.len(),
            resources,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(user_name: &str) -> UserDraft {
        UserDraft {
            user_name: user_name.to_string(),
            name: None,
            active: true,
            emails: Vec::new(),
            dept: None,
            risk_score: 0,
        }
    }

    #[test]
    fn test_user_draft_username_rules() {
        assert!(draft("jdoe").validate().is_ok());
        assert!(draft("j.doe-1_x").validate().is_ok());
        assert!(draft("").validate().is_err());
        assert!(draft("j").validate().is_err());
        assert!(draft(&"x".repeat(51)).validate().is_err());
        assert!(draft("j doe").validate().is_err());
        assert!(draft("jdoe!").validate().is_err());
    }

    #[test]
    fn test_user_draft_risk_score_bounds() {
        let mut d = draft("jdoe");
        d.risk_score = 0;
        assert!(d.validate().is_ok());
        d.risk_score = 100;
        assert!(d.validate().is_ok());
        d.risk_score = 101;
        assert!(d.validate().is_err());
        d.risk_score = -1;
        assert!(d.validate().is_err());
    }

    #[test]
    fn test_user_draft_email_rules() {
        let mut d = draft("jdoe");
        d.emails = vec![ScimEmail {
            value: "john.doe@company.com".to_string(),
            primary: true,
            email_type: "work".to_string(),
        }];
        assert!(d.validate().is_ok());

        d.emails.push(ScimEmail {
            value: "jd@home.net".to_string(),
            primary: true,
            email_type: "home".to_string(),
        });
        assert!(d.validate().is_err());

        d.emails = vec![ScimEmail {
            value: "not-an-email".to_string(),
            primary: false,
            email_type: "work".to_string(),
        }];
        assert!(d.validate().is_err());
    }

    #[test]
    fn test_name_formatted_derivation() {
        let mut name = ScimName {
            given_name: Some("John".to_string()),
            family_name: Some("Doe".to_string()),
            formatted: None,
        };
        name.fill_formatted();
        assert_eq!(name.formatted.as_deref(), Some("John Doe"));

        let mut explicit = ScimName {
            given_name: Some("John".to_string()),
            family_name: None,
            formatted: Some("Dr. J".to_string()),
        };
        explicit.fill_formatted();
        assert_eq!(explicit.formatted.as_deref(), Some("Dr. J"));
    }

    #[test]
    fn test_list_response_page() {
        let page = ListResponse::page(10, 1, vec!["a", "b"]);
        assert_eq!(page.total_results, 10);
        assert_eq!(page.items_per_page, 2);
        let json = serde_json::to_value(&page).unwrap();
        assert!(json["Resources"].is_array());
        assert_eq!(json["totalResults"], 10);
        assert_eq!(json["startIndex"], 1);
    }

    #[test]
    fn test_group_draft_validation() {
        let ok = GroupDraft {
            display_name: "ADMINS".to_string(),
            members: Vec::new(),
        };
        assert!(ok.validate().is_ok());

        let bad = GroupDraft {
            display_name: "  ".to_string(),
            members: Vec::new(),
        };
        assert!(bad.validate().is_err());
    }
}
