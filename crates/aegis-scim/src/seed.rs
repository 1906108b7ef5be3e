//! Initial directory data.

use aegis_core::CoreResult;

use crate::store::{GroupStore, InMemoryDirectory, UserStore};
use crate::types::{GroupDraft, GroupMember, ScimEmail, ScimName, UserDraft};

fn user(
    user_name: &str,
    given: &str,
    family: &str,
    email: &str,
    active: bool,
    dept: &str,
    risk_score: i64,
) -> UserDraft {
    UserDraft {
        user_name: user_name.to_string(),
        name: Some(ScimName {
            given_name: Some(given.to_string()),
            family_name: Some(family.to_string()),
            formatted: None,
        }),
        active,
        emails: vec![ScimEmail {
            value: email.to_string(),
            primary: true,
            email_type: "work".to_string(),
        }],
        dept: Some(dept.to_string()),
        risk_score,
    }
}

/// Seeds the directory with the initial users and groups.
///
/// Skipped when the directory already holds data, so restarts do not
/// duplicate resources.
///
/// # Errors
///
/// Propagates store failures.
pub async fn seed_initial_data(directory: &InMemoryDirectory) -> CoreResult<()> {
    if directory.user_count().await > 0 {
        tracing::info!("Initial data already exists, skipping seed");
        return Ok(());
    }

    let jdoe = directory
        .create_user(user(
            "jdoe",
            "John",
            "Doe",
            "john.doe@company.com",
            true,
            "HR",
            20,
        ))
        .await?;
    let agonzalez = directory
        .create_user(user(
            "agonzalez",
            "Ana",
            "González",
            "ana.gonzalez@company.com",
            true,
            "Finance",
            30,
        ))
        .await?;
    let mrios = directory
        .create_user(user(
            "mrios",
            "Miguel",
            "Ríos",
            "miguel.rios@company.com",
            false,
            "IT",
            15,
        ))
        .await?;

    let member = |user: &crate::types::ScimUser| GroupMember {
        value: user.id.clone(),
        display: Some(user.user_name.clone()),
    };

    directory
        .create_group(GroupDraft {
            display_name: "HR_READERS".to_string(),
            members: vec![member(&jdoe)],
        })
        .await?;
    directory
        .create_group(GroupDraft {
            display_name: "FIN_APPROVERS".to_string(),
            members: vec![member(&agonzalez)],
        })
        .await?;
    directory
        .create_group(GroupDraft {
            display_name: "ADMINS".to_string(),
            members: vec![member(&mrios)],
        })
        .await?;

    tracing::info!(users_created = 3, groups_created = 3, "Initial data seeded");
    Ok(())
}
