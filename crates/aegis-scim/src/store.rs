//! Directory storage traits and the in-memory implementation.
//!
//! The stores are trait objects so a database-backed implementation can
//! slot in behind the same interface. The bundled [`InMemoryDirectory`]
//! keeps users and groups under one read-write lock and derives user group
//! membership from the group side at read time.

use std::collections::HashMap;
use std::sync::Arc;

use aegis_core::{CoreError, CoreResult, DirectoryLookup, UserAttributes};
use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::types::{GroupDraft, ScimGroup, ScimMeta, ScimUser, UserDraft};

/// Server-side filter for user listings.
#[derive(Debug, Clone, PartialEq)]
pub enum UserFilter {
    /// Exact `userName` match.
    UserNameEq(String),
}

/// Server-side filter for group listings.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupFilter {
    /// Exact `displayName` match.
    DisplayNameEq(String),
}

/// User persistence operations.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Creates a user. Fails with `AlreadyExists` on a duplicate `userName`.
    async fn create_user(&self, draft: UserDraft) -> CoreResult<ScimUser>;

    /// Fetches a user by id.
    async fn get_user(&self, id: &str) -> CoreResult<ScimUser>;

    /// Lists users, optionally filtered.
    async fn list_users(&self, filter: Option<&UserFilter>) -> CoreResult<Vec<ScimUser>>;

    /// Replaces a user's attributes.
    async fn replace_user(&self, id: &str, draft: UserDraft) -> CoreResult<ScimUser>;

    /// Deletes a user, removing it from all group memberships.
    async fn delete_user(&self, id: &str) -> CoreResult<()>;

    /// Finds a user by exact `userName`.
    async fn find_user_by_username(&self, user_name: &str) -> CoreResult<Option<ScimUser>>;
}

/// Group persistence operations.
#[async_trait]
pub trait GroupStore: Send + Sync {
    /// Creates a group. Fails with `AlreadyExists` on a duplicate
    /// `displayName` and `ReferentialIntegrity` on unknown members.
    async fn create_group(&self, draft: GroupDraft) -> CoreResult<ScimGroup>;

    /// Fetches a group by id.
    async fn get_group(&self, id: &str) -> CoreResult<ScimGroup>;

    /// Lists groups, optionally filtered.
    async fn list_groups(&self, filter: Option<&GroupFilter>) -> CoreResult<Vec<ScimGroup>>;

    /// Replaces a group's attributes and membership.
    async fn replace_group(&self, id: &str, draft: GroupDraft) -> CoreResult<ScimGroup>;

    /// Deletes a group.
    async fn delete_group(&self, id: &str) -> CoreResult<()>;

    /// Finds a group by exact `displayName`.
    async fn find_group_by_display_name(&self, name: &str) -> CoreResult<Option<ScimGroup>>;
}

#[derive(Default)]
struct DirectoryState {
    users: HashMap<String, ScimUser>,
    groups: HashMap<String, ScimGroup>,
}

impl DirectoryState {
    fn group_names_for(&self, user_id: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .groups
            .values()
            .filter(|group| group.members.iter().any(|m| m.value == user_id))
            .map(|group| group.display_name.clone())
            .collect();
        names.sort();
        names
    }

    fn with_groups(&self, user: &ScimUser) -> ScimUser {
        let mut resolved = user.clone();
        resolved.groups = self.group_names_for(&user.id);
        resolved
    }
}

/// In-memory user/group directory.
pub struct InMemoryDirectory {
    state: RwLock<DirectoryState>,
}

impl InMemoryDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(DirectoryState::default()),
        }
    }

    /// Creates an empty directory behind an `Arc`.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Number of stored users.
    pub async fn user_count(&self) -> usize {
        self.state.read().await.users.len()
    }

    /// Number of stored groups.
    pub async fn group_count(&self) -> usize {
        self.state.read().await.groups.len()
    }
}

impl Default for InMemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

fn new_user_id() -> String {
    format!("usr_{}", &Uuid::new_v4().simple().to_string()[..12])
}

fn new_group_id() -> String {
    format!("grp_{}", &Uuid::new_v4().simple().to_string()[..12])
}

fn user_from_draft(id: String, mut draft: UserDraft) -> ScimUser {
    if let Some(ref mut name) = draft.name {
        name.fill_formatted();
    }
    ScimUser {
        schemas: vec![crate::types::USER_SCHEMA.to_string()],
        id,
        user_name: draft.user_name.trim().to_string(),
        name: draft.name,
        active: draft.active,
        emails: draft.emails,
        groups: Vec::new(),
        dept: draft.dept,
        risk_score: draft.risk_score,
        meta: ScimMeta::now("User"),
    }
}

#[async_trait]
impl UserStore for InMemoryDirectory {
    async fn create_user(&self, draft: UserDraft) -> CoreResult<ScimUser> {
        draft
            .validate()
            .map_err(CoreError::invalid_resource)?;

        let mut state = self.state.write().await;
        let user_name = draft.user_name.trim();
        if state.users.values().any(|u| u.user_name == user_name) {
            return Err(CoreError::already_exists("User", user_name));
        }

        let user = user_from_draft(new_user_id(), draft);
        tracing::info!(user_id = %user.id, user_name = %user.user_name, "User created");
        state.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: &str) -> CoreResult<ScimUser> {
        let state = self.state.read().await;
        state
            .users
            .get(id)
            .map(|user| state.with_groups(user))
            .ok_or_else(|| CoreError::not_found("User", id))
    }

    async fn list_users(&self, filter: Option<&UserFilter>) -> CoreResult<Vec<ScimUser>> {
        let state = self.state.read().await;
        let mut users: Vec<ScimUser> = state
            .users
            .values()
            .filter(|user| match filter {
                Some(UserFilter::UserNameEq(name)) => user.user_name == *name,
                None => true,
            })
            .map(|user| state.with_groups(user))
            .collect();
        users.sort_by(|a, b| a.user_name.cmp(&b.user_name));
        Ok(users)
    }

    async fn replace_user(&self, id: &str, draft: UserDraft) -> CoreResult<ScimUser> {
        draft
            .validate()
            .map_err(CoreError::invalid_resource)?;

        let mut state = self.state.write().await;
        let user_name = draft.user_name.trim();
        if state
            .users
            .values()
            .any(|u| u.user_name == user_name && u.id != id)
        {
            return Err(CoreError::already_exists("User", user_name));
        }

        let Some(existing) = state.users.get(id) else {
            return Err(CoreError::not_found("User", id));
        };

        let mut replacement = user_from_draft(id.to_string(), draft);
        replacement.meta.created = existing.meta.created.clone();
        replacement.meta.touch();

        state.users.insert(id.to_string(), replacement.clone());
        let resolved = state.with_groups(&replacement);
        tracing::info!(user_id = %id, "User replaced");
        Ok(resolved)
    }

    async fn delete_user(&self, id: &str) -> CoreResult<()> {
        let mut state = self.state.write().await;
        if state.users.remove(id).is_none() {
            return Err(CoreError::not_found("User", id));
        }
        for group in state.groups.values_mut() {
            group.members.retain(|m| m.value != id);
        }
        tracing::info!(user_id = %id, "User deleted");
        Ok(())
    }

    async fn find_user_by_username(&self, user_name: &str) -> CoreResult<Option<ScimUser>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|u| u.user_name == user_name)
            .map(|user| state.with_groups(user)))
    }
}

fn check_members(state: &DirectoryState, draft: &GroupDraft) -> CoreResult<()> {
    for member in &draft.members {
        if !state.users.contains_key(&member.value) {
            return Err(CoreError::referential_integrity(format!(
                "Group member does not exist: {}",
                member.value
            )));
        }
    }
    Ok(())
}

#[async_trait]
impl GroupStore for InMemoryDirectory {
    async fn create_group(&self, draft: GroupDraft) -> CoreResult<ScimGroup> {
        draft
            .validate()
            .map_err(CoreError::invalid_resource)?;

        let mut state = self.state.write().await;
        if state
            .groups
            .values()
            .any(|g| g.display_name == draft.display_name)
        {
            return Err(CoreError::already_exists("Group", &draft.display_name));
        }
        check_members(&state, &draft)?;

        let group = ScimGroup {
            schemas: vec![crate::types::GROUP_SCHEMA.to_string()],
            id: new_group_id(),
            display_name: draft.display_name,
            members: draft.members,
            meta: ScimMeta::now("Group"),
        };
        tracing::info!(group_id = %group.id, display_name = %group.display_name, "Group created");
        state.groups.insert(group.id.clone(), group.clone());
        Ok(group)
    }

    async fn get_group(&self, id: &str) -> CoreResult<ScimGroup> {
        let state = self.state.read().await;
        state
            .groups
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("Group", id))
    }

    async fn list_groups(&self, filter: Option<&GroupFilter>) -> CoreResult<Vec<ScimGroup>> {
        let state = self.state.read().await;
        let mut groups: Vec<ScimGroup> = state
            .groups
            .values()
            .filter(|group| match filter {
                Some(GroupFilter::DisplayNameEq(name)) => group.display_name == *name,
                None => true,
            })
            .cloned()
            .collect();
        groups.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        Ok(groups)
    }

    async fn replace_group(&self, id: &str, draft: GroupDraft) -> CoreResult<ScimGroup> {
        draft
            .validate()
            .map_err(CoreError::invalid_resource)?;

        let mut state = self.state.write().await;
        if state
            .groups
            .values()
            .any(|g| g.display_name == draft.display_name && g.id != id)
        {
            return Err(CoreError::already_exists("Group", &draft.display_name));
        }
        check_members(&state, &draft)?;

        let Some(existing) = state.groups.get(id) else {
            return Err(CoreError::not_found("Group", id));
        };

        let mut meta = existing.meta.clone();
        meta.touch();
        let group = ScimGroup {
            schemas: vec![crate::types::GROUP_SCHEMA.to_string()],
            id: id.to_string(),
            display_name: draft.display_name,
            members: draft.members,
            meta,
        };
        state.groups.insert(id.to_string(), group.clone());
        tracing::info!(group_id = %id, "Group replaced");
        Ok(group)
    }

    async fn delete_group(&self, id: &str) -> CoreResult<()> {
        let mut state = self.state.write().await;
        if state.groups.remove(id).is_none() {
            return Err(CoreError::not_found("Group", id));
        }
        tracing::info!(group_id = %id, "Group deleted");
        Ok(())
    }

    async fn find_group_by_display_name(&self, name: &str) -> CoreResult<Option<ScimGroup>> {
        let state = self.state.read().await;
        Ok(state
            .groups
            .values()
            .find(|g| g.display_name == name)
            .cloned())
    }
}

#[async_trait]
impl DirectoryLookup for InMemoryDirectory {
    async fn lookup_user_by_name(&self, name: &str) -> CoreResult<Option<UserAttributes>> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.user_name == name).map(|user| {
            UserAttributes {
                username: user.user_name.clone(),
                active: user.active,
                dept: user.dept.clone(),
                groups: state.group_names_for(&user.id),
                risk_score: Some(user.risk_score),
            }
        }))
    }

    async fn validate_group_exists(&self, name: &str) -> CoreResult<bool> {
        let state = self.state.read().await;
        Ok(state.groups.values().any(|g| g.display_name == name))
    }
}
