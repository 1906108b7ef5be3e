//! # aegis-scim
//!
//! SCIM 2.0 user/group provisioning for the Aegis identity microservice.
//!
//! This crate provides:
//! - SCIM resource types (users, groups, list envelopes)
//! - Storage traits plus the bundled in-memory directory
//! - Seed data for first boot
//! - Axum handlers for the `/scim/v2` surface
//!
//! The auth core only reads the directory through
//! [`aegis_core::DirectoryLookup`], which [`InMemoryDirectory`] implements.

pub mod handlers;
pub mod seed;
pub mod store;
pub mod types;

pub use handlers::{ScimState, router};
pub use seed::seed_initial_data;
pub use store::{GroupFilter, GroupStore, InMemoryDirectory, UserFilter, UserStore};
pub use types::{
    GroupDraft, GroupMember, ListResponse, ScimEmail, ScimGroup, ScimMeta, ScimName, ScimUser,
    UserDraft,
};
