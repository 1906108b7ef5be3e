//! # aegis-core
//!
//! Shared types for the Aegis identity microservice.
//!
//! This crate provides:
//! - The error taxonomy used at the resource-store (SCIM) boundary
//! - The [`DirectoryLookup`] trait through which the auth core reads the
//!   directory store

pub mod directory;
pub mod error;

pub use directory::{DirectoryLookup, UserAttributes};
pub use error::CoreError;

/// Type alias for results at the core/store boundary.
pub type CoreResult<T> = Result<T, CoreError>;
