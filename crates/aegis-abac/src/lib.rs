//! # aegis-abac
//!
//! Attribute-based access control engine for the Aegis identity
//! microservice.
//!
//! This crate provides:
//! - The policy model: decisions, operators, tagged condition trees
//! - A validator that checks externally-authored JSON policy documents
//! - A file-backed policy repository with mtime-driven hot reload
//! - A recursive condition evaluator with typed operator dispatch
//! - The authorization service: precedence resolution, decision caching,
//!   audit logging
//!
//! ## Modules
//!
//! - [`model`] - Shared policy and request/response types
//! - [`validator`] - Policy document validation and compilation
//! - [`repository`] - Hot-reloading policy repository
//! - [`evaluator`] - Condition tree evaluation
//! - [`cache`] - Decision cache with content-addressed fingerprints
//! - [`service`] - Authorization orchestration

pub mod cache;
pub mod error;
pub mod evaluator;
pub mod model;
pub mod repository;
pub mod service;
pub mod validator;

pub use cache::{DecisionCache, fingerprint};
pub use error::PolicyError;
pub use evaluator::{evaluate_node, flatten_request};
pub use model::{
    AbacRequest, AbacResponse, ConditionNode, ContextAttributes, Decision, EffectsDistribution,
    FlattenedContext, LeafCondition, Operator, OperatorCheck, Policy, PolicySet,
    ResourceAttributes, SubjectAttributes, ValidationResult, parse_hh_mm,
};
pub use repository::{PolicyRepository, PolicySetMetadata, PolicySnapshot};
pub use service::{
    ApplicablePolicies, AuthzMetrics, AuthzService, PolicyApplicability, ReloadOutcome,
};
pub use validator::PolicyValidator;
