//! `maarif-core` — domain foundation for the maarif authorization engine.
//!
//! Pure domain primitives only: strongly-typed identifiers and the shared
//! error model. No infrastructure concerns.

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{InstitutionId, RoleId, UserId};
