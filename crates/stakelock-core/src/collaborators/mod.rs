//! # Collaborators
//!
//! External services the manager consumes but does not own.
//!
//! - `Clock`: injected time source, never read ambiently
//! - `Custody`: the pooled fungible asset backing all stake
//! - `AuthorizationGate`: privileged operation checks
//!
//! Each trait ships one production-shaped implementation and, where tests
//! need it, a deterministic one.

mod auth;
mod clock;
mod custody;

pub use auth::*;
pub use clock::*;
pub use custody::*;
