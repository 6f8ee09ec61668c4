//! Comfort Way Core Library
//!
//! The I/O-free half of the backend's authentication design:
//! - Roles form a closed set of capability levels
//! - Sessions are signed, time-bound tokens carrying identity and role claims
//! - Email sign-in links are signed, single-audience tokens
//! - The access policy guard decides every authorization question

pub mod error;
pub mod link;
pub mod policy;
pub mod role;
pub mod session;

pub use error::Error;
pub use link::{LinkClaims, LinkSigner};
pub use policy::Decision;
pub use role::Role;
pub use session::{SessionClaims, SessionIssuer};

/// Result type for comfortway-core operations
pub type Result<T> = std::result::Result<T, Error>;
