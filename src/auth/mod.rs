//! Token issuing and verification.
//!
//! # Data Flow
//! ```text
//! handler → KeyRing::sign(payload) → "header.payload.signature"
//! request → BearerAuth → KeyRing::verify → locals → handler
//! config reload → KeyRing::sync_secrets
//! ```

pub mod lifetime;
pub mod middleware;
pub mod token;

pub use lifetime::Lifetime;
pub use middleware::{bearer_token, BearerAuth};
pub use token::{AuthError, Claims, Header, KeyRing, TokenData};
