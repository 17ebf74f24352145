//! Kennel authorization
//!
//! Every protected operation runs the same three-step precondition before
//! touching state:
//!
//! 1. verify the bearer credential (structure, signature, expiry)
//! 2. decode it to a candidate principal id
//! 3. confirm the principal still exists
//!
//! Steps 1 and 2 fail with the same generic outcome so callers cannot tell
//! which check rejected them. There is no session store; the gate re-runs on
//! every call.

pub mod error;
pub mod gate;
pub mod token;
pub mod verifier;

pub use error::{AuthFailure, AuthResult, CredentialError};
pub use gate::AuthGate;
pub use token::{HmacCredentialVerifier, TokenKey};
pub use verifier::CredentialVerifier;
