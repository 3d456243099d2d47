//! Authentication and request-scoped identity.
//!
//! Requests to protected routes carry `Authorization: Bearer <token>`. The
//! [`AuthGate`] validates the token with the [`TokenCodec`], resolves its
//! subject through an [`IdentityStore`], and on success the middleware
//! attaches an [`AuthenticatedUser`] to the request for handlers to read via
//! the [`CurrentUser`] extractor.
//!
//! ## Security Model
//!
//! - The signature is verified before any claim is trusted
//! - Rejections never carry key material, only the failure reason
//! - Store outages map to server errors, not "unknown user"
//! - Nothing about a resolved identity outlives its request

mod context;
mod gate;
pub mod token;
mod user_store;

#[cfg(test)]
pub(crate) mod testing;

pub use context::{AuthenticatedUser, CurrentUser};
pub use gate::{AuthError, AuthGate};
pub use token::{Clock, FixedClock, SystemClock, TokenCodec, TokenError, extract_bearer};
pub use user_store::{
    IdentityStore, StoreError, StoreFuture, UserStore, hash_password, verify_password,
};
