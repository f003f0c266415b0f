//! OAuth credentials: acquisition, storage, refresh and revocation.

pub mod keyring_store;
pub mod oauth;
pub mod store;

pub use oauth::{OAuthConfig, TokenSet};
pub use store::{Credential, CredentialStore};
