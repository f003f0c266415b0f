//! Thin wrapper around the OS keyring for OAuth client secrets.

use crate::error::OAuthError;

const SERVICE: &str = "tasksync";

pub fn get(key: &str) -> Result<Option<String>, OAuthError> {
    let entry = keyring::Entry::new(SERVICE, key)?;
    match entry.get_password() {
        Ok(pw) => Ok(Some(pw)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn set(key: &str, value: &str) -> Result<(), OAuthError> {
    let entry = keyring::Entry::new(SERVICE, key)?;
    entry.set_password(value)?;
    Ok(())
}
