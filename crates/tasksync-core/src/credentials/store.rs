//! Per-account OAuth credentials persisted in SQLite.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;

use super::oauth::{self, OAuthConfig, TokenSet};
use crate::error::{CredentialError, DatabaseError, OAuthError};
use crate::storage::database::{opt_ts_from_sql, ts_from_sql, ts_to_sql};
use crate::storage::{Config, Database};

const CREDENTIAL_COLUMNS: &str =
    "account_id, access_token, refresh_token, expires_at, scopes, email, enabled, created_at, updated_at";
const HTTP_TIMEOUT: Duration = Duration::from_secs(20);

/// A stored OAuth credential for one account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Credential {
    pub account_id: String,
    #[serde(skip_serializing)]
    pub access_token: String,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub scopes: Vec<String>,
    pub email: Option<String>,
    /// `false` once a refresh has been rejected; the user must log in again.
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Credential {
    /// Whether the access token expires within `margin` of `now`. A
    /// credential without an expiry never needs refreshing.
    pub fn expires_within(&self, now: DateTime<Utc>, margin: chrono::Duration) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now + margin)
    }
}

fn row_to_credential(row: &Row<'_>) -> rusqlite::Result<Credential> {
    let scopes: String = row.get(4)?;
    Ok(Credential {
        account_id: row.get(0)?,
        access_token: row.get(1)?,
        refresh_token: row.get(2)?,
        expires_at: opt_ts_from_sql(3, row.get(3)?)?,
        scopes: scopes.split_whitespace().map(String::from).collect(),
        email: row.get(5)?,
        enabled: row.get::<_, i64>(6)? != 0,
        created_at: ts_from_sql(7, &row.get::<_, String>(7)?)?,
        updated_at: ts_from_sql(8, &row.get::<_, String>(8)?)?,
    })
}

/// Owns the credential lifecycle: store after login, hand out a valid access
/// token (refreshing near expiry), disable on rejected refresh, revoke.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    oauth: OAuthConfig,
    http: Client,
    refresh_margin: chrono::Duration,
}

impl CredentialStore {
    /// `refresh_margin_secs`: refresh when the token expires within this
    /// many seconds.
    pub fn new(oauth: OAuthConfig, refresh_margin_secs: i64) -> Result<Self, OAuthError> {
        let http = Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            oauth,
            http,
            refresh_margin: chrono::Duration::seconds(refresh_margin_secs.max(0)),
        })
    }

    /// Build from the `[oauth]` section of `config`.
    pub fn from_config(config: &Config) -> Result<Self, OAuthError> {
        Self::new(
            OAuthConfig::from_config(config)?,
            config.oauth.refresh_margin_secs,
        )
    }

    pub fn oauth(&self) -> &OAuthConfig {
        &self.oauth
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    /// Insert or replace the credential for `account_id`.
    ///
    /// A missing refresh token or email keeps whatever was stored before.
    /// Storing always re-enables the credential.
    pub fn store(
        &self,
        db: &Database,
        account_id: &str,
        tokens: &TokenSet,
        email: Option<&str>,
    ) -> Result<Credential, DatabaseError> {
        let now = ts_to_sql(&Utc::now());
        db.conn().execute(
            "INSERT INTO credentials
                (account_id, access_token, refresh_token, expires_at, scopes, email, enabled, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?7)
             ON CONFLICT(account_id) DO UPDATE SET
                access_token = excluded.access_token,
                refresh_token = COALESCE(excluded.refresh_token, credentials.refresh_token),
                expires_at = excluded.expires_at,
                scopes = CASE WHEN excluded.scopes = '' THEN credentials.scopes ELSE excluded.scopes END,
                email = COALESCE(excluded.email, credentials.email),
                enabled = 1,
                updated_at = excluded.updated_at",
            params![
                account_id,
                tokens.access_token,
                tokens.refresh_token,
                tokens.expires_at.as_ref().map(ts_to_sql),
                tokens.scopes.join(" "),
                email,
                now,
            ],
        )?;
        self.get(db, account_id)?.ok_or_else(|| {
            DatabaseError::QueryFailed(format!("credential for {account_id} vanished after write"))
        })
    }

    /// Finish an authorization-code login: exchange the code, look up the
    /// account email and store the result.
    pub async fn complete_login(
        &self,
        db: &Database,
        account_id: &str,
        code: &str,
    ) -> Result<Credential, crate::error::CoreError> {
        let tokens = oauth::exchange_code(&self.http, &self.oauth, code).await?;
        let email = match oauth::fetch_email(&self.http, &self.oauth, &tokens.access_token).await {
            Ok(email) => email,
            Err(e) => {
                tracing::debug!(account_id, error = %e, "could not fetch account email");
                None
            }
        };
        let cred = self.store(db, account_id, &tokens, email.as_deref())?;
        tracing::info!(account_id, email = ?cred.email, "stored credential");
        Ok(cred)
    }

    /// The stored credential, enabled or not.
    pub fn get(
        &self,
        db: &Database,
        account_id: &str,
    ) -> Result<Option<Credential>, DatabaseError> {
        let sql = format!("SELECT {CREDENTIAL_COLUMNS} FROM credentials WHERE account_id = ?1");
        let cred = db
            .conn()
            .query_row(&sql, params![account_id], row_to_credential)
            .optional()?;
        Ok(cred)
    }

    /// All stored credentials, ordered by account.
    pub fn list_accounts(&self, db: &Database) -> Result<Vec<Credential>, DatabaseError> {
        let sql = format!("SELECT {CREDENTIAL_COLUMNS} FROM credentials ORDER BY account_id");
        let mut stmt = db.conn().prepare(&sql)?;
        let rows = stmt.query_map([], row_to_credential)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Mark the credential unusable without deleting it.
    pub fn disable(&self, db: &Database, account_id: &str) -> Result<(), DatabaseError> {
        db.conn().execute(
            "UPDATE credentials SET enabled = 0, updated_at = ?2 WHERE account_id = ?1",
            params![account_id, ts_to_sql(&Utc::now())],
        )?;
        Ok(())
    }

    /// Return a credential whose access token is usable now.
    ///
    /// `None` means the account needs to log in: no credential, a disabled
    /// one, or a refresh the identity provider rejected (which also disables
    /// it). A refresh that could not complete right now (unreachable
    /// provider, 5xx, 429) is [`CredentialError::Transient`] and leaves the
    /// credential enabled for the next attempt.
    pub async fn get_valid_credential(
        &self,
        db: &Database,
        account_id: &str,
    ) -> Result<Option<Credential>, CredentialError> {
        let Some(cred) = self.get(db, account_id)? else {
            return Ok(None);
        };
        if !cred.enabled {
            tracing::debug!(account_id, "credential is disabled");
            return Ok(None);
        }
        if !cred.expires_within(Utc::now(), self.refresh_margin) {
            return Ok(Some(cred));
        }

        let Some(refresh_token) = cred.refresh_token.as_deref() else {
            tracing::warn!(account_id, "access token expired and no refresh token stored");
            self.disable(db, account_id)?;
            return Ok(None);
        };

        match oauth::refresh(&self.http, &self.oauth, refresh_token).await {
            Ok(tokens) => {
                tracing::info!(account_id, "refreshed access token");
                Ok(Some(self.store(db, account_id, &tokens, None)?))
            }
            Err(e) if e.is_transient() => {
                tracing::warn!(account_id, error = %e, "token refresh unavailable, will retry");
                Err(CredentialError::Transient(e))
            }
            Err(e) => {
                tracing::warn!(
                    account_id,
                    error = %e,
                    "token refresh rejected, disabling credential"
                );
                self.disable(db, account_id)?;
                Ok(None)
            }
        }
    }

    /// Revoke the token at the provider (best effort) and delete the local
    /// credential regardless. Returns whether a credential existed.
    pub async fn revoke(&self, db: &Database, account_id: &str) -> Result<bool, DatabaseError> {
        let Some(cred) = self.get(db, account_id)? else {
            return Ok(false);
        };

        let token = cred.refresh_token.as_deref().unwrap_or(&cred.access_token);
        if let Err(e) = oauth::revoke(&self.http, &self.oauth, token).await {
            tracing::warn!(
                account_id,
                error = %e,
                "remote revoke failed, deleting local credential anyway"
            );
        }

        db.conn().execute(
            "DELETE FROM credentials WHERE account_id = ?1",
            params![account_id],
        )?;
        Ok(true)
    }
}
