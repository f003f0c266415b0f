use std::net::TcpListener;
use std::time::Duration;

use clap::Subcommand;
use tasksync_core::credentials::{keyring_store, oauth};
use tasksync_core::{Config, CredentialStore, Database};

use super::{CmdResult, Scope};

const LOGIN_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Subcommand)]
pub enum AuthAction {
    /// Store the OAuth client id and secret in the OS keyring
    Configure {
        #[arg(long)]
        client_id: String,
        #[arg(long)]
        client_secret: String,
    },
    /// Authorize an account in the browser
    Login {
        /// Print the authorization URL instead of opening a browser
        #[arg(long)]
        no_browser: bool,
    },
    /// Show stored accounts
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Revoke and forget the account's credential
    Logout,
}

pub async fn run(action: AuthAction, scope: &Scope) -> CmdResult {
    match action {
        AuthAction::Configure {
            client_id,
            client_secret,
        } => {
            keyring_store::set(oauth::CLIENT_ID_KEY, client_id.trim())?;
            keyring_store::set(oauth::CLIENT_SECRET_KEY, client_secret.trim())?;
            println!("OAuth client stored in keyring");
        }
        AuthAction::Login { no_browser } => login(scope, no_browser).await?,
        AuthAction::Status { json } => {
            let store = credential_store()?;
            let db = Database::open()?;
            let accounts = store.list_accounts(&db)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&accounts)?);
            } else if accounts.is_empty() {
                println!("no accounts");
            } else {
                for cred in accounts {
                    let state = if cred.enabled { "active" } else { "needs login" };
                    let expiry = cred
                        .expires_at
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| "-".into());
                    println!(
                        "{}\t{}\t{state}\texpires {expiry}",
                        cred.account_id,
                        cred.email.as_deref().unwrap_or("-"),
                    );
                }
            }
        }
        AuthAction::Logout => {
            let store = credential_store()?;
            let db = Database::open()?;
            if store.revoke(&db, &scope.account).await? {
                println!("logged out of '{}'", scope.account);
            } else {
                println!("no credential for '{}'", scope.account);
            }
        }
    }
    Ok(())
}

fn credential_store() -> Result<CredentialStore, Box<dyn std::error::Error>> {
    let config = Config::load()?;
    Ok(CredentialStore::from_config(&config)?)
}

async fn login(scope: &Scope, no_browser: bool) -> CmdResult {
    let store = credential_store()?;
    let state = oauth::generate_state()?;
    let listener = TcpListener::bind(("127.0.0.1", store.oauth().redirect_port))?;
    let url = store.oauth().authorization_url(&state);

    println!("Authorize tasksync in your browser:\n{url}");
    if !no_browser {
        if let Err(e) = open::that(&url) {
            eprintln!("could not open a browser ({e}); open the URL above manually");
        }
    }

    let code = tokio::task::spawn_blocking(move || {
        oauth::wait_for_callback(&listener, &state, LOGIN_TIMEOUT)
    })
    .await??;

    let db = Database::open()?;
    let cred = store.complete_login(&db, &scope.account, &code).await?;
    match cred.email.as_deref() {
        Some(email) => println!("logged in '{}' as {email}", cred.account_id),
        None => println!("logged in '{}'", cred.account_id),
    }
    Ok(())
}
