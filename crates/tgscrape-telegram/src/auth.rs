//! Interactive authorization.
//!
//! Scrapes run as a user account, so the very first start needs a login code
//! (and possibly a 2FA password) typed at the terminal. Every later start
//! reuses the saved session file.

use std::io::{self, BufRead, Write};

use grammers_client::{Client, SignInError};
use tracing::info;

use tgscrape_core::{config::Config, Error, Result};

/// Ensure the client is authorized, running the interactive login flow when
/// the saved session is stale or missing.
pub async fn ensure_authorized(client: &Client, cfg: &Config) -> Result<()> {
    if client
        .is_authorized()
        .await
        .map_err(|e| Error::Source(format!("authorization check failed: {e}")))?
    {
        return Ok(());
    }

    let phone = cfg.phone.clone().ok_or_else(|| {
        Error::Config("session is not authorized and TG_PHONE is not set".to_string())
    })?;

    info!(phone = %phone, "requesting login code");
    let token = client
        .request_login_code(&phone)
        .await
        .map_err(|e| Error::Source(format!("login code request failed: {e}")))?;

    let code = prompt("Enter the login code: ")?;
    match client.sign_in(&token, code.trim()).await {
        Ok(_) => {}
        Err(SignInError::PasswordRequired(password_token)) => {
            let password = prompt("Enter your 2FA password: ")?;
            client
                .check_password(password_token, password.trim())
                .await
                .map_err(|e| Error::Source(format!("2FA check failed: {e}")))?;
        }
        Err(e) => return Err(Error::Source(format!("sign in failed: {e}"))),
    }

    client.session().save_to_file(&cfg.session_file)?;
    info!("session authorized and saved");
    Ok(())
}

fn prompt(message: &str) -> Result<String> {
    let mut stdout = io::stdout().lock();
    stdout.write_all(message.as_bytes())?;
    stdout.flush()?;

    let mut line = String::new();
    let read = io::stdin().lock().read_line(&mut line)?;
    if read == 0 {
        return Err(Error::Config(
            "interaction required for login but stdin is closed".to_string(),
        ));
    }
    Ok(line)
}
