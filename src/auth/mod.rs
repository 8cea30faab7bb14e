//! Token issuance and verification for websocket clients.
//!
//! The [`AuthGate`] owns the signing key. It is loaded from the token
//! singleton at startup, or created on first run together with a token for
//! the default web UI client, which is written to the configured auth file.

mod client_files;
pub mod token;

pub use client_files::ClientConfigFile;
pub use token::{Claims, ISSUER};

use crate::config::Config;
use crate::db::{ConfigSnapshot, Database, TokenRecord};
use crate::error::Result;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Signs and checks client tokens
pub struct AuthGate {
    db: Arc<Database>,
    record: RwLock<TokenRecord>,
}

impl AuthGate {
    /// Load the stored signing key, or initialise one on first run
    ///
    /// First run mints a token for `config.client.default_client_name`,
    /// stores the record and writes the token to `config.client.auth_file`.
    /// A failed file write is logged and does not abort startup.
    pub async fn load_or_init(db: Arc<Database>, config: &Config) -> Result<Self> {
        if let Some(record) = db.load_tokens().await? {
            tracing::debug!(issued = record.token_names.len(), "loaded signing key");
            return Ok(Self {
                db,
                record: RwLock::new(record),
            });
        }

        tracing::info!("No token record found, assuming first run and generating a signing key");
        let record = Self::fresh_record(config)?;
        db.save_tokens(&record).await?;
        write_auth_file(config, &record.first_token).await;

        Ok(Self {
            db,
            record: RwLock::new(record),
        })
    }

    fn fresh_record(config: &Config) -> Result<TokenRecord> {
        let signing_key = token::generate_signing_key();
        let client_name = config.client.default_client_name.clone();
        let first_token = token::sign(&Claims::for_client(&client_name), &signing_key)?;
        Ok(TokenRecord {
            signing_key,
            token_names: vec![client_name],
            first_token,
        })
    }

    /// Check a token and return its claims
    pub async fn verify(&self, token: &str) -> Result<Claims> {
        let record = self.record.read().await;
        token::verify(token, &record.signing_key)
    }

    /// Mint a token for `client_name` and record the name
    ///
    /// The name is stored before the token is returned.
    pub async fn issue_token(&self, client_name: &str) -> Result<String> {
        if client_name.trim().is_empty() {
            return Err(crate::error::AuthError::InvalidClaims("empty client name".into()).into());
        }

        let mut record = self.record.write().await;
        let token = token::sign(&Claims::for_client(client_name), &record.signing_key)?;

        let mut next = record.clone();
        next.token_names.push(client_name.to_string());
        self.db.save_tokens(&next).await?;
        *record = next;

        tracing::info!(client_name, "issued new client token");
        Ok(token)
    }

    /// Replace the signing key, invalidating every issued token
    ///
    /// A new first token is minted for the default client and written to the
    /// auth file. Returns that token.
    pub async fn rotate_signing_key(&self, config: &Config) -> Result<String> {
        let mut record = self.record.write().await;
        let next = Self::fresh_record(config)?;
        self.db.save_tokens(&next).await?;
        *record = next;

        tracing::warn!("signing key rotated, previously issued tokens are no longer valid");
        write_auth_file(config, &record.first_token).await;
        Ok(record.first_token.clone())
    }

    /// Token minted for the default client
    pub async fn first_token(&self) -> String {
        self.record.read().await.first_token.clone()
    }

    /// Every client name a token has been issued for
    pub async fn issued_names(&self) -> Vec<String> {
        self.record.read().await.token_names.clone()
    }

    /// Regenerate the client config file when the connect settings changed
    ///
    /// Compares the stored snapshot with the current client settings and
    /// websocket address. When there is no snapshot or they differ, the file
    /// is rewritten and the snapshot replaced. Returns whether it was written.
    pub async fn sync_client_config(&self, config: &Config) -> Result<bool> {
        let current = ConfigSnapshot {
            client: config.client.clone(),
            websocket_address: config.websocket_address(),
        };

        match self.db.load_config_snapshot().await? {
            Some(stored) if stored == current => {
                tracing::info!("Client settings unchanged, not regenerating client config");
                return Ok(false);
            }
            Some(_) => tracing::info!("Client settings changed, rewriting client config"),
            None => tracing::info!("No stored client settings, generating client config"),
        }

        let contents = ClientConfigFile::new(config, &self.first_token().await);
        client_files::write_client_config(&config.client.config_file, &contents).await?;
        self.db.save_config_snapshot(&current).await?;
        Ok(true)
    }
}

async fn write_auth_file(config: &Config, token: &str) {
    let path = &config.client.auth_file;
    match client_files::write_secret(path, token.as_bytes()).await {
        Ok(()) => tracing::info!(path = %path.display(), "wrote client auth token"),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Unable to write client auth to file")
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
