use std::sync::Arc;

use crate::config::Config;
use crate::credentials::{CodeIssuer, CodeVerifier, CredentialStore};
use crate::err::Error;
use crate::io::{BlobStore, LocalBlobStore};
use crate::notify::{LogNotifier, Notifier};
use crate::session::{AdminCredentials, SessionIssuer};
use crate::store::{MemoryStore, PgStore, Store};

/// Shared application state
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub blobs: Arc<dyn BlobStore>,
    pub codes: CodeIssuer,
    pub verifier: CodeVerifier,
    pub sessions: SessionIssuer,
    pub admin: AdminCredentials,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        blobs: Arc<dyn BlobStore>,
        notifier: Arc<dyn Notifier>,
        sessions: SessionIssuer,
        admin: AdminCredentials,
        domain: &str,
    ) -> Self {
        let credentials = CredentialStore::new();
        Self {
            store,
            blobs,
            codes: CodeIssuer::new(credentials.clone(), domain, notifier),
            verifier: CodeVerifier::new(credentials),
            sessions,
            admin,
        }
    }

    pub async fn from_config(config: &Config) -> Result<Self, Error> {
        let store: Arc<dyn Store> = match &config.database_url {
            Some(url) => Arc::new(PgStore::connect(url).await?),
            None => {
                log::warn!("DATABASE_URL not set, using a volatile in-memory store");
                Arc::new(MemoryStore::new())
            }
        };
        let blobs = LocalBlobStore::prepare(&config.uploads_dir).await?;
        Ok(Self::new(
            store,
            Arc::new(blobs),
            Arc::new(LogNotifier),
            SessionIssuer::new(&config.jwt_secret),
            AdminCredentials::new(&config.admin_email, &config.admin_password)?,
            &config.institution_domain,
        ))
    }
}
