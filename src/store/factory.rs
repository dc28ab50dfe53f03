//! Startup backend selection.

use std::sync::Arc;

use tracing::{info, warn};

use super::local::LocalStore;
use super::postgres::PgDocumentService;
use super::remote::RemoteStore;
use super::service::DocumentService;
use super::DocumentStore;
use crate::config::BoardConfig;
use crate::notify::Notice;
use crate::storage::LocalStorage;

const FALLBACK_NOTICE: &str = "Connection lost, using local data";

/// The store chosen for a session, plus a notice to show if the choice was
/// a degradation.
pub struct OpenedStore {
    pub store: Arc<dyn DocumentStore>,
    pub notice: Option<Notice>,
}

impl OpenedStore {
    fn local(storage: Arc<dyn LocalStorage>, notice: Option<Notice>) -> Self {
        Self { store: Arc::new(LocalStore::new(storage)), notice }
    }
}

/// Open the configured backend: Postgres when a database URL is set and
/// reachable, otherwise local storage.
pub async fn open_store(config: &BoardConfig, storage: Arc<dyn LocalStorage>) -> OpenedStore {
    let Some(url) = config.database_url.as_deref() else {
        info!("no database configured; using local store");
        return OpenedStore::local(storage, None);
    };

    match crate::db::init_pool(url, config.db_max_connections).await {
        Ok(pool) => select_store(Arc::new(PgDocumentService::new(pool)), storage).await,
        Err(e) => {
            warn!(error = %e, "database unavailable; using local store");
            OpenedStore::local(storage, Some(Notice::error(FALLBACK_NOTICE)))
        }
    }
}

/// Probe `service` once and pick the remote store if it answers.
pub async fn select_store(service: Arc<dyn DocumentService>, storage: Arc<dyn LocalStorage>) -> OpenedStore {
    match service.probe().await {
        Ok(()) => {
            info!("remote backend reachable; using remote store");
            OpenedStore { store: Arc::new(RemoteStore::new(service, storage)), notice: None }
        }
        Err(e) => {
            warn!(error = %e, "remote backend probe failed; using local store");
            OpenedStore::local(storage, Some(Notice::error(FALLBACK_NOTICE)))
        }
    }
}
