//! Postgres document service.
//!
//! DESIGN
//! ======
//! All collections share one `documents` table keyed by `(collection, id)`
//! with a `jsonb` body. A row trigger `pg_notify`s the collection name on
//! every change; each watch holds a `PgListener` and re-reads the whole
//! collection per notification, which yields the snapshot semantics the
//! store expects. Merge writes use `jsonb ||`.
//!
//! ERROR HANDLING
//! ==============
//! Notifications are read with `try_recv`, which reports a dropped
//! connection as `Ok(None)` after reconnecting. Both a dropped connection
//! and a failed receive are forwarded to the watcher as an error, followed
//! by a fresh read of the collection: anything notified while the
//! connection was down is otherwise lost.

use std::time::Duration;

use serde_json::Value;
use sqlx::PgPool;
use sqlx::postgres::PgListener;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::channel::Feed;
use super::service::{DocumentService, ServiceError, WatchEvent, WatchStream};

/// Channel the `documents` trigger notifies on.
const NOTIFY_CHANNEL: &str = "documents";
const LISTEN_RETRY: Duration = Duration::from_secs(1);
const CONNECTION_LOST: &str = "notification connection lost";

#[derive(Debug, Clone)]
pub struct PgDocumentService {
    pool: PgPool,
}

impl PgDocumentService {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn load_collection(pool: &PgPool, collection: &str) -> Result<Vec<Value>, ServiceError> {
    let rows = sqlx::query_scalar::<_, Value>("SELECT body FROM documents WHERE collection = $1 ORDER BY id")
        .bind(collection)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

async fn run_watch(pool: PgPool, collection: String, tx: mpsc::UnboundedSender<WatchEvent>) {
    let mut listener = loop {
        match listen(&pool).await {
            Ok(listener) => break listener,
            Err(e) => {
                warn!(%collection, error = %e, "document listener failed to start");
                if tx.send(Err(e.into())).is_err() {
                    return;
                }
                tokio::time::sleep(LISTEN_RETRY).await;
            }
        }
    };

    if tx.send(load_collection(&pool, &collection).await).is_err() {
        return;
    }

    loop {
        let event = match listener.try_recv().await {
            Ok(Some(notification)) if notification.payload() == collection => {
                load_collection(&pool, &collection).await
            }
            Ok(Some(_)) => continue,
            Ok(None) => {
                warn!(%collection, "document listener reconnected; reloading collection");
                if tx.send(Err(ServiceError::Unavailable(CONNECTION_LOST.into()))).is_err() {
                    return;
                }
                load_collection(&pool, &collection).await
            }
            Err(e) => {
                warn!(%collection, error = %e, "document notification failed");
                if tx.send(Err(e.into())).is_err() {
                    return;
                }
                tokio::time::sleep(LISTEN_RETRY).await;
                load_collection(&pool, &collection).await
            }
        };
        if tx.send(event).is_err() {
            debug!(%collection, "document watcher dropped");
            return;
        }
    }
}

async fn listen(pool: &PgPool) -> Result<PgListener, sqlx::Error> {
    let mut listener = PgListener::connect_with(pool).await?;
    listener.listen(NOTIFY_CHANNEL).await?;
    Ok(listener)
}

#[async_trait::async_trait]
impl DocumentService for PgDocumentService {
    async fn probe(&self) -> Result<(), ServiceError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn set(&self, collection: &str, id: &str, doc: Value, merge: bool) -> Result<(), ServiceError> {
        sqlx::query(
            "INSERT INTO documents (collection, id, body) VALUES ($1, $2, $3) \
             ON CONFLICT (collection, id) DO UPDATE SET \
             body = CASE WHEN $4 THEN documents.body || EXCLUDED.body ELSE EXCLUDED.body END, \
             updated_at = now()",
        )
        .bind(collection)
        .bind(id)
        .bind(doc)
        .bind(merge)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, fields: Value) -> Result<(), ServiceError> {
        let result = sqlx::query(
            "UPDATE documents SET body = body || $3, updated_at = now() WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .bind(fields)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound { collection: collection.to_string(), id: id.to_string() });
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), ServiceError> {
        sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    fn watch(&self, collection: &str) -> WatchStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_watch(self.pool.clone(), collection.to_string(), tx));
        Feed::new(rx, Some(task))
    }
}
