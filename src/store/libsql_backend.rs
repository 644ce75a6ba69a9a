//! libSQL ledger backend.
//!
//! Local file or in-memory databases, schema created on open. Every
//! mutation is a single autocommitted statement — durable before the call
//! returns, so a crash between `advance` calls leaves the ledger at the
//! last completed stage and the next cycle resumes from stored status.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::model::{AnnouncementRecord, Outcome, Status};
use crate::store::traits::Ledger;

/// libSQL-backed announcement ledger.
///
/// A single connection is reused for all operations; `libsql::Connection`
/// is `Send + Sync` and safe for concurrent async use. The pipeline is the
/// single writer.
pub struct LibSqlLedger {
    #[allow(dead_code)]
    db: Arc<Database>,
    conn: Connection,
}

impl LibSqlLedger {
    /// Open (or create) a local database file and initialize the schema.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Open(format!("create database directory: {e}")))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Open(format!("open database: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| StoreError::Open(format!("create connection: {e}")))?;

        let ledger = Self {
            db: Arc::new(db),
            conn,
        };
        ledger.init_schema().await?;
        info!(path = %path.display(), "Ledger opened");
        Ok(ledger)
    }

    /// Create an in-memory ledger (tests and the check-document mode).
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| StoreError::Open(format!("open in-memory database: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| StoreError::Open(format!("create connection: {e}")))?;

        let ledger = Self {
            db: Arc::new(db),
            conn,
        };
        ledger.init_schema().await?;
        Ok(ledger)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS announcements (
                    id TEXT PRIMARY KEY,
                    company_id TEXT NOT NULL,
                    company_name TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    status TEXT NOT NULL DEFAULT 'SEEN',
                    result_json TEXT
                );
                CREATE INDEX IF NOT EXISTS idx_announcements_status
                    ON announcements(status);",
            )
            .await
            .map_err(|e| StoreError::Query(format!("init_schema: {e}")))?;
        Ok(())
    }

    /// Read the current status of a record, if present.
    async fn current_status(&self, id: &str) -> Result<Option<Status>, StoreError> {
        let mut rows = self
            .conn
            .query(
                "SELECT status FROM announcements WHERE id = ?1",
                params![id],
            )
            .await
            .map_err(|e| StoreError::Query(format!("current_status: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let s: String = row
                    .get(0)
                    .map_err(|e| StoreError::Query(format!("current_status row: {e}")))?;
                Ok(Status::parse(&s))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::Query(format!("current_status: {e}"))),
        }
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[async_trait]
impl Ledger for LibSqlLedger {
    async fn exists(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.current_status(id).await?.is_some())
    }

    async fn needs_processing(&self, id: &str) -> Result<bool, StoreError> {
        Ok(matches!(self.current_status(id).await?, Some(s) if !s.is_terminal()))
    }

    async fn create(
        &self,
        id: &str,
        company_id: &str,
        company_name: &str,
    ) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        let result = self
            .conn
            .execute(
                "INSERT INTO announcements (id, company_id, company_name, created_at, status)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, company_id, company_name, now, Status::Seen.as_str()],
            )
            .await;

        match result {
            Ok(_) => {
                debug!(id, company = company_name, "Announcement recorded as SEEN");
                Ok(())
            }
            Err(e) if e.to_string().contains("UNIQUE constraint") => {
                Err(StoreError::DuplicateKey { id: id.to_string() })
            }
            Err(e) => Err(StoreError::Query(format!("create: {e}"))),
        }
    }

    async fn advance(
        &self,
        id: &str,
        status: Status,
        result: Option<&Outcome>,
    ) -> Result<(), StoreError> {
        // Read-then-write is safe here: the pipeline is the single writer
        // per id (creation races are caught by the UNIQUE key).
        let current = self
            .current_status(id)
            .await?
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;

        if current.is_terminal() || status.rank() <= current.rank() {
            return Err(StoreError::InvalidTransition {
                id: id.to_string(),
                from: current.as_str().to_string(),
                to: status.as_str().to_string(),
            });
        }

        let result_json = match result {
            Some(outcome) => Some(
                serde_json::to_string(outcome)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?,
            ),
            None => None,
        };

        match result_json {
            Some(json) => {
                self.conn
                    .execute(
                        "UPDATE announcements SET status = ?1, result_json = ?2 WHERE id = ?3",
                        params![status.as_str(), json, id],
                    )
                    .await
                    .map_err(|e| StoreError::Query(format!("advance: {e}")))?;
            }
            None => {
                self.conn
                    .execute(
                        "UPDATE announcements SET status = ?1 WHERE id = ?2",
                        params![status.as_str(), id],
                    )
                    .await
                    .map_err(|e| StoreError::Query(format!("advance: {e}")))?;
            }
        }

        debug!(id, status = %status, "Announcement advanced");
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<AnnouncementRecord>, StoreError> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, company_id, company_name, created_at, status, result_json
                 FROM announcements WHERE id = ?1",
                params![id],
            )
            .await
            .map_err(|e| StoreError::Query(format!("get: {e}")))?;

        let row = match rows.next().await {
            Ok(Some(row)) => row,
            Ok(None) => return Ok(None),
            Err(e) => return Err(StoreError::Query(format!("get: {e}"))),
        };

        let id_str: String = row
            .get(0)
            .map_err(|e| StoreError::Query(format!("get row: {e}")))?;
        let company_id: String = row
            .get(1)
            .map_err(|e| StoreError::Query(format!("get row: {e}")))?;
        let company_name: String = row
            .get(2)
            .map_err(|e| StoreError::Query(format!("get row: {e}")))?;
        let created_str: String = row
            .get(3)
            .map_err(|e| StoreError::Query(format!("get row: {e}")))?;
        let status_str: String = row
            .get(4)
            .map_err(|e| StoreError::Query(format!("get row: {e}")))?;
        // NULL comes back as a get error; treat it as absent.
        let result_json: Option<String> = row.get(5).ok();

        let status = Status::parse(&status_str).ok_or_else(|| {
            StoreError::Query(format!("unknown status {status_str:?} for id {id_str}"))
        })?;
        let result = match result_json {
            Some(json) => Some(
                serde_json::from_str(&json)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?,
            ),
            None => None,
        };

        Ok(Some(AnnouncementRecord {
            id: id_str,
            company_id,
            company_name,
            created_at: parse_datetime(&created_str),
            status,
            result,
        }))
    }
}
