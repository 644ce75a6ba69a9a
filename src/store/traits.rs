//! `Ledger` trait — durable record of announcement processing status.
//!
//! The ledger is the only cross-run (and cross-instance) synchronization
//! point: admission is decided purely from stored status, and the UNIQUE
//! primary key guards against two instances creating the same id.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::model::{AnnouncementRecord, Outcome, Status};

/// Backend-agnostic announcement ledger.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// True if any record with this id exists, regardless of status.
    async fn exists(&self, id: &str) -> Result<bool, StoreError>;

    /// True iff the record is in a non-terminal status (`SEEN` or
    /// `DOWNLOADED`) — a crash left it mid-pipeline. Such records are
    /// resumed on the next cycle instead of skipped, so every announcement
    /// eventually reaches `PROCESSED` or `ERROR`.
    async fn needs_processing(&self, id: &str) -> Result<bool, StoreError>;

    /// Insert a new record in `SEEN` status. Fails with `DuplicateKey` if
    /// the id already exists.
    async fn create(
        &self,
        id: &str,
        company_id: &str,
        company_name: &str,
    ) -> Result<(), StoreError>;

    /// Advance a record's status, optionally attaching the result payload.
    ///
    /// Fails with `NotFound` for unknown ids and `InvalidTransition` when
    /// the new status would move backwards or leave a terminal state.
    async fn advance(
        &self,
        id: &str,
        status: Status,
        result: Option<&Outcome>,
    ) -> Result<(), StoreError>;

    /// Read back a full record.
    async fn get(&self, id: &str) -> Result<Option<AnnouncementRecord>, StoreError>;
}
