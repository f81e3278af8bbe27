/// Storage port trait
///
/// Defines the interface for database operations.
/// Implementation: SQLite adapter
use crate::domain::models::{ExtractionRecord, Meeting, ProviderAttemptLog, Transcript};
use crate::error::Result;
use async_trait::async_trait;

/// Port trait for storage operations
#[async_trait]
pub trait StoragePort: Send + Sync {
    // Meeting operations
    /// Create a new meeting together with its transcript
    async fn create_meeting(&self, meeting: &Meeting) -> Result<i64>;

    /// Get a meeting by ID
    async fn get_meeting(&self, id: i64) -> Result<Option<Meeting>>;

    /// Get the transcript for a meeting, None if the meeting does not exist
    async fn get_transcript(&self, meeting_id: i64) -> Result<Option<Transcript>>;

    // Extraction operations
    /// Insert or overwrite the single current extraction for a meeting
    async fn upsert_extraction(&self, record: &ExtractionRecord) -> Result<i64>;

    /// Get the current extraction for a meeting
    async fn get_extraction(&self, meeting_id: i64) -> Result<Option<ExtractionRecord>>;

    /// Count stored extraction records for a meeting (0 or 1)
    async fn count_extractions(&self, meeting_id: i64) -> Result<usize>;

    // Attempt log operations
    /// Append one provider attempt (never updated or deleted)
    async fn insert_attempt(&self, attempt: &ProviderAttemptLog) -> Result<i64>;

    /// Get attempt logs for a meeting, oldest first
    async fn list_attempts(&self, meeting_id: i64) -> Result<Vec<ProviderAttemptLog>>;

    // Batch selection queries
    /// Meetings with no extraction record, ascending by id
    async fn list_pending_meeting_ids(&self) -> Result<Vec<i64>>;

    /// Meetings whose current extraction failed and that have no succeeded
    /// attempt recorded after it, ascending by id
    async fn list_failed_unresolved_meeting_ids(&self) -> Result<Vec<i64>>;
}
