/// SQLite storage adapter
///
/// Implements StoragePort for SQLite database operations.
use crate::domain::models::{
    ExtractionFields, ExtractionRecord, ExtractionStatus, Meeting, ProviderAttemptLog,
    TokenUsage, Transcript, Volume, VolumeUnit,
};
use crate::error::{AppError, Result};
use crate::ports::storage::StoragePort;
use async_trait::async_trait;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

const EXTRACTION_COLUMNS: &str = "id, meeting_id, status, model, industry, company_size, \
     pain_points, lead_source, volume_quantity, volume_unit, volume_is_peak, integrations, \
     urgency, sentiment, jtbd_primary, success_metrics, objections, buyer_role, error, \
     created_at, updated_at";

const ATTEMPT_COLUMNS: &str = "id, meeting_id, provider, model, status, raw_response, \
     duration_ms, prompt_tokens, completion_tokens, total_tokens, error, created_at";

/// SQLite storage implementation
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    /// Create a new SQLite storage with the given database path
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        Self::from_connection(conn)
    }

    /// Create a private in-memory database (used by tests and dry runs)
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        // Enable foreign keys
        conn.execute("PRAGMA foreign_keys = ON", [])?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run database migrations
    pub fn run_migrations(&self) -> Result<()> {
        use rusqlite_migration::{Migrations, M};

        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../../migrations/001_initial.sql"
        ))]);

        let mut conn = self.conn()?;
        migrations.to_latest(&mut conn)?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Other("SQLite connection mutex poisoned".to_string()))
    }
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn enum_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr<Err = AppError>,
{
    let value: Option<String> = row.get(idx)?;
    value
        .map(|v| v.parse::<T>().map_err(|e| conversion_error(idx, e)))
        .transpose()
}

fn list_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<T>> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text).map_err(|e| conversion_error(idx, e))
}

fn list_json<T: Serialize>(items: &[T]) -> Result<String> {
    Ok(serde_json::to_string(items)?)
}

fn status_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<ExtractionStatus> {
    let status: String = row.get(idx)?;
    status.parse().map_err(|e| conversion_error(idx, e))
}

fn meeting_from_row(row: &Row<'_>) -> rusqlite::Result<Meeting> {
    Ok(Meeting {
        id: Some(row.get(0)?),
        client_name: row.get(1)?,
        client_email: row.get(2)?,
        seller: row.get(3)?,
        meeting_date: row.get(4)?,
        closed: row.get(5)?,
        transcript: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn extraction_from_row(row: &Row<'_>) -> rusqlite::Result<ExtractionRecord> {
    let quantity: Option<i64> = row.get(8)?;
    let unit: Option<VolumeUnit> = enum_column(row, 9)?;
    let is_peak: Option<bool> = row.get(10)?;
    let volume = match (quantity, unit) {
        (Some(quantity), Some(unit)) => Some(Volume {
            quantity: u32::try_from(quantity).map_err(|e| conversion_error(8, e))?,
            unit,
            is_peak: is_peak.unwrap_or(false),
        }),
        _ => None,
    };

    Ok(ExtractionRecord {
        id: Some(row.get(0)?),
        meeting_id: row.get(1)?,
        status: status_column(row, 2)?,
        model: row.get(3)?,
        fields: ExtractionFields {
            industry: enum_column(row, 4)?,
            company_size: enum_column(row, 5)?,
            pain_points: list_column(row, 6)?,
            lead_source: enum_column(row, 7)?,
            volume,
            integrations: list_column(row, 11)?,
            urgency: enum_column(row, 12)?,
            sentiment: enum_column(row, 13)?,
            jtbd_primary: list_column(row, 14)?,
            success_metrics: list_column(row, 15)?,
            objections: list_column(row, 16)?,
            buyer_role: enum_column(row, 17)?,
        },
        error: row.get(18)?,
        created_at: row.get(19)?,
        updated_at: row.get(20)?,
    })
}

fn attempt_from_row(row: &Row<'_>) -> rusqlite::Result<ProviderAttemptLog> {
    let prompt_tokens: Option<u32> = row.get(7)?;
    let completion_tokens: Option<u32> = row.get(8)?;
    let total_tokens: Option<u32> = row.get(9)?;
    let token_usage = if prompt_tokens.is_none() && completion_tokens.is_none() && total_tokens.is_none() {
        None
    } else {
        Some(TokenUsage {
            prompt_tokens,
            completion_tokens,
            total_tokens,
        })
    };
    let duration_ms: i64 = row.get(6)?;

    Ok(ProviderAttemptLog {
        id: Some(row.get(0)?),
        meeting_id: row.get(1)?,
        provider: row.get(2)?,
        model: row.get(3)?,
        status: status_column(row, 4)?,
        raw_response: row.get(5)?,
        duration_ms: duration_ms.max(0) as u64,
        token_usage,
        error: row.get(10)?,
        created_at: row.get(11)?,
    })
}

#[async_trait]
impl StoragePort for SqliteStorage {
    async fn create_meeting(&self, meeting: &Meeting) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO meetings (client_name, client_email, seller, meeting_date, closed, transcript, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                meeting.client_name,
                meeting.client_email,
                meeting.seller,
                meeting.meeting_date,
                meeting.closed,
                meeting.transcript,
                meeting.created_at,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    async fn get_meeting(&self, id: i64) -> Result<Option<Meeting>> {
        let conn = self.conn()?;
        let meeting = conn
            .query_row(
                "SELECT id, client_name, client_email, seller, meeting_date, closed, transcript, created_at
                 FROM meetings WHERE id = ?1",
                params![id],
                meeting_from_row,
            )
            .optional()?;
        Ok(meeting)
    }

    async fn get_transcript(&self, meeting_id: i64) -> Result<Option<Transcript>> {
        let conn = self.conn()?;
        let text: Option<String> = conn
            .query_row(
                "SELECT transcript FROM meetings WHERE id = ?1",
                params![meeting_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(text.map(|text| Transcript { meeting_id, text }))
    }

    async fn upsert_extraction(&self, record: &ExtractionRecord) -> Result<i64> {
        let fields = &record.fields;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO extractions (meeting_id, status, model, industry, company_size, pain_points,
                 lead_source, volume_quantity, volume_unit, volume_is_peak, integrations, urgency,
                 sentiment, jtbd_primary, success_metrics, objections, buyer_role, error,
                 created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)
             ON CONFLICT(meeting_id) DO UPDATE SET
                 status = excluded.status,
                 model = excluded.model,
                 industry = excluded.industry,
                 company_size = excluded.company_size,
                 pain_points = excluded.pain_points,
                 lead_source = excluded.lead_source,
                 volume_quantity = excluded.volume_quantity,
                 volume_unit = excluded.volume_unit,
                 volume_is_peak = excluded.volume_is_peak,
                 integrations = excluded.integrations,
                 urgency = excluded.urgency,
                 sentiment = excluded.sentiment,
                 jtbd_primary = excluded.jtbd_primary,
                 success_metrics = excluded.success_metrics,
                 objections = excluded.objections,
                 buyer_role = excluded.buyer_role,
                 error = excluded.error,
                 updated_at = excluded.updated_at",
            params![
                record.meeting_id,
                record.status.as_str(),
                record.model,
                fields.industry.map(|v| v.as_str()),
                fields.company_size.map(|v| v.as_str()),
                list_json(&fields.pain_points)?,
                fields.lead_source.map(|v| v.as_str()),
                fields.volume.map(|v| v.quantity),
                fields.volume.map(|v| v.unit.as_str()),
                fields.volume.map(|v| v.is_peak),
                list_json(&fields.integrations)?,
                fields.urgency.map(|v| v.as_str()),
                fields.sentiment.map(|v| v.as_str()),
                list_json(&fields.jtbd_primary)?,
                list_json(&fields.success_metrics)?,
                list_json(&fields.objections)?,
                fields.buyer_role.map(|v| v.as_str()),
                record.error,
                record.created_at,
                record.updated_at,
            ],
        )?;

        // last_insert_rowid is not updated on the conflict path
        let id = conn.query_row(
            "SELECT id FROM extractions WHERE meeting_id = ?1",
            params![record.meeting_id],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    async fn get_extraction(&self, meeting_id: i64) -> Result<Option<ExtractionRecord>> {
        let conn = self.conn()?;
        let record = conn
            .query_row(
                &format!(
                    "SELECT {} FROM extractions WHERE meeting_id = ?1",
                    EXTRACTION_COLUMNS
                ),
                params![meeting_id],
                extraction_from_row,
            )
            .optional()?;
        Ok(record)
    }

    async fn count_extractions(&self, meeting_id: i64) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM extractions WHERE meeting_id = ?1",
            params![meeting_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    async fn insert_attempt(&self, attempt: &ProviderAttemptLog) -> Result<i64> {
        let usage = attempt.token_usage.unwrap_or_default();
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO provider_attempts (meeting_id, provider, model, status, raw_response,
                 duration_ms, prompt_tokens, completion_tokens, total_tokens, error, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                attempt.meeting_id,
                attempt.provider,
                attempt.model,
                attempt.status.as_str(),
                attempt.raw_response,
                i64::try_from(attempt.duration_ms).unwrap_or(i64::MAX),
                usage.prompt_tokens,
                usage.completion_tokens,
                usage.total_tokens,
                attempt.error,
                attempt.created_at,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    async fn list_attempts(&self, meeting_id: i64) -> Result<Vec<ProviderAttemptLog>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM provider_attempts WHERE meeting_id = ?1 ORDER BY created_at ASC, id ASC",
            ATTEMPT_COLUMNS
        ))?;
        let attempts = stmt
            .query_map(params![meeting_id], attempt_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(attempts)
    }

    async fn list_pending_meeting_ids(&self) -> Result<Vec<i64>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT m.id FROM meetings m
             WHERE NOT EXISTS (SELECT 1 FROM extractions e WHERE e.meeting_id = m.id)
             ORDER BY m.id ASC",
        )?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids)
    }

    async fn list_failed_unresolved_meeting_ids(&self) -> Result<Vec<i64>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT e.meeting_id FROM extractions e
             WHERE e.status = 'failed'
               AND NOT EXISTS (
                   SELECT 1 FROM provider_attempts a
                   WHERE a.meeting_id = e.meeting_id
                     AND a.status = 'succeeded'
                     AND a.created_at > e.updated_at
               )
             ORDER BY e.meeting_id ASC",
        )?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Industry, Integration, LeadSource, PainPoint};
    use tempfile::TempDir;

    fn storage() -> SqliteStorage {
        let storage = SqliteStorage::in_memory().unwrap();
        storage.run_migrations().unwrap();
        storage
    }

    fn sample_fields() -> ExtractionFields {
        ExtractionFields {
            industry: Some(Industry::Tourism),
            pain_points: vec![PainPoint::HighVolume, PainPoint::AfterHoursCoverage],
            lead_source: Some(LeadSource::Conference),
            volume: Some(Volume {
                quantity: 150,
                unit: VolumeUnit::Weekly,
                is_peak: true,
            }),
            integrations: vec![Integration::Whatsapp],
            ..Default::default()
        }
    }

    fn attempt(meeting_id: i64, status: ExtractionStatus, created_at: i64) -> ProviderAttemptLog {
        ProviderAttemptLog {
            id: None,
            meeting_id,
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            status,
            raw_response: Some("{}".to_string()),
            duration_ms: 1200,
            token_usage: Some(TokenUsage {
                prompt_tokens: Some(10),
                completion_tokens: Some(5),
                total_tokens: Some(15),
            }),
            error: None,
            created_at,
        }
    }

    #[tokio::test]
    async fn test_meeting_and_transcript_roundtrip() {
        let storage = storage();
        let meeting = Meeting::new("Hotel Andes".to_string(), "Hola, somos un hotel".to_string())
            .with_seller(Some("Toro".to_string()))
            .with_closed(true);
        let id = storage.create_meeting(&meeting).await.unwrap();

        let loaded = storage.get_meeting(id).await.unwrap().unwrap();
        assert_eq!(loaded.client_name, "Hotel Andes");
        assert_eq!(loaded.seller.as_deref(), Some("Toro"));
        assert!(loaded.closed);

        let transcript = storage.get_transcript(id).await.unwrap().unwrap();
        assert_eq!(transcript.text, "Hola, somos un hotel");
        assert!(storage.get_transcript(id + 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_keeps_single_record() {
        let storage = storage();
        let id = storage
            .create_meeting(&Meeting::new("A".to_string(), "t".to_string()))
            .await
            .unwrap();

        let failed = ExtractionRecord::failed(id, "all providers failed".to_string());
        let first_id = storage.upsert_extraction(&failed).await.unwrap();

        let succeeded = ExtractionRecord::succeeded(id, "gpt-4o-mini".to_string(), sample_fields());
        let second_id = storage.upsert_extraction(&succeeded).await.unwrap();

        assert_eq!(first_id, second_id);
        assert_eq!(storage.count_extractions(id).await.unwrap(), 1);

        let loaded = storage.get_extraction(id).await.unwrap().unwrap();
        assert_eq!(loaded.status, ExtractionStatus::Succeeded);
        assert_eq!(loaded.model, "gpt-4o-mini");
        assert_eq!(loaded.fields, sample_fields());
        assert_eq!(loaded.error, None);
        assert_eq!(loaded.created_at, failed.created_at);
    }

    #[tokio::test]
    async fn test_attempts_are_appended_in_order() {
        let storage = storage();
        let id = storage
            .create_meeting(&Meeting::new("A".to_string(), "t".to_string()))
            .await
            .unwrap();

        storage
            .insert_attempt(&attempt(id, ExtractionStatus::Failed, 1_000))
            .await
            .unwrap();
        let mut no_usage = attempt(id, ExtractionStatus::Succeeded, 2_000);
        no_usage.token_usage = None;
        storage.insert_attempt(&no_usage).await.unwrap();

        let attempts = storage.list_attempts(id).await.unwrap();
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0].status, ExtractionStatus::Failed);
        assert_eq!(attempts[0].duration_ms, 1200);
        assert_eq!(attempts[0].token_usage.unwrap().total_tokens, Some(15));
        assert_eq!(attempts[1].token_usage, None);
    }

    #[tokio::test]
    async fn test_pending_and_failed_queries() {
        let storage = storage();
        let mut ids = Vec::new();
        for name in ["pending", "failed", "ok", "resolved"] {
            ids.push(
                storage
                    .create_meeting(&Meeting::new(name.to_string(), "t".to_string()))
                    .await
                    .unwrap(),
            );
        }
        let (pending, failed, ok, resolved) = (ids[0], ids[1], ids[2], ids[3]);

        let mut failed_record = ExtractionRecord::failed(failed, "x".to_string());
        failed_record.updated_at = 5_000;
        storage.upsert_extraction(&failed_record).await.unwrap();

        storage
            .upsert_extraction(&ExtractionRecord::succeeded(
                ok,
                "m".to_string(),
                ExtractionFields::default(),
            ))
            .await
            .unwrap();

        // A success logged after the failure resolves it
        let mut resolved_record = ExtractionRecord::failed(resolved, "x".to_string());
        resolved_record.updated_at = 5_000;
        storage.upsert_extraction(&resolved_record).await.unwrap();
        storage
            .insert_attempt(&attempt(resolved, ExtractionStatus::Succeeded, 6_000))
            .await
            .unwrap();

        // An older success does not
        storage
            .insert_attempt(&attempt(failed, ExtractionStatus::Succeeded, 4_000))
            .await
            .unwrap();

        assert_eq!(storage.list_pending_meeting_ids().await.unwrap(), vec![pending]);
        assert_eq!(
            storage.list_failed_unresolved_meeting_ids().await.unwrap(),
            vec![failed]
        );
    }

    #[tokio::test]
    async fn test_file_backed_database_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lead-scribe.db");

        let id = {
            let storage = SqliteStorage::new(&path).unwrap();
            storage.run_migrations().unwrap();
            storage
                .create_meeting(&Meeting::new("A".to_string(), "persisted".to_string()))
                .await
                .unwrap()
        };

        let reopened = SqliteStorage::new(&path).unwrap();
        reopened.run_migrations().unwrap();
        let transcript = reopened.get_transcript(id).await.unwrap().unwrap();
        assert_eq!(transcript.text, "persisted");
    }
}
