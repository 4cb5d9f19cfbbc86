use chrono::{DateTime, Utc};
use proctor_core::model::{ParticipantId, TrialId};
use sqlx::Row;

use super::SqliteStorage;
use super::mapping::{conn, map_trial_row, ser};
use crate::repository::{StorageError, TrialRecord, TrialRepository};

#[async_trait::async_trait]
impl TrialRepository for SqliteStorage {
    async fn create_trial(
        &self,
        trialer: ParticipantId,
        testificate: ParticipantId,
        app: &str,
        started_at: DateTime<Utc>,
    ) -> Result<TrialId, StorageError> {
        let res = sqlx::query(
            r"
                INSERT INTO trials (trialer, testificate, app, started_at)
                VALUES (?1, ?2, ?3, ?4)
            ",
        )
        .bind(trialer.to_string())
        .bind(testificate.to_string())
        .bind(app)
        .bind(started_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(TrialId::new(res.last_insert_rowid()))
    }

    async fn close_trial(
        &self,
        id: TrialId,
        passed: bool,
        ended_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
                UPDATE trials SET ended_at = ?2, passed = ?3 WHERE id = ?1
            ",
        )
        .bind(id.value())
        .bind(ended_at)
        .bind(i64::from(passed))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn add_note(&self, id: TrialId, note: &str) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO notes (trial_id, value) VALUES (?1, ?2)
            ",
        )
        .bind(id.value())
        .bind(note)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                StorageError::NotFound
            }
            other => conn(other),
        })?;
        Ok(())
    }

    async fn get_trial(&self, id: TrialId) -> Result<TrialRecord, StorageError> {
        let note_rows = sqlx::query(
            r"
                SELECT value FROM notes WHERE trial_id = ?1 ORDER BY id
            ",
        )
        .bind(id.value())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut notes = Vec::with_capacity(note_rows.len());
        for row in note_rows {
            notes.push(row.try_get::<String, _>("value").map_err(ser)?);
        }

        let row = sqlx::query(
            r"
                SELECT id, trialer, testificate, app, started_at, ended_at, passed
                FROM trials
                WHERE id = ?1
            ",
        )
        .bind(id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        map_trial_row(&row, notes)
    }

    async fn list_trials(&self, testificate: ParticipantId) -> Result<Vec<TrialId>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id FROM trials WHERE testificate = ?1 ORDER BY id
            ",
        )
        .bind(testificate.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            ids.push(TrialId::new(row.try_get::<i64, _>("id").map_err(ser)?));
        }
        Ok(ids)
    }

    async fn count_trials(&self, testificate: ParticipantId) -> Result<u32, StorageError> {
        let row = sqlx::query(
            r"
                SELECT COUNT(*) AS n FROM trials WHERE testificate = ?1
            ",
        )
        .bind(testificate.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(conn)?;

        let n: i64 = row.try_get("n").map_err(ser)?;
        u32::try_from(n).map_err(|_| StorageError::Serialization(format!("invalid count: {n}")))
    }
}
