use chrono::{DateTime, Utc};
use proctor_core::model::{ParticipantId, TestId};
use sqlx::Row;

use super::SqliteStorage;
use super::mapping::{conn, map_test_row, ser};
use crate::repository::{StorageError, TestRecord, TestRepository};

#[async_trait::async_trait]
impl TestRepository for SqliteStorage {
    async fn create_test(
        &self,
        testificate: ParticipantId,
        started_at: DateTime<Utc>,
    ) -> Result<TestId, StorageError> {
        let res = sqlx::query(
            r"
                INSERT INTO tests (testificate, started_at) VALUES (?1, ?2)
            ",
        )
        .bind(testificate.to_string())
        .bind(started_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(TestId::new(res.last_insert_rowid()))
    }

    async fn close_test(
        &self,
        id: TestId,
        passed: bool,
        wrong: u32,
        ended_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
                UPDATE tests SET ended_at = ?2, passed = ?3, wrong = ?4 WHERE id = ?1
            ",
        )
        .bind(id.value())
        .bind(ended_at)
        .bind(i64::from(passed))
        .bind(i64::from(wrong))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn set_wrong_count(&self, id: TestId, wrong: u32) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
                UPDATE tests SET wrong = ?2 WHERE id = ?1
            ",
        )
        .bind(id.value())
        .bind(i64::from(wrong))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn get_test(&self, id: TestId) -> Result<TestRecord, StorageError> {
        let row = sqlx::query(
            r"
                SELECT id, testificate, started_at, ended_at, passed, wrong
                FROM tests
                WHERE id = ?1
            ",
        )
        .bind(id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        map_test_row(&row)
    }

    async fn list_tests(&self, testificate: ParticipantId) -> Result<Vec<TestId>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id FROM tests WHERE testificate = ?1 ORDER BY id
            ",
        )
        .bind(testificate.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            ids.push(TestId::new(row.try_get::<i64, _>("id").map_err(ser)?));
        }
        Ok(ids)
    }

    async fn count_tests(&self, testificate: ParticipantId) -> Result<u32, StorageError> {
        let row = sqlx::query(
            r"
                SELECT COUNT(*) AS n FROM tests WHERE testificate = ?1
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
