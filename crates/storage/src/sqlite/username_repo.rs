use proctor_core::model::ParticipantId;
use sqlx::Row;

use super::SqliteStorage;
use super::mapping::{conn, participant_from_text, ser};
use crate::repository::{StorageError, UsernameRepository};

#[async_trait::async_trait]
impl UsernameRepository for SqliteStorage {
    async fn cache_username(
        &self,
        participant: ParticipantId,
        username: &str,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO username_cache (participant, username)
                VALUES (?1, ?2)
                ON CONFLICT(participant) DO UPDATE SET username = excluded.username
            ",
        )
        .bind(participant.to_string())
        .bind(username)
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn participant_for(
        &self,
        username: &str,
    ) -> Result<Option<ParticipantId>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT participant FROM username_cache WHERE username = ?1
            ",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.map(|row| {
            let value: String = row.try_get("participant").map_err(ser)?;
            participant_from_text(&value)
        })
        .transpose()
    }

    async fn username_for(
        &self,
        participant: ParticipantId,
    ) -> Result<Option<String>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT username FROM username_cache WHERE participant = ?1
            ",
        )
        .bind(participant.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.map(|row| row.try_get::<String, _>("username").map_err(ser))
            .transpose()
    }
}
