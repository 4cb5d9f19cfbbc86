use proctor_core::model::{ParticipantId, TestId, TrialId};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::{StorageError, TestRecord, TrialRecord};

pub(super) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(super) fn conn(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(super) fn participant_from_text(value: &str) -> Result<ParticipantId, StorageError> {
    value
        .parse::<ParticipantId>()
        .map_err(|_| StorageError::Serialization(format!("invalid participant id: {value}")))
}

pub(super) fn wrong_from_i64(value: i64) -> Result<u32, StorageError> {
    u32::try_from(value).map_err(|_| StorageError::Serialization(format!("invalid wrong: {value}")))
}

fn passed_from_row(row: &SqliteRow) -> Result<Option<bool>, StorageError> {
    let passed: Option<i64> = row.try_get("passed").map_err(ser)?;
    Ok(passed.map(|v| v != 0))
}

pub(super) fn map_trial_row(row: &SqliteRow, notes: Vec<String>) -> Result<TrialRecord, StorageError> {
    let id: i64 = row.try_get("id").map_err(ser)?;
    let trialer: String = row.try_get("trialer").map_err(ser)?;
    let testificate: String = row.try_get("testificate").map_err(ser)?;
    Ok(TrialRecord {
        id: TrialId::new(id),
        trialer: participant_from_text(&trialer)?,
        testificate: participant_from_text(&testificate)?,
        app: row.try_get("app").map_err(ser)?,
        started_at: row.try_get("started_at").map_err(ser)?,
        ended_at: row.try_get("ended_at").map_err(ser)?,
        passed: passed_from_row(row)?,
        notes,
    })
}

pub(super) fn map_test_row(row: &SqliteRow) -> Result<TestRecord, StorageError> {
    let id: i64 = row.try_get("id").map_err(ser)?;
    let testificate: String = row.try_get("testificate").map_err(ser)?;
    let wrong: Option<i64> = row.try_get("wrong").map_err(ser)?;
    Ok(TestRecord {
        id: TestId::new(id),
        testificate: participant_from_text(&testificate)?,
        started_at: row.try_get("started_at").map_err(ser)?,
        ended_at: row.try_get("ended_at").map_err(ser)?,
        passed: passed_from_row(row)?,
        wrong: wrong.map(wrong_from_i64).transpose()?,
    })
}
