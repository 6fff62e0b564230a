use models::{AnsweredBy, Call, CallDirection, CallStatus};
use sqlx::{Row, SqlitePool};

use crate::error::{classify, Result, StoreError};

#[derive(Clone)]
pub struct CallRepo {
    pool: SqlitePool,
}

fn direction_to_str(d: CallDirection) -> &'static str {
    match d {
        CallDirection::Incoming => "incoming",
        CallDirection::Outgoing => "outgoing",
    }
}

fn direction_from_str(s: &str) -> CallDirection {
    match s {
        "outgoing" => CallDirection::Outgoing,
        _ => CallDirection::Incoming,
    }
}

fn status_to_str(s: CallStatus) -> &'static str {
    match s {
        CallStatus::Ringing => "ringing",
        CallStatus::Answered => "answered",
        CallStatus::Missed => "missed",
        CallStatus::Busy => "busy",
        CallStatus::Failed => "failed",
        CallStatus::Rejected => "rejected",
    }
}

fn status_from_str(s: &str) -> CallStatus {
    match s {
        "answered" => CallStatus::Answered,
        "missed" => CallStatus::Missed,
        "busy" => CallStatus::Busy,
        "failed" => CallStatus::Failed,
        "rejected" => CallStatus::Rejected,
        _ => CallStatus::Ringing,
    }
}

fn row_to_call(row: &sqlx::sqlite::SqliteRow) -> std::result::Result<Call, sqlx::Error> {
    let direction: String = row.try_get("direction")?;
    let status: String = row.try_get("status")?;
    let raw_payload: Option<String> = row.try_get("raw_payload")?;
    let answered_by_user_id: Option<i64> = row.try_get("answered_by_user_id")?;
    let answered_by = answered_by_user_id.map(|user_id| AnsweredBy {
        user_id,
        username: row.try_get("answered_by_username").unwrap_or_default(),
        extension: row.try_get("answered_by_extension").unwrap_or_default(),
    });
    Ok(Call {
        id: row.try_get("id")?,
        direction: direction_from_str(&direction),
        caller_number: row.try_get("caller_number")?,
        called_number: row.try_get("called_number")?,
        caller_name: row.try_get("caller_name")?,
        line_name: row.try_get("line_name")?,
        device_name: row.try_get("device_name")?,
        start_time: row.try_get("start_time")?,
        answer_time: row.try_get("answer_time")?,
        end_time: row.try_get("end_time")?,
        status: status_from_str(&status),
        source: row.try_get("source")?,
        backend_unique_id: row.try_get("backend_unique_id")?,
        answered_by,
        seen: row.try_get::<i64, _>("seen")? != 0,
        notes: row.try_get("notes")?,
        recording_url: row.try_get("recording_url")?,
        raw_payload: raw_payload.and_then(|s| serde_json::from_str(&s).ok()),
    })
}

impl CallRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Returns `Ok(false)` without writing anything when `backend_unique_id`
    /// is already present — the CDR-dedup invariant from §8.
    pub async fn insert_if_new(&self, call: &Call) -> Result<bool> {
        if let Some(unique_id) = &call.backend_unique_id {
            let existing: Option<(i64,)> =
                sqlx::query_as("SELECT 1 FROM calls WHERE backend_unique_id = ?")
                    .bind(unique_id)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(StoreError::Fatal)?;
            if existing.is_some() {
                return Ok(false);
            }
        }

        let raw_payload = call
            .raw_payload
            .as_ref()
            .map(|v| serde_json::to_string(v).unwrap_or_default());
        let now = chrono::Utc::now().to_rfc3339();

        let result = sqlx::query(
            "INSERT INTO calls (id, direction, caller_number, called_number, caller_name, line_name, device_name,
                start_time, answer_time, end_time, status, source, backend_unique_id,
                answered_by_user_id, answered_by_username, answered_by_extension, seen, notes, recording_url, raw_payload, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&call.id)
        .bind(direction_to_str(call.direction))
        .bind(&call.caller_number)
        .bind(&call.called_number)
        .bind(&call.caller_name)
        .bind(&call.line_name)
        .bind(&call.device_name)
        .bind(call.start_time)
        .bind(call.answer_time)
        .bind(call.end_time)
        .bind(status_to_str(call.status))
        .bind(&call.source)
        .bind(&call.backend_unique_id)
        .bind(call.answered_by.as_ref().map(|a| a.user_id))
        .bind(call.answered_by.as_ref().map(|a| a.username.clone()))
        .bind(call.answered_by.as_ref().map(|a| a.extension.clone()))
        .bind(call.seen as i64)
        .bind(&call.notes)
        .bind(&call.recording_url)
        .bind(raw_payload)
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(true),
            Err(e) => match classify(e) {
                // A racing writer landed the same unique id first: treat as dedup, not an error.
                StoreError::Conflict(_) => Ok(false),
                other => Err(other),
            },
        }
    }

    pub async fn get(&self, id: &str) -> Result<Option<Call>> {
        let row = sqlx::query("SELECT * FROM calls WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::Fatal)?;
        row.as_ref()
            .map(row_to_call)
            .transpose()
            .map_err(StoreError::Fatal)
    }

    pub async fn list_recent(&self, limit: i64) -> Result<Vec<Call>> {
        let rows = sqlx::query("SELECT * FROM calls ORDER BY start_time DESC LIMIT ?")
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::Fatal)?;
        rows.iter()
            .map(row_to_call)
            .collect::<std::result::Result<_, _>>()
            .map_err(StoreError::Fatal)
    }

    /// Retention policy: calls older than `retention_days` are purged.
    pub async fn purge_older_than(&self, retention_days: i64, now: i64) -> Result<u64> {
        let cutoff = now - retention_days * 86_400;
        let res = sqlx::query("DELETE FROM calls WHERE start_time < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(StoreError::Fatal)?;
        Ok(res.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn pool() -> SqlitePool {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    fn sample() -> Call {
        Call {
            id: "pbx_1".into(),
            direction: CallDirection::Incoming,
            caller_number: "0123456789".into(),
            called_number: "1001".into(),
            caller_name: None,
            line_name: None,
            device_name: None,
            start_time: 0,
            answer_time: Some(10),
            end_time: Some(70),
            status: CallStatus::Answered,
            source: "gsm".into(),
            backend_unique_id: Some("L1".into()),
            answered_by: None,
            seen: false,
            notes: None,
            recording_url: None,
            raw_payload: None,
        }
    }

    #[tokio::test]
    async fn duplicate_cdr_is_a_noop() {
        let repo = CallRepo::new(pool().await);
        assert!(repo.insert_if_new(&sample()).await.unwrap());
        assert!(!repo.insert_if_new(&sample()).await.unwrap());
        let all = repo.list_recent(10).await.unwrap();
        assert_eq!(all.len(), 1);
    }
}
