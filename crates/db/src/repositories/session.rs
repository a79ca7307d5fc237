use std::path::PathBuf;

use chrono::{DateTime, Utc};
use sqlx::Row;

use terraloom_core::{Intent, Session, SessionId, SessionSummary, Turn};

use super::{RepositoryError, SessionRepository};
use crate::DbPool;

pub struct SqlSessionRepository {
    pool: DbPool,
}

impl SqlSessionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SessionRepository for SqlSessionRepository {
    async fn load(&self, id: &SessionId) -> Result<Option<Session>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, title, work_dir, history, last_intent, chat_answer, iac_code,
                    iac_diagram_path, plan_output, apply_output, clarification_questions,
                    error_message, created_at, updated_at
             FROM sessions WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(decode_session).transpose()
    }

    async fn save(&self, session: &Session) -> Result<(), RepositoryError> {
        let history = serde_json::to_string(&session.history)
            .map_err(|err| RepositoryError::Decode(err.to_string()))?;
        let questions = serde_json::to_string(&session.clarification_questions)
            .map_err(|err| RepositoryError::Decode(err.to_string()))?;

        sqlx::query(
            "INSERT INTO sessions (
                 id, title, work_dir, history, last_intent, chat_answer, iac_code,
                 iac_diagram_path, plan_output, apply_output, clarification_questions,
                 error_message, created_at, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 title = excluded.title,
                 work_dir = excluded.work_dir,
                 history = excluded.history,
                 last_intent = excluded.last_intent,
                 chat_answer = excluded.chat_answer,
                 iac_code = excluded.iac_code,
                 iac_diagram_path = excluded.iac_diagram_path,
                 plan_output = excluded.plan_output,
                 apply_output = excluded.apply_output,
                 clarification_questions = excluded.clarification_questions,
                 error_message = excluded.error_message,
                 updated_at = excluded.updated_at",
        )
        .bind(&session.id.0)
        .bind(&session.title)
        .bind(session.work_dir.to_string_lossy().into_owned())
        .bind(history)
        .bind(session.last_intent.map(|intent| intent.as_str()))
        .bind(&session.chat_answer)
        .bind(&session.iac_code)
        .bind(&session.iac_diagram_path)
        .bind(&session.plan_output)
        .bind(&session.apply_output)
        .bind(questions)
        .bind(&session.error_message)
        .bind(session.created_at.to_rfc3339())
        .bind(session.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(&self) -> Result<Vec<SessionSummary>, RepositoryError> {
        let rows = sqlx::query("SELECT id, title, updated_at FROM sessions ORDER BY updated_at DESC")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| {
                Ok(SessionSummary {
                    id: SessionId(row.try_get("id")?),
                    title: row.try_get("title")?,
                    last_modified: decode_timestamp(row.try_get::<String, _>("updated_at")?)?,
                })
            })
            .collect()
    }
}

fn decode_session(row: sqlx::sqlite::SqliteRow) -> Result<Session, RepositoryError> {
    let history: Vec<Turn> = serde_json::from_str(&row.try_get::<String, _>("history")?)
        .map_err(|err| RepositoryError::Decode(format!("history: {err}")))?;
    let clarification_questions: Vec<String> =
        serde_json::from_str(&row.try_get::<String, _>("clarification_questions")?)
            .map_err(|err| RepositoryError::Decode(format!("clarification_questions: {err}")))?;
    let last_intent = row
        .try_get::<Option<String>, _>("last_intent")?
        .map(|label| {
            label
                .parse::<Intent>()
                .map_err(|err| RepositoryError::Decode(format!("last_intent: {err}")))
        })
        .transpose()?;

    Ok(Session {
        id: SessionId(row.try_get("id")?),
        title: row.try_get("title")?,
        work_dir: PathBuf::from(row.try_get::<String, _>("work_dir")?),
        history,
        last_intent,
        chat_answer: row.try_get("chat_answer")?,
        iac_code: row.try_get("iac_code")?,
        iac_diagram_path: row.try_get("iac_diagram_path")?,
        plan_output: row.try_get("plan_output")?,
        apply_output: row.try_get("apply_output")?,
        clarification_questions,
        error_message: row.try_get("error_message")?,
        created_at: decode_timestamp(row.try_get::<String, _>("created_at")?)?,
        updated_at: decode_timestamp(row.try_get::<String, _>("updated_at")?)?,
    })
}

fn decode_timestamp(raw: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|err| RepositoryError::Decode(format!("timestamp `{raw}`: {err}")))
}
