use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::intent::Intent;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One role-tagged message. Immutable once appended; ordering is the
/// entire context window for every downstream completion call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

const TITLE_MAX_CHARS: usize = 80;

/// One user's persisted conversation plus derived artifacts.
///
/// The store exclusively owns persisted copies; the orchestrator mutates a
/// working copy and hands it back for a single save at end of turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub title: String,
    pub work_dir: PathBuf,
    pub history: Vec<Turn>,
    pub last_intent: Option<Intent>,
    pub chat_answer: String,
    pub iac_code: String,
    pub iac_diagram_path: String,
    pub plan_output: String,
    pub apply_output: String,
    pub clarification_questions: Vec<String>,
    pub error_message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: SessionId, work_dir: PathBuf) -> Self {
        let now = Utc::now();
        Self {
            id,
            title: String::new(),
            work_dir,
            history: Vec::new(),
            last_intent: None,
            chat_answer: String::new(),
            iac_code: String::new(),
            iac_diagram_path: String::new(),
            plan_output: String::new(),
            apply_output: String::new(),
            clarification_questions: Vec::new(),
            error_message: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Appends a user turn; the first one also becomes the session title.
    pub fn push_user_turn(&mut self, content: impl Into<String>) {
        let content = content.into();
        if self.title.is_empty() {
            self.title = truncate_title(&content);
        }
        self.history.push(Turn::user(content));
    }

    pub fn push_assistant_turn(&mut self, content: impl Into<String>) {
        self.history.push(Turn::assistant(content.into()));
    }

    /// Selects the single user-facing signal for the turn, in the fixed
    /// precedence order: chat answer > clarification > error > new-code
    /// notice > fallback prompt.
    pub fn response_text(&self, new_code_generated: bool) -> String {
        if !self.chat_answer.is_empty() {
            return self.chat_answer.clone();
        }
        if !self.clarification_questions.is_empty() {
            return self.clarification_questions.join("\n");
        }
        if !self.error_message.is_empty() {
            return self.error_message.clone();
        }
        if new_code_generated {
            return "I have updated the architecture based on your request. \
                    You can see the new code and diagram. What would you like to do next?"
                .to_string();
        }
        "I'm not sure how to proceed. Could you please clarify?".to_string()
    }
}

/// Row shape for `list_sessions`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub title: String,
    pub last_modified: DateTime<Utc>,
}

fn truncate_title(content: &str) -> String {
    let trimmed = content.trim();
    if trimmed.chars().count() <= TITLE_MAX_CHARS {
        return trimmed.to_string();
    }
    let mut title: String = trimmed.chars().take(TITLE_MAX_CHARS).collect();
    title.push('…');
    title
}
