//! Answer - タスクごとの診断/ステータス
//!
//! Handler の成否（オブジェクトが無い、権限が無い、など）はこの層のエラーでは
//! なく、Task の answer list に入ってそのまま呼び出し元へ返ります。

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStatus {
    Ok,
    /// Master could not be reached, or the exchange with it failed.
    NoMaster,
    /// Request is not valid in its context.
    Semantic,
    /// Object already exists.
    Exists,
    /// Object does not exist.
    NotFound,
    /// Caller is not allowed to do this.
    Denied,
    /// Anything else.
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerQuality {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub status: AnswerStatus,
    pub quality: AnswerQuality,
    pub text: String,
}

impl Answer {
    pub fn new(status: AnswerStatus, quality: AnswerQuality, text: impl Into<String>) -> Self {
        Self {
            status,
            quality,
            text: text.into(),
        }
    }

    pub fn ok(text: impl Into<String>) -> Self {
        Self::new(AnswerStatus::Ok, AnswerQuality::Info, text)
    }

    pub fn error(status: AnswerStatus, text: impl Into<String>) -> Self {
        Self::new(status, AnswerQuality::Error, text)
    }

    pub fn is_error(&self) -> bool {
        self.quality == AnswerQuality::Error
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}/{:?}] {}", self.quality, self.status, self.text)
    }
}

/// Per-task answer list.
pub type AnswerList = Vec<Answer>;

/// Does any answer in the list carry error quality?
pub fn has_error(answers: &[Answer]) -> bool {
    answers.iter().any(Answer::is_error)
}
