use thiserror::Error;

use crate::domain::{Answer, AnswerList, AnswerStatus, AuthParseError, RequestId};
use crate::ports::{CodecError, QueueError};

/// ErrorKind はエラーの運用分類
///
/// - Transient: 呼び出し全体をやり直せば通る可能性がある
/// - Permanent: 同じ入力では何度やっても失敗する
/// - Infrastructure: master やトランスポートの障害
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Permanent,
    Infrastructure,
}

/// Failure of a whole GDI exchange.
///
/// Per-task failures are not errors here; they travel in the task's answer
/// list.
#[derive(Debug, Error)]
pub enum GdiError {
    #[error("request contains no tasks")]
    EmptyPacket,

    #[error("invalid auth info: {0}")]
    Auth(#[from] AuthParseError),

    #[error("request queue is closed")]
    QueueClosed,

    #[error("request {0} was dropped before it was handled")]
    NotHandled(RequestId),

    #[error("unable to prepare request: {0}")]
    Codec(#[from] CodecError),

    #[error("unable to decode response: {0}")]
    Reply(CodecError),

    #[error("job verification rejected the request")]
    Verification { answers: AnswerList },

    #[error("unable to contact {component} using port {port} on host \"{host}\"")]
    MasterUnreachable {
        component: String,
        host: String,
        port: u16,
    },

    #[error("can't send request to {component} using port {port} on host \"{host}\": {detail}")]
    Transport {
        component: String,
        host: String,
        port: u16,
        detail: String,
    },

    #[error("{0}")]
    NoMaster(String),

    #[error("mismatch between sent request {sent} and received response {received}")]
    Mismatch { sent: RequestId, received: RequestId },
}

impl GdiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GdiError::EmptyPacket
            | GdiError::Auth(_)
            | GdiError::Codec(_)
            | GdiError::Verification { .. }
            | GdiError::Mismatch { .. } => ErrorKind::Permanent,
            GdiError::QueueClosed => ErrorKind::Transient,
            GdiError::NotHandled(_)
            | GdiError::Reply(_)
            | GdiError::MasterUnreachable { .. }
            | GdiError::Transport { .. }
            | GdiError::NoMaster(_) => ErrorKind::Infrastructure,
        }
    }

    /// The error as one answer list entry.
    pub fn to_answer(&self) -> Answer {
        let status = match self {
            GdiError::EmptyPacket | GdiError::Auth(_) | GdiError::Verification { .. } => {
                AnswerStatus::Semantic
            }
            GdiError::QueueClosed | GdiError::NotHandled(_) | GdiError::Codec(_) => {
                AnswerStatus::Unknown
            }
            GdiError::Reply(_)
            | GdiError::MasterUnreachable { .. }
            | GdiError::Transport { .. }
            | GdiError::NoMaster(_)
            | GdiError::Mismatch { .. } => AnswerStatus::NoMaster,
        };
        Answer::error(status, self.to_string())
    }

    /// All answers describing this error, including any collected on the way.
    pub fn into_answers(self) -> AnswerList {
        let answer = self.to_answer();
        match self {
            GdiError::Verification { mut answers } => {
                answers.push(answer);
                answers
            }
            _ => vec![answer],
        }
    }
}

impl From<QueueError> for GdiError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Closed => GdiError::QueueClosed,
        }
    }
}
