//! Transport port - プロセス間のメッセージ送受信
//!
//! 接続管理やフレーミングは実装側の責務です。この層が見るのは
//! 「送る」「メッセージ id を指定して同期受信する」「相手の状態を聞く」
//! 「生きているか確認する」の 4 つだけです。
//!
//! エラーは小さな閉じた集合（timeout / connect error / connection not found /
//! other）に分類されます。

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Address of a communicating process.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub component: String,
    pub id: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, component: impl Into<String>, id: u16) -> Self {
        Self {
            host: host.into(),
            component: component.into(),
            id,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.host, self.component, self.id)
    }
}

/// Fixed tag under which messages are exchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageTag {
    GdiRequest,
}

/// Transport-assigned id of a sent message; replies are keyed to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Status reported by a remote endpoint when probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointStatus {
    /// 0 means the application reports itself healthy.
    pub application_status: u32,
}

impl EndpointStatus {
    pub fn is_ok(&self) -> bool {
        self.application_status == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("synchronous receive timeout")]
    Timeout,

    #[error("can't connect to service")]
    ConnectError,

    #[error("connection not found")]
    ConnectionNotFound,

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout)
    }

    /// The peer cannot be reached at all, as opposed to an unusual failure.
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            TransportError::ConnectError | TransportError::ConnectionNotFound
        )
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        to: &Endpoint,
        tag: MessageTag,
        payload: Vec<u8>,
    ) -> Result<MessageId, TransportError>;

    /// Block until the reply to `response_to` arrives or `timeout` elapses.
    async fn receive(
        &self,
        from: &Endpoint,
        tag: MessageTag,
        response_to: MessageId,
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError>;

    /// Ask the peer for its status. An error is a definitive failure.
    async fn endpoint_status(&self, endpoint: &Endpoint) -> Result<EndpointStatus, TransportError>;

    /// Lightweight liveness check.
    async fn ping(&self, endpoint: &Endpoint) -> Result<(), TransportError>;
}
