//! RequestQueue port - master 内部の packet キュー
//!
//! master プロセス内から発行された packet はここに積まれ、worker が取り出して
//! 実行します。プロセスの起動から終了までの寿命を持つ共有ハンドルとして
//! 生成し、submit 側と worker 側の両方に明示的に渡します。
//!
//! # 設計原則
//! - FIFO
//! - blocking pop（timeout 付き）
//! - close 後は push できず、待機中の pop は起こされる
//! - close 時に残っていた packet は drop される（producer は NotHandled で解放）

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::app::handoff::QueuedPacket;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("queue closed")]
    Closed,
}

#[async_trait]
pub trait RequestQueue: Send + Sync {
    /// Append a packet and wake one waiting consumer. Does not block.
    async fn store_notify(&self, item: QueuedPacket) -> Result<(), QueueError>;

    /// Take the oldest packet, waiting up to `timeout` for one to arrive.
    ///
    /// `Ok(None)` on timeout or spurious wake-up, `Err(Closed)` once the
    /// queue is closed.
    async fn wait_for_new(&self, timeout: Duration) -> Result<Option<QueuedPacket>, QueueError>;

    /// Wake every waiting consumer without handing out a packet.
    fn wakeup_all_waiting(&self);

    /// Refuse further packets and wake every waiting consumer. Packets still
    /// queued are dropped, which fails their producers' waits.
    fn close(&self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
