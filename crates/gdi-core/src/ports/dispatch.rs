//! DispatchStrategy port - packet をどう master に届けるか
//!
//! # 実装
//! - **InternalDispatch**: master プロセス内。共有キューに積み、handled を待つ
//! - **ExternalDispatch**: 別プロセス。シリアライズして送り、返信を受けて照合する
//!
//! どちらの経路でも結果は `MultiResult` に変換されるので、呼び出し側から見た
//! 形は変わりません。

use async_trait::async_trait;

use crate::app::handoff::PendingPacket;
use crate::domain::{MultiResult, Packet, RequestId};
use crate::error::GdiError;
use crate::observability::DispatchCounters;

/// A packet after `execute`, not yet turned into a result.
#[derive(Debug)]
pub enum Submission {
    /// Queued for the master's workers; the result arrives later.
    Internal(PendingPacket),
    /// Exchange with the master already completed and correlated.
    External(Packet),
}

impl Submission {
    pub fn id(&self) -> RequestId {
        match self {
            Submission::Internal(pending) => pending.id(),
            Submission::External(packet) => packet.id(),
        }
    }

    /// Has the master finished with every task?
    pub fn is_handled(&self) -> bool {
        match self {
            Submission::Internal(pending) => pending.is_handled(),
            Submission::External(_) => true,
        }
    }
}

#[async_trait]
pub trait DispatchStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn counters(&self) -> &DispatchCounters;

    /// Assign the packet id and hand the packet over.
    async fn execute(&self, packet: Packet) -> Result<Submission, GdiError>;

    /// Wait until the packet is handled and drain it into a result.
    async fn wait_for_result(&self, submission: Submission) -> Result<MultiResult, GdiError> {
        let packet = match submission {
            Submission::Internal(pending) => pending.wait().await?,
            Submission::External(packet) => packet,
        };
        self.counters().record_completed();
        Ok(MultiResult::from_packet(packet))
    }
}
