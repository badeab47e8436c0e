//! Handoff - internal dispatch の producer/consumer 同期
//!
//! submit した側は `PendingPacket` を、worker 側は `QueuedPacket` を持ちます。
//! Packet 本体の所有権は常にどちらか一方にしかありません。
//!
//! - submit から handled まで: worker（`QueuedPacket`）
//! - handled の後: producer（`PendingPacket::wait` の戻り値）
//!
//! `QueuedPacket` が `mark_handled` されずに drop された場合（handler の panic、
//! close されたキューに残っていた packet など）は abandoned になり、待っている
//! producer には `GdiError::NotHandled` が返ります。
//!
//! # 学習ポイント
//! - Mutex + Condvar による handled の通知
//! - wait は上限付きの `wait_timeout` を繰り返す。通知を 1 回取りこぼしても
//!   poll interval 以内にフラグを再確認できる
//! - Async からは spawn_blocking 経由で待つ。1 回の blocking 呼び出しは
//!   poll interval で終わるので、future を drop すればスレッドもすぐ解放される
//! - Drop で相手側に「もう来ない」ことを知らせる

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use tracing::{debug, warn};

use crate::domain::{Packet, RequestId};
use crate::error::GdiError;

/// How long a waiter sleeps before re-checking the handled flag.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug)]
enum Slot {
    Pending,
    Handled(Packet),
    /// The consumer half was dropped without handling the packet.
    Abandoned,
    Taken,
}

#[derive(Debug)]
pub(crate) struct Handoff {
    slot: Mutex<Slot>,
    cond: Condvar,
}

impl Handoff {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            slot: Mutex::new(Slot::Pending),
            cond: Condvar::new(),
        })
    }

    fn is_handled(&self) -> bool {
        matches!(*self.slot.lock().unwrap(), Slot::Handled(_) | Slot::Taken)
    }

    /// Block until the packet is handled or abandoned. Any number of threads
    /// may wait.
    fn wait_till_handled(&self, id: RequestId, poll_interval: Duration) -> Result<(), GdiError> {
        let mut guard = self.slot.lock().unwrap();
        while matches!(*guard, Slot::Pending) {
            debug!(packet = %id, "waiting for packet to be handled by worker");
            let (next, _) = self.cond.wait_timeout(guard, poll_interval).unwrap();
            guard = next;
        }
        if matches!(*guard, Slot::Abandoned) {
            return Err(GdiError::NotHandled(id));
        }
        debug!(packet = %id, "got signal that packet is handled");
        Ok(())
    }

    /// Wait at most `wait` for the packet. `Ok(None)` while it is still
    /// pending.
    fn take_within(&self, id: RequestId, wait: Duration) -> Result<Option<Packet>, GdiError> {
        let mut guard = self.slot.lock().unwrap();
        if matches!(*guard, Slot::Pending) {
            debug!(packet = %id, "waiting for packet to be handled by worker");
            let (next, _) = self.cond.wait_timeout(guard, wait).unwrap();
            guard = next;
        }
        match std::mem::replace(&mut *guard, Slot::Taken) {
            Slot::Handled(packet) => Ok(Some(packet)),
            Slot::Pending => {
                *guard = Slot::Pending;
                Ok(None)
            }
            Slot::Abandoned => {
                *guard = Slot::Abandoned;
                Err(GdiError::NotHandled(id))
            }
            Slot::Taken => Err(GdiError::NotHandled(id)),
        }
    }

    fn broadcast_handled(&self, packet: Packet) {
        let mut guard = self.slot.lock().unwrap();
        *guard = Slot::Handled(packet);
        drop(guard);
        debug!("broadcast that packet is handled");
        self.cond.notify_all();
    }

    /// Mark a still pending packet as abandoned. Returns whether it was
    /// pending.
    fn abandon(&self) -> bool {
        let mut guard = self.slot.lock().unwrap();
        if !matches!(*guard, Slot::Pending) {
            return false;
        }
        *guard = Slot::Abandoned;
        drop(guard);
        self.cond.notify_all();
        true
    }
}

/// Producer side of a submitted packet.
#[derive(Debug)]
pub struct PendingPacket {
    id: RequestId,
    handoff: Arc<Handoff>,
    poll_interval: Duration,
}

impl PendingPacket {
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Non-blocking check of the handled flag.
    pub fn is_handled(&self) -> bool {
        self.handoff.is_handled()
    }

    /// Block until a worker has handled the packet, without taking it back.
    pub fn wait_till_handled(&self) -> Result<(), GdiError> {
        self.handoff.wait_till_handled(self.id, self.poll_interval)
    }

    /// Block the calling thread until a worker has handled every task, then
    /// take the packet back.
    ///
    /// Fails with `GdiError::NotHandled` if the packet was dropped on the
    /// worker side instead.
    pub fn wait_blocking(self) -> Result<Packet, GdiError> {
        loop {
            if let Some(packet) = self.handoff.take_within(self.id, self.poll_interval)? {
                return Ok(packet);
            }
        }
    }

    /// Async form of [`PendingPacket::wait_blocking`].
    ///
    /// Every blocking step lasts at most one poll interval, so the future can
    /// be dropped (for example by `tokio::time::timeout`) without leaving a
    /// thread parked on the packet.
    pub async fn wait(self) -> Result<Packet, GdiError> {
        let id = self.id;
        loop {
            let handoff = Arc::clone(&self.handoff);
            let poll_interval = self.poll_interval;
            let taken = tokio::task::spawn_blocking(move || handoff.take_within(id, poll_interval))
                .await
                .map_err(|e| {
                    warn!(packet = %id, "waiting for packet failed: {e}");
                    GdiError::NotHandled(id)
                })?;
            if let Some(packet) = taken? {
                return Ok(packet);
            }
        }
    }
}

/// Consumer side of a submitted packet, as stored in the request queue.
///
/// Dropping it without `mark_handled` releases the producer with
/// `GdiError::NotHandled`.
#[derive(Debug)]
pub struct QueuedPacket {
    packet: Packet,
    handoff: Arc<Handoff>,
}

impl QueuedPacket {
    pub fn id(&self) -> RequestId {
        self.packet.id()
    }

    pub fn packet(&self) -> &Packet {
        &self.packet
    }

    pub fn packet_mut(&mut self) -> &mut Packet {
        &mut self.packet
    }

    /// Called once every task has been executed. Hands the packet back to
    /// the producer and wakes every waiter.
    pub fn mark_handled(mut self) {
        let packet = std::mem::replace(&mut self.packet, Packet::create_base());
        self.handoff.broadcast_handled(packet);
    }
}

impl Drop for QueuedPacket {
    fn drop(&mut self) {
        if self.handoff.abandon() {
            warn!(packet = %self.packet.id(), "packet dropped before it was handled");
        }
    }
}

/// Split a packet into its producer and consumer halves.
pub fn handoff(packet: Packet, poll_interval: Duration) -> (PendingPacket, QueuedPacket) {
    let shared = Handoff::new();
    let pending = PendingPacket {
        id: packet.id(),
        handoff: Arc::clone(&shared),
        poll_interval,
    };
    let queued = QueuedPacket {
        packet,
        handoff: shared,
    };
    (pending, queued)
}
