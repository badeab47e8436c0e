//! InMemoryRequestQueue - master 内部の packet キュー
//!
//! # 学習ポイント
//! - Mutex + Condvar による blocking pop
//! - Async での blocking 処理の扱い（spawn_blocking）
//! - close / wakeup による待機中スレッドの解放
//! - close 時に残っていた packet は drop され、producer には NotHandled が返る

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use tracing::{trace, warn};

use crate::app::handoff::QueuedPacket;
use crate::ports::{QueueError, RequestQueue};

#[derive(Debug, Default)]
struct QueueState {
    items: VecDeque<QueuedPacket>,
    closed: bool,
    /// Bumped by `wakeup_all_waiting` so waiters can tell a deliberate wake-up
    /// from a spurious one.
    wakeups: u64,
}

/// InMemoryRequestQueue は FIFO の packet キュー
///
/// # 実装詳細
/// - VecDeque<QueuedPacket> を Mutex で保護
/// - Condvar で push / wakeup / close を通知
#[derive(Debug, Clone, Default)]
pub struct InMemoryRequestQueue {
    state: Arc<Mutex<QueueState>>,
    condvar: Arc<Condvar>,
}

impl InMemoryRequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn pop_blocking(&self, timeout: Duration) -> Result<Option<QueuedPacket>, QueueError> {
        let start = Instant::now();
        let mut guard = self.state.lock().unwrap();
        let wakeups = guard.wakeups;
        loop {
            if let Some(item) = guard.items.pop_front() {
                return Ok(Some(item));
            }
            if guard.closed {
                return Err(QueueError::Closed);
            }
            if guard.wakeups != wakeups {
                return Ok(None);
            }
            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return Ok(None);
            }
            let (next, result) = self
                .condvar
                .wait_timeout(guard, timeout.saturating_sub(elapsed))
                .unwrap();
            guard = next;
            if result.timed_out() && guard.items.is_empty() {
                return if guard.closed {
                    Err(QueueError::Closed)
                } else {
                    Ok(None)
                };
            }
        }
    }
}

#[async_trait::async_trait]
impl RequestQueue for InMemoryRequestQueue {
    async fn store_notify(&self, item: QueuedPacket) -> Result<(), QueueError> {
        let mut guard = self.state.lock().unwrap();
        if guard.closed {
            return Err(QueueError::Closed);
        }
        trace!(packet = %item.id(), depth = guard.items.len() + 1, "packet queued");
        guard.items.push_back(item);
        drop(guard);

        // 待機中のスレッドに通知
        self.condvar.notify_one();
        Ok(())
    }

    async fn wait_for_new(&self, timeout: Duration) -> Result<Option<QueuedPacket>, QueueError> {
        let queue = self.clone();
        // spawn_blocking で同期処理を実行（Condvar で待つため）
        tokio::task::spawn_blocking(move || queue.pop_blocking(timeout))
            .await
            .map_err(|_| QueueError::Closed)?
    }

    fn wakeup_all_waiting(&self) {
        let mut guard = self.state.lock().unwrap();
        guard.wakeups += 1;
        drop(guard);
        self.condvar.notify_all();
    }

    fn close(&self) {
        let mut guard = self.state.lock().unwrap();
        guard.closed = true;
        let leftover = std::mem::take(&mut guard.items);
        drop(guard);
        self.condvar.notify_all();

        // dropping releases each producer with NotHandled
        if !leftover.is_empty() {
            warn!(packets = leftover.len(), "queue closed with unhandled packets");
        }
        drop(leftover);
    }

    fn len(&self) -> usize {
        self.state.lock().unwrap().items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::handoff::{DEFAULT_POLL_INTERVAL, handoff};
    use crate::domain::{Command, OwnershipMode, Packet, RequestId, Target, TaskInputs};
    use crate::error::GdiError;
    use tokio::time::Instant;

    fn queued(id: u32) -> QueuedPacket {
        let mut packet = Packet::create_base();
        packet.append_task(
            Target::JOB_LIST,
            Command::get(),
            TaskInputs::new(),
            OwnershipMode::Move,
        );
        packet.assign_id(RequestId::new(id));
        handoff(packet, DEFAULT_POLL_INTERVAL).1
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = InMemoryRequestQueue::new();
        queue.store_notify(queued(1)).await.unwrap();
        queue.store_notify(queued(2)).await.unwrap();
        assert_eq!(queue.len(), 2);

        let first = queue.wait_for_new(Duration::from_secs(1)).await.unwrap().unwrap();
        let second = queue.wait_for_new(Duration::from_secs(1)).await.unwrap().unwrap();

        assert_eq!(first.id(), RequestId::new(1));
        assert_eq!(second.id(), RequestId::new(2));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_pop_timeout() {
        let queue = InMemoryRequestQueue::new();
        let start = Instant::now();
        let popped = queue.wait_for_new(Duration::from_millis(200)).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(200));
        assert!(popped.is_none());
    }

    #[tokio::test]
    async fn test_push_wakes_pop() {
        let queue = InMemoryRequestQueue::new();

        let pop_future = tokio::spawn({
            let queue = queue.clone();
            async move { queue.wait_for_new(Duration::from_secs(5)).await.unwrap() }
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        queue.store_notify(queued(7)).await.unwrap();

        let popped = pop_future.await.unwrap();
        assert_eq!(popped.map(|q| q.id()), Some(RequestId::new(7)));
    }

    #[tokio::test]
    async fn test_wakeup_all_releases_waiters_empty_handed() {
        let queue = InMemoryRequestQueue::new();

        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let queue = queue.clone();
                tokio::spawn(async move { queue.wait_for_new(Duration::from_secs(5)).await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(100)).await;
        let start = Instant::now();
        queue.wakeup_all_waiting();

        for waiter in waiters {
            assert!(matches!(waiter.await.unwrap(), Ok(None)));
        }
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_close_rejects_push_and_wakes_pop() {
        let queue = InMemoryRequestQueue::new();
        queue.close();

        assert_eq!(queue.store_notify(queued(2)).await, Err(QueueError::Closed));
        assert!(matches!(
            queue.wait_for_new(Duration::from_millis(10)).await,
            Err(QueueError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_close_releases_producers_of_leftover_packets() {
        let queue = InMemoryRequestQueue::new();
        let mut packet = Packet::create_base();
        packet.assign_id(RequestId::new(3));
        let (pending, queued) = handoff(packet, Duration::from_millis(50));
        queue.store_notify(queued).await.unwrap();

        queue.close();
        assert!(queue.is_empty());

        let result = tokio::time::timeout(Duration::from_secs(2), pending.wait())
            .await
            .expect("producer was not released");
        assert!(matches!(result, Err(GdiError::NotHandled(id)) if id == RequestId::new(3)));
    }
}
