//! WorkerGroup - internal dispatch の消費側
//!
//! キューから packet を取り出し、全 Task を Runtime で実行してから
//! `mark_handled` で producer に返します。
//!
//! packet ごとに別タスクで実行するので、handler が panic しても worker は
//! 止まりません。その packet は drop され、producer には NotHandled が返ります。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::app::runtime::Runtime;
use crate::ports::{QueueError, RequestQueue};

/// Worker group handle.
/// - `request_shutdown` で新しい packet を取らなくなる
/// - `shutdown_and_join()` で全ワーカーの終了を待ち、キューを close する
pub struct WorkerGroup {
    shutdown_tx: watch::Sender<bool>,
    queue: Arc<dyn RequestQueue>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerGroup {
    /// Spawn `n` workers. Each one re-checks for shutdown at least once per
    /// `poll_interval`.
    pub fn spawn(
        n: usize,
        queue: Arc<dyn RequestQueue>,
        runtime: Arc<Runtime>,
        poll_interval: Duration,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let q = Arc::clone(&queue);
            let rt = Arc::clone(&runtime);
            let rx = shutdown_rx.clone();

            let join = tokio::spawn(async move {
                worker_loop(worker_id, q, rt, rx, poll_interval).await;
            });
            joins.push(join);
        }
        info!(workers = n, "worker group started");

        Self {
            shutdown_tx,
            queue,
            joins,
        }
    }

    /// Request shutdown for all workers.
    ///
    /// A packet already taken from the queue is still executed and handed
    /// back; only new packets are no longer taken.
    pub fn request_shutdown(&self) {
        // ignore send error: receivers may already be dropped
        let _ = self.shutdown_tx.send(true);
        self.queue.wakeup_all_waiting();
    }

    /// Shutdown, wait for all workers, then close the queue.
    ///
    /// Packets nobody took any more are dropped by the close, so their
    /// producers fail with `GdiError::NotHandled` instead of waiting forever.
    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for j in self.joins {
            let _ = j.await;
        }
        self.queue.close();
        info!("worker group stopped");
    }
}

async fn worker_loop(
    worker_id: usize,
    queue: Arc<dyn RequestQueue>,
    runtime: Arc<Runtime>,
    shutdown_rx: watch::Receiver<bool>,
    poll_interval: Duration,
) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        // 取り出した packet は必ず handled まで進める。select で中断しないこと
        let mut queued = match queue.wait_for_new(poll_interval).await {
            Ok(Some(queued)) => queued,
            Ok(None) => continue,
            Err(QueueError::Closed) => break,
        };

        let id = queued.id();
        debug!(worker = worker_id, packet = %id, "worker took packet");
        let rt = Arc::clone(&runtime);
        let run = tokio::spawn(async move {
            rt.execute_packet(queued.packet_mut()).await;
            queued.mark_handled();
        });
        if let Err(e) = run.await {
            warn!(worker = worker_id, packet = %id, "packet execution panicked: {e}");
        }
    }
    debug!(worker = worker_id, "worker exiting");
}
