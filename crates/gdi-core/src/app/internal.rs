//! InternalDispatch - master プロセス内からの GDI 呼び出し
//!
//! packet に id を振り、origin を master 自身に書き換えて共有キューに積みます。
//! submit はブロックしません。結果は `PendingPacket::wait` で受け取ります。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::app::handoff::{DEFAULT_POLL_INTERVAL, PendingPacket, handoff};
use crate::domain::Packet;
use crate::error::GdiError;
use crate::observability::DispatchCounters;
use crate::ports::{
    DispatchStrategy, Endpoint, IdGenerator, RequestQueue, SequentialIdGenerator, Submission,
};

pub struct InternalDispatch {
    queue: Arc<dyn RequestQueue>,
    ids: Arc<dyn IdGenerator>,
    master: Endpoint,
    poll_interval: Duration,
    counters: DispatchCounters,
}

impl InternalDispatch {
    /// `master` is the address stamped as origin on every submitted packet.
    pub fn new(queue: Arc<dyn RequestQueue>, master: Endpoint) -> Self {
        Self {
            queue,
            ids: Arc::new(SequentialIdGenerator::new()),
            master,
            poll_interval: DEFAULT_POLL_INTERVAL,
            counters: DispatchCounters::new(),
        }
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// How often a waiting producer re-checks the handled flag.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Queue the packet for the worker group.
    ///
    /// The packet is rejected (and not queued) when its auth info cannot be
    /// parsed. Tasks must not be appended after this call; ownership passes
    /// to the worker until it marks the packet handled.
    pub async fn submit_internal(&self, mut packet: Packet) -> Result<PendingPacket, GdiError> {
        let id = self.ids.next_request_id();
        packet.assign_id(id);

        let origin = packet.origin_mut();
        origin.host = self.master.host.clone();
        origin.component = self.master.component.clone();
        origin.component_id = self.master.id;
        if let Err(err) = origin.parse_identity().map(|_| ()) {
            warn!(packet = %id, "rejecting internal request: {err}");
            return Err(err.into());
        }
        packet.mark_internal();
        packet.trace_dump();

        let (pending, queued) = handoff(packet, self.poll_interval);
        self.queue.store_notify(queued).await?;
        self.counters.record_submitted();
        debug!(packet = %id, depth = self.queue.len(), "internal request queued");
        Ok(pending)
    }
}

#[async_trait]
impl DispatchStrategy for InternalDispatch {
    fn name(&self) -> &'static str {
        "internal"
    }

    fn counters(&self) -> &DispatchCounters {
        &self.counters
    }

    async fn execute(&self, packet: Packet) -> Result<Submission, GdiError> {
        Ok(Submission::Internal(self.submit_internal(packet).await?))
    }
}
