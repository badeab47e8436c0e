//! GdiClient - 上位 API が使う GDI 呼び出しの入口
//!
//! # 使用例
//! ```ignore
//! let client = GdiClient::new(dispatch, auth);
//!
//! let mut multi = client.multi();
//! let hgroups = multi.append(Target::HOST_GROUP_LIST, Command::get(), TaskInputs::new());
//! let queues = multi.append(Target::CLUSTER_QUEUE_LIST, Command::get(), TaskInputs::new());
//! let mut result = multi.execute().await?.wait().await?;
//!
//! let hgroups = result.take(hgroups);
//! ```
//!
//! dispatch 戦略（internal / external）は構築時に 1 つだけ選びます。
//! 呼び出し側からはどちらの経路でも同じ `MultiResult` が返ります。

use std::sync::Arc;

use tracing::debug;

use crate::domain::{
    AuthContext, Command, Filter, MultiResult, ObjectList, OwnershipMode, Packet, Projection,
    RequestId, Target, TaskId, TaskInputs, TaskResult,
};
use crate::error::GdiError;
use crate::observability::DispatchCounts;
use crate::ports::{Clock, DispatchStrategy, Submission, SystemClock};

pub struct GdiClient {
    strategy: Arc<dyn DispatchStrategy>,
    auth: AuthContext,
    clock: Arc<dyn Clock>,
}

impl GdiClient {
    pub fn new(strategy: Arc<dyn DispatchStrategy>, auth: AuthContext) -> Self {
        Self {
            strategy,
            auth,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn counters(&self) -> DispatchCounts {
        self.strategy.counters().snapshot()
    }

    /// Start a request that may carry several tasks.
    pub fn multi(&self) -> MultiRequest<'_> {
        MultiRequest {
            client: self,
            packet: Packet::create(&self.auth, self.clock.now()),
            mode: OwnershipMode::Move,
        }
    }

    /// Single-task request.
    pub async fn gdi(
        &self,
        target: Target,
        command: Command,
        data: Option<ObjectList>,
        filter: Option<Filter>,
        projection: Option<Projection>,
    ) -> Result<TaskResult, GdiError> {
        let (mut data, mut filter, mut projection) = (data, filter, projection);
        let mut multi = self.multi();
        let id = multi.append(
            target,
            command,
            TaskInputs::new()
                .data(&mut data)
                .filter(&mut filter)
                .projection(&mut projection),
        );
        let mut result = multi.execute().await?.wait().await?;
        Ok(result.take(id).unwrap_or_default())
    }
}

/// Tasks being collected into one packet.
pub struct MultiRequest<'c> {
    client: &'c GdiClient,
    packet: Packet,
    mode: OwnershipMode,
}

impl<'c> MultiRequest<'c> {
    /// How the inputs of later `append` calls are taken over.
    pub fn ownership_mode(mut self, mode: OwnershipMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn append(&mut self, target: Target, command: Command, inputs: TaskInputs<'_>) -> TaskId {
        self.packet.append_task(target, command, inputs, self.mode)
    }

    pub fn packet(&self) -> &Packet {
        &self.packet
    }

    /// Hand the packet to the dispatch strategy.
    pub async fn execute(self) -> Result<SubmittedRequest<'c>, GdiError> {
        if self.packet.is_empty() {
            return Err(GdiError::EmptyPacket);
        }
        debug!(
            strategy = self.client.strategy.name(),
            tasks = self.packet.task_count(),
            "executing request"
        );
        let submission = self.client.strategy.execute(self.packet).await?;
        Ok(SubmittedRequest {
            client: self.client,
            submission,
        })
    }
}

/// A request handed to the master, result not yet collected.
pub struct SubmittedRequest<'c> {
    client: &'c GdiClient,
    submission: Submission,
}

impl SubmittedRequest<'_> {
    pub fn request_id(&self) -> RequestId {
        self.submission.id()
    }

    pub fn is_handled(&self) -> bool {
        self.submission.is_handled()
    }

    pub async fn wait(self) -> Result<MultiResult, GdiError> {
        self.client.strategy.wait_for_result(self.submission).await
    }
}
