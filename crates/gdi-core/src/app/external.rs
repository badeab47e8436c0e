//! ExternalDispatch - 別プロセスからの GDI 呼び出し
//!
//! 1 回の呼び出しは次の順に進みます。
//!
//! 1. ジョブ投入なら検証器にかける（シリアライズより前）
//! 2. id を振ってシリアライズし、master に送信
//! 3. 返信を受信（timeout のときだけ設定回数まで再試行）
//! 4. 返信を送った packet と照合し、結果を書き戻す
//!
//! # 学習ポイント
//! - 設定は試行ごとに `ParameterSource` から読み直す（実行中の再設定に追従）
//! - 失敗時は master の生存確認をしてからエラーメッセージを選ぶ
//! - 照合の失敗は再試行せず、呼び出し全体を失敗させる

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::app::settings::GdiSettings;
use crate::domain::{ObjectList, Operation, Packet};
use crate::error::GdiError;
use crate::observability::DispatchCounters;
use crate::ports::{
    DispatchStrategy, Endpoint, IdGenerator, JobVerifier, MessageId, MessageTag, PacketCodec,
    ParameterSource, SequentialIdGenerator, Submission, Transport, TransportError,
};

/// Port the master listens on unless configured otherwise.
pub const DEFAULT_MASTER_PORT: u16 = 6444;

pub struct ExternalDispatch {
    transport: Arc<dyn Transport>,
    codec: Arc<dyn PacketCodec>,
    params: Arc<dyn ParameterSource>,
    ids: Arc<dyn IdGenerator>,
    verifier: Option<Arc<dyn JobVerifier>>,
    master: Endpoint,
    master_port: u16,
    counters: DispatchCounters,
}

impl ExternalDispatch {
    pub fn new(
        transport: Arc<dyn Transport>,
        codec: Arc<dyn PacketCodec>,
        params: Arc<dyn ParameterSource>,
        master: Endpoint,
    ) -> Self {
        Self {
            transport,
            codec,
            params,
            ids: Arc::new(SequentialIdGenerator::new()),
            verifier: None,
            master,
            master_port: DEFAULT_MASTER_PORT,
            counters: DispatchCounters::new(),
        }
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_job_verifier(mut self, verifier: Arc<dyn JobVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Port reported in "unable to contact" messages.
    pub fn with_master_port(mut self, port: u16) -> Self {
        self.master_port = port;
        self
    }

    pub fn master(&self) -> &Endpoint {
        &self.master
    }

    fn settings(&self) -> GdiSettings {
        GdiSettings::from_source(self.params.as_ref())
    }

    /// Run job verification on a job submission packet.
    ///
    /// Applies only when the sole task adds or copies jobs. Every job is
    /// detached, verified and put back, newest first, so the list keeps its
    /// order. The first rejected job fails the whole request.
    pub fn verify_jobs(&self, packet: &mut Packet) -> Result<(), GdiError> {
        let Some(verifier) = &self.verifier else {
            return Ok(());
        };
        if packet.task_count() != 1 {
            return Ok(());
        }
        let Some(task) = packet.first_task_mut() else {
            return Ok(());
        };
        if !task.target().is_job_submission()
            || !matches!(task.command().operation(), Operation::Add | Operation::Copy)
        {
            return Ok(());
        }
        let Some(jobs) = task.data_mut() else {
            return Ok(());
        };

        let mut answers = Vec::new();
        let mut verified = ObjectList::new();
        while let Some(job) = jobs.pop_last() {
            let (job, accepted) = verifier.verify(job, &mut answers);
            if !accepted {
                warn!("job verification rejected a job");
                return Err(GdiError::Verification { answers });
            }
            verified.insert_first(job);
        }
        *jobs = verified;
        for answer in &answers {
            debug!(status = ?answer.status, "job verification: {}", answer.text);
        }
        Ok(())
    }

    /// Assign an id, serialize and transmit the packet.
    pub async fn send(&self, packet: &mut Packet) -> Result<MessageId, GdiError> {
        packet.assign_id(self.ids.next_request_id());
        packet.trace_dump();

        let mut buf = Vec::with_capacity(self.codec.estimated_size(packet));
        self.codec.pack(packet, &mut buf)?;

        match self
            .transport
            .send(&self.master, MessageTag::GdiRequest, buf)
            .await
        {
            Ok(mid) => {
                self.counters.record_submitted();
                debug!(packet = %packet.id(), message = %mid, master = %self.master, "request sent");
                Ok(mid)
            }
            Err(err) => {
                warn!(packet = %packet.id(), master = %self.master, "sending request failed: {err}");
                Err(self
                    .liveness_failure()
                    .await
                    .unwrap_or_else(|| GdiError::NoMaster("sending request failed".to_string())))
            }
        }
    }

    /// Receive the reply to `mid`, retrying while attempts time out.
    ///
    /// Each attempt reads the receive timeout before it starts; the retry
    /// count and the ping flag are read after it ends. A timeout with the
    /// ping flag set probes the master's endpoint status, and a failed probe
    /// ends the loop. Any other transport error ends it immediately.
    pub async fn receive_with_retry(&self, mid: MessageId) -> Result<Vec<u8>, GdiError> {
        let mut retries_used = 0u32;
        let last_error = loop {
            let timeout = self.settings().receive_timeout();
            debug!(message = %mid, attempt = retries_used.saturating_add(1), ?timeout, "waiting for reply");

            let received = self
                .transport
                .receive(&self.master, MessageTag::GdiRequest, mid, timeout)
                .await;
            let settings = self.settings();

            let err = match received {
                Ok(bytes) => return Ok(bytes),
                Err(err) => err,
            };
            if !err.is_timeout() {
                break err;
            }

            debug!(message = %mid, retries = %settings.retries, "receive timed out");
            if settings.ping {
                match self.transport.endpoint_status(&self.master).await {
                    Ok(status) if status.is_ok() => debug!(master = %self.master, "ping ok"),
                    Ok(status) => debug!(
                        master = %self.master,
                        application_status = status.application_status,
                        "ping reports an error"
                    ),
                    Err(probe) => {
                        warn!(master = %self.master, "ping failed: {probe}");
                        break err;
                    }
                }
            }

            match settings.retries.next_retry(retries_used) {
                Some(next) => retries_used = next,
                None => break err,
            }
            self.counters.record_retry();
        };

        Err(self.liveness_failure().await.unwrap_or_else(|| {
            GdiError::NoMaster(format!(
                "failed receiving response for message id {mid} ({last_error})"
            ))
        }))
    }

    /// Ping the master and describe why it cannot be used, if it cannot.
    async fn liveness_failure(&self) -> Option<GdiError> {
        let err = self.transport.ping(&self.master).await.err()?;
        info!(master = %self.master, "master is not alive: {err}");
        Some(self.unreachable_error(err))
    }

    fn unreachable_error(&self, err: TransportError) -> GdiError {
        if err.is_unreachable() {
            GdiError::MasterUnreachable {
                component: self.master.component.clone(),
                host: self.master.host.clone(),
                port: self.master_port,
            }
        } else {
            GdiError::Transport {
                component: self.master.component.clone(),
                host: self.master.host.clone(),
                port: self.master_port,
                detail: err.to_string(),
            }
        }
    }
}

/// Check that `received` answers `sent` and move its results over.
///
/// The packets match when their ids are equal and their task id sequences
/// are identical in order and length. On a match every sent task gets the
/// received task's data (replacing its own) and answers; `received` is
/// released either way.
pub fn correlate(sent: &mut Packet, mut received: Packet) -> Result<(), GdiError> {
    let same_tasks = sent.task_count() == received.task_count()
        && sent
            .tasks()
            .iter()
            .zip(received.tasks())
            .all(|(s, r)| s.id() == r.id());

    if sent.id() != received.id() || !same_tasks {
        warn!(
            sent = %sent.id(),
            received = %received.id(),
            sent_tasks = sent.task_count(),
            received_tasks = received.task_count(),
            "mismatch between request and response"
        );
        let err = GdiError::Mismatch {
            sent: sent.id(),
            received: received.id(),
        };
        received.destroy();
        return Err(err);
    }

    for (s, r) in sent.tasks_mut().iter_mut().zip(received.tasks_mut()) {
        s.set_data(r.take_data());
        s.set_answers(r.take_answers());
    }
    received.destroy();
    Ok(())
}

#[async_trait]
impl DispatchStrategy for ExternalDispatch {
    fn name(&self) -> &'static str {
        "external"
    }

    fn counters(&self) -> &DispatchCounters {
        &self.counters
    }

    async fn execute(&self, mut packet: Packet) -> Result<Submission, GdiError> {
        self.verify_jobs(&mut packet)?;
        let mid = self.send(&mut packet).await?;
        let bytes = self.receive_with_retry(mid).await?;
        let reply = self.codec.unpack(&bytes).map_err(GdiError::Reply)?;
        if let Err(err) = correlate(&mut packet, reply) {
            self.counters.record_mismatch();
            return Err(err);
        }
        Ok(Submission::External(packet))
    }
}
