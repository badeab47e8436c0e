//! LoopbackTransport - プロセス内 master につながる Transport
//!
//! `send` で受け取った packet をその場でデコードし、worker group と同じ
//! Runtime で実行して、返信をメッセージ id ごとの mailbox に置きます。
//! `receive` は mailbox から取り出すだけです。
//!
//! テストと demo で external dispatch を通しで動かすための実装です。
//! `set_reachable(false)` で master 停止を再現できます。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::app::runtime::Runtime;
use crate::ports::{
    Endpoint, EndpointStatus, MessageId, MessageTag, PacketCodec, Transport, TransportError,
};

pub struct LoopbackTransport {
    master: Endpoint,
    runtime: Arc<Runtime>,
    codec: Arc<dyn PacketCodec>,
    next_id: AtomicU64,
    mailbox: Mutex<HashMap<MessageId, Vec<u8>>>,
    reachable: AtomicBool,
}

impl LoopbackTransport {
    pub fn new(master: Endpoint, runtime: Arc<Runtime>, codec: Arc<dyn PacketCodec>) -> Self {
        Self {
            master,
            runtime,
            codec,
            next_id: AtomicU64::new(1),
            mailbox: Mutex::new(HashMap::new()),
            reachable: AtomicBool::new(true),
        }
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    fn check_peer(&self, peer: &Endpoint) -> Result<(), TransportError> {
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectError);
        }
        if *peer != self.master {
            return Err(TransportError::ConnectionNotFound);
        }
        Ok(())
    }

    /// What the master does with one request: decode, execute, encode.
    async fn serve(&self, payload: &[u8]) -> Result<Vec<u8>, TransportError> {
        let mut packet = self
            .codec
            .unpack(payload)
            .map_err(|e| TransportError::Other(format!("master could not decode request: {e}")))?;
        let id = packet.id();
        if let Err(err) = packet.origin_mut().parse_identity().map(|_| ()) {
            warn!(packet = %id, "request without usable auth info: {err}");
        }
        self.runtime.execute_packet(&mut packet).await;

        let mut reply = Vec::with_capacity(self.codec.estimated_size(&packet));
        self.codec
            .pack(&packet, &mut reply)
            .map_err(|e| TransportError::Other(format!("master could not encode reply: {e}")))?;
        Ok(reply)
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send(
        &self,
        to: &Endpoint,
        tag: MessageTag,
        payload: Vec<u8>,
    ) -> Result<MessageId, TransportError> {
        self.check_peer(to)?;
        let mid = MessageId(self.next_id.fetch_add(1, Ordering::SeqCst));
        debug!(message = %mid, ?tag, bytes = payload.len(), "loopback request");

        let reply = self.serve(&payload).await?;
        self.mailbox.lock().unwrap().insert(mid, reply);
        Ok(mid)
    }

    async fn receive(
        &self,
        from: &Endpoint,
        _tag: MessageTag,
        response_to: MessageId,
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        self.check_peer(from)?;
        let reply = self.mailbox.lock().unwrap().remove(&response_to);
        if let Some(reply) = reply {
            return Ok(reply);
        }
        // replies are produced inside `send`, so a missing one never shows up
        tokio::time::sleep(timeout).await;
        Err(TransportError::Timeout)
    }

    async fn endpoint_status(&self, endpoint: &Endpoint) -> Result<EndpointStatus, TransportError> {
        self.check_peer(endpoint)?;
        Ok(EndpointStatus {
            application_status: 0,
        })
    }

    async fn ping(&self, endpoint: &Endpoint) -> Result<(), TransportError> {
        self.check_peer(endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::external::ExternalDispatch;
    use crate::app::runtime::HandlerRegistry;
    use crate::domain::{Command, OwnershipMode, Packet, Target, TaskId, TaskInputs};
    use crate::error::GdiError;
    use crate::impls::{JsonPacketCodec, ObjectStoreHandler, ParameterList};
    use crate::ports::DispatchStrategy;
    use serde_json::json;

    fn master() -> Endpoint {
        Endpoint::new("master01", "qmaster", 1)
    }

    fn loopback() -> Arc<LoopbackTransport> {
        let mut reg = HandlerRegistry::new();
        reg.register(
            Target::HOST_GROUP_LIST,
            Arc::new(ObjectStoreHandler::with_objects(
                "name",
                vec![json!({"name": "@allhosts"}), json!({"name": "@gpu"})],
            )),
        )
        .unwrap();
        Arc::new(LoopbackTransport::new(
            master(),
            Arc::new(Runtime::new(Arc::new(reg))),
            Arc::new(JsonPacketCodec::new()),
        ))
    }

    fn dispatch(transport: Arc<LoopbackTransport>) -> ExternalDispatch {
        ExternalDispatch::new(
            transport,
            Arc::new(JsonPacketCodec::new()),
            Arc::new(ParameterList::parse("gdi_timeout=1")),
            master(),
        )
    }

    fn list_host_groups() -> Packet {
        let mut packet = Packet::create_base();
        packet.append_task(
            Target::HOST_GROUP_LIST,
            Command::get(),
            TaskInputs::new(),
            OwnershipMode::Move,
        );
        packet
    }

    #[tokio::test]
    async fn external_exchange_through_the_loopback_master() {
        let dispatch = dispatch(loopback());

        let submission = dispatch.execute(list_host_groups()).await.unwrap();
        let mut result = dispatch.wait_for_result(submission).await.unwrap();

        let groups = result.take(TaskId::new(1)).unwrap();
        assert_eq!(groups.objects.as_ref().map(|o| o.len()), Some(2));
        assert!(!groups.is_error());
    }

    #[tokio::test]
    async fn reply_can_be_received_only_once() {
        let transport = loopback();
        let mut buf = Vec::new();
        JsonPacketCodec.pack(&list_host_groups(), &mut buf).unwrap();

        let mid = transport.send(&master(), MessageTag::GdiRequest, buf).await.unwrap();
        let timeout = Duration::from_millis(10);
        assert!(transport.receive(&master(), MessageTag::GdiRequest, mid, timeout).await.is_ok());
        assert_eq!(
            transport.receive(&master(), MessageTag::GdiRequest, mid, timeout).await,
            Err(TransportError::Timeout)
        );
    }

    #[tokio::test]
    async fn unreachable_master_fails_the_call() {
        let transport = loopback();
        transport.set_reachable(false);
        let dispatch = dispatch(transport);

        let err = dispatch.execute(list_host_groups()).await.unwrap_err();
        assert!(matches!(err, GdiError::MasterUnreachable { .. }));
    }

    #[tokio::test]
    async fn wrong_peer_is_not_found() {
        let transport = loopback();
        let other = Endpoint::new("elsewhere", "qmaster", 1);
        assert_eq!(
            transport.ping(&other).await,
            Err(TransportError::ConnectionNotFound)
        );
    }
}
