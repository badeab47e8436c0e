//! JsonPacketCodec - 長さプレフィックス付き JSON フレーム
//!
//! Wire format: 4-byte length prefix (big-endian) + JSON payload.
//!
//! 受信側だけで意味を持つフィールド（internal フラグ、解析済み identity）は
//! シリアライズされません。

use crate::domain::Packet;
use crate::ports::{CodecError, PacketCodec};

const LEN_PREFIX: usize = 4;

/// Upper bound for one encoded packet.
pub const MAX_FRAME: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPacketCodec;

impl JsonPacketCodec {
    pub fn new() -> Self {
        Self
    }
}

impl PacketCodec for JsonPacketCodec {
    fn estimated_size(&self, packet: &Packet) -> usize {
        // header + per-task overhead; data lists dominate for large requests
        let objects: usize = packet
            .tasks()
            .iter()
            .map(|t| t.data().map_or(0, |d| d.len()))
            .sum();
        LEN_PREFIX + 256 + packet.task_count() * 128 + objects * 64
    }

    fn pack(&self, packet: &Packet, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        let body = serde_json::to_vec(packet)?;
        if body.len() > MAX_FRAME {
            return Err(CodecError::TooLarge(body.len()));
        }
        buf.reserve(LEN_PREFIX + body.len());
        buf.extend_from_slice(&(body.len() as u32).to_be_bytes());
        buf.extend_from_slice(&body);
        Ok(())
    }

    fn unpack(&self, buf: &[u8]) -> Result<Packet, CodecError> {
        let Some((prefix, rest)) = buf.split_first_chunk::<LEN_PREFIX>() else {
            return Err(CodecError::Truncated {
                needed: LEN_PREFIX,
                available: buf.len(),
            });
        };
        let len = u32::from_be_bytes(*prefix) as usize;
        if len > MAX_FRAME {
            return Err(CodecError::TooLarge(len));
        }
        if rest.len() < len {
            return Err(CodecError::Truncated {
                needed: LEN_PREFIX + len,
                available: buf.len(),
            });
        }
        Ok(serde_json::from_slice(&rest[..len])?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        AuthContext, Command, Identity, ObjectList, OwnershipMode, Projection, RequestId,
        SubCommand, Target, TaskInputs,
    };
    use chrono::TimeZone;
    use serde_json::json;

    fn sample() -> Packet {
        let ctx = AuthContext {
            host: "submit01".into(),
            component: "qconf".into(),
            component_id: 0,
            identity: Identity {
                uid: 1000,
                gid: 100,
                user: "alice".into(),
                group: "users".into(),
                groups: vec![100, 27],
            },
        };
        let now = chrono::Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let mut packet = Packet::create(&ctx, now);
        let mut data = Some(ObjectList::from(vec![json!({"name": "@allhosts"})]));
        packet.append_task(
            Target::HOST_GROUP_LIST,
            Command::add().with(SubCommand::RETURN_NEW_VERSION),
            TaskInputs::new().data(&mut data),
            OwnershipMode::Move,
        );
        let mut what = Some(Projection::fields(["name"]));
        packet.append_task(
            Target::EXEC_HOST_LIST,
            Command::get(),
            TaskInputs::new().projection(&mut what),
            OwnershipMode::Move,
        );
        packet.assign_id(RequestId::new(42));
        packet
    }

    #[test]
    fn frame_starts_with_big_endian_length() {
        let mut buf = Vec::new();
        JsonPacketCodec.pack(&sample(), &mut buf).unwrap();

        let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        assert_eq!(len, buf.len() - 4);
        assert_eq!(buf[4], b'{');
    }

    #[test]
    fn unpack_restores_ids_tasks_and_origin() {
        let packet = sample();
        let mut buf = Vec::new();
        JsonPacketCodec.pack(&packet, &mut buf).unwrap();

        let decoded = JsonPacketCodec.unpack(&buf).unwrap();
        assert_eq!(decoded, packet);
        assert_eq!(decoded.id(), RequestId::new(42));
        assert_eq!(decoded.tasks()[1].target(), Target::EXEC_HOST_LIST);
    }

    #[test]
    fn receiver_only_state_is_not_sent() {
        let mut packet = sample();
        packet.mark_internal();
        let mut buf = Vec::new();
        JsonPacketCodec.pack(&packet, &mut buf).unwrap();

        let decoded = JsonPacketCodec.unpack(&buf).unwrap();
        assert!(!decoded.is_internal());
        assert!(decoded.origin().identity.is_none());
    }

    #[test]
    fn short_buffers_are_truncated() {
        let mut buf = Vec::new();
        JsonPacketCodec.pack(&sample(), &mut buf).unwrap();

        assert!(matches!(
            JsonPacketCodec.unpack(&buf[..2]),
            Err(CodecError::Truncated { needed: 4, available: 2 })
        ));
        assert!(matches!(
            JsonPacketCodec.unpack(&buf[..buf.len() - 1]),
            Err(CodecError::Truncated { .. })
        ));
    }

    #[test]
    fn garbage_body_is_malformed() {
        let mut buf = 3u32.to_be_bytes().to_vec();
        buf.extend_from_slice(b"{x}");
        assert!(matches!(
            JsonPacketCodec.unpack(&buf),
            Err(CodecError::Malformed(_))
        ));
    }

    #[test]
    fn oversized_length_is_rejected_before_reading() {
        let buf = u32::MAX.to_be_bytes().to_vec();
        assert!(matches!(
            JsonPacketCodec.unpack(&buf),
            Err(CodecError::TooLarge(_))
        ));
    }

    #[test]
    fn estimate_grows_with_data() {
        let small = Packet::create_base();
        assert!(JsonPacketCodec.estimated_size(&sample()) > JsonPacketCodec.estimated_size(&small));
    }
}
