//! PacketCodec port - Packet とバイト列の相互変換
//!
//! バイトレイアウトはこの層では規定しません。

use thiserror::Error;

use crate::domain::Packet;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("buffer too short: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("payload is {0} bytes, larger than the frame limit")]
    TooLarge(usize),

    #[error("malformed packet: {0}")]
    Malformed(#[from] serde_json::Error),
}

pub trait PacketCodec: Send + Sync {
    /// Estimated encoded size, used to size the send buffer.
    fn estimated_size(&self, packet: &Packet) -> usize;

    fn pack(&self, packet: &Packet, buf: &mut Vec<u8>) -> Result<(), CodecError>;

    fn unpack(&self, buf: &[u8]) -> Result<Packet, CodecError>;
}
