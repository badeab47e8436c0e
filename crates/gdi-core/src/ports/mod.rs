//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! dispatch engine が依存する外部協力者（トランスポート、シリアライザ、
//! パラメータ、worker キュー、ジョブ検証器）はすべて trait の向こう側にいます。

pub mod clock;
pub mod codec;
pub mod dispatch;
pub mod id_generator;
pub mod job_verifier;
pub mod params;
pub mod request_queue;
pub mod transport;

// 主要な trait を再エクスポート
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::codec::{CodecError, PacketCodec};
pub use self::dispatch::{DispatchStrategy, Submission};
pub use self::id_generator::{IdGenerator, SequentialIdGenerator};
pub use self::job_verifier::JobVerifier;
pub use self::params::ParameterSource;
pub use self::request_queue::{QueueError, RequestQueue};
pub use self::transport::{
    Endpoint, EndpointStatus, MessageId, MessageTag, Transport, TransportError,
};
