//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせて dispatch engine を実装します。
//!
//! # 主要コンポーネント
//! - **GdiClient**: 上位 API の入口（単発呼び出しと multi request）
//! - **InternalDispatch**: master プロセス内の共有キュー経由の経路
//! - **ExternalDispatch**: 送信・再試行付き受信・照合による経路
//! - **Handoff**: internal dispatch の producer/consumer 同期
//! - **WorkerGroup**: キューを消費して Task を実行するワーカー
//! - **Runtime**: target ごとの handler 振り分け
//! - **GdiSettings**: 再試行回数・受信 timeout・ping の実行時設定

pub mod client;
pub mod external;
pub mod handoff;
pub mod internal;
pub mod runtime;
pub mod settings;
pub mod worker;

// 主要な型を再エクスポート
pub use self::client::{GdiClient, MultiRequest, SubmittedRequest};
pub use self::external::{DEFAULT_MASTER_PORT, ExternalDispatch, correlate};
pub use self::handoff::{DEFAULT_POLL_INTERVAL, PendingPacket, QueuedPacket, handoff};
pub use self::internal::InternalDispatch;
pub use self::runtime::{HandlerError, HandlerRegistry, Runtime, TaskHandler};
pub use self::settings::{GdiSettings, RetryCount};
pub use self::worker::WorkerGroup;
