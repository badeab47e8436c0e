//! Impls - 実装（開発用・テスト用）
//!
//! このモジュールには ports の実装を含めます。
//!
//! # 含まれる実装
//! - **InMemoryRequestQueue**: internal dispatch の共有キュー
//! - **JsonPacketCodec**: 長さプレフィックス付き JSON の wire codec
//! - **ParameterList**: 実行時に書き換えられる key/value パラメータ
//! - **LoopbackTransport**: プロセス内 master への Transport
//! - **ObjectStoreHandler**: メモリ上のオブジェクト一覧を操作する handler
//!
//! # 本番用実装
//! 実際のネットワーク transport は別クレートに配置します。

pub mod inmem_queue;
pub mod json_codec;
pub mod loopback;
pub mod memory_store;
pub mod params;

// 主要な型を再エクスポート
pub use self::inmem_queue::InMemoryRequestQueue;
pub use self::json_codec::JsonPacketCodec;
pub use self::loopback::LoopbackTransport;
pub use self::memory_store::ObjectStoreHandler;
pub use self::params::ParameterList;
