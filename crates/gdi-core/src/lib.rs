//! gdi-core
//!
//! Dispatch engine for GDI requests: packets of tasks sent to the cluster
//! master, either through an in-process queue or over a transport.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, command, target, task, packet, answer, result）
//! - **ports**: 抽象化レイヤー（Transport, PacketCodec, RequestQueue, ParameterSource, など）
//! - **app**: アプリケーションロジック（internal/external dispatch, worker, client）
//! - **impls**: 実装（InMemoryRequestQueue, JsonPacketCodec, LoopbackTransport など開発用）
//! - **error**: dispatch 全体の失敗を表す `GdiError`
//! - **observability**: dispatch カウンタ

pub mod app;
pub mod domain;
pub mod error;
pub mod impls;
pub mod observability;
pub mod ports;

pub use crate::error::{ErrorKind, GdiError};
