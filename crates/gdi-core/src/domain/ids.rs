//! Domain identifiers (strongly-typed IDs).
//!
//! Packet と Task の ID はどちらも `u32` の連番ですが、意味が違います。
//! - **RequestId**: プロセス内で一意。dispatch 時に採番される
//! - **TaskId**: Packet 内で一意。1 から始まり append ごとに +1
//!
//! ## Phantom Type パターン
//! `Id<T>` で共通実装を提供しつつ、`T` はマーカー型としてだけ使います。
//! RequestId と TaskId を取り違えるとコンパイルエラーになります。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

/// IdMarker は各 ID 型のマーカー trait
pub trait IdMarker: Send + Sync + 'static {
    /// Display で使うプレフィックス（例: "req-", "task-"）
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
///
/// `0` is reserved for "not assigned yet" (a packet that has not been
/// dispatched, or the last task id of an empty packet).
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T: IdMarker> {
    value: u32,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub const UNASSIGNED: Self = Self::new(0);

    pub const fn new(value: u32) -> Self {
        Self {
            value,
            _marker: PhantomData,
        }
    }

    pub fn get(&self) -> u32 {
        self.value
    }

    pub fn is_assigned(&self) -> bool {
        self.value != 0
    }

    /// The id that follows this one.
    pub fn next(&self) -> Self {
        Self::new(self.value + 1)
    }
}

impl<T: IdMarker> From<u32> for Id<T> {
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.value)
    }
}

// ========================================
// マーカー型の定義
// ========================================

/// Request (Packet) のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Request {}

impl IdMarker for Request {
    fn prefix() -> &'static str {
        "req-"
    }
}

/// Task のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Task {}

impl IdMarker for Task {
    fn prefix() -> &'static str {
        "task-"
    }
}

/// Identifier of a Packet (one client/master round trip).
pub type RequestId = Id<Request>;

/// Identifier of a Task within its Packet.
pub type TaskId = Id<Task>;
