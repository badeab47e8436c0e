//! IdGenerator port - request id の採番
//!
//! Packet id は dispatch 時にプロセス内で一意な連番として振られます。
//! internal / external のどちらの経路でも同じ生成器を共有します。

use std::sync::atomic::{AtomicU32, Ordering};

use crate::domain::RequestId;

/// # Thread Safety
/// - `Send + Sync` を要求（複数スレッドから使える）
pub trait IdGenerator: Send + Sync {
    fn next_request_id(&self) -> RequestId;
}

/// Monotonic counter starting at 1.
///
/// Wraps around on overflow and never hands out 0, which means
/// "unassigned".
#[derive(Debug)]
pub struct SequentialIdGenerator {
    next: AtomicU32,
}

impl SequentialIdGenerator {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u32) -> Self {
        Self {
            next: AtomicU32::new(first),
        }
    }
}

impl Default for SequentialIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_request_id(&self) -> RequestId {
        loop {
            let id = self.next.fetch_add(1, Ordering::Relaxed);
            if id != 0 {
                return RequestId::new(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn ids_start_at_one_and_increase() {
        let id_gen = SequentialIdGenerator::new();
        assert_eq!(id_gen.next_request_id(), RequestId::new(1));
        assert_eq!(id_gen.next_request_id(), RequestId::new(2));
        assert_eq!(id_gen.next_request_id(), RequestId::new(3));
    }

    #[test]
    fn wrap_around_skips_zero() {
        let id_gen = SequentialIdGenerator::starting_at(u32::MAX);
        assert_eq!(id_gen.next_request_id(), RequestId::new(u32::MAX));
        assert_eq!(id_gen.next_request_id(), RequestId::new(1));
    }

    #[test]
    fn ids_are_unique_across_threads() {
        let id_gen = Arc::new(SequentialIdGenerator::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let id_gen = Arc::clone(&id_gen);
                std::thread::spawn(move || {
                    (0..250).map(|_| id_gen.next_request_id()).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id));
            }
        }
        assert_eq!(seen.len(), 1000);
    }
}
