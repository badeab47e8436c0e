//! Runtime - master 側で Task を handler に振り分けて実行する
//!
//! worker group（internal dispatch）と loopback transport（external dispatch）
//! の両方がこの Runtime を使うので、どちらの経路でも同じ handler が走ります。
//!
//! # 設計原則
//! - Registry は起動時に組み立て（mutable）、実行中は共有して読むだけ（immutable）
//! - handler の失敗は packet の失敗ではない。その Task の answer list に積む

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::{Answer, AnswerStatus, Origin, Packet, Target, Task};

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("no handler registered for target {0}")]
    NotFound(Target),

    #[error("handler for target {0} is already registered")]
    Duplicate(Target),

    #[error("{operation} is not supported for target {target}")]
    Unsupported {
        operation: &'static str,
        target: Target,
    },

    #[error("{0}")]
    Failed(String),
}

impl HandlerError {
    pub fn to_answer(&self) -> Answer {
        let status = match self {
            HandlerError::NotFound(_) | HandlerError::Unsupported { .. } => AnswerStatus::Semantic,
            HandlerError::Duplicate(_) | HandlerError::Failed(_) => AnswerStatus::Unknown,
        };
        Answer::error(status, self.to_string())
    }
}

/// Executes the tasks addressed to one target.
///
/// The handler writes its output into the task: objects into `data`, status
/// into `answers`.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, task: &mut Task, origin: &Origin) -> Result<(), HandlerError>;
}

/// Registry of handlers (target -> handler).
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<Target, Arc<dyn TaskHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register(
        &mut self,
        target: Target,
        handler: Arc<dyn TaskHandler>,
    ) -> Result<(), HandlerError> {
        if self.handlers.contains_key(&target) {
            return Err(HandlerError::Duplicate(target));
        }
        self.handlers.insert(target, handler);
        Ok(())
    }

    pub fn get(&self, target: Target) -> Option<&Arc<dyn TaskHandler>> {
        self.handlers.get(&target)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Runtime executes packets by dispatching each task to a registered handler.
pub struct Runtime {
    registry: Arc<HandlerRegistry>,
}

impl Runtime {
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Execute one task. Failures end up in the task's answer list.
    pub async fn execute_task(&self, task: &mut Task, origin: &Origin) {
        let target = task.target();
        let result = match self.registry.get(target) {
            Some(handler) => handler.handle(task, origin).await,
            None => Err(HandlerError::NotFound(target)),
        };
        if let Err(err) = result {
            warn!(task = %task.id(), %target, "task failed: {err}");
            task.add_answer(err.to_answer());
        }
    }

    /// Execute every task of the packet in append order.
    pub async fn execute_packet(&self, packet: &mut Packet) {
        debug!(packet = %packet.id(), tasks = packet.task_count(), "executing packet");
        let (origin, tasks) = packet.origin_and_tasks_mut();
        for task in tasks {
            self.execute_task(task, origin).await;
        }
    }
}
