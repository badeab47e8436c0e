//! Task - Packet 内の 1 操作
//!
//! Task は Packet への append でしか作られず、Packet と一緒にしか破棄されません。
//! 4 つのフィールド（data / answers / filter / projection）は Task が排他的に
//! 所有します。呼び出し元のリストを move するか複製するかは `OwnershipMode` で
//! 選びます。

use serde::{Deserialize, Serialize};

use super::answer::{Answer, AnswerList};
use super::command::Command;
use super::ids::TaskId;
use super::object::{Filter, ObjectList, Projection};
use super::target::Target;

/// How caller-provided inputs are handed to a new task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OwnershipMode {
    /// Take the value; the caller's slot is left empty.
    #[default]
    Move,
    /// Duplicate the value; the caller keeps its own copy.
    Copy,
}

impl OwnershipMode {
    fn transfer<T: Clone>(self, slot: Option<&mut Option<T>>) -> Option<T> {
        let slot = slot?;
        match self {
            OwnershipMode::Move => slot.take(),
            OwnershipMode::Copy => slot.clone(),
        }
    }
}

/// Caller-owned inputs for `Packet::append_task`.
///
/// Each field borrows the caller's slot so that move semantics can empty it.
#[derive(Debug, Default)]
pub struct TaskInputs<'a> {
    pub data: Option<&'a mut Option<ObjectList>>,
    pub answers: Option<&'a mut Option<AnswerList>>,
    pub filter: Option<&'a mut Option<Filter>>,
    pub projection: Option<&'a mut Option<Projection>>,
}

impl<'a> TaskInputs<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data(mut self, data: &'a mut Option<ObjectList>) -> Self {
        self.data = Some(data);
        self
    }

    pub fn answers(mut self, answers: &'a mut Option<AnswerList>) -> Self {
        self.answers = Some(answers);
        self
    }

    pub fn filter(mut self, filter: &'a mut Option<Filter>) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn projection(mut self, projection: &'a mut Option<Projection>) -> Self {
        self.projection = Some(projection);
        self
    }
}

/// One logical operation within a packet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    target: Target,
    command: Command,
    data: Option<ObjectList>,
    #[serde(default)]
    answers: AnswerList,
    filter: Option<Filter>,
    projection: Option<Projection>,
}

impl Task {
    /// Build a task from caller inputs.
    ///
    /// In copy mode the input objects are duplicated through the projection
    /// when one is given, so the task only carries the selected fields.
    pub(crate) fn create(
        id: TaskId,
        target: Target,
        command: Command,
        inputs: TaskInputs<'_>,
        mode: OwnershipMode,
    ) -> Self {
        let projection = mode.transfer(inputs.projection);
        let data = match (mode, &projection, inputs.data) {
            (OwnershipMode::Copy, Some(projection), Some(slot)) => {
                slot.as_ref().map(|objects| projection.select_all(objects))
            }
            (_, _, slot) => mode.transfer(slot),
        };
        Self {
            id,
            target,
            command,
            data,
            answers: mode.transfer(inputs.answers).unwrap_or_default(),
            filter: mode.transfer(inputs.filter),
            projection,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub fn command(&self) -> Command {
        self.command
    }

    pub fn operation_name(&self) -> &'static str {
        self.command.operation().name()
    }

    pub fn data(&self) -> Option<&ObjectList> {
        self.data.as_ref()
    }

    pub fn data_mut(&mut self) -> Option<&mut ObjectList> {
        self.data.as_mut()
    }

    pub fn take_data(&mut self) -> Option<ObjectList> {
        self.data.take()
    }

    /// Replace the data list, discarding the previous one.
    pub fn set_data(&mut self, data: Option<ObjectList>) {
        self.data = data;
    }

    pub fn answers(&self) -> &[Answer] {
        &self.answers
    }

    pub fn add_answer(&mut self, answer: Answer) {
        self.answers.push(answer);
    }

    pub fn take_answers(&mut self) -> AnswerList {
        std::mem::take(&mut self.answers)
    }

    pub fn set_answers(&mut self, answers: AnswerList) {
        self.answers = answers;
    }

    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    pub fn projection(&self) -> Option<&Projection> {
        self.projection.as_ref()
    }
}
