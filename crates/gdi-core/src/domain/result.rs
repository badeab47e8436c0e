//! Multi-result: per-task outcome handed back to the caller.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::answer::{AnswerList, has_error};
use super::ids::TaskId;
use super::object::ObjectList;
use super::packet::Packet;

/// Outcome of one task.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TaskResult {
    /// Objects returned by GET, PERMCHECK and ADD with RETURN_NEW_VERSION.
    pub objects: Option<ObjectList>,
    pub answers: AnswerList,
}

impl TaskResult {
    pub fn is_error(&self) -> bool {
        has_error(&self.answers)
    }
}

/// Task id -> result, in task order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MultiResult {
    entries: BTreeMap<TaskId, TaskResult>,
}

impl MultiResult {
    /// Drain every task of a fully handled packet and release the packet.
    ///
    /// This is the single join point of both dispatch strategies, so the
    /// shape of the result does not depend on the transport.
    pub fn from_packet(mut packet: Packet) -> Self {
        let mut entries = BTreeMap::new();
        for task in packet.tasks_mut() {
            let objects = if task.command().returns_objects() {
                task.take_data()
            } else {
                None
            };
            let answers = task.take_answers();
            entries.insert(task.id(), TaskResult { objects, answers });
        }
        packet.destroy();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: TaskId) -> Option<&TaskResult> {
        self.entries.get(&id)
    }

    /// Extract the result of one task, leaving the others in place.
    pub fn take(&mut self, id: TaskId) -> Option<TaskResult> {
        self.entries.remove(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.entries.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TaskId, &TaskResult)> {
        self.entries.iter().map(|(id, r)| (*id, r))
    }
}

impl IntoIterator for MultiResult {
    type Item = (TaskId, TaskResult);
    type IntoIter = std::collections::btree_map::IntoIter<TaskId, TaskResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Free-function form of [`MultiResult::from_packet`].
pub fn to_multi_result(packet: Packet) -> MultiResult {
    MultiResult::from_packet(packet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::answer::{Answer, AnswerStatus};
    use crate::domain::command::{Command, SubCommand};
    use crate::domain::target::Target;
    use crate::domain::task::{OwnershipMode, TaskInputs};
    use serde_json::json;

    fn objects(names: &[&str]) -> ObjectList {
        names.iter().map(|n| json!({ "name": n })).collect()
    }

    #[test]
    fn host_group_get_yields_objects_and_ok_answer() {
        let mut packet = Packet::create_base();
        packet.append_task(
            Target::HOST_GROUP_LIST,
            Command::get(),
            TaskInputs::new(),
            OwnershipMode::Move,
        );

        // handler side
        let task = &mut packet.tasks_mut()[0];
        task.set_data(Some(objects(&["@hg1", "@hg2"])));
        task.add_answer(Answer::ok("ok"));

        let result = to_multi_result(packet);
        assert_eq!(result.len(), 1);
        let entry = result.get(TaskId::new(1)).unwrap();
        assert_eq!(entry.objects, Some(objects(&["@hg1", "@hg2"])));
        assert_eq!(entry.answers, vec![Answer::ok("ok")]);
    }

    #[test]
    fn only_object_returning_commands_carry_objects() {
        let commands = [
            Command::get(),
            Command::add(),
            Command::add().with(SubCommand::RETURN_NEW_VERSION),
            Command::modify(),
        ];
        let mut packet = Packet::create_base();
        for command in commands {
            let mut data = Some(objects(&["x"]));
            packet.append_task(
                Target::USERSET_LIST,
                command,
                TaskInputs::new().data(&mut data),
                OwnershipMode::Move,
            );
        }
        for task in packet.tasks_mut() {
            task.add_answer(Answer::error(AnswerStatus::Denied, "no"));
        }

        let result = MultiResult::from_packet(packet);
        let with_objects: Vec<u32> = result
            .iter()
            .filter(|(_, r)| r.objects.is_some())
            .map(|(id, _)| id.get())
            .collect();
        assert_eq!(with_objects, vec![1, 3]);
        assert!(result.iter().all(|(_, r)| r.is_error()));
    }

    #[test]
    fn entries_are_keyed_in_task_order() {
        let mut packet = Packet::create_base();
        for _ in 0..5 {
            packet.append_task(
                Target::CONFIG_LIST,
                Command::get(),
                TaskInputs::new(),
                OwnershipMode::Move,
            );
        }

        let mut result = MultiResult::from_packet(packet);
        assert_eq!(result.ids().map(|id| id.get()).collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);

        assert!(result.take(TaskId::new(3)).is_some());
        assert!(result.take(TaskId::new(3)).is_none());
        assert_eq!(result.len(), 4);
    }
}
