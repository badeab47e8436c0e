//! ObjectStoreHandler - 開発用のオブジェクト一覧 handler
//!
//! 1 つの target（ホストグループ一覧など）をメモリ上の `Vec<Object>` で持ち、
//! GET / ADD / DEL / MOD / REPLACE を実装します。オブジェクトは `key_field`
//! の値で識別します。
//!
//! demo とテスト用です。永続化や権限チェックはしません。

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::app::runtime::{HandlerError, TaskHandler};
use crate::domain::{
    Answer, AnswerStatus, Object, ObjectList, Operation, Origin, SubCommand, Task,
};

pub struct ObjectStoreHandler {
    key_field: String,
    objects: Mutex<Vec<Object>>,
}

impl ObjectStoreHandler {
    pub fn new(key_field: impl Into<String>) -> Self {
        Self::with_objects(key_field, Vec::new())
    }

    pub fn with_objects(key_field: impl Into<String>, objects: Vec<Object>) -> Self {
        Self {
            key_field: key_field.into(),
            objects: Mutex::new(objects),
        }
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> ObjectList {
        self.objects.lock().unwrap().iter().cloned().collect()
    }

    fn key_of<'a>(&self, object: &'a Object) -> Option<&'a Value> {
        object.get(&self.key_field)
    }

    fn position(&self, objects: &[Object], key: &Value) -> Option<usize> {
        objects.iter().position(|o| self.key_of(o) == Some(key))
    }

    fn missing_key(&self) -> Answer {
        Answer::error(
            AnswerStatus::Semantic,
            format!("object has no \"{}\" field", self.key_field),
        )
    }

    fn get(&self, task: &mut Task) {
        let selected: ObjectList = {
            let objects = self.objects.lock().unwrap();
            objects
                .iter()
                .filter(|o| task.filter().is_none_or(|f| f.matches(o)))
                .map(|o| match task.projection() {
                    Some(projection) => projection.select(o),
                    None => o.clone(),
                })
                .collect()
        };
        let n = selected.len();
        task.set_data(Some(selected));
        task.add_answer(Answer::ok(format!("{n} object(s) found")));
    }

    fn add(&self, task: &mut Task) {
        let incoming = task.take_data().unwrap_or_default();
        let mut added = ObjectList::new();
        {
            let mut objects = self.objects.lock().unwrap();
            for object in incoming {
                let Some(key) = self.key_of(&object).cloned() else {
                    task.add_answer(self.missing_key());
                    continue;
                };
                if self.position(&objects, &key).is_some() {
                    task.add_answer(Answer::error(
                        AnswerStatus::Exists,
                        format!("{} already exists", key_text(&key)),
                    ));
                    continue;
                }
                task.add_answer(Answer::ok(format!("added {}", key_text(&key))));
                objects.push(object.clone());
                added.push(object);
            }
        }
        let return_new = task
            .command()
            .sub_command()
            .contains(SubCommand::RETURN_NEW_VERSION);
        task.set_data(return_new.then_some(added));
    }

    fn delete(&self, task: &mut Task) {
        let incoming = task.take_data().unwrap_or_default();
        let mut objects = self.objects.lock().unwrap();
        for object in &incoming {
            let Some(key) = self.key_of(object) else {
                task.add_answer(self.missing_key());
                continue;
            };
            match self.position(&objects, key) {
                Some(at) => {
                    objects.remove(at);
                    task.add_answer(Answer::ok(format!("removed {}", key_text(key))));
                }
                None => task.add_answer(not_found(key)),
            }
        }
    }

    fn modify(&self, task: &mut Task) {
        let incoming = task.take_data().unwrap_or_default();
        let mut objects = self.objects.lock().unwrap();
        for object in incoming {
            let Some(key) = self.key_of(&object).cloned() else {
                task.add_answer(self.missing_key());
                continue;
            };
            let Some(at) = self.position(&objects, &key) else {
                task.add_answer(not_found(&key));
                continue;
            };
            match object {
                Value::Object(changes) if objects[at].is_object() => {
                    if let Some(existing) = objects[at].as_object_mut() {
                        existing.extend(changes);
                    }
                }
                replacement => objects[at] = replacement,
            }
            task.add_answer(Answer::ok(format!("modified {}", key_text(&key))));
        }
    }

    fn replace(&self, task: &mut Task) {
        let incoming = task.take_data().unwrap_or_default();
        if incoming.iter().any(|o| self.key_of(o).is_none()) {
            task.add_answer(self.missing_key());
            return;
        }
        let n = incoming.len();
        *self.objects.lock().unwrap() = incoming.into_inner();
        task.add_answer(Answer::ok(format!("replaced list with {n} object(s)")));
    }
}

fn key_text(key: &Value) -> String {
    key.as_str().map_or_else(|| key.to_string(), str::to_owned)
}

fn not_found(key: &Value) -> Answer {
    Answer::error(
        AnswerStatus::NotFound,
        format!("{} does not exist", key_text(key)),
    )
}

#[async_trait]
impl TaskHandler for ObjectStoreHandler {
    async fn handle(&self, task: &mut Task, _origin: &Origin) -> Result<(), HandlerError> {
        let operation = task.command().operation();
        debug!(task = %task.id(), target = %task.target(), op = operation.name(), "object store");
        match operation {
            Operation::Get => self.get(task),
            Operation::Add => self.add(task),
            Operation::Delete => self.delete(task),
            Operation::Modify => self.modify(task),
            Operation::Replace => self.replace(task),
            other => {
                return Err(HandlerError::Unsupported {
                    operation: other.name(),
                    target: task.target(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        Command, Filter, OwnershipMode, Packet, Projection, Target, TaskInputs,
    };
    use serde_json::json;

    fn store() -> ObjectStoreHandler {
        ObjectStoreHandler::with_objects(
            "name",
            vec![
                json!({"name": "@allhosts", "hosts": ["a", "b"], "kind": "hgroup"}),
                json!({"name": "@gpu", "hosts": ["g1"], "kind": "hgroup"}),
            ],
        )
    }

    async fn run(
        store: &ObjectStoreHandler,
        command: Command,
        data: Option<Vec<Object>>,
        filter: Option<Filter>,
        projection: Option<Projection>,
    ) -> Task {
        let mut data = data.map(ObjectList::from);
        let mut filter = filter;
        let mut projection = projection;
        let mut packet = Packet::create_base();
        packet.append_task(
            Target::HOST_GROUP_LIST,
            command,
            TaskInputs::new()
                .data(&mut data)
                .filter(&mut filter)
                .projection(&mut projection),
            OwnershipMode::Move,
        );
        let mut task = packet.tasks()[0].clone();
        store
            .handle(&mut task, packet.origin())
            .await
            .unwrap();
        task
    }

    #[tokio::test]
    async fn get_applies_filter_and_projection() {
        let store = store();
        let task = run(
            &store,
            Command::get(),
            None,
            Some(Filter::eq("name", "@gpu")),
            Some(Projection::fields(["name"])),
        )
        .await;

        assert_eq!(
            task.data(),
            Some(&ObjectList::from(vec![json!({"name": "@gpu"})]))
        );
        assert!(!task.answers()[0].is_error());
    }

    #[tokio::test]
    async fn get_without_filter_returns_everything() {
        let store = store();
        let task = run(&store, Command::get(), None, None, None).await;
        assert_eq!(task.data().map(ObjectList::len), Some(2));
    }

    #[tokio::test]
    async fn add_rejects_duplicates_and_returns_new_version_on_request() {
        let store = store();
        let task = run(
            &store,
            Command::add().with(SubCommand::RETURN_NEW_VERSION),
            Some(vec![json!({"name": "@new"}), json!({"name": "@gpu"})]),
            None,
            None,
        )
        .await;

        assert_eq!(
            task.data(),
            Some(&ObjectList::from(vec![json!({"name": "@new"})]))
        );
        assert_eq!(task.answers()[1].status, AnswerStatus::Exists);
        assert_eq!(store.snapshot().len(), 3);

        let plain = run(&store, Command::add(), Some(vec![json!({"name": "@x"})]), None, None).await;
        assert_eq!(plain.data(), None);
    }

    #[tokio::test]
    async fn delete_and_modify_report_missing_objects() {
        let store = store();
        let task = run(
            &store,
            Command::delete(),
            Some(vec![json!({"name": "@gpu"}), json!({"name": "@nope"})]),
            None,
            None,
        )
        .await;
        assert!(!task.answers()[0].is_error());
        assert_eq!(task.answers()[1].status, AnswerStatus::NotFound);

        let task = run(
            &store,
            Command::modify(),
            Some(vec![json!({"name": "@allhosts", "hosts": ["c"]}), json!({"name": "@gpu"})]),
            None,
            None,
        )
        .await;
        assert!(!task.answers()[0].is_error());
        assert_eq!(task.answers()[1].status, AnswerStatus::NotFound);
        assert_eq!(
            store.snapshot().iter().next(),
            Some(&json!({"name": "@allhosts", "hosts": ["c"], "kind": "hgroup"}))
        );
    }

    #[tokio::test]
    async fn replace_swaps_the_whole_list() {
        let store = store();
        run(
            &store,
            Command::new(Operation::Replace),
            Some(vec![json!({"name": "@only"})]),
            None,
            None,
        )
        .await;
        assert_eq!(store.snapshot(), ObjectList::from(vec![json!({"name": "@only"})]));
    }

    #[tokio::test]
    async fn unsupported_operations_are_errors() {
        let store = store();
        let mut packet = Packet::create_base();
        packet.append_task(
            Target::HOST_GROUP_LIST,
            Command::new(Operation::Trigger),
            TaskInputs::new(),
            OwnershipMode::Move,
        );
        let (origin, tasks) = packet.origin_and_tasks_mut();
        let err = store.handle(&mut tasks[0], origin).await.unwrap_err();
        assert!(matches!(err, HandlerError::Unsupported { operation: "TRIGGER", .. }));
    }
}
