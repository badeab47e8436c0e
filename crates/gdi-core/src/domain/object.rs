//! Object lists, filters and projections.
//!
//! オブジェクトモデル自体はこの層の関心外なので、1 オブジェクトは
//! `serde_json::Value` として運ぶだけです。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One object of the cluster object store.
pub type Object = Value;

/// Ordered list of objects (input or output of a task).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectList(Vec<Object>);

impl ObjectList {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, object: Object) {
        self.0.push(object);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Object> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Object> {
        self.0.iter_mut()
    }

    pub fn retain(&mut self, f: impl FnMut(&Object) -> bool) {
        self.0.retain(f);
    }

    /// Detach the most recently added object.
    pub fn pop_last(&mut self) -> Option<Object> {
        self.0.pop()
    }

    /// Insert an object in front of every other object.
    pub fn insert_first(&mut self, object: Object) {
        self.0.insert(0, object);
    }

    pub fn into_inner(self) -> Vec<Object> {
        self.0
    }
}

impl From<Vec<Object>> for ObjectList {
    fn from(objects: Vec<Object>) -> Self {
        Self(objects)
    }
}

impl FromIterator<Object> for ObjectList {
    fn from_iter<I: IntoIterator<Item = Object>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for ObjectList {
    type Item = Object;
    type IntoIter = std::vec::IntoIter<Object>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ObjectList {
    type Item = &'a Object;
    type IntoIter = std::slice::Iter<'a, Object>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Selection predicate narrowing a GET.
///
/// A conjunction of `field == value` terms. An empty filter matches every
/// object.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Filter {
    terms: Vec<(String, Value)>,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            terms: vec![(field.into(), value.into())],
        }
    }

    pub fn and(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.terms.push((field.into(), value.into()));
        self
    }

    pub fn matches(&self, object: &Object) -> bool {
        self.terms
            .iter()
            .all(|(field, value)| object.get(field) == Some(value))
    }
}

/// Field selection applied to the objects of a GET.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Projection {
    fields: Vec<String>,
}

impl Projection {
    pub fn fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Keep only the projected fields of a map object.
    ///
    /// Non-map objects are returned unchanged.
    pub fn select(&self, object: &Object) -> Object {
        let Some(map) = object.as_object() else {
            return object.clone();
        };
        let selected: Map<String, Value> = self
            .fields
            .iter()
            .filter_map(|field| map.get(field).map(|v| (field.clone(), v.clone())))
            .collect();
        Value::Object(selected)
    }

    pub fn select_all(&self, objects: &ObjectList) -> ObjectList {
        objects.iter().map(|o| self.select(o)).collect()
    }
}
