//! ParameterList - 書き換え可能な key/value パラメータ
//!
//! `qmaster_params` 形式の `key=value,key=value` 文字列から作れます。
//! 設定の再読込を想定して、共有したまま `set` / `reload` で値を差し替えられます。

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::ports::ParameterSource;

#[derive(Debug, Clone, Default)]
pub struct ParameterList {
    values: Arc<RwLock<HashMap<String, String>>>,
}

impl ParameterList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `key=value` pairs separated by commas or whitespace.
    ///
    /// A bare `key` is stored as `true`. Empty items are skipped.
    pub fn parse(raw: &str) -> Self {
        let list = Self::new();
        list.reload(raw);
        list
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let list = Self::new();
        {
            let mut values = list.values.write().unwrap();
            for (k, v) in pairs {
                values.insert(k.into(), v.into());
            }
        }
        list
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        debug!(%key, %value, "parameter changed");
        self.values.write().unwrap().insert(key, value);
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        self.values.write().unwrap().remove(key)
    }

    /// Replace every value with the ones in `raw`.
    pub fn reload(&self, raw: &str) {
        let parsed: HashMap<String, String> = raw
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|item| !item.is_empty())
            .map(|item| match item.split_once('=') {
                Some((k, v)) => (k.trim().to_string(), v.trim().to_string()),
                None => (item.trim().to_string(), "true".to_string()),
            })
            .collect();
        *self.values.write().unwrap() = parsed;
    }
}

impl ParameterSource for ParameterList {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().unwrap().get(key).cloned()
    }
}
