// src/index/config.rs

//! Index configuration and the config-patch op grammar
//!
//! An index configuration is stored as one JSON document. Plain `stage`
//! indexes carry upload ACLs, bases and the `push_requests_allowed` policy
//! flag; `merge` indexes additionally carry the append-only `states`,
//! `messages` and `changers` lists that make up a push request's history.
//!
//! Updates arrive either as a list of string ops (`key+=value`,
//! `key-=value`, `key=value`) or as a JSON object replacing the named keys.
//! [`apply_patch`] turns either form into a complete new configuration so
//! that validation only ever compares two full snapshots.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Type tag of an index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// Regular index hosting releases
    Stage,
    /// Staging index of a push request
    #[serde(alias = "pr")]
    Merge,
}

impl IndexKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexKind::Stage => "stage",
            IndexKind::Merge => "merge",
        }
    }
}

impl FromStr for IndexKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "stage" => Ok(IndexKind::Stage),
            "merge" | "pr" => Ok(IndexKind::Merge),
            _ => Err(format!("Invalid index type: {s}")),
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_true() -> bool {
    true
}

/// Persisted configuration of one index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(rename = "type")]
    pub kind: IndexKind,

    /// Base indexes, as `user/index`
    #[serde(default)]
    pub bases: Vec<String>,

    /// Users allowed to upload into this index
    #[serde(default)]
    pub acl_upload: Vec<String>,

    /// Whether existing files may be overwritten
    #[serde(default = "default_true")]
    pub volatile: bool,

    /// Whether staging indexes may name this index as their base
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_requests_allowed: Option<bool>,

    /// Push request state history, last entry is the current state
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub states: Vec<String>,

    /// One message per state entry
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<String>,

    /// Principal responsible for each realized state change
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changers: Vec<String>,
}

impl IndexConfig {
    /// Empty configuration of the given kind
    pub fn new(kind: IndexKind) -> Self {
        Self {
            kind,
            bases: Vec::new(),
            acl_upload: Vec::new(),
            volatile: true,
            push_requests_allowed: None,
            states: Vec::new(),
            messages: Vec::new(),
            changers: Vec::new(),
        }
    }

    /// Build a configuration from a creation request body
    ///
    /// `type` defaults to `stage`. Scalar values for list fields are
    /// accepted and wrapped, so `bases="user/index"` works like
    /// `bases=["user/index"]`.
    pub fn from_request(body: &Map<String, Value>) -> Result<Self> {
        let mut body = body.clone();
        if !body.contains_key("type") {
            body.insert("type".to_string(), Value::from("stage"));
        }
        for key in LIST_FIELDS {
            if let Some(value) = body.get_mut(*key) {
                *value = ensure_list(value.take());
            }
        }
        serde_json::from_value(Value::Object(body))
            .map_err(|e| Error::InvalidIndexConfig(vec![format!("invalid index configuration: {e}")]))
    }

    /// Current push request state tag, if any
    pub fn current_state(&self) -> Option<&str> {
        self.states.last().map(String::as_str)
    }

    /// The target index of a staging index
    pub fn target(&self) -> Option<&str> {
        self.bases.first().map(String::as_str)
    }

    /// Effective value of the staging-acceptance policy flag
    pub fn allows_push_requests(&self) -> bool {
        self.push_requests_allowed.unwrap_or(false)
    }

    /// JSON representation
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse the stored JSON representation
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

const LIST_FIELDS: &[&str] = &["bases", "acl_upload", "states", "messages", "changers"];

fn ensure_list(value: Value) -> Value {
    match value {
        Value::Array(_) => value,
        Value::Null => Value::Array(Vec::new()),
        Value::String(s) if s.is_empty() => Value::Array(Vec::new()),
        other => Value::Array(vec![other]),
    }
}

/// A configuration update as sent by a client
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ConfigPatch {
    /// `key+=value`, `key-=value` or `key=value` ops applied in order
    Ops(Vec<String>),
    /// Keys replaced wholesale
    Replace(Map<String, Value>),
}

#[derive(Debug, PartialEq)]
enum PatchOp<'a> {
    Append(&'a str, &'a str),
    Remove(&'a str, &'a str),
    Set(&'a str, &'a str),
}

fn parse_op(op: &str) -> Result<PatchOp<'_>> {
    let eq = op
        .find('=')
        .ok_or_else(|| Error::BadRequest(format!("invalid config op '{op}', expected key=value")))?;
    let (lhs, value) = (&op[..eq], &op[eq + 1..]);
    let parsed = if let Some(key) = lhs.strip_suffix('+') {
        PatchOp::Append(key, value)
    } else if let Some(key) = lhs.strip_suffix('-') {
        PatchOp::Remove(key, value)
    } else {
        PatchOp::Set(lhs, value)
    };
    let key = match parsed {
        PatchOp::Append(k, _) | PatchOp::Remove(k, _) | PatchOp::Set(k, _) => k,
    };
    if key.is_empty() {
        return Err(Error::BadRequest(format!("invalid config op '{op}', missing key")));
    }
    Ok(parsed)
}

/// Apply `patch` to `config`, producing the complete new configuration
pub fn apply_patch(config: &IndexConfig, patch: &ConfigPatch) -> Result<IndexConfig> {
    let mut doc = match serde_json::to_value(config)? {
        Value::Object(map) => map,
        _ => return Err(Error::InitError("index config is not an object".to_string())),
    };

    match patch {
        ConfigPatch::Ops(ops) => {
            for op in ops {
                apply_op(&mut doc, parse_op(op)?)?;
            }
        }
        ConfigPatch::Replace(values) => {
            for (key, value) in values {
                let value = if LIST_FIELDS.contains(&key.as_str()) {
                    ensure_list(value.clone())
                } else {
                    value.clone()
                };
                doc.insert(key.clone(), value);
            }
        }
    }

    serde_json::from_value(Value::Object(doc))
        .map_err(|e| Error::InvalidIndexConfig(vec![format!("invalid index configuration: {e}")]))
}

fn apply_op(doc: &mut Map<String, Value>, op: PatchOp<'_>) -> Result<()> {
    match op {
        PatchOp::Append(key, value) => {
            let entry = doc
                .entry(key.to_string())
                .or_insert_with(|| Value::Array(Vec::new()));
            match entry {
                Value::Array(items) => items.push(Value::from(value)),
                _ => {
                    return Err(Error::BadRequest(format!(
                        "cannot append to non-list config key '{key}'"
                    )));
                }
            }
        }
        PatchOp::Remove(key, value) => match doc.get_mut(key) {
            Some(Value::Array(items)) => {
                let before = items.len();
                items.retain(|item| item.as_str() != Some(value));
                if items.len() == before {
                    return Err(Error::BadRequest(format!(
                        "value '{value}' not found in config key '{key}'"
                    )));
                }
            }
            _ => {
                return Err(Error::BadRequest(format!(
                    "cannot remove from non-list config key '{key}'"
                )));
            }
        },
        PatchOp::Set(key, value) => {
            let new_value = if LIST_FIELDS.contains(&key) {
                Value::Array(
                    value
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(Value::from)
                        .collect(),
                )
            } else {
                match value.to_ascii_lowercase().as_str() {
                    "true" | "yes" => Value::Bool(true),
                    "false" | "no" => Value::Bool(false),
                    _ => Value::from(value),
                }
            };
            doc.insert(key.to_string(), new_value);
        }
    }
    Ok(())
}
