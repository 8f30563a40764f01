use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// サーバーから push された変更通知
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub entity_type: String,
    pub kind: ChangeKind,
    #[serde(default)]
    pub new_record: Option<Value>,
    #[serde(default)]
    pub old_record: Option<Value>,
}

impl ChangeEvent {
    pub fn insert(entity_type: impl Into<String>, record: Value) -> Self {
        Self {
            entity_type: entity_type.into(),
            kind: ChangeKind::Insert,
            new_record: Some(record),
            old_record: None,
        }
    }

    pub fn update(entity_type: impl Into<String>, record: Value, old: Option<Value>) -> Self {
        Self {
            entity_type: entity_type.into(),
            kind: ChangeKind::Update,
            new_record: Some(record),
            old_record: old,
        }
    }

    pub fn delete(entity_type: impl Into<String>, old: Value) -> Self {
        Self {
            entity_type: entity_type.into(),
            kind: ChangeKind::Delete,
            new_record: None,
            old_record: Some(old),
        }
    }

    /// Logical id of the affected record. Deletes usually only carry it on the old record.
    pub fn record_id(&self, id_field: &str) -> Option<String> {
        let lookup = |record: &Option<Value>| {
            record
                .as_ref()
                .and_then(|value| value.get(id_field))
                .and_then(id_to_string)
        };
        match self.kind {
            ChangeKind::Delete => lookup(&self.old_record).or_else(|| lookup(&self.new_record)),
            _ => lookup(&self.new_record).or_else(|| lookup(&self.old_record)),
        }
    }
}

pub(crate) fn id_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
