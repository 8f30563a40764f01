use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Self-contained data needed to replay a mutation after a restart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "Value", into = "Value")]
pub struct ActionPayload(Value);

impl ActionPayload {
    pub fn new(value: Value) -> Result<Self, String> {
        Self::validate(&value)?;
        Ok(Self(value))
    }

    pub fn from_json_str(json: &str) -> Result<Self, String> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| format!("Invalid JSON payload: {e}"))?;
        Self::new(value)
    }

    pub fn as_json(&self) -> &Value {
        &self.0
    }

    pub fn into_inner(self) -> Value {
        self.0
    }

    /// オブジェクト型ペイロードのフィールドを取得
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.0.as_object().and_then(|map| map.get(name))
    }

    fn validate(value: &Value) -> Result<(), String> {
        if value.is_null() {
            return Err("Action payload cannot be null".to_string());
        }
        Ok(())
    }
}

impl TryFrom<Value> for ActionPayload {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ActionPayload> for Value {
    fn from(payload: ActionPayload) -> Self {
        payload.0
    }
}
