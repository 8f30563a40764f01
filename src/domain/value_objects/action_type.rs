use serde::{Deserialize, Serialize};
use std::fmt;

/// オフラインで受け付けるミューテーションの種類。
///
/// The set is closed; `Unknown` only exists so that a queue persisted by a
/// different build can still be loaded. Nothing can be registered for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionType {
    CreatePickupRequest,
    DeletePickupRequest,
    UpdateAssignmentStatus,
    SendMessage,
    UpdateProfile,
    UpdateLocation,
    Unknown(String),
}

impl ActionType {
    pub const ALL: [ActionType; 6] = [
        ActionType::CreatePickupRequest,
        ActionType::DeletePickupRequest,
        ActionType::UpdateAssignmentStatus,
        ActionType::SendMessage,
        ActionType::UpdateProfile,
        ActionType::UpdateLocation,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            ActionType::CreatePickupRequest => "create_pickup_request",
            ActionType::DeletePickupRequest => "delete_pickup_request",
            ActionType::UpdateAssignmentStatus => "update_assignment_status",
            ActionType::SendMessage => "send_message",
            ActionType::UpdateProfile => "update_profile",
            ActionType::UpdateLocation => "update_location",
            ActionType::Unknown(value) => value.as_str(),
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, ActionType::Unknown(_))
    }
}

impl From<&str> for ActionType {
    fn from(value: &str) -> Self {
        match value {
            "create_pickup_request" => ActionType::CreatePickupRequest,
            "delete_pickup_request" => ActionType::DeletePickupRequest,
            "update_assignment_status" => ActionType::UpdateAssignmentStatus,
            "send_message" => ActionType::SendMessage,
            "update_profile" => ActionType::UpdateProfile,
            "update_location" => ActionType::UpdateLocation,
            other => ActionType::Unknown(other.to_string()),
        }
    }
}

impl From<String> for ActionType {
    fn from(value: String) -> Self {
        ActionType::from(value.as_str())
    }
}

impl From<ActionType> for String {
    fn from(kind: ActionType) -> Self {
        match kind {
            ActionType::Unknown(value) => value,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
