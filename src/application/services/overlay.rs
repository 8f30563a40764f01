use crate::domain::entities::change_event::id_to_string;
use crate::domain::entities::{OfflineAction, TargetEffect};
use crate::domain::value_objects::ActionId;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// A record as the UI should render it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservedRecord {
    pub id: String,
    pub record: Value,
    /// Set while a queued action still changes this record; the UI should
    /// prefer this optimistic view until the action clears.
    pub pending_action: Option<ActionId>,
}

impl ObservedRecord {
    pub fn is_pending(&self) -> bool {
        self.pending_action.is_some()
    }
}

/// サーバーのスナップショットに未送信アクションを重ねる
///
/// `pending` must be in queue order. Actions not targeting `collection` are
/// ignored. Upserts shallow-merge the payload over the server record (or add
/// it when the server has not seen it yet); removals hide the record.
pub fn overlay_pending(
    snapshot: &[Value],
    pending: &[OfflineAction],
    collection: &str,
    id_field: &str,
) -> Vec<ObservedRecord> {
    let mut rows: Vec<Option<ObservedRecord>> = Vec::with_capacity(snapshot.len());
    let mut index: HashMap<String, usize> = HashMap::new();

    for record in snapshot {
        let Some(id) = record.get(id_field).and_then(id_to_string) else {
            continue;
        };
        index.insert(id.clone(), rows.len());
        rows.push(Some(ObservedRecord {
            id,
            record: record.clone(),
            pending_action: None,
        }));
    }

    for action in pending {
        let Some(target) = action.target.as_ref() else {
            continue;
        };
        if target.collection != collection {
            continue;
        }

        let slot = index.get(&target.entity_id).copied();
        match target.effect {
            TargetEffect::Upsert => {
                let base = slot.and_then(|i| rows[i].as_ref()).map(|row| &row.record);
                let merged = merge_record(base, action.payload.as_json(), id_field, &target.entity_id);
                let row = ObservedRecord {
                    id: target.entity_id.clone(),
                    record: merged,
                    pending_action: Some(action.id.clone()),
                };
                match slot {
                    Some(i) => rows[i] = Some(row),
                    None => {
                        index.insert(target.entity_id.clone(), rows.len());
                        rows.push(Some(row));
                    }
                }
            }
            TargetEffect::Remove => {
                if let Some(i) = slot {
                    rows[i] = None;
                }
            }
        }
    }

    rows.into_iter().flatten().collect()
}

fn merge_record(base: Option<&Value>, patch: &Value, id_field: &str, entity_id: &str) -> Value {
    let Some(patch_map) = patch.as_object() else {
        return patch.clone();
    };

    let mut merged: Map<String, Value> = base
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    for (key, value) in patch_map {
        merged.insert(key.clone(), value.clone());
    }
    merged
        .entry(id_field.to_string())
        .or_insert_with(|| Value::String(entity_id.to_string()));
    Value::Object(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::ActionTarget;
    use crate::domain::value_objects::{ActionPayload, ActionType};
    use chrono::Utc;
    use serde_json::json;

    fn action(kind: ActionType, payload: Value, target: ActionTarget) -> OfflineAction {
        OfflineAction::new(
            kind,
            ActionPayload::new(payload).unwrap(),
            Some(target),
            Utc::now(),
        )
    }

    #[test]
    fn pending_insert_appears_before_server_confirms() {
        let snapshot = vec![json!({"id": "r1", "status": "pending"})];
        let create = action(
            ActionType::CreatePickupRequest,
            json!({"status": "pending", "bins": 3}),
            ActionTarget::upsert("client_requests", "tmp-9"),
        );

        let view = overlay_pending(&snapshot, &[create.clone()], "client_requests", "id");

        assert_eq!(view.len(), 2);
        assert!(!view[0].is_pending());
        assert_eq!(view[1].id, "tmp-9");
        assert_eq!(view[1].record["id"], "tmp-9");
        assert_eq!(view[1].pending_action, Some(create.id));
    }

    #[test]
    fn stale_server_row_does_not_hide_pending_update() {
        let snapshot = vec![json!({"id": 5, "status": "assigned", "driver": "d1"})];
        let update = action(
            ActionType::UpdateAssignmentStatus,
            json!({"status": "completed"}),
            ActionTarget::upsert("driver_assignments", "5"),
        );

        let view = overlay_pending(&snapshot, &[update], "driver_assignments", "id");

        assert_eq!(view.len(), 1);
        assert_eq!(view[0].record["status"], "completed");
        assert_eq!(view[0].record["driver"], "d1");
        assert!(view[0].is_pending());
    }

    #[test]
    fn pending_delete_hides_record_and_later_actions_win() {
        let snapshot = vec![json!({"id": "a"}), json!({"id": "b"})];
        let delete = action(
            ActionType::DeletePickupRequest,
            json!({"id": "a"}),
            ActionTarget::remove("client_requests", "a"),
        );
        let other_collection = action(
            ActionType::UpdateProfile,
            json!({"name": "x"}),
            ActionTarget::upsert("profile", "b"),
        );

        let view = overlay_pending(
            &snapshot,
            &[delete, other_collection],
            "client_requests",
            "id",
        );

        assert_eq!(view.len(), 1);
        assert_eq!(view[0].id, "b");
        assert!(!view[0].is_pending());
    }

    #[test]
    fn records_without_id_are_skipped() {
        let snapshot = vec![json!({"status": "orphan"}), json!({"id": "ok"})];
        let view = overlay_pending(&snapshot, &[], "c", "id");
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].id, "ok");
    }
}
