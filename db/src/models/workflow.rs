use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ColumnTrait, DatabaseConnection, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::events::TriggerEvent;

/// Comparison operators available to workflow conditions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    Contains,
    InArray,
}

/// A single field check against the trigger event's context.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowCondition {
    /// Field name looked up in the event context.
    pub field: String,
    pub operator: ConditionOperator,
    pub value: serde_json::Value,
}

impl WorkflowCondition {
    pub fn new(field: &str, operator: ConditionOperator, value: serde_json::Value) -> Self {
        Self {
            field: field.to_string(),
            operator,
            value,
        }
    }

    /// Evaluates this check against an event context object.
    ///
    /// A missing field never matches.
    pub fn evaluate(&self, context: &serde_json::Value) -> bool {
        let Some(field_value) = context.get(&self.field) else {
            return false;
        };

        match self.operator {
            ConditionOperator::Equals => field_value == &self.value,
            ConditionOperator::NotEquals => field_value != &self.value,
            ConditionOperator::GreaterThan => self.compare_numeric(field_value, |a, b| a > b),
            ConditionOperator::LessThan => self.compare_numeric(field_value, |a, b| a < b),
            ConditionOperator::Contains => match (field_value, &self.value) {
                (serde_json::Value::String(haystack), serde_json::Value::String(needle)) => {
                    haystack.contains(needle.as_str())
                }
                (serde_json::Value::Array(items), needle) => items.contains(needle),
                _ => false,
            },
            ConditionOperator::InArray => match &self.value {
                serde_json::Value::Array(allowed) => allowed.contains(field_value),
                _ => false,
            },
        }
    }

    fn compare_numeric<F>(&self, field_value: &serde_json::Value, cmp: F) -> bool
    where
        F: Fn(f64, f64) -> bool,
    {
        match (field_value.as_f64(), self.value.as_f64()) {
            (Some(a), Some(b)) => cmp(a, b),
            _ => false,
        }
    }
}

/// Bookkeeping patch applied by the `update_session` action.
///
/// Deliberately closed: there is no way to express a status change here, so
/// workflows can never bypass the state machine's guards.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teacher_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_count: Option<i32>,
}

/// The closed set of actions a workflow may run, in declared order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowAction {
    /// Dispatch the trigger event's notification to every eligible contact.
    SendNotification,
    /// Write an audit log row without any send side effect.
    LogEvent {
        #[serde(default)]
        note: Option<String>,
    },
    /// Patch session bookkeeping fields, bypassing transition guards.
    UpdateSession { patch: SessionPatch },
    /// Send an e-mail through the configured mailer.
    SendEmail {
        to: String,
        subject: String,
        body: String,
    },
}

/// Broad categories a workflow belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum WorkflowType {
    #[sea_orm(string_value = "session_notification")]
    SessionNotification,

    #[sea_orm(string_value = "attendance_alert")]
    AttendanceAlert,

    #[sea_orm(string_value = "custom_message")]
    CustomMessage,

    #[sea_orm(string_value = "scheduled_reminder")]
    ScheduledReminder,
}

/// Represents a configurable workflow in the `workflows` table.
///
/// Conditions and actions are data, not code: they are stored as JSON and
/// decoded into the closed types above when the engine loads the workflow.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "workflows")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    pub workflow_type: WorkflowType,
    pub trigger_event: TriggerEvent,
    #[sea_orm(column_type = "Json")]
    pub conditions: Json,
    #[sea_orm(column_type = "Json")]
    pub actions: Json,
    pub is_active: bool,
    /// Lower priority runs first.
    pub priority: i32,
    pub last_executed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        panic!("No RelationDef implemented")
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn create(
        db: &DatabaseConnection,
        name: &str,
        workflow_type: WorkflowType,
        trigger_event: TriggerEvent,
        conditions: &[WorkflowCondition],
        actions: &[WorkflowAction],
        priority: i32,
    ) -> Result<Self, DbErr> {
        let now = Utc::now();
        ActiveModel {
            name: Set(name.to_owned()),
            workflow_type: Set(workflow_type),
            trigger_event: Set(trigger_event),
            conditions: Set(serde_json::to_value(conditions)
                .map_err(|e| DbErr::Custom(format!("Failed to encode conditions: {e}")))?),
            actions: Set(serde_json::to_value(actions)
                .map_err(|e| DbErr::Custom(format!("Failed to encode actions: {e}")))?),
            is_active: Set(true),
            priority: Set(priority),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    /// Active workflows for a trigger, lowest priority first.
    pub async fn find_active_for_trigger(
        db: &DatabaseConnection,
        trigger: TriggerEvent,
    ) -> Result<Vec<Self>, DbErr> {
        Entity::find()
            .filter(Column::TriggerEvent.eq(trigger))
            .filter(Column::IsActive.eq(true))
            .order_by_asc(Column::Priority)
            .order_by_asc(Column::Id)
            .all(db)
            .await
    }

    /// Decodes the stored condition list.
    pub fn decode_conditions(&self) -> Result<Vec<WorkflowCondition>, serde_json::Error> {
        serde_json::from_value(self.conditions.clone())
    }

    /// Decodes the stored action list.
    pub fn decode_actions(&self) -> Result<Vec<WorkflowAction>, serde_json::Error> {
        serde_json::from_value(self.actions.clone())
    }

    /// All conditions must hold; an empty list is vacuously true.
    pub fn conditions_met(&self, context: &serde_json::Value) -> Result<bool, serde_json::Error> {
        Ok(self
            .decode_conditions()?
            .iter()
            .all(|c| c.evaluate(context)))
    }

    /// Stamps `last_executed_at`, regardless of execution outcome.
    pub async fn touch_executed(&self, db: &DatabaseConnection) -> Result<(), DbErr> {
        let mut active: ActiveModel = self.clone().into();
        active.last_executed_at = Set(Some(Utc::now()));
        active.updated_at = Set(Utc::now());
        active.update(db).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn equals_and_not_equals() {
        let ctx = json!({"subject": "Mathematics", "student_count": 28});

        let eq = WorkflowCondition::new("subject", ConditionOperator::Equals, json!("Mathematics"));
        assert!(eq.evaluate(&ctx));

        let ne = WorkflowCondition::new("subject", ConditionOperator::NotEquals, json!("Biology"));
        assert!(ne.evaluate(&ctx));

        let eq_miss = WorkflowCondition::new("subject", ConditionOperator::Equals, json!("Biology"));
        assert!(!eq_miss.evaluate(&ctx));
    }

    #[test]
    fn numeric_comparisons() {
        let ctx = json!({"student_count": 28});

        let gt = WorkflowCondition::new("student_count", ConditionOperator::GreaterThan, json!(10));
        assert!(gt.evaluate(&ctx));

        let lt = WorkflowCondition::new("student_count", ConditionOperator::LessThan, json!(10));
        assert!(!lt.evaluate(&ctx));

        // Comparing a string numerically never matches.
        let bad = WorkflowCondition::new("student_count", ConditionOperator::GreaterThan, json!("x"));
        assert!(!bad.evaluate(&ctx));
    }

    #[test]
    fn contains_and_in_array() {
        let ctx = json!({"subject": "Advanced Mathematics", "class_id": 3});

        let contains =
            WorkflowCondition::new("subject", ConditionOperator::Contains, json!("Math"));
        assert!(contains.evaluate(&ctx));

        let in_array =
            WorkflowCondition::new("class_id", ConditionOperator::InArray, json!([1, 2, 3]));
        assert!(in_array.evaluate(&ctx));

        let not_in =
            WorkflowCondition::new("class_id", ConditionOperator::InArray, json!([7, 8]));
        assert!(!not_in.evaluate(&ctx));
    }

    #[test]
    fn missing_field_never_matches() {
        let ctx = json!({"subject": "Mathematics"});
        let cond = WorkflowCondition::new("grade", ConditionOperator::Equals, json!("7"));
        assert!(!cond.evaluate(&ctx));

        let ne = WorkflowCondition::new("grade", ConditionOperator::NotEquals, json!("7"));
        assert!(!ne.evaluate(&ctx));
    }

    #[test]
    fn action_json_round_trip_uses_snake_case_tags() {
        let actions = vec![
            WorkflowAction::SendNotification,
            WorkflowAction::LogEvent { note: Some("audit".into()) },
            WorkflowAction::UpdateSession {
                patch: SessionPatch {
                    student_count: Some(30),
                    ..Default::default()
                },
            },
            WorkflowAction::SendEmail {
                to: "principal@school.example".into(),
                subject: "Session finished".into(),
                body: "See dashboard".into(),
            },
        ];

        let encoded = serde_json::to_value(&actions).unwrap();
        assert_eq!(encoded[0]["type"], "send_notification");
        assert_eq!(encoded[1]["type"], "log_event");
        assert_eq!(encoded[2]["type"], "update_session");
        assert_eq!(encoded[3]["type"], "send_email");

        let decoded: Vec<WorkflowAction> = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, actions);
    }

    #[test]
    fn unknown_action_tag_fails_to_decode() {
        let raw = json!([{"type": "set_status", "status": "finished"}]);
        assert!(serde_json::from_value::<Vec<WorkflowAction>>(raw).is_err());
    }
}
