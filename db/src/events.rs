//! Trigger events emitted by the session state machine.
//!
//! Every successful lifecycle transition produces a [`SessionEvent`] after the
//! new state has been committed. The workflow engine consumes these events and
//! evaluates workflow conditions against their JSON form.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::models::class_session;

/// Named causes a workflow can react to.
///
/// The `session_*` values correspond one-to-one with state-machine
/// transitions; `manual` and `scheduled` cover operator-initiated and
/// timer-initiated workflow runs.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum TriggerEvent {
    #[sea_orm(string_value = "session_start")]
    SessionStart,

    #[sea_orm(string_value = "session_break")]
    SessionBreak,

    #[sea_orm(string_value = "session_resume")]
    SessionResume,

    #[sea_orm(string_value = "session_finish")]
    SessionFinish,

    #[sea_orm(string_value = "session_cancel")]
    SessionCancel,

    #[sea_orm(string_value = "manual")]
    Manual,

    #[sea_orm(string_value = "scheduled")]
    Scheduled,
}

/// A committed session transition plus the context workflows evaluate against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEvent {
    pub trigger: TriggerEvent,
    pub session_id: i64,
    pub class_id: i64,
    pub subject: String,
    pub teacher_name: String,
    pub session_date: chrono::NaiveDate,
    pub student_count: i32,
    pub break_duration_minutes: i32,
    /// Set once the session has started; used to derive total duration.
    pub actual_start_time: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
    /// Caller-supplied extra fields, merged flat into the evaluation context.
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SessionEvent {
    pub fn from_session(
        trigger: TriggerEvent,
        session: &class_session::Model,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            trigger,
            session_id: session.id,
            class_id: session.class_id,
            subject: session.subject.clone(),
            teacher_name: session.teacher_name.clone(),
            session_date: session.session_date,
            student_count: session.student_count,
            break_duration_minutes: session.break_duration_minutes,
            actual_start_time: session.actual_start_time,
            occurred_at,
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_extra(mut self, key: &str, value: serde_json::Value) -> Self {
        self.extra.insert(key.to_string(), value);
        self
    }

    pub fn event_type(&self) -> String {
        self.trigger.to_string()
    }

    /// Flattens the event into a single JSON object for condition evaluation.
    ///
    /// Session fields and `extra` entries live side by side; `extra` wins on a
    /// key collision so callers can override snapshot fields when re-running a
    /// workflow manually.
    pub fn to_context(&self) -> Result<serde_json::Value, serde_json::Error> {
        let mut map = serde_json::Map::new();
        map.insert("event".into(), self.event_type().into());
        map.insert("session_id".into(), self.session_id.into());
        map.insert("class_id".into(), self.class_id.into());
        map.insert("subject".into(), self.subject.clone().into());
        map.insert("teacher_name".into(), self.teacher_name.clone().into());
        map.insert(
            "session_date".into(),
            self.session_date.format("%Y-%m-%d").to_string().into(),
        );
        map.insert("student_count".into(), self.student_count.into());
        map.insert(
            "break_duration_minutes".into(),
            self.break_duration_minutes.into(),
        );
        map.insert("occurred_at".into(), self.occurred_at.to_rfc3339().into());
        for (k, v) in &self.extra {
            map.insert(k.clone(), v.clone());
        }
        Ok(serde_json::Value::Object(map))
    }
}
