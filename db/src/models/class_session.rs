use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DatabaseConnection, Set};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::events::TriggerEvent;

/// Lifecycle states of a classroom session.
///
/// The stored string values are load-bearing: existing rows and external
/// consumers key off them, so they must not change.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SessionStatus {
    #[sea_orm(string_value = "scheduled")]
    Scheduled,

    #[sea_orm(string_value = "started")]
    Started,

    #[sea_orm(string_value = "break")]
    Break,

    #[sea_orm(string_value = "resumed")]
    Resumed,

    #[sea_orm(string_value = "finished")]
    Finished,

    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl SessionStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Finished | SessionStatus::Cancelled)
    }

    /// Edit and delete are legal only before the session has begun.
    pub fn is_editable(&self) -> bool {
        matches!(self, SessionStatus::Scheduled)
    }
}

/// The guarded transitions of the session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SessionTransition {
    Start,
    Break,
    Resume,
    Finish,
    Cancel,
}

impl SessionTransition {
    /// The guard table: which states each transition may leave from.
    pub fn allowed_from(&self, status: SessionStatus) -> bool {
        use SessionStatus::*;
        match self {
            SessionTransition::Start => matches!(status, Scheduled),
            SessionTransition::Break => matches!(status, Started | Resumed),
            SessionTransition::Resume => matches!(status, Break),
            SessionTransition::Finish => matches!(status, Started | Break | Resumed),
            SessionTransition::Cancel => matches!(status, Scheduled),
        }
    }

    /// The state this transition lands in.
    pub fn target(&self) -> SessionStatus {
        match self {
            SessionTransition::Start => SessionStatus::Started,
            SessionTransition::Break => SessionStatus::Break,
            SessionTransition::Resume => SessionStatus::Resumed,
            SessionTransition::Finish => SessionStatus::Finished,
            SessionTransition::Cancel => SessionStatus::Cancelled,
        }
    }

    /// The workflow trigger emitted once this transition commits.
    pub fn trigger(&self) -> TriggerEvent {
        match self {
            SessionTransition::Start => TriggerEvent::SessionStart,
            SessionTransition::Break => TriggerEvent::SessionBreak,
            SessionTransition::Resume => TriggerEvent::SessionResume,
            SessionTransition::Finish => TriggerEvent::SessionFinish,
            SessionTransition::Cancel => TriggerEvent::SessionCancel,
        }
    }
}

/// Represents one scheduled occurrence of a class being taught.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "class_sessions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub class_id: i64,
    pub subject: String,
    pub teacher_name: String,
    pub session_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub break_duration_minutes: i32,
    pub status: SessionStatus,
    pub actual_start_time: Option<DateTime<Utc>>,
    pub actual_break_time: Option<DateTime<Utc>>,
    pub actual_resume_time: Option<DateTime<Utc>>,
    pub actual_end_time: Option<DateTime<Utc>>,
    pub student_count: i32,
    /// Running count of notifications dispatched for this session.
    pub notified_count: i32,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::class_group::Entity",
        from = "Column::ClassId",
        to = "super::class_group::Column::Id"
    )]
    Class,
    #[sea_orm(has_many = "super::notification_log::Entity")]
    Notifications,
}

impl Related<super::class_group::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Class.def()
    }
}

impl Related<super::notification_log::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Notifications.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Schedules a new session. Sessions always enter the state machine at
    /// `scheduled`.
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        db: &DatabaseConnection,
        class_id: i64,
        subject: &str,
        teacher_name: &str,
        session_date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
        break_duration_minutes: i32,
        student_count: i32,
    ) -> Result<Self, DbErr> {
        let now = Utc::now();
        ActiveModel {
            class_id: Set(class_id),
            subject: Set(subject.to_owned()),
            teacher_name: Set(teacher_name.to_owned()),
            session_date: Set(session_date),
            start_time: Set(start_time),
            end_time: Set(end_time),
            break_duration_minutes: Set(break_duration_minutes),
            status: Set(SessionStatus::Scheduled),
            student_count: Set(student_count),
            notified_count: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_guard_table_matches_lifecycle_graph() {
        use SessionStatus::{Break, Cancelled, Finished, Resumed, Scheduled, Started};

        let all_states = [Scheduled, Started, Break, Resumed, Finished, Cancelled];

        for status in all_states {
            assert_eq!(
                SessionTransition::Start.allowed_from(status),
                status == Scheduled
            );
            assert_eq!(
                SessionTransition::Cancel.allowed_from(status),
                status == Scheduled
            );
            assert_eq!(
                SessionTransition::Resume.allowed_from(status),
                status == Break
            );
            assert_eq!(
                SessionTransition::Break.allowed_from(status),
                matches!(status, Started | Resumed)
            );
            assert_eq!(
                SessionTransition::Finish.allowed_from(status),
                matches!(status, Started | Break | Resumed)
            );
        }
    }

    #[test]
    fn terminal_states_admit_no_transition() {
        use SessionTransition::*;
        for status in [SessionStatus::Finished, SessionStatus::Cancelled] {
            assert!(status.is_terminal());
            for t in [Start, Break, Resume, Finish, Cancel] {
                assert!(!t.allowed_from(status));
            }
        }
    }

    #[test]
    fn status_strings_are_stable() {
        let pairs = [
            (SessionStatus::Scheduled, "scheduled"),
            (SessionStatus::Started, "started"),
            (SessionStatus::Break, "break"),
            (SessionStatus::Resumed, "resumed"),
            (SessionStatus::Finished, "finished"),
            (SessionStatus::Cancelled, "cancelled"),
        ];
        for (status, s) in pairs {
            assert_eq!(status.to_string(), s);
        }
    }
}
