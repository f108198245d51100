use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ColumnTrait, DatabaseConnection, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::events::TriggerEvent;

/// Delivery lifecycle of one outbound message.
///
/// The stored string values are part of the external contract.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum DeliveryStatus {
    #[sea_orm(string_value = "pending")]
    Pending,

    #[sea_orm(string_value = "sent")]
    Sent,

    #[sea_orm(string_value = "delivered")]
    Delivered,

    #[sea_orm(string_value = "read")]
    Read,

    #[sea_orm(string_value = "failed")]
    Failed,
}

impl DeliveryStatus {
    /// Progress rank used to reject stale webhook updates. `failed` sits
    /// outside the progression and is handled separately.
    pub fn precedence(&self) -> u8 {
        match self {
            DeliveryStatus::Pending => 0,
            DeliveryStatus::Sent => 1,
            DeliveryStatus::Delivered => 2,
            DeliveryStatus::Read => 3,
            DeliveryStatus::Failed => 0,
        }
    }

    /// Whether the message reached the gateway (counts as "already notified"
    /// for the dispatch idempotency guard).
    pub fn is_sent_or_better(&self) -> bool {
        matches!(
            self,
            DeliveryStatus::Sent | DeliveryStatus::Delivered | DeliveryStatus::Read
        )
    }
}

/// Represents one per-contact send attempt in the `notification_logs` table.
///
/// This is the system of record for delivery: append-mostly, update-by-status,
/// deleted only by retention cleanup.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "notification_logs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub session_id: i64,
    /// Absent for audit entries written by the `log_event` workflow action.
    pub student_id: Option<i64>,
    pub recipient_phone: String,
    pub recipient_name: String,
    pub event_type: TriggerEvent,
    pub message: String,
    pub status: DeliveryStatus,
    pub retry_count: i32,
    pub gateway_message_id: Option<String>,
    /// Raw gateway response body, kept for operational debugging.
    pub gateway_response: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
    pub failed_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::class_session::Entity",
        from = "Column::SessionId",
        to = "super::class_session::Column::Id"
    )]
    Session,
    #[sea_orm(
        belongs_to = "super::student::Entity",
        from = "Column::StudentId",
        to = "super::student::Column::Id"
    )]
    Student,
}

impl Related<super::class_session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Session.def()
    }
}

impl Related<super::student::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Student.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Inserts a `pending` log row for a send attempt about to happen.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_pending(
        db: &DatabaseConnection,
        session_id: i64,
        student_id: i64,
        recipient_phone: &str,
        recipient_name: &str,
        event_type: TriggerEvent,
        message: &str,
    ) -> Result<Self, DbErr> {
        let now = Utc::now();
        ActiveModel {
            session_id: Set(session_id),
            student_id: Set(Some(student_id)),
            recipient_phone: Set(recipient_phone.to_owned()),
            recipient_name: Set(recipient_name.to_owned()),
            event_type: Set(event_type),
            message: Set(message.to_owned()),
            status: Set(DeliveryStatus::Pending),
            retry_count: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    /// Inserts an audit entry with no recipient and no send side effect.
    pub async fn create_audit(
        db: &DatabaseConnection,
        session_id: i64,
        event_type: TriggerEvent,
        note: &str,
    ) -> Result<Self, DbErr> {
        let now = Utc::now();
        ActiveModel {
            session_id: Set(session_id),
            student_id: Set(None),
            recipient_phone: Set(String::new()),
            recipient_name: Set(String::new()),
            event_type: Set(event_type),
            message: Set(note.to_owned()),
            status: Set(DeliveryStatus::Pending),
            retry_count: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    pub async fn find_by_gateway_message_id(
        db: &DatabaseConnection,
        message_id: &str,
    ) -> Result<Option<Self>, DbErr> {
        Entity::find()
            .filter(Column::GatewayMessageId.eq(message_id))
            .one(db)
            .await
    }

    /// Log rows for a (session, student, event) tuple, used by the dispatch
    /// idempotency guard.
    pub async fn find_for_dispatch(
        db: &DatabaseConnection,
        session_id: i64,
        student_id: i64,
        event_type: TriggerEvent,
    ) -> Result<Vec<Self>, DbErr> {
        Entity::find()
            .filter(Column::SessionId.eq(session_id))
            .filter(Column::StudentId.eq(student_id))
            .filter(Column::EventType.eq(event_type))
            .all(db)
            .await
    }

    /// Marks the row `sent` with the gateway's message id.
    pub async fn mark_sent(
        self,
        db: &DatabaseConnection,
        gateway_message_id: &str,
        raw_response: Option<&str>,
    ) -> Result<Self, DbErr> {
        let mut active: ActiveModel = self.into();
        active.status = Set(DeliveryStatus::Sent);
        active.gateway_message_id = Set(Some(gateway_message_id.to_owned()));
        active.gateway_response = Set(raw_response.map(|s| s.to_owned()));
        active.sent_at = Set(Some(Utc::now()));
        active.failed_reason = Set(None);
        active.updated_at = Set(Utc::now());
        active.update(db).await
    }

    /// Retention cleanup: drops rows older than the cutoff. The only code
    /// path that ever deletes log rows.
    pub async fn purge_older_than(
        db: &DatabaseConnection,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, DbErr> {
        let result = Entity::delete_many()
            .filter(Column::CreatedAt.lt(cutoff))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }

    /// Marks the row `failed` with a reason. Never bumps `retry_count`; the
    /// resend path owns that counter.
    pub async fn mark_failed(
        self,
        db: &DatabaseConnection,
        reason: &str,
        raw_response: Option<&str>,
    ) -> Result<Self, DbErr> {
        let mut active: ActiveModel = self.into();
        active.status = Set(DeliveryStatus::Failed);
        active.failed_reason = Set(Some(reason.to_owned()));
        active.gateway_response = Set(raw_response.map(|s| s.to_owned()));
        active.updated_at = Set(Utc::now());
        active.update(db).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_orders_the_happy_path() {
        assert!(DeliveryStatus::Pending.precedence() < DeliveryStatus::Sent.precedence());
        assert!(DeliveryStatus::Sent.precedence() < DeliveryStatus::Delivered.precedence());
        assert!(DeliveryStatus::Delivered.precedence() < DeliveryStatus::Read.precedence());
    }

    #[test]
    fn sent_or_better_excludes_pending_and_failed() {
        assert!(!DeliveryStatus::Pending.is_sent_or_better());
        assert!(!DeliveryStatus::Failed.is_sent_or_better());
        assert!(DeliveryStatus::Sent.is_sent_or_better());
        assert!(DeliveryStatus::Delivered.is_sent_or_better());
        assert!(DeliveryStatus::Read.is_sent_or_better());
    }

    #[test]
    fn status_strings_are_stable() {
        for (status, s) in [
            (DeliveryStatus::Pending, "pending"),
            (DeliveryStatus::Sent, "sent"),
            (DeliveryStatus::Delivered, "delivered"),
            (DeliveryStatus::Read, "read"),
            (DeliveryStatus::Failed, "failed"),
        ] {
            assert_eq!(status.to_string(), s);
        }
    }
}
