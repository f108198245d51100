use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ColumnTrait, DatabaseConnection, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::events::TriggerEvent;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ContactType {
    #[sea_orm(string_value = "father")]
    Father,

    #[sea_orm(string_value = "mother")]
    Mother,

    #[sea_orm(string_value = "guardian")]
    Guardian,

    #[sea_orm(string_value = "emergency")]
    Emergency,
}

/// Represents a parent/guardian contact in the `parent_contacts` table.
///
/// `phone` is stored in canonical international-digit form; `whatsapp` is an
/// optional override for the chat-gateway destination.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "parent_contacts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub student_id: i64,
    pub contact_type: ContactType,
    pub name: String,
    pub phone: String,
    pub whatsapp: Option<String>,
    /// At most one primary contact per student.
    pub is_primary: bool,
    pub is_active: bool,
    pub notifications_enabled: bool,
    /// Per-event opt-in map, e.g. `{"session_start": true}`. Missing keys
    /// default to enabled.
    #[sea_orm(column_type = "Json")]
    pub preferences: Json,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::student::Entity",
        from = "Column::StudentId",
        to = "super::student::Column::Id"
    )]
    Student,
}

impl Related<super::student::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Student.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn create(
        db: &DatabaseConnection,
        student_id: i64,
        contact_type: ContactType,
        name: &str,
        phone: &str,
        whatsapp: Option<&str>,
    ) -> Result<Self, DbErr> {
        let now = Utc::now();
        ActiveModel {
            student_id: Set(student_id),
            contact_type: Set(contact_type),
            name: Set(name.to_owned()),
            phone: Set(phone.to_owned()),
            whatsapp: Set(whatsapp.map(|s| s.to_owned())),
            is_primary: Set(false),
            is_active: Set(true),
            notifications_enabled: Set(true),
            preferences: Set(serde_json::json!({})),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    /// Destination number for the chat gateway; falls back to `phone`.
    pub fn whatsapp_number(&self) -> &str {
        self.whatsapp.as_deref().unwrap_or(&self.phone)
    }

    /// Whether this contact wants notifications for the given event.
    ///
    /// A missing preference key means opted in.
    pub fn wants(&self, event: TriggerEvent) -> bool {
        if !self.is_active || !self.notifications_enabled {
            return false;
        }
        match self.preferences.get(event.to_string()) {
            Some(serde_json::Value::Bool(enabled)) => *enabled,
            _ => true,
        }
    }

    /// All contacts for a student, primaries first.
    pub async fn find_for_student(
        db: &DatabaseConnection,
        student_id: i64,
    ) -> Result<Vec<Self>, DbErr> {
        use sea_orm::QueryOrder;
        Entity::find()
            .filter(Column::StudentId.eq(student_id))
            .order_by_desc(Column::IsPrimary)
            .order_by_asc(Column::Id)
            .all(db)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn contact(preferences: serde_json::Value, active: bool, enabled: bool) -> Model {
        Model {
            id: 1,
            student_id: 1,
            contact_type: ContactType::Mother,
            name: "Ibu Sari".into(),
            phone: "6281234567890".into(),
            whatsapp: None,
            is_primary: true,
            is_active: active,
            notifications_enabled: enabled,
            preferences,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn missing_preference_defaults_to_opted_in() {
        let c = contact(json!({}), true, true);
        assert!(c.wants(TriggerEvent::SessionStart));
    }

    #[test]
    fn explicit_preference_is_honoured() {
        let c = contact(json!({"session_break": false}), true, true);
        assert!(!c.wants(TriggerEvent::SessionBreak));
        assert!(c.wants(TriggerEvent::SessionFinish));
    }

    #[test]
    fn inactive_or_muted_contacts_never_want_notifications() {
        let inactive = contact(json!({}), false, true);
        assert!(!inactive.wants(TriggerEvent::SessionStart));

        let muted = contact(json!({}), true, false);
        assert!(!muted.wants(TriggerEvent::SessionStart));
    }

    #[test]
    fn whatsapp_falls_back_to_phone() {
        let mut c = contact(json!({}), true, true);
        assert_eq!(c.whatsapp_number(), "6281234567890");
        c.whatsapp = Some("6289876543210".into());
        assert_eq!(c.whatsapp_number(), "6289876543210");
    }
}
