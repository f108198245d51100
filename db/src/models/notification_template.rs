use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ColumnTrait, DatabaseConnection, QueryFilter, Set};
use serde::Serialize;

use crate::events::TriggerEvent;

/// Represents a message template in the `notification_templates` table.
///
/// The body carries `{variable}` placeholders. The placeholder syntax is part
/// of the external contract: stored templates break if it changes.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "notification_templates")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    pub event_type: TriggerEvent,
    pub body: String,
    /// BCP-47-ish language tag, e.g. "id" or "en".
    pub language: String,
    /// Placeholder names actually used by the body, derived at save time.
    #[sea_orm(column_type = "Json")]
    pub variables: Json,
    pub is_active: bool,
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
    /// Inserts a template row. Placeholder validation happens in the template
    /// service before this is called; `variables` is the derived list.
    pub async fn create(
        db: &DatabaseConnection,
        name: &str,
        event_type: TriggerEvent,
        body: &str,
        language: &str,
        variables: &[String],
    ) -> Result<Self, DbErr> {
        let now = Utc::now();
        ActiveModel {
            name: Set(name.to_owned()),
            event_type: Set(event_type),
            body: Set(body.to_owned()),
            language: Set(language.to_owned()),
            variables: Set(serde_json::to_value(variables)
                .map_err(|e| DbErr::Custom(format!("Failed to encode variables: {e}")))?),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    /// The active template for an (event, language) pair, if configured.
    pub async fn find_for_event(
        db: &DatabaseConnection,
        event_type: TriggerEvent,
        language: &str,
    ) -> Result<Option<Self>, DbErr> {
        Entity::find()
            .filter(Column::EventType.eq(event_type))
            .filter(Column::Language.eq(language))
            .filter(Column::IsActive.eq(true))
            .one(db)
            .await
    }
}
