use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Last known connectivity state of a gateway device.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum DeviceState {
    #[sea_orm(string_value = "connected")]
    Connected,

    #[sea_orm(string_value = "disconnected")]
    Disconnected,

    #[sea_orm(string_value = "connecting")]
    Connecting,

    #[sea_orm(string_value = "error")]
    Error,
}

/// Singleton-per-device row in the `connection_status` table.
///
/// Updated by the dispatcher on send attempts and by device-status webhook
/// callbacks; read by the health endpoint.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "connection_status")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub device_id: String,
    pub state: DeviceState,
    pub last_connected_at: Option<DateTime<Utc>>,
    /// Remaining send quota as last reported by the gateway.
    pub quota_remaining: Option<i32>,
    pub last_error: Option<String>,
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
    pub async fn find_for_device(
        db: &DatabaseConnection,
        device_id: &str,
    ) -> Result<Option<Self>, DbErr> {
        Entity::find()
            .filter(Column::DeviceId.eq(device_id))
            .one(db)
            .await
    }

    /// Records the device's latest state, creating the row on first contact.
    pub async fn record_state(
        db: &DatabaseConnection,
        device_id: &str,
        state: DeviceState,
        quota_remaining: Option<i32>,
        last_error: Option<&str>,
    ) -> Result<Self, DbErr> {
        let now = Utc::now();
        let connected_at = (state == DeviceState::Connected).then_some(now);

        match Self::find_for_device(db, device_id).await? {
            Some(existing) => {
                let mut active: ActiveModel = existing.into();
                active.state = Set(state);
                if let Some(ts) = connected_at {
                    active.last_connected_at = Set(Some(ts));
                }
                if quota_remaining.is_some() {
                    active.quota_remaining = Set(quota_remaining);
                }
                active.last_error = Set(last_error.map(|s| s.to_owned()));
                active.updated_at = Set(now);
                active.update(db).await
            }
            None => {
                ActiveModel {
                    device_id: Set(device_id.to_owned()),
                    state: Set(state),
                    last_connected_at: Set(connected_at),
                    quota_remaining: Set(quota_remaining),
                    last_error: Set(last_error.map(|s| s.to_owned())),
                    updated_at: Set(now),
                    ..Default::default()
                }
                .insert(db)
                .await
            }
        }
    }
}
