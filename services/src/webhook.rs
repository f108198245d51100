//! Webhook ingestion.
//!
//! The gateway pushes asynchronous callbacks: message delivery receipts, read
//! receipts, error reports, incoming messages, and device connectivity
//! changes. Callbacks may arrive out of order or duplicated, so every status
//! transition is idempotent and precedence-checked. Processing problems are
//! logged and swallowed; the endpoint always acknowledges, because the
//! provider's only reaction to an error response is a retry storm.

use chrono::Utc;
use db::models::connection_status;
use db::models::notification_log::{self, DeliveryStatus};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ServiceResult;
use crate::gateway::interpret_device_status;

/// Inbound callback payloads, discriminated by the `event` field.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WebhookPayload {
    MessageStatus {
        message_id: String,
        status: String,
        #[serde(default)]
        reason: Option<String>,
    },
    IncomingMessage {
        #[serde(default)]
        from: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },
    DeviceStatus {
        #[serde(default)]
        device_id: Option<String>,
        status: String,
        #[serde(default)]
        quota_remaining: Option<i32>,
    },
    /// Provider-generic payloads we do not interpret.
    #[serde(other)]
    Unknown,
}

/// What ingestion did with a callback. Every variant is an acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestOutcome {
    StatusUpdated,
    StaleUpdateIgnored,
    UnknownMessageId,
    DeviceStatusRecorded,
    IgnoredPayload,
}

#[derive(Clone)]
pub struct WebhookService {
    db: DatabaseConnection,
    default_device_id: String,
}

impl WebhookService {
    pub fn new(db: DatabaseConnection, default_device_id: &str) -> Self {
        Self {
            db,
            default_device_id: default_device_id.to_string(),
        }
    }

    /// Ingests one raw callback body. Never fails: parse and processing
    /// problems degrade to [`IngestOutcome::IgnoredPayload`].
    pub async fn ingest(&self, raw: serde_json::Value) -> IngestOutcome {
        let payload: WebhookPayload = match serde_json::from_value(raw) {
            Ok(payload) => payload,
            Err(err) => {
                warn!("Undecodable webhook payload: {}", err);
                return IngestOutcome::IgnoredPayload;
            }
        };

        match self.process(payload).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!("Webhook processing failed: {}", err);
                IngestOutcome::IgnoredPayload
            }
        }
    }

    async fn process(&self, payload: WebhookPayload) -> ServiceResult<IngestOutcome> {
        match payload {
            WebhookPayload::MessageStatus {
                message_id,
                status,
                reason,
            } => {
                self.reconcile_message_status(&message_id, &status, reason.as_deref())
                    .await
            }
            WebhookPayload::DeviceStatus {
                device_id,
                status,
                quota_remaining,
            } => {
                let device_id = device_id.as_deref().unwrap_or(&self.default_device_id);
                let state = interpret_device_status(&status);
                connection_status::Model::record_state(
                    &self.db,
                    device_id,
                    state,
                    quota_remaining,
                    None,
                )
                .await?;
                info!("Device {} reported {}", device_id, state);
                Ok(IngestOutcome::DeviceStatusRecorded)
            }
            WebhookPayload::IncomingMessage { from, .. } => {
                info!(
                    "Ignoring incoming message callback from {}",
                    from.as_deref().unwrap_or("unknown")
                );
                Ok(IngestOutcome::IgnoredPayload)
            }
            WebhookPayload::Unknown => Ok(IngestOutcome::IgnoredPayload),
        }
    }

    /// Applies a status callback to the owning log row.
    ///
    /// Transitions only move forward (`sent` → `delivered` → `read`); a
    /// duplicate or lower-precedence update is a stale no-op. Error callbacks
    /// mark the row failed unless the message already reached the recipient.
    async fn reconcile_message_status(
        &self,
        message_id: &str,
        status: &str,
        reason: Option<&str>,
    ) -> ServiceResult<IngestOutcome> {
        let Some(log) =
            notification_log::Model::find_by_gateway_message_id(&self.db, message_id).await?
        else {
            warn!("Status callback for unknown message id {}", message_id);
            return Ok(IngestOutcome::UnknownMessageId);
        };

        let new_status = match status.to_ascii_lowercase().as_str() {
            "sent" => DeliveryStatus::Sent,
            "delivered" => DeliveryStatus::Delivered,
            "read" => DeliveryStatus::Read,
            "failed" | "error" => DeliveryStatus::Failed,
            other => {
                warn!("Unknown delivery status '{}' for {}", other, message_id);
                return Ok(IngestOutcome::IgnoredPayload);
            }
        };

        let now = Utc::now();
        let current = log.status;

        if new_status == DeliveryStatus::Failed {
            // An error report after successful delivery is stale.
            if current.is_sent_or_better() && current != DeliveryStatus::Sent {
                return Ok(IngestOutcome::StaleUpdateIgnored);
            }
            if current == DeliveryStatus::Failed {
                return Ok(IngestOutcome::StaleUpdateIgnored);
            }
            let mut active: notification_log::ActiveModel = log.into();
            active.status = Set(DeliveryStatus::Failed);
            active.failed_reason = Set(Some(
                reason.unwrap_or("gateway reported failure").to_string(),
            ));
            active.updated_at = Set(now);
            active.update(&self.db).await?;
            return Ok(IngestOutcome::StatusUpdated);
        }

        if new_status.precedence() <= current.precedence() {
            return Ok(IngestOutcome::StaleUpdateIgnored);
        }

        let mut active: notification_log::ActiveModel = log.into();
        active.status = Set(new_status);
        match new_status {
            DeliveryStatus::Delivered => active.delivered_at = Set(Some(now)),
            DeliveryStatus::Read => active.read_at = Set(Some(now)),
            _ => {}
        }
        active.failed_reason = Set(None);
        active.updated_at = Set(now);
        active.update(&self.db).await?;

        info!("Message {} advanced to {}", message_id, new_status);
        Ok(IngestOutcome::StatusUpdated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use db::events::TriggerEvent;
    use db::models::connection_status::DeviceState;
    use db::models::{class_group, class_session, student};
    use db::test_utils::setup_test_db;
    use sea_orm::EntityTrait;
    use serde_json::json;

    async fn seed_sent_log(db: &DatabaseConnection) -> notification_log::Model {
        let class = class_group::Model::create(db, "7A", "Grade 7", "Mrs. Dewi")
            .await
            .unwrap();
        let student = student::Model::create(db, class.id, "Budi Santoso")
            .await
            .unwrap();
        let session = class_session::Model::create(
            db,
            class.id,
            "Mathematics",
            "Mr. Agus",
            chrono::NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            chrono::NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            chrono::NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            15,
            28,
        )
        .await
        .unwrap();

        let log = notification_log::Model::create_pending(
            db,
            session.id,
            student.id,
            "6281111111111",
            "Ibu Sari",
            TriggerEvent::SessionStart,
            "Pelajaran dimulai",
        )
        .await
        .unwrap();
        log.mark_sent(db, "wamid-1", None).await.unwrap()
    }

    async fn reload(db: &DatabaseConnection, id: i64) -> notification_log::Model {
        notification_log::Entity::find_by_id(id)
            .one(db)
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn delivery_and_read_receipts_advance_the_row() {
        let db = setup_test_db().await;
        let log = seed_sent_log(&db).await;
        let service = WebhookService::new(db.clone(), "device-1");

        let outcome = service
            .ingest(json!({"event": "message_status", "message_id": "wamid-1", "status": "delivered"}))
            .await;
        assert_eq!(outcome, IngestOutcome::StatusUpdated);
        let row = reload(&db, log.id).await;
        assert_eq!(row.status, DeliveryStatus::Delivered);
        assert!(row.delivered_at.is_some());

        let outcome = service
            .ingest(json!({"event": "message_status", "message_id": "wamid-1", "status": "read"}))
            .await;
        assert_eq!(outcome, IngestOutcome::StatusUpdated);
        let row = reload(&db, log.id).await;
        assert_eq!(row.status, DeliveryStatus::Read);
        assert!(row.read_at.is_some());
    }

    #[tokio::test]
    async fn duplicate_and_out_of_order_updates_are_stale_noops() {
        let db = setup_test_db().await;
        let log = seed_sent_log(&db).await;
        let service = WebhookService::new(db.clone(), "device-1");

        service
            .ingest(json!({"event": "message_status", "message_id": "wamid-1", "status": "read"}))
            .await;

        // Applying "delivered" after "read" is a lower-precedence update.
        let outcome = service
            .ingest(json!({"event": "message_status", "message_id": "wamid-1", "status": "delivered"}))
            .await;
        assert_eq!(outcome, IngestOutcome::StaleUpdateIgnored);

        // Applying "read" twice is a no-op.
        let outcome = service
            .ingest(json!({"event": "message_status", "message_id": "wamid-1", "status": "read"}))
            .await;
        assert_eq!(outcome, IngestOutcome::StaleUpdateIgnored);

        let row = reload(&db, log.id).await;
        assert_eq!(row.status, DeliveryStatus::Read);
    }

    #[tokio::test]
    async fn error_callback_records_failure_reason() {
        let db = setup_test_db().await;
        let log = seed_sent_log(&db).await;
        let service = WebhookService::new(db.clone(), "device-1");

        let outcome = service
            .ingest(json!({
                "event": "message_status",
                "message_id": "wamid-1",
                "status": "failed",
                "reason": "recipient not on the platform"
            }))
            .await;
        assert_eq!(outcome, IngestOutcome::StatusUpdated);

        let row = reload(&db, log.id).await;
        assert_eq!(row.status, DeliveryStatus::Failed);
        assert_eq!(
            row.failed_reason.as_deref(),
            Some("recipient not on the platform")
        );
    }

    #[tokio::test]
    async fn error_after_delivery_is_ignored() {
        let db = setup_test_db().await;
        let log = seed_sent_log(&db).await;
        let service = WebhookService::new(db.clone(), "device-1");

        service
            .ingest(json!({"event": "message_status", "message_id": "wamid-1", "status": "delivered"}))
            .await;
        let outcome = service
            .ingest(json!({"event": "message_status", "message_id": "wamid-1", "status": "failed"}))
            .await;
        assert_eq!(outcome, IngestOutcome::StaleUpdateIgnored);
        assert_eq!(reload(&db, log.id).await.status, DeliveryStatus::Delivered);
    }

    #[tokio::test]
    async fn unknown_message_id_is_acknowledged_without_raising() {
        let db = setup_test_db().await;
        let service = WebhookService::new(db, "device-1");

        let outcome = service
            .ingest(json!({"event": "message_status", "message_id": "no-such-id", "status": "delivered"}))
            .await;
        assert_eq!(outcome, IngestOutcome::UnknownMessageId);
    }

    #[tokio::test]
    async fn device_status_callbacks_bypass_the_notification_log() {
        let db = setup_test_db().await;
        let service = WebhookService::new(db.clone(), "device-1");

        let outcome = service
            .ingest(json!({"event": "device_status", "status": "ready", "quota_remaining": 420}))
            .await;
        assert_eq!(outcome, IngestOutcome::DeviceStatusRecorded);

        let status = connection_status::Model::find_for_device(&db, "device-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(status.state, DeviceState::Connected);
        assert_eq!(status.quota_remaining, Some(420));
        assert!(status.last_connected_at.is_some());

        let outcome = service
            .ingest(json!({"event": "device_status", "device_id": "other", "status": "banned"}))
            .await;
        assert_eq!(outcome, IngestOutcome::DeviceStatusRecorded);
        let other = connection_status::Model::find_for_device(&db, "other")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(other.state, DeviceState::Disconnected);
    }

    #[tokio::test]
    async fn malformed_and_foreign_payloads_are_swallowed() {
        let db = setup_test_db().await;
        let service = WebhookService::new(db, "device-1");

        assert_eq!(
            service.ingest(json!({"not_event": true})).await,
            IngestOutcome::IgnoredPayload
        );
        assert_eq!(
            service.ingest(json!({"event": "provider_ping"})).await,
            IngestOutcome::IgnoredPayload
        );
        assert_eq!(
            service
                .ingest(json!({"event": "incoming_message", "from": "628123", "message": "hi"}))
                .await,
            IngestOutcome::IgnoredPayload
        );
    }
}
