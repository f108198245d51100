use chrono::{DateTime, Utc};
use db::models::notification_log::Model as LogModel;
use serde::Serialize;

#[derive(Debug, Default, Serialize)]
pub struct NotificationLogResponse {
    pub id: i64,
    pub session_id: i64,
    pub student_id: Option<i64>,
    pub recipient_phone: String,
    pub recipient_name: String,
    pub event_type: String,
    pub message: String,
    pub status: String,
    pub retry_count: i32,
    pub gateway_message_id: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
    pub failed_reason: Option<String>,
}

impl From<LogModel> for NotificationLogResponse {
    fn from(m: LogModel) -> Self {
        Self {
            id: m.id,
            session_id: m.session_id,
            student_id: m.student_id,
            recipient_phone: m.recipient_phone,
            recipient_name: m.recipient_name,
            event_type: m.event_type.to_string(),
            message: m.message,
            status: m.status.to_string(),
            retry_count: m.retry_count,
            gateway_message_id: m.gateway_message_id,
            sent_at: m.sent_at,
            delivered_at: m.delivered_at,
            read_at: m.read_at,
            failed_reason: m.failed_reason,
        }
    }
}
