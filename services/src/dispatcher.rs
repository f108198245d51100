//! Dispatcher and delivery tracker.
//!
//! Turns a trigger event into per-contact sends through the gateway client
//! and records one `notification_logs` row per attempt. Transport failures
//! are captured on the row and never escape the dispatch boundary; the
//! summary return value is the contract.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use db::events::{SessionEvent, TriggerEvent};
use db::models::class_session;
use db::models::connection_status::{self, DeviceState};
use db::models::notification_log::{self, DeliveryStatus};
use db::models::{class_group, student};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::contacts::ContactDirectory;
use crate::error::{ServiceError, ServiceResult};
use crate::gateway::{GatewayClient, GatewayError};
use crate::session::SessionService;
use crate::template::{self, TemplateService};

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub school_name: String,
    pub default_language: String,
    pub max_retries: u32,
    pub device_id: String,
}

/// Per-contact outcome of one dispatch.
#[derive(Debug, Clone, Serialize)]
pub struct ContactSendOutcome {
    pub log_id: i64,
    pub contact_id: Option<i64>,
    pub phone: String,
    pub status: DeliveryStatus,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStatus {
    /// Sends were attempted; per-contact results carry the detail.
    Dispatched,
    /// The idempotency guard fired; prior results are reported unchanged.
    AlreadyNotified,
    /// No contact is eligible for this event. Not an error.
    NoEligibleContacts,
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchOutcome {
    pub status: DispatchStatus,
    pub sent: usize,
    pub failed: usize,
    pub contacts: Vec<ContactSendOutcome>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentDispatch {
    pub student_id: i64,
    pub outcome: DispatchOutcome,
}

/// Aggregate result of a bulk dispatch; always returned, never thrown.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkDispatchSummary {
    pub sent: usize,
    pub failed: usize,
    pub already_notified: usize,
    pub no_contacts: usize,
    pub details: Vec<StudentDispatch>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RetrySweepSummary {
    pub attempted: usize,
    pub recovered: usize,
    pub still_failed: usize,
}

/// Template variables derivable from the trigger event alone. Per-contact
/// variables (student/parent/class names) are added inside the dispatch loop.
pub fn base_variables(event: &SessionEvent, school_name: &str) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    vars.insert("school_name".to_string(), school_name.to_string());
    vars.insert("subject".to_string(), event.subject.clone());
    vars.insert("teacher_name".to_string(), event.teacher_name.clone());
    vars.insert(
        "session_date".to_string(),
        event.session_date.format("%Y-%m-%d").to_string(),
    );

    let clock = event.occurred_at.format("%H:%M").to_string();
    match event.trigger {
        TriggerEvent::SessionStart => {
            vars.insert("start_time".to_string(), clock);
        }
        TriggerEvent::SessionBreak => {
            vars.insert("break_time".to_string(), clock);
            vars.insert(
                "break_duration".to_string(),
                event.break_duration_minutes.to_string(),
            );
        }
        TriggerEvent::SessionResume => {
            vars.insert("resume_time".to_string(), clock);
        }
        TriggerEvent::SessionFinish => {
            vars.insert("end_time".to_string(), clock);
            if let Some(started) = event.actual_start_time {
                vars.insert(
                    "total_duration".to_string(),
                    SessionService::format_duration(started, event.occurred_at),
                );
            }
        }
        TriggerEvent::SessionCancel | TriggerEvent::Manual | TriggerEvent::Scheduled => {}
    }
    vars
}

pub struct Dispatcher {
    db: DatabaseConnection,
    gateway: Arc<dyn GatewayClient>,
    contacts: ContactDirectory,
    templates: TemplateService,
    config: DispatcherConfig,
}

impl Dispatcher {
    pub fn new(
        db: DatabaseConnection,
        gateway: Arc<dyn GatewayClient>,
        contacts: ContactDirectory,
        templates: TemplateService,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            db,
            gateway,
            contacts,
            templates,
            config,
        }
    }

    /// Whether a (session, student, event) tuple already reached the gateway.
    pub async fn is_notification_sent(
        &self,
        session_id: i64,
        student_id: i64,
        event_type: TriggerEvent,
    ) -> ServiceResult<bool> {
        let rows =
            notification_log::Model::find_for_dispatch(&self.db, session_id, student_id, event_type)
                .await?;
        Ok(rows.iter().any(|r| r.status.is_sent_or_better()))
    }

    /// Dispatches one event for one student to every eligible contact.
    ///
    /// Re-invoking for an already-notified tuple is a no-op that reports the
    /// prior result; it creates no new log rows and sends nothing.
    pub async fn dispatch(
        &self,
        session_id: i64,
        student_id: i64,
        event_type: TriggerEvent,
        variables: &HashMap<String, String>,
    ) -> ServiceResult<DispatchOutcome> {
        let prior =
            notification_log::Model::find_for_dispatch(&self.db, session_id, student_id, event_type)
                .await?;
        if prior.iter().any(|r| r.status.is_sent_or_better()) {
            info!(
                "Duplicate dispatch suppressed for session {} student {} event {}",
                session_id, student_id, event_type
            );
            return Ok(Self::outcome_from_rows(DispatchStatus::AlreadyNotified, &prior));
        }

        let student = student::Entity::find_by_id(student_id)
            .one(&self.db)
            .await?
            .ok_or(ServiceError::StudentNotFound(student_id))?;
        let class = class_group::Entity::find_by_id(student.class_id)
            .one(&self.db)
            .await?;

        let eligible = self.contacts.eligible_contacts(student_id, event_type).await?;
        if eligible.is_empty() {
            return Ok(DispatchOutcome {
                status: DispatchStatus::NoEligibleContacts,
                sent: 0,
                failed: 0,
                contacts: Vec::new(),
            });
        }

        let template = self
            .templates
            .resolve(event_type, &self.config.default_language)
            .await?;

        let mut results = Vec::with_capacity(eligible.len());
        let mut sent = 0usize;
        let mut failed = 0usize;
        let mut last_transport_error: Option<String> = None;

        for contact in &eligible {
            let mut vars = variables.clone();
            vars.insert("student_name".to_string(), student.full_name.clone());
            vars.insert("parent_name".to_string(), contact.name.clone());
            vars.insert("school_name".to_string(), self.config.school_name.clone());
            if let Some(class) = &class {
                vars.insert("class_name".to_string(), class.name.clone());
            }

            let message = template::render(&template.body, &vars);
            let destination = contact.whatsapp_number().to_string();

            let log = notification_log::Model::create_pending(
                &self.db,
                session_id,
                student_id,
                &destination,
                &contact.name,
                event_type,
                &message,
            )
            .await?;

            match self.gateway.send(&destination, &message).await {
                Ok(ack) => {
                    let updated = log
                        .mark_sent(&self.db, &ack.message_id, ack.raw_response.as_deref())
                        .await?;
                    sent += 1;
                    results.push(ContactSendOutcome {
                        log_id: updated.id,
                        contact_id: Some(contact.id),
                        phone: destination,
                        status: updated.status,
                        error: None,
                    });
                }
                Err(err) => {
                    if matches!(err, GatewayError::Transport(_)) {
                        last_transport_error = Some(err.to_string());
                    }
                    let reason = err.to_string();
                    warn!(
                        "Gateway send failed for log {} ({}): {}",
                        log.id, destination, reason
                    );
                    let updated = log.mark_failed(&self.db, &reason, None).await?;
                    failed += 1;
                    results.push(ContactSendOutcome {
                        log_id: updated.id,
                        contact_id: Some(contact.id),
                        phone: destination,
                        status: updated.status,
                        error: Some(reason),
                    });
                }
            }
        }

        self.record_gateway_health(sent > 0, last_transport_error.as_deref())
            .await;

        if sent > 0 {
            self.bump_notified_count(session_id, sent as i32).await?;
        }

        Ok(DispatchOutcome {
            status: DispatchStatus::Dispatched,
            sent,
            failed,
            contacts: results,
        })
    }

    /// Bulk dispatch: the same operation looped per student, accumulating an
    /// aggregate summary. Partial failure never aborts the loop.
    pub async fn dispatch_bulk(
        &self,
        session_id: i64,
        student_ids: &[i64],
        event_type: TriggerEvent,
        variables: &HashMap<String, String>,
    ) -> ServiceResult<BulkDispatchSummary> {
        let mut summary = BulkDispatchSummary::default();

        for &student_id in student_ids {
            match self
                .dispatch(session_id, student_id, event_type, variables)
                .await
            {
                Ok(outcome) => {
                    summary.sent += outcome.sent;
                    summary.failed += outcome.failed;
                    match outcome.status {
                        DispatchStatus::AlreadyNotified => summary.already_notified += 1,
                        DispatchStatus::NoEligibleContacts => summary.no_contacts += 1,
                        DispatchStatus::Dispatched => {}
                    }
                    summary.details.push(StudentDispatch {
                        student_id,
                        outcome,
                    });
                }
                Err(err) => {
                    // Keep making progress through the rest of the batch.
                    warn!(
                        "Dispatch for student {} in session {} errored: {}",
                        student_id, session_id, err
                    );
                    summary.failed += 1;
                    summary.details.push(StudentDispatch {
                        student_id,
                        outcome: DispatchOutcome {
                            status: DispatchStatus::Dispatched,
                            sent: 0,
                            failed: 1,
                            contacts: Vec::new(),
                        },
                    });
                }
            }
        }

        Ok(summary)
    }

    /// Re-sends the message recorded on an existing log row, updating that
    /// row in place and incrementing its retry counter.
    pub async fn resend(&self, log_id: i64) -> ServiceResult<notification_log::Model> {
        let log = notification_log::Entity::find_by_id(log_id)
            .one(&self.db)
            .await?
            .ok_or(ServiceError::LogNotFound(log_id))?;

        if log.retry_count >= self.config.max_retries as i32 {
            return Err(ServiceError::RetryLimitReached(log_id));
        }

        let attempt = log.retry_count + 1;
        let destination = log.recipient_phone.clone();
        let message = log.message.clone();
        let result = self.gateway.send(&destination, &message).await;

        let now = Utc::now();
        let mut active: notification_log::ActiveModel = log.into();
        active.retry_count = Set(attempt);
        match &result {
            Ok(ack) => {
                active.status = Set(DeliveryStatus::Sent);
                active.gateway_message_id = Set(Some(ack.message_id.clone()));
                active.gateway_response = Set(ack.raw_response.clone());
                active.sent_at = Set(Some(now));
                active.failed_reason = Set(None);
            }
            Err(err) => {
                active.status = Set(DeliveryStatus::Failed);
                active.failed_reason = Set(Some(err.to_string()));
            }
        }
        active.updated_at = Set(now);
        let updated = active.update(&self.db).await?;

        self.record_gateway_health(
            result.is_ok(),
            result.as_ref().err().map(|e| e.to_string()).as_deref(),
        )
        .await;

        Ok(updated)
    }

    /// Retries every `failed` row still under the retry limit. Rows at the
    /// limit are left alone permanently.
    pub async fn retry_sweep(&self) -> ServiceResult<RetrySweepSummary> {
        let candidates = notification_log::Entity::find()
            .filter(notification_log::Column::Status.eq(DeliveryStatus::Failed))
            .filter(notification_log::Column::RetryCount.lt(self.config.max_retries as i32))
            .all(&self.db)
            .await?;

        let mut summary = RetrySweepSummary {
            attempted: candidates.len(),
            ..Default::default()
        };

        for row in candidates {
            match self.resend(row.id).await {
                Ok(updated) if updated.status == DeliveryStatus::Sent => summary.recovered += 1,
                Ok(_) => summary.still_failed += 1,
                Err(err) => {
                    warn!("Retry of log {} errored: {}", row.id, err);
                    summary.still_failed += 1;
                }
            }
        }

        Ok(summary)
    }

    fn outcome_from_rows(
        status: DispatchStatus,
        rows: &[notification_log::Model],
    ) -> DispatchOutcome {
        let sent = rows.iter().filter(|r| r.status.is_sent_or_better()).count();
        let failed = rows
            .iter()
            .filter(|r| r.status == DeliveryStatus::Failed)
            .count();
        DispatchOutcome {
            status,
            sent,
            failed,
            contacts: rows
                .iter()
                .map(|r| ContactSendOutcome {
                    log_id: r.id,
                    contact_id: None,
                    phone: r.recipient_phone.clone(),
                    status: r.status,
                    error: r.failed_reason.clone(),
                })
                .collect(),
        }
    }

    async fn bump_notified_count(&self, session_id: i64, by: i32) -> ServiceResult<()> {
        if let Some(session) = class_session::Entity::find_by_id(session_id)
            .one(&self.db)
            .await?
        {
            let mut active: class_session::ActiveModel = session.clone().into();
            active.notified_count = Set(session.notified_count + by);
            active.updated_at = Set(Utc::now());
            active.update(&self.db).await?;
        }
        Ok(())
    }

    /// Best-effort connection bookkeeping; failures here must not disturb
    /// dispatch results.
    async fn record_gateway_health(&self, any_success: bool, transport_error: Option<&str>) {
        let (state, error) = if any_success {
            (DeviceState::Connected, None)
        } else if let Some(reason) = transport_error {
            (DeviceState::Error, Some(reason))
        } else {
            return;
        };

        if let Err(err) = connection_status::Model::record_state(
            &self.db,
            &self.config.device_id,
            state,
            None,
            error,
        )
        .await
        {
            warn!("Failed to record gateway health: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockGateway;
    use db::models::parent_contact::ContactType;
    use db::test_utils::setup_test_db;
    use sea_orm::PaginatorTrait;

    struct Fixture {
        db: DatabaseConnection,
        gateway: Arc<MockGateway>,
        dispatcher: Dispatcher,
        session: class_session::Model,
        student: student::Model,
    }

    fn config() -> DispatcherConfig {
        DispatcherConfig {
            school_name: "SMP Harapan".into(),
            default_language: "id".into(),
            max_retries: 3,
            device_id: "device-1".into(),
        }
    }

    async fn fixture_with_gateway(gateway: MockGateway) -> Fixture {
        let db = setup_test_db().await;
        let gateway = Arc::new(gateway);

        let class = class_group::Model::create(&db, "7A", "Grade 7", "Mrs. Dewi")
            .await
            .unwrap();
        let student = student::Model::create(&db, class.id, "Budi Santoso")
            .await
            .unwrap();
        let session = class_session::Model::create(
            &db,
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

        let contacts = ContactDirectory::new(db.clone(), "62");
        contacts
            .add_contact(student.id, ContactType::Mother, "Ibu Sari", "081111111111", None)
            .await
            .unwrap();

        let templates = TemplateService::new(db.clone());
        let dispatcher = Dispatcher::new(
            db.clone(),
            gateway.clone(),
            contacts,
            templates,
            config(),
        );

        Fixture {
            db,
            gateway,
            dispatcher,
            session,
            student,
        }
    }

    fn start_variables() -> HashMap<String, String> {
        let mut vars = HashMap::new();
        vars.insert("start_time".to_string(), "09:00".to_string());
        vars.insert("subject".to_string(), "Mathematics".to_string());
        vars.insert("session_date".to_string(), "2026-03-02".to_string());
        vars.insert("teacher_name".to_string(), "Mr. Agus".to_string());
        vars
    }

    #[tokio::test]
    async fn dispatch_writes_one_sent_row_per_contact() {
        let f = fixture_with_gateway(MockGateway::new()).await;

        let outcome = f
            .dispatcher
            .dispatch(
                f.session.id,
                f.student.id,
                TriggerEvent::SessionStart,
                &start_variables(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.status, DispatchStatus::Dispatched);
        assert_eq!(outcome.sent, 1);
        assert_eq!(outcome.failed, 0);

        let rows = notification_log::Entity::find().all(&f.db).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, DeliveryStatus::Sent);
        assert!(rows[0].gateway_message_id.is_some());
        assert!(rows[0].message.contains("Budi Santoso"));
        assert!(rows[0].message.contains("09:00"));

        // Message went to the contact's canonical number.
        let sent = f.gateway.sent_messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "6281111111111");
    }

    #[tokio::test]
    async fn dispatch_is_idempotent_per_tuple() {
        let f = fixture_with_gateway(MockGateway::new()).await;

        let first = f
            .dispatcher
            .dispatch(
                f.session.id,
                f.student.id,
                TriggerEvent::SessionStart,
                &start_variables(),
            )
            .await
            .unwrap();
        assert_eq!(first.status, DispatchStatus::Dispatched);

        let second = f
            .dispatcher
            .dispatch(
                f.session.id,
                f.student.id,
                TriggerEvent::SessionStart,
                &start_variables(),
            )
            .await
            .unwrap();
        assert_eq!(second.status, DispatchStatus::AlreadyNotified);
        assert_eq!(second.sent, 1);

        let rows = notification_log::Entity::find()
            .count(&f.db)
            .await
            .unwrap();
        assert_eq!(rows, 1);
        assert_eq!(f.gateway.sent_messages().len(), 1);

        // A different event for the same pair still goes out.
        let finish = f
            .dispatcher
            .dispatch(
                f.session.id,
                f.student.id,
                TriggerEvent::SessionFinish,
                &HashMap::new(),
            )
            .await
            .unwrap();
        assert_eq!(finish.status, DispatchStatus::Dispatched);
    }

    #[tokio::test]
    async fn transport_failure_is_recorded_not_thrown() {
        let f = fixture_with_gateway(MockGateway::failing("connection refused")).await;

        let outcome = f
            .dispatcher
            .dispatch(
                f.session.id,
                f.student.id,
                TriggerEvent::SessionStart,
                &start_variables(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.status, DispatchStatus::Dispatched);
        assert_eq!(outcome.sent, 0);
        assert_eq!(outcome.failed, 1);

        let rows = notification_log::Entity::find().all(&f.db).await.unwrap();
        assert_eq!(rows[0].status, DeliveryStatus::Failed);
        assert!(rows[0]
            .failed_reason
            .as_deref()
            .unwrap()
            .contains("connection refused"));

        let health = connection_status::Model::find_for_device(&f.db, "device-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(health.state, DeviceState::Error);
    }

    #[tokio::test]
    async fn no_eligible_contacts_is_an_empty_result() {
        let f = fixture_with_gateway(MockGateway::new()).await;
        let other = student::Model::create(&f.db, f.session.class_id, "Citra Lestari")
            .await
            .unwrap();

        let outcome = f
            .dispatcher
            .dispatch(
                f.session.id,
                other.id,
                TriggerEvent::SessionStart,
                &start_variables(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.status, DispatchStatus::NoEligibleContacts);
        assert!(outcome.contacts.is_empty());
        let rows = notification_log::Entity::find()
            .count(&f.db)
            .await
            .unwrap();
        assert_eq!(rows, 0);
    }

    #[tokio::test]
    async fn resend_updates_the_same_row_and_bounds_retries() {
        let f = fixture_with_gateway(MockGateway::failing("timeout")).await;

        f.dispatcher
            .dispatch(
                f.session.id,
                f.student.id,
                TriggerEvent::SessionStart,
                &start_variables(),
            )
            .await
            .unwrap();

        let row = notification_log::Entity::find()
            .one(&f.db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.status, DeliveryStatus::Failed);
        assert_eq!(row.retry_count, 0);

        for expected in 1..=3 {
            let updated = f.dispatcher.resend(row.id).await.unwrap();
            assert_eq!(updated.retry_count, expected);
            assert_eq!(updated.status, DeliveryStatus::Failed);
        }

        // Limit reached: no further automatic retries.
        let result = f.dispatcher.resend(row.id).await;
        assert!(matches!(result, Err(ServiceError::RetryLimitReached(_))));

        let count = notification_log::Entity::find()
            .count(&f.db)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn retry_sweep_recovers_once_the_gateway_heals() {
        let gateway = MockGateway::new();
        gateway.script(Err(GatewayError::Transport("timeout".into())));
        let f = fixture_with_gateway(gateway).await;

        f.dispatcher
            .dispatch(
                f.session.id,
                f.student.id,
                TriggerEvent::SessionStart,
                &start_variables(),
            )
            .await
            .unwrap();

        let summary = f.dispatcher.retry_sweep().await.unwrap();
        assert_eq!(summary.attempted, 1);
        assert_eq!(summary.recovered, 1);

        let row = notification_log::Entity::find()
            .one(&f.db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.status, DeliveryStatus::Sent);
        assert_eq!(row.retry_count, 1);

        // Nothing left to sweep.
        let idle = f.dispatcher.retry_sweep().await.unwrap();
        assert_eq!(idle.attempted, 0);
    }

    #[tokio::test]
    async fn bulk_dispatch_accumulates_per_student_outcomes() {
        let f = fixture_with_gateway(MockGateway::new()).await;
        let orphan = student::Model::create(&f.db, f.session.class_id, "Citra Lestari")
            .await
            .unwrap();

        let summary = f
            .dispatcher
            .dispatch_bulk(
                f.session.id,
                &[f.student.id, orphan.id],
                TriggerEvent::SessionStart,
                &start_variables(),
            )
            .await
            .unwrap();

        assert_eq!(summary.sent, 1);
        assert_eq!(summary.no_contacts, 1);
        assert_eq!(summary.details.len(), 2);
    }
}
