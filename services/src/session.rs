//! The session state machine.
//!
//! `scheduled → started → break ⇄ resumed → finished`, with `cancelled`
//! reachable only from `scheduled`. Every transition is one transactional
//! read-check-write keyed by session id: the guard is re-checked against the
//! freshly read row inside the transaction, so two racing `finish` calls
//! cannot both succeed.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use db::events::SessionEvent;
use db::models::class_session::{self, SessionStatus, SessionTransition};
use sea_orm::{
    ActiveModelTrait, DatabaseConnection, DatabaseTransaction, EntityTrait, Set, TransactionTrait,
};
use tracing::info;

use crate::error::{ServiceError, ServiceResult};

/// Fields an operator may edit while the session is still `scheduled`.
#[derive(Debug, Clone, Default)]
pub struct SessionEdit {
    pub subject: Option<String>,
    pub teacher_name: Option<String>,
    pub session_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub break_duration_minutes: Option<i32>,
    pub student_count: Option<i32>,
}

#[derive(Clone)]
pub struct SessionService {
    db: DatabaseConnection,
}

impl SessionService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn load(
        txn: &DatabaseTransaction,
        session_id: i64,
    ) -> ServiceResult<class_session::Model> {
        let session = class_session::Entity::find_by_id(session_id)
            .one(txn)
            .await?
            .filter(|s| s.deleted_at.is_none())
            .ok_or(ServiceError::SessionNotFound(session_id))?;
        Ok(session)
    }

    /// Whether `transition` would currently be accepted. Advisory only: the
    /// state may change between this check and [`apply`], which re-validates.
    pub async fn can_transition(
        &self,
        session_id: i64,
        transition: SessionTransition,
    ) -> ServiceResult<bool> {
        let txn = self.db.begin().await?;
        let session = Self::load(&txn, session_id).await?;
        txn.commit().await?;
        Ok(transition.allowed_from(session.status))
    }

    /// Applies a guarded transition and returns the updated session together
    /// with the trigger event, built only after the new state is durably
    /// committed.
    pub async fn apply(
        &self,
        session_id: i64,
        transition: SessionTransition,
    ) -> ServiceResult<(class_session::Model, SessionEvent)> {
        let now = Utc::now();

        let txn = self.db.begin().await?;
        let session = Self::load(&txn, session_id).await?;

        if !transition.allowed_from(session.status) {
            return Err(ServiceError::InvalidTransition {
                from: session.status,
                action: transition.to_string(),
            });
        }

        let mut active: class_session::ActiveModel = session.into();
        active.status = Set(transition.target());
        match transition {
            SessionTransition::Start => active.actual_start_time = Set(Some(now)),
            SessionTransition::Break => active.actual_break_time = Set(Some(now)),
            SessionTransition::Resume => active.actual_resume_time = Set(Some(now)),
            SessionTransition::Finish => active.actual_end_time = Set(Some(now)),
            SessionTransition::Cancel => {}
        }
        active.updated_at = Set(now);
        let updated = active.update(&txn).await?;
        txn.commit().await?;

        info!(
            "Session {} transitioned to {} via {}",
            updated.id, updated.status, transition
        );

        let event = SessionEvent::from_session(transition.trigger(), &updated, now);
        Ok((updated, event))
    }

    /// Edits session details; legal only while `scheduled`.
    pub async fn update_scheduled(
        &self,
        session_id: i64,
        edit: SessionEdit,
    ) -> ServiceResult<class_session::Model> {
        let txn = self.db.begin().await?;
        let session = Self::load(&txn, session_id).await?;

        if !session.status.is_editable() {
            return Err(ServiceError::InvalidTransition {
                from: session.status,
                action: "edit".into(),
            });
        }

        let mut active: class_session::ActiveModel = session.into();
        if let Some(subject) = edit.subject {
            active.subject = Set(subject);
        }
        if let Some(teacher_name) = edit.teacher_name {
            active.teacher_name = Set(teacher_name);
        }
        if let Some(session_date) = edit.session_date {
            active.session_date = Set(session_date);
        }
        if let Some(start_time) = edit.start_time {
            active.start_time = Set(start_time);
        }
        if let Some(end_time) = edit.end_time {
            active.end_time = Set(end_time);
        }
        if let Some(break_duration_minutes) = edit.break_duration_minutes {
            active.break_duration_minutes = Set(break_duration_minutes);
        }
        if let Some(student_count) = edit.student_count {
            active.student_count = Set(student_count);
        }
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;
        txn.commit().await?;
        Ok(updated)
    }

    /// Soft-deletes a session; legal only while `scheduled`.
    pub async fn delete_scheduled(&self, session_id: i64) -> ServiceResult<()> {
        let txn = self.db.begin().await?;
        let session = Self::load(&txn, session_id).await?;

        if !session.status.is_editable() {
            return Err(ServiceError::InvalidTransition {
                from: session.status,
                action: "delete".into(),
            });
        }

        let mut active: class_session::ActiveModel = session.into();
        active.deleted_at = Set(Some(Utc::now()));
        active.updated_at = Set(Utc::now());
        active.update(&txn).await?;
        txn.commit().await?;
        Ok(())
    }

    /// Duration between actual start and a later timestamp, formatted for the
    /// `total_duration` template variable.
    pub fn format_duration(start: DateTime<Utc>, end: DateTime<Utc>) -> String {
        let minutes = (end - start).num_minutes().max(0);
        if minutes >= 60 {
            format!("{}h {}m", minutes / 60, minutes % 60)
        } else {
            format!("{minutes}m")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use db::events::TriggerEvent;
    use db::models::class_group;
    use db::test_utils::setup_test_db;

    async fn seed_session(db: &DatabaseConnection) -> class_session::Model {
        let class = class_group::Model::create(db, "7A", "Grade 7", "Mrs. Dewi")
            .await
            .unwrap();
        class_session::Model::create(
            db,
            class.id,
            "Mathematics",
            "Mr. Agus",
            NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            15,
            28,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn full_lifecycle_records_each_timestamp() {
        let db = setup_test_db().await;
        let session = seed_session(&db).await;
        let service = SessionService::new(db);

        let (s, e) = service
            .apply(session.id, SessionTransition::Start)
            .await
            .unwrap();
        assert_eq!(s.status, SessionStatus::Started);
        assert!(s.actual_start_time.is_some());
        assert_eq!(e.trigger, TriggerEvent::SessionStart);

        let (s, _) = service
            .apply(session.id, SessionTransition::Break)
            .await
            .unwrap();
        assert_eq!(s.status, SessionStatus::Break);
        assert!(s.actual_break_time.is_some());

        let (s, _) = service
            .apply(session.id, SessionTransition::Resume)
            .await
            .unwrap();
        assert_eq!(s.status, SessionStatus::Resumed);
        assert!(s.actual_resume_time.is_some());

        let (s, e) = service
            .apply(session.id, SessionTransition::Finish)
            .await
            .unwrap();
        assert_eq!(s.status, SessionStatus::Finished);
        assert!(s.actual_end_time.is_some());
        assert_eq!(e.trigger, TriggerEvent::SessionFinish);
    }

    #[tokio::test]
    async fn finish_without_break_is_legal() {
        let db = setup_test_db().await;
        let session = seed_session(&db).await;
        let service = SessionService::new(db);

        service
            .apply(session.id, SessionTransition::Start)
            .await
            .unwrap();
        let (s, _) = service
            .apply(session.id, SessionTransition::Finish)
            .await
            .unwrap();
        assert_eq!(s.status, SessionStatus::Finished);
    }

    #[tokio::test]
    async fn resume_without_break_is_rejected() {
        let db = setup_test_db().await;
        let session = seed_session(&db).await;
        let service = SessionService::new(db);

        service
            .apply(session.id, SessionTransition::Start)
            .await
            .unwrap();
        let result = service.apply(session.id, SessionTransition::Resume).await;
        assert!(matches!(
            result,
            Err(ServiceError::InvalidTransition {
                from: SessionStatus::Started,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn second_finish_fails_at_commit_time_recheck() {
        let db = setup_test_db().await;
        let session = seed_session(&db).await;
        let service = SessionService::new(db);

        service
            .apply(session.id, SessionTransition::Start)
            .await
            .unwrap();
        service
            .apply(session.id, SessionTransition::Finish)
            .await
            .unwrap();

        let result = service.apply(session.id, SessionTransition::Finish).await;
        assert!(matches!(
            result,
            Err(ServiceError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn cancel_is_only_reachable_from_scheduled() {
        let db = setup_test_db().await;
        let session = seed_session(&db).await;
        let service = SessionService::new(db.clone());

        assert!(service
            .can_transition(session.id, SessionTransition::Cancel)
            .await
            .unwrap());

        service
            .apply(session.id, SessionTransition::Start)
            .await
            .unwrap();
        let result = service.apply(session.id, SessionTransition::Cancel).await;
        assert!(matches!(
            result,
            Err(ServiceError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn edit_and_delete_are_rejected_after_start() {
        let db = setup_test_db().await;
        let session = seed_session(&db).await;
        let service = SessionService::new(db);

        service
            .update_scheduled(
                session.id,
                SessionEdit {
                    subject: Some("Physics".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        service
            .apply(session.id, SessionTransition::Start)
            .await
            .unwrap();

        let edit = service
            .update_scheduled(session.id, SessionEdit::default())
            .await;
        assert!(matches!(edit, Err(ServiceError::InvalidTransition { .. })));

        let delete = service.delete_scheduled(session.id).await;
        assert!(matches!(delete, Err(ServiceError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn deleted_sessions_are_invisible_to_transitions() {
        let db = setup_test_db().await;
        let session = seed_session(&db).await;
        let service = SessionService::new(db);

        service.delete_scheduled(session.id).await.unwrap();
        let result = service.apply(session.id, SessionTransition::Start).await;
        assert!(matches!(result, Err(ServiceError::SessionNotFound(_))));
    }

    #[test]
    fn duration_formatting() {
        let start = Utc::now();
        assert_eq!(
            SessionService::format_duration(start, start + chrono::Duration::minutes(45)),
            "45m"
        );
        assert_eq!(
            SessionService::format_duration(start, start + chrono::Duration::minutes(95)),
            "1h 35m"
        );
    }
}
