use crate::seed::Seeder;
use async_trait::async_trait;
use db::events::TriggerEvent;
use db::models::workflow::{Model as WorkflowModel, WorkflowAction, WorkflowType};
use sea_orm::{DatabaseConnection, DbErr};

pub struct WorkflowSeeder;

#[async_trait]
impl Seeder for WorkflowSeeder {
    async fn seed(&self, db: &DatabaseConnection) -> Result<(), DbErr> {
        for (name, trigger) in [
            ("Notify parents on session start", TriggerEvent::SessionStart),
            ("Notify parents on break", TriggerEvent::SessionBreak),
            ("Notify parents on resume", TriggerEvent::SessionResume),
            ("Notify parents on session finish", TriggerEvent::SessionFinish),
            ("Notify parents on cancellation", TriggerEvent::SessionCancel),
        ] {
            WorkflowModel::create(
                db,
                name,
                WorkflowType::SessionNotification,
                trigger,
                &[],
                &[WorkflowAction::SendNotification],
                10,
            )
            .await?;
        }

        // Audit trail for finished sessions, after the parent notification.
        WorkflowModel::create(
            db,
            "Record finish audit entry",
            WorkflowType::CustomMessage,
            TriggerEvent::SessionFinish,
            &[],
            &[WorkflowAction::LogEvent {
                note: Some("session finished".into()),
            }],
            20,
        )
        .await?;

        Ok(())
    }
}
