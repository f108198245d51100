use crate::seed::Seeder;
use async_trait::async_trait;
use db::events::TriggerEvent;
use sea_orm::{DatabaseConnection, DbErr};
use services::template::TemplateService;

pub struct TemplateSeeder;

#[async_trait]
impl Seeder for TemplateSeeder {
    async fn seed(&self, db: &DatabaseConnection) -> Result<(), DbErr> {
        let service = TemplateService::new(db.clone());

        for event in [
            TriggerEvent::SessionStart,
            TriggerEvent::SessionBreak,
            TriggerEvent::SessionResume,
            TriggerEvent::SessionFinish,
            TriggerEvent::SessionCancel,
        ] {
            for language in ["id", "en"] {
                service
                    .resolve(event, language)
                    .await
                    .map_err(|e| DbErr::Custom(e.to_string()))?;
            }
        }
        Ok(())
    }
}
