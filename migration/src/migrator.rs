use sea_orm_migration::prelude::*;

use crate::migrations;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(migrations::m202601120001_create_classes::Migration),
            Box::new(migrations::m202601120002_create_class_sessions::Migration),
            Box::new(migrations::m202601120003_create_parent_contacts::Migration),
            Box::new(migrations::m202601120004_create_notification_templates::Migration),
            Box::new(migrations::m202601120005_create_workflows::Migration),
            Box::new(migrations::m202601120006_create_notification_logs::Migration),
            Box::new(migrations::m202601120007_create_connection_status::Migration),
        ]
    }
}
