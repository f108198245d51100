use crate::seed::Seeder;
use async_trait::async_trait;
use db::models::class_group;
use sea_orm::{DatabaseConnection, DbErr};

pub struct ClassSeeder;

#[async_trait]
impl Seeder for ClassSeeder {
    async fn seed(&self, db: &DatabaseConnection) -> Result<(), DbErr> {
        let classes = [
            ("7A", "Grade 7", "Mrs. Dewi Lestari"),
            ("7B", "Grade 7", "Mr. Bambang Wijaya"),
            ("8A", "Grade 8", "Mrs. Siti Rahma"),
        ];

        for (name, grade, homeroom) in classes {
            class_group::Model::create(db, name, grade, homeroom).await?;
        }
        Ok(())
    }
}
