use crate::seed::Seeder;
use async_trait::async_trait;
use db::models::parent_contact::ContactType;
use db::models::student;
use sea_orm::{DatabaseConnection, DbErr, EntityTrait};
use services::contacts::ContactDirectory;

pub struct ParentContactSeeder;

#[async_trait]
impl Seeder for ParentContactSeeder {
    async fn seed(&self, db: &DatabaseConnection) -> Result<(), DbErr> {
        use rand::{Rng, SeedableRng};
        let mut rng = rand::rngs::StdRng::seed_from_u64(11);

        let directory = ContactDirectory::new(db.clone(), "62");
        let students = student::Entity::find().all(db).await?;

        for student in &students {
            // Every student gets a mother contact; roughly half get a father too.
            let phone = format!("08{:010}", rng.gen_range(1_000_000_000u64..9_999_999_999));
            let mother = directory
                .add_contact(student.id, ContactType::Mother, "Ibu Rumah", &phone, None)
                .await
                .map_err(|e| DbErr::Custom(e.to_string()))?;
            directory
                .set_primary_contact(student.id, mother.id)
                .await
                .map_err(|e| DbErr::Custom(e.to_string()))?;

            if rng.gen_bool(0.5) {
                let phone = format!("08{:010}", rng.gen_range(1_000_000_000u64..9_999_999_999));
                directory
                    .add_contact(student.id, ContactType::Father, "Bapak Rumah", &phone, None)
                    .await
                    .map_err(|e| DbErr::Custom(e.to_string()))?;
            }
        }
        Ok(())
    }
}
