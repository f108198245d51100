use crate::seed::Seeder;
use async_trait::async_trait;
use db::models::{class_group, student};
use sea_orm::{DatabaseConnection, DbErr, EntityTrait};

const FIRST_NAMES: &[&str] = &[
    "Budi", "Citra", "Dian", "Eka", "Fajar", "Gita", "Hendra", "Intan", "Joko", "Kartika",
];
const LAST_NAMES: &[&str] = &[
    "Santoso", "Lestari", "Wijaya", "Pratama", "Rahayu", "Saputra", "Utami", "Hidayat",
];

pub struct StudentSeeder;

#[async_trait]
impl Seeder for StudentSeeder {
    async fn seed(&self, db: &DatabaseConnection) -> Result<(), DbErr> {
        use rand::seq::SliceRandom;
        use rand::SeedableRng;
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);

        let classes = class_group::Entity::find().all(db).await?;
        for class in &classes {
            for _ in 0..8 {
                let first = FIRST_NAMES.choose(&mut rng).unwrap();
                let last = LAST_NAMES.choose(&mut rng).unwrap();
                student::Model::create(db, class.id, &format!("{first} {last}")).await?;
            }
        }
        Ok(())
    }
}
