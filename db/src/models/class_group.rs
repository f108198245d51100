use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DatabaseConnection, Set};
use serde::Serialize;

/// Represents a class (homeroom group) in the `classes` table.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "classes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name, e.g. "7A".
    pub name: String,
    /// Grade label, e.g. "Grade 7".
    pub grade: String,
    pub homeroom_teacher: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::student::Entity")]
    Students,
    #[sea_orm(has_many = "super::class_session::Entity")]
    Sessions,
}

impl Related<super::student::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Students.def()
    }
}

impl Related<super::class_session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sessions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn create(
        db: &DatabaseConnection,
        name: &str,
        grade: &str,
        homeroom_teacher: &str,
    ) -> Result<Self, DbErr> {
        let now = Utc::now();
        ActiveModel {
            name: Set(name.to_owned()),
            grade: Set(grade.to_owned()),
            homeroom_teacher: Set(homeroom_teacher.to_owned()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
    }
}
