//! Contact directory: who gets notified for a student, and on which number.

use db::events::TriggerEvent;
use db::models::parent_contact::{self, ContactType};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};

use crate::error::{ServiceError, ServiceResult};

/// Canonicalizes a phone number to international digit form.
///
/// Punctuation and spaces are stripped; a leading `+` or `00` prefix is
/// dropped; a single leading `0` is replaced with the configured country
/// code. Numbers already in international form pass through unchanged.
pub fn normalize_phone(country_code: &str, raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    let had_plus = raw.trim_start().starts_with('+');
    if had_plus {
        return digits;
    }
    if let Some(rest) = digits.strip_prefix("00") {
        return rest.to_string();
    }
    if let Some(rest) = digits.strip_prefix('0') {
        return format!("{country_code}{rest}");
    }
    digits
}

/// Resolves students to notification-eligible contacts.
#[derive(Clone)]
pub struct ContactDirectory {
    db: DatabaseConnection,
    country_code: String,
}

impl ContactDirectory {
    pub fn new(db: DatabaseConnection, country_code: &str) -> Self {
        Self {
            db,
            country_code: country_code.to_string(),
        }
    }

    /// Registers a contact, canonicalizing both numbers.
    pub async fn add_contact(
        &self,
        student_id: i64,
        contact_type: ContactType,
        name: &str,
        phone: &str,
        whatsapp: Option<&str>,
    ) -> ServiceResult<parent_contact::Model> {
        let phone = normalize_phone(&self.country_code, phone);
        let whatsapp = whatsapp.map(|w| normalize_phone(&self.country_code, w));

        parent_contact::Model::create(
            &self.db,
            student_id,
            contact_type,
            name,
            &phone,
            whatsapp.as_deref(),
        )
        .await
        .map_err(ServiceError::from)
    }

    /// Contacts that should receive a notification for `event`: active,
    /// opted in, and not muted for this event type. An empty result is not
    /// an error.
    pub async fn eligible_contacts(
        &self,
        student_id: i64,
        event: TriggerEvent,
    ) -> ServiceResult<Vec<parent_contact::Model>> {
        let contacts = parent_contact::Model::find_for_student(&self.db, student_id).await?;
        Ok(contacts.into_iter().filter(|c| c.wants(event)).collect())
    }

    /// Makes `contact_id` the student's only primary contact.
    ///
    /// The clear-then-set sequence runs inside one transaction so at most one
    /// primary contact per student holds after every completed call.
    pub async fn set_primary_contact(
        &self,
        student_id: i64,
        contact_id: i64,
    ) -> ServiceResult<parent_contact::Model> {
        let txn = self.db.begin().await?;

        let Some(target) = parent_contact::Entity::find_by_id(contact_id).one(&txn).await? else {
            return Err(ServiceError::Validation(format!(
                "Contact {contact_id} not found"
            )));
        };
        if target.student_id != student_id {
            return Err(ServiceError::Validation(format!(
                "Contact {contact_id} does not belong to student {student_id}"
            )));
        }

        parent_contact::Entity::update_many()
            .col_expr(parent_contact::Column::IsPrimary, Expr::value(false))
            .filter(parent_contact::Column::StudentId.eq(student_id))
            .exec(&txn)
            .await?;

        let mut active: parent_contact::ActiveModel = target.into();
        active.is_primary = Set(true);
        active.updated_at = Set(chrono::Utc::now());
        let updated = active.update(&txn).await?;

        txn.commit().await?;
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use db::models::{class_group, student};
    use db::test_utils::setup_test_db;
    use sea_orm::PaginatorTrait;

    #[test]
    fn local_numbers_gain_the_country_code() {
        assert_eq!(normalize_phone("62", "0812-3456-7890"), "6281234567890");
        assert_eq!(normalize_phone("62", "0812 3456 7890"), "6281234567890");
    }

    #[test]
    fn international_forms_are_preserved() {
        assert_eq!(normalize_phone("62", "+62 812 3456 7890"), "6281234567890");
        assert_eq!(normalize_phone("62", "006281234567890"), "6281234567890");
        assert_eq!(normalize_phone("62", "6281234567890"), "6281234567890");
    }

    async fn seed_student(db: &DatabaseConnection) -> student::Model {
        let class = class_group::Model::create(db, "7A", "Grade 7", "Mrs. Dewi")
            .await
            .unwrap();
        student::Model::create(db, class.id, "Budi Santoso")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn eligible_contacts_filters_muted_and_inactive() {
        let db = setup_test_db().await;
        let student = seed_student(&db).await;
        let directory = ContactDirectory::new(db.clone(), "62");

        let mother = directory
            .add_contact(student.id, ContactType::Mother, "Ibu Sari", "081111111111", None)
            .await
            .unwrap();
        let father = directory
            .add_contact(student.id, ContactType::Father, "Pak Joko", "082222222222", None)
            .await
            .unwrap();

        // Mute the father for break notifications only.
        let mut active: parent_contact::ActiveModel = father.clone().into();
        active.preferences = Set(serde_json::json!({"session_break": false}));
        active.update(&db).await.unwrap();

        let for_break = directory
            .eligible_contacts(student.id, TriggerEvent::SessionBreak)
            .await
            .unwrap();
        assert_eq!(for_break.len(), 1);
        assert_eq!(for_break[0].id, mother.id);

        let for_start = directory
            .eligible_contacts(student.id, TriggerEvent::SessionStart)
            .await
            .unwrap();
        assert_eq!(for_start.len(), 2);
    }

    #[tokio::test]
    async fn set_primary_clears_all_other_primaries() {
        let db = setup_test_db().await;
        let student = seed_student(&db).await;
        let directory = ContactDirectory::new(db.clone(), "62");

        let mother = directory
            .add_contact(student.id, ContactType::Mother, "Ibu Sari", "081111111111", None)
            .await
            .unwrap();
        let father = directory
            .add_contact(student.id, ContactType::Father, "Pak Joko", "082222222222", None)
            .await
            .unwrap();

        directory
            .set_primary_contact(student.id, mother.id)
            .await
            .unwrap();
        directory
            .set_primary_contact(student.id, father.id)
            .await
            .unwrap();

        let primaries = parent_contact::Entity::find()
            .filter(parent_contact::Column::StudentId.eq(student.id))
            .filter(parent_contact::Column::IsPrimary.eq(true))
            .count(&db)
            .await
            .unwrap();
        assert_eq!(primaries, 1);

        let current = parent_contact::Entity::find_by_id(father.id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert!(current.is_primary);
    }

    #[tokio::test]
    async fn set_primary_rejects_foreign_contacts() {
        let db = setup_test_db().await;
        let student_a = seed_student(&db).await;
        let student_b = student::Model::create(&db, student_a.class_id, "Citra Lestari")
            .await
            .unwrap();
        let directory = ContactDirectory::new(db.clone(), "62");

        let contact_b = directory
            .add_contact(student_b.id, ContactType::Guardian, "Om Rudi", "083333333333", None)
            .await
            .unwrap();

        let result = directory
            .set_primary_contact(student_a.id, contact_b.id)
            .await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }
}
