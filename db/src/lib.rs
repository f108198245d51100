pub mod events;
pub mod models;
pub mod test_utils;

use sea_orm::{Database, DatabaseConnection};
use std::path::Path;

/// Connects using `DATABASE_URL`-style input: either a full DSN or a bare
/// SQLite file path.
pub async fn connect(path_or_url: &str) -> DatabaseConnection {
    let url = if path_or_url.starts_with("sqlite:")
        || path_or_url.starts_with("postgres://")
        || path_or_url.starts_with("mysql://")
    {
        path_or_url.to_string()
    } else {
        // SQLite won't create intermediate dirs.
        if let Some(parent) = Path::new(path_or_url).parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        format!("sqlite://{path_or_url}?mode=rwc")
    };

    Database::connect(&url)
        .await
        .expect("Failed to connect to database")
}
