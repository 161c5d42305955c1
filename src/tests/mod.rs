mod test_store;
mod test_tracker;

use std::time::Duration;

use crate::database::connection::Database;

/// Upper bound for anything a test waits on.
pub const WAIT: Duration = Duration::from_secs(5);

/// A private in-memory store. One connection, so every query sees the same
/// database.
pub async fn memory_database() -> Database {
    Database::connect("sqlite::memory:", 1)
        .await
        .expect("in-memory database should open")
}
