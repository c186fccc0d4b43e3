/// Database row types — these map directly to SQLite rows.
/// Distinct from taskmate-types models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub created_at: String,
}

pub struct TaskRow {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub description: Option<String>,
    pub due_date: String,
    pub status: String,
    pub priority: String,
    pub created_at: String,
}

/// Column values written by insert and update.
pub struct TaskFields<'a> {
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub due_date: &'a str,
    pub status: &'a str,
    pub priority: &'a str,
}

/// A task joined with its owner, as scanned by the reminder engine.
/// Owner columns are `None` when the owner row is missing.
pub struct ReminderRow {
    pub task_id: String,
    pub title: String,
    pub due_date: String,
    pub status: String,
    pub owner_username: Option<String>,
    pub owner_email: Option<String>,
}
