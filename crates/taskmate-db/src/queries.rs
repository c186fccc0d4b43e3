use crate::Database;
use crate::models::{ReminderRow, TaskFields, TaskRow, UserRow};
use anyhow::Result;
use rusqlite::{Connection, Row};
use taskmate_types::api::{TaskQuery, TaskSort};

const TASK_COLUMNS: &str =
    "id, owner_id, title, description, due_date, status, priority, created_at";

impl Database {
    // -- Users --

    /// Returns false when the username or email is already taken.
    pub fn create_user(&self, id: &str, username: &str, email: &str, password_hash: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (id, username, email, password) VALUES (?1, ?2, ?3, ?4)",
                (id, username, email, password_hash),
            );
            match inserted {
                Ok(_) => Ok(true),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
                {
                    Ok(false)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, username))
    }

    pub fn delete_user(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }

    // -- Tasks --

    pub fn insert_task(&self, id: &str, owner_id: &str, fields: &TaskFields<'_>) -> Result<TaskRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO tasks (id, owner_id, title, description, due_date, status, priority)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    id,
                    owner_id,
                    fields.title,
                    fields.description,
                    fields.due_date,
                    fields.status,
                    fields.priority
                ],
            )?;
            query_task(conn, owner_id, id)?
                .ok_or_else(|| anyhow::anyhow!("Task vanished after insert: {}", id))
        })
    }

    /// Fetch a task scoped to its owner. Other users' tasks read as `None`.
    pub fn get_task(&self, owner_id: &str, id: &str) -> Result<Option<TaskRow>> {
        self.with_conn(|conn| query_task(conn, owner_id, id))
    }

    pub fn list_tasks(&self, owner_id: &str, query: &TaskQuery) -> Result<Vec<TaskRow>> {
        self.with_conn(|conn| query_tasks(conn, owner_id, query))
    }

    /// Returns false when no task with this id belongs to the owner.
    pub fn update_task(&self, owner_id: &str, id: &str, fields: &TaskFields<'_>) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE tasks
                 SET title = ?1, description = ?2, due_date = ?3, status = ?4, priority = ?5
                 WHERE id = ?6 AND owner_id = ?7",
                rusqlite::params![
                    fields.title,
                    fields.description,
                    fields.due_date,
                    fields.status,
                    fields.priority,
                    id,
                    owner_id
                ],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn delete_task(&self, owner_id: &str, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "DELETE FROM tasks WHERE id = ?1 AND owner_id = ?2",
                (id, owner_id),
            )?;
            Ok(changed > 0)
        })
    }

    // -- Reminders --

    /// Every task in the store, unfiltered, joined with its owner's contact.
    pub fn all_tasks_with_owner(&self) -> Result<Vec<ReminderRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT t.id, t.title, t.due_date, t.status, u.username, u.email
                 FROM tasks t
                 LEFT JOIN users u ON t.owner_id = u.id
                 ORDER BY t.due_date, t.id",
            )?;

            let rows = stmt
                .query_map([], |row| {
                    Ok(ReminderRow {
                        task_id: row.get(0)?,
                        title: row.get(1)?,
                        due_date: row.get(2)?,
                        status: row.get(3)?,
                        owner_username: row.get(4)?,
                        owner_email: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn reminder_already_sent(&self, task_id: &str, threshold: i64, due_date: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn
                .query_row(
                    "SELECT 1 FROM reminder_log WHERE task_id = ?1 AND threshold = ?2 AND due_date = ?3",
                    rusqlite::params![task_id, threshold, due_date],
                    |_| Ok(()),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Idempotent: recording the same (task, threshold, due date) twice is a no-op.
    pub fn record_reminder_sent(&self, task_id: &str, threshold: i64, due_date: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO reminder_log (task_id, threshold, due_date) VALUES (?1, ?2, ?3)",
                rusqlite::params![task_id, threshold, due_date],
            )?;
            Ok(())
        })
    }
}

fn query_user(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, username, email, password, created_at FROM users WHERE username = ?1",
    )?;

    let row = stmt
        .query_row([username], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                email: row.get(2)?,
                password: row.get(3)?,
                created_at: row.get(4)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<TaskRow> {
    Ok(TaskRow {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        due_date: row.get(4)?,
        status: row.get(5)?,
        priority: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn query_task(conn: &Connection, owner_id: &str, id: &str) -> Result<Option<TaskRow>> {
    let sql = format!("SELECT {} FROM tasks WHERE id = ?1 AND owner_id = ?2", TASK_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt.query_row([id, owner_id], task_from_row).optional()?;
    Ok(row)
}

fn query_tasks(conn: &Connection, owner_id: &str, query: &TaskQuery) -> Result<Vec<TaskRow>> {
    let order_by = match query.sort {
        TaskSort::DueDate => "due_date ASC, created_at ASC",
        TaskSort::Priority => {
            "CASE priority
                WHEN 'Critical' THEN 3
                WHEN 'High' THEN 2
                WHEN 'Medium' THEN 1
                ELSE 0
             END DESC, due_date ASC"
        }
        TaskSort::Title => "title COLLATE NOCASE ASC",
    };

    // NULL filter parameters match everything
    let sql = format!(
        "SELECT {} FROM tasks
         WHERE owner_id = ?1
           AND (?2 IS NULL OR status = ?2)
           AND (?3 IS NULL OR priority = ?3)
         ORDER BY {}",
        TASK_COLUMNS, order_by
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            rusqlite::params![
                owner_id,
                query.status.map(|s| s.as_str()),
                query.priority.map(|p| p.as_str())
            ],
            task_from_row,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskmate_types::models::{Priority, TaskStatus};
    use uuid::Uuid;

    fn db_with_user(username: &str) -> (Database, String) {
        let db = Database::open_in_memory().unwrap();
        let user_id = Uuid::new_v4().to_string();
        db.create_user(&user_id, username, &format!("{username}@example.com"), "hash")
            .unwrap();
        (db, user_id)
    }

    fn fields<'a>(title: &'a str, due_date: &'a str, priority: &'a str) -> TaskFields<'a> {
        TaskFields {
            title,
            description: None,
            due_date,
            status: "To Do",
            priority,
        }
    }

    fn add_task(db: &Database, owner: &str, title: &str, due: &str, priority: &str) -> String {
        let id = Uuid::new_v4().to_string();
        db.insert_task(&id, owner, &fields(title, due, priority)).unwrap();
        id
    }

    #[test]
    fn duplicate_username_or_email_is_rejected() {
        let (db, _) = db_with_user("alice");
        let dup_name = db.create_user(&Uuid::new_v4().to_string(), "alice", "other@example.com", "h");
        assert!(!dup_name.unwrap());
        let dup_email = db.create_user(&Uuid::new_v4().to_string(), "bob", "alice@example.com", "h");
        assert!(!dup_email.unwrap());
        assert!(db.get_user_by_username("bob").unwrap().is_none());
        assert!(db.create_user(&Uuid::new_v4().to_string(), "bob", "bob@example.com", "h").unwrap());
    }

    #[test]
    fn tasks_are_scoped_to_their_owner() {
        let (db, alice) = db_with_user("alice");
        let bob = Uuid::new_v4().to_string();
        db.create_user(&bob, "bob", "bob@example.com", "h").unwrap();

        let task_id = add_task(&db, &alice, "Write report", "2026-10-20", "High");

        assert!(db.get_task(&alice, &task_id).unwrap().is_some());
        assert!(db.get_task(&bob, &task_id).unwrap().is_none());
        assert!(!db.delete_task(&bob, &task_id).unwrap());
        assert!(!db.update_task(&bob, &task_id, &fields("x", "2026-10-20", "Low")).unwrap());
        assert!(db.list_tasks(&bob, &TaskQuery::default()).unwrap().is_empty());
        assert!(db.delete_task(&alice, &task_id).unwrap());
    }

    #[test]
    fn list_filters_and_sorts() {
        let (db, alice) = db_with_user("alice");
        add_task(&db, &alice, "b-late", "2026-12-01", "Low");
        add_task(&db, &alice, "a-early", "2026-10-18", "Critical");
        add_task(&db, &alice, "C-mid", "2026-11-01", "Medium");

        let by_due = db.list_tasks(&alice, &TaskQuery::default()).unwrap();
        let titles: Vec<_> = by_due.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, ["a-early", "C-mid", "b-late"]);

        let by_title = db
            .list_tasks(&alice, &TaskQuery { sort: TaskSort::Title, ..Default::default() })
            .unwrap();
        let titles: Vec<_> = by_title.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, ["a-early", "b-late", "C-mid"]);

        let by_priority = db
            .list_tasks(&alice, &TaskQuery { sort: TaskSort::Priority, ..Default::default() })
            .unwrap();
        assert_eq!(by_priority[0].priority, "Critical");
        assert_eq!(by_priority[2].priority, "Low");

        let only_medium = db
            .list_tasks(
                &alice,
                &TaskQuery { priority: Some(Priority::Medium), ..Default::default() },
            )
            .unwrap();
        assert_eq!(only_medium.len(), 1);
        assert_eq!(only_medium[0].title, "C-mid");

        let completed = db
            .list_tasks(
                &alice,
                &TaskQuery { status: Some(TaskStatus::Completed), ..Default::default() },
            )
            .unwrap();
        assert!(completed.is_empty());
    }

    #[test]
    fn reminder_scan_includes_every_owner() {
        let (db, alice) = db_with_user("alice");
        let bob = Uuid::new_v4().to_string();
        db.create_user(&bob, "bob", "bob@example.com", "h").unwrap();
        add_task(&db, &alice, "one", "2026-10-20", "Low");
        add_task(&db, &bob, "two", "2026-10-18", "Low");

        let rows = db.all_tasks_with_owner().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].title, "two");
        assert_eq!(rows[0].owner_email.as_deref(), Some("bob@example.com"));
        assert_eq!(rows[1].owner_username.as_deref(), Some("alice"));
    }

    #[test]
    fn reminder_log_is_keyed_by_due_date() {
        let (db, alice) = db_with_user("alice");
        let task = add_task(&db, &alice, "one", "2026-10-20", "Low");

        assert!(!db.reminder_already_sent(&task, 3, "2026-10-20").unwrap());
        db.record_reminder_sent(&task, 3, "2026-10-20").unwrap();
        db.record_reminder_sent(&task, 3, "2026-10-20").unwrap();
        assert!(db.reminder_already_sent(&task, 3, "2026-10-20").unwrap());
        assert!(!db.reminder_already_sent(&task, 1, "2026-10-20").unwrap());
        assert!(!db.reminder_already_sent(&task, 3, "2026-10-25").unwrap());
    }

    #[test]
    fn deleting_a_user_cascades_to_tasks() {
        let (db, alice) = db_with_user("alice");
        let task = add_task(&db, &alice, "one", "2026-10-20", "Low");
        db.record_reminder_sent(&task, 3, "2026-10-20").unwrap();

        assert!(db.delete_user(&alice).unwrap());
        assert!(db.all_tasks_with_owner().unwrap().is_empty());
        assert!(!db.reminder_already_sent(&task, 3, "2026-10-20").unwrap());
    }
}
