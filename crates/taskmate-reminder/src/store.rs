use anyhow::Result;
use chrono::NaiveDate;
use tracing::warn;

use taskmate_db::Database;
use taskmate_db::models::ReminderRow;
use taskmate_types::models::TaskStatus;

use crate::threshold::Threshold;

/// What the engine needs to know about a task.
#[derive(Debug, Clone, PartialEq)]
pub struct ReminderTask {
    pub task_id: String,
    pub title: String,
    pub due_date: NaiveDate,
    pub status: TaskStatus,
    pub owner_name: Option<String>,
    /// Owner's email. `None` when the owner no longer resolves.
    pub recipient: Option<String>,
}

/// Read side of task storage, plus the sent-reminder ledger.
///
/// Calls are blocking; the engine runs them on the blocking pool.
pub trait TaskStore: Send + Sync + 'static {
    /// Every task, with no status or date filter.
    fn all_tasks(&self) -> Result<Vec<ReminderTask>>;

    fn already_sent(&self, task_id: &str, threshold: Threshold, due_date: NaiveDate) -> Result<bool>;

    fn record_sent(&self, task_id: &str, threshold: Threshold, due_date: NaiveDate) -> Result<()>;
}

fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

impl TaskStore for Database {
    fn all_tasks(&self) -> Result<Vec<ReminderTask>> {
        let rows = self.all_tasks_with_owner()?;
        Ok(rows.into_iter().filter_map(reminder_task_from_row).collect())
    }

    fn already_sent(&self, task_id: &str, threshold: Threshold, due_date: NaiveDate) -> Result<bool> {
        self.reminder_already_sent(task_id, threshold.days(), &date_key(due_date))
    }

    fn record_sent(&self, task_id: &str, threshold: Threshold, due_date: NaiveDate) -> Result<()> {
        self.record_reminder_sent(task_id, threshold.days(), &date_key(due_date))
    }
}

fn reminder_task_from_row(row: ReminderRow) -> Option<ReminderTask> {
    let due_date = match NaiveDate::parse_from_str(&row.due_date, "%Y-%m-%d") {
        Ok(date) => date,
        Err(e) => {
            warn!("Skipping task '{}' with corrupt due_date '{}': {}", row.task_id, row.due_date, e);
            return None;
        }
    };

    // Status only matters for the skip-completed filter, so a bad value is not fatal
    let status = row.status.parse().unwrap_or_else(|e| {
        warn!("Corrupt status on task '{}': {}", row.task_id, e);
        TaskStatus::default()
    });

    Some(ReminderTask {
        task_id: row.task_id,
        title: row.title,
        due_date,
        status,
        owner_name: row.owner_username,
        recipient: row.owner_email,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskmate_db::models::TaskFields;

    #[test]
    fn database_rows_become_reminder_tasks() {
        let db = Database::open_in_memory().unwrap();
        db.create_user("u1", "alice", "a@x.com", "hash").unwrap();
        db.insert_task(
            "t1",
            "u1",
            &TaskFields {
                title: "Renew passport",
                description: Some("bring photos"),
                due_date: "2026-10-20",
                status: "Completed",
                priority: "High",
            },
        )
        .unwrap();

        let tasks = db.all_tasks().unwrap();
        assert_eq!(
            tasks,
            vec![ReminderTask {
                task_id: "t1".into(),
                title: "Renew passport".into(),
                due_date: NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
                status: TaskStatus::Completed,
                owner_name: Some("alice".into()),
                recipient: Some("a@x.com".into()),
            }]
        );
    }

    #[test]
    fn corrupt_due_dates_are_skipped() {
        let db = Database::open_in_memory().unwrap();
        db.create_user("u1", "alice", "a@x.com", "hash").unwrap();
        for (id, due) in [("good", "2026-10-20"), ("bad", "next tuesday")] {
            db.insert_task(
                id,
                "u1",
                &TaskFields {
                    title: id,
                    description: None,
                    due_date: due,
                    status: "To Do",
                    priority: "Low",
                },
            )
            .unwrap();
        }

        let tasks = db.all_tasks().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].task_id, "good");
    }

    #[test]
    fn sent_ledger_goes_through_the_database() {
        let db = Database::open_in_memory().unwrap();
        db.create_user("u1", "alice", "a@x.com", "hash").unwrap();
        db.insert_task(
            "t1",
            "u1",
            &TaskFields {
                title: "x",
                description: None,
                due_date: "2026-10-20",
                status: "To Do",
                priority: "Low",
            },
        )
        .unwrap();
        let due = NaiveDate::from_ymd_opt(2026, 10, 20).unwrap();

        assert!(!db.already_sent("t1", Threshold::OneDay, due).unwrap());
        db.record_sent("t1", Threshold::OneDay, due).unwrap();
        assert!(db.already_sent("t1", Threshold::OneDay, due).unwrap());
        assert!(!db.already_sent("t1", Threshold::DueToday, due).unwrap());
    }
}
