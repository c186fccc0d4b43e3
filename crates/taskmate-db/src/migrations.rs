use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (users, tasks)");
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS users (
                id          TEXT PRIMARY KEY,
                username    TEXT NOT NULL UNIQUE,
                email       TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS tasks (
                id          TEXT PRIMARY KEY,
                owner_id    TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                title       TEXT NOT NULL,
                description TEXT,
                due_date    TEXT NOT NULL,
                status      TEXT NOT NULL DEFAULT 'To Do',
                priority    TEXT NOT NULL DEFAULT 'Low',
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_owner
                ON tasks(owner_id, due_date);

            CREATE INDEX IF NOT EXISTS idx_tasks_due_date
                ON tasks(due_date);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (reminder log)");
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS reminder_log (
                task_id     TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
                threshold   INTEGER NOT NULL,
                due_date    TEXT NOT NULL,
                sent_at     TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (task_id, threshold, due_date)
            );

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
