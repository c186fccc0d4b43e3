use axum::{
    Extension,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};

use taskmate_types::api::{Claims, TaskQuery};
use taskmate_types::models::Task;

use crate::auth::AppState;
use crate::tasks::{task_from_row, with_db};

const CSV_HEADER: [&str; 5] = ["Title", "Description", "Due Date", "Status", "Priority"];

/// Download the caller's tasks as CSV, ordered by due date.
pub async fn export_csv(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let owner = claims.sub.to_string();
    let rows = with_db(&state, move |db| db.list_tasks(&owner, &TaskQuery::default())).await?;

    let tasks: Vec<Task> = rows.into_iter().map(task_from_row).collect();

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"tasks.csv\""),
        ],
        render_csv(&tasks),
    ))
}

pub fn render_csv(tasks: &[Task]) -> String {
    let mut out = String::new();
    push_record(&mut out, CSV_HEADER);

    for task in tasks {
        let due_date = task.due_date.format("%Y-%m-%d").to_string();
        push_record(
            &mut out,
            [
                task.title.as_str(),
                task.description.as_deref().unwrap_or(""),
                due_date.as_str(),
                task.status.as_str(),
                task.priority.as_str(),
            ],
        );
    }

    out
}

fn push_record<const N: usize>(out: &mut String, fields: [&str; N]) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        push_field(out, field);
    }
    out.push_str("\r\n");
}

/// RFC 4180 quoting: wrap in quotes when needed and double embedded quotes.
fn push_field(out: &mut String, field: &str) {
    if field.contains([',', '"', '\n', '\r']) {
        out.push('"');
        out.push_str(&field.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(field);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use taskmate_types::models::{Priority, TaskStatus};
    use uuid::Uuid;

    fn task(title: &str, description: Option<&str>) -> Task {
        Task {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            title: title.to_string(),
            description: description.map(str::to_string),
            due_date: NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
            status: TaskStatus::InProgress,
            priority: Priority::High,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn empty_export_is_just_the_header() {
        assert_eq!(render_csv(&[]), "Title,Description,Due Date,Status,Priority\r\n");
    }

    #[test]
    fn fields_needing_quotes_are_escaped() {
        let csv = render_csv(&[
            task("Plain", None),
            task("Milk, eggs", Some("say \"please\"\nthen leave")),
        ]);

        let mut lines = csv.split("\r\n");
        lines.next();
        assert_eq!(lines.next(), Some("Plain,,2026-10-20,In Progress,High"));
        assert_eq!(
            lines.next(),
            Some("\"Milk, eggs\",\"say \"\"please\"\"\nthen leave\",2026-10-20,In Progress,High")
        );
    }
}
