use chrono::NaiveDate;

use crate::store::ReminderTask;

/// Days-before-due at which a reminder fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Threshold {
    ThreeDays,
    OneDay,
    DueToday,
}

impl Threshold {
    /// Evaluation order. The day counts are distinct, so at most one matches.
    pub const ORDER: [Threshold; 3] = [Self::ThreeDays, Self::OneDay, Self::DueToday];

    pub fn days(self) -> i64 {
        match self {
            Self::ThreeDays => 3,
            Self::OneDay => 1,
            Self::DueToday => 0,
        }
    }

    pub fn for_delta(delta_days: i64) -> Option<Self> {
        Self::ORDER.into_iter().find(|t| t.days() == delta_days)
    }

    /// Whole calendar days from `today` until `due_date`. Negative once overdue.
    pub fn delta_days(due_date: NaiveDate, today: NaiveDate) -> i64 {
        (due_date - today).num_days()
    }

    pub fn subject(self) -> &'static str {
        match self {
            Self::ThreeDays => "3 days left",
            Self::OneDay => "1 day left",
            Self::DueToday => "Deadline is today",
        }
    }

    fn closing_line(self) -> &'static str {
        match self {
            Self::ThreeDays => "You have 3 days left to complete it.",
            Self::OneDay => "You have 1 day left to complete it.",
            Self::DueToday => "The deadline is today.",
        }
    }
}

/// A rendered message ready for a notifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub body: String,
    pub recipient: String,
}

impl Notification {
    pub fn for_task(task: &ReminderTask, threshold: Threshold, recipient: &str) -> Self {
        let greeting = match task.owner_name.as_deref() {
            Some(name) => format!("Hi {},", name),
            None => "Hi,".to_string(),
        };

        Self {
            subject: threshold.subject().to_string(),
            body: format!(
                "{}\n\nYour task \"{}\" is due on {}. {}\n",
                greeting,
                task.title,
                task.due_date.format("%Y-%m-%d"),
                threshold.closing_line()
            ),
            recipient: recipient.to_string(),
        }
    }
}
