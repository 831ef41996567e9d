// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

use crate::ids::*;

/// The four backend resources, in tab order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Statuses,
    Tasks,
    Recipients,
    Emails,
}

impl EntityKind {
    pub const ALL: [Self; 4] = [Self::Statuses, Self::Tasks, Self::Recipients, Self::Emails];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Statuses => "statuses",
            Self::Tasks => "tasks",
            Self::Recipients => "recipients",
            Self::Emails => "emails",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "statuses" => Some(Self::Statuses),
            "tasks" => Some(Self::Tasks),
            "recipients" => Some(Self::Recipients),
            "emails" => Some(Self::Emails),
            _ => None,
        }
    }

    /// Display text for tab strips and table titles; `as_str` stays the
    /// machine key used in routes and config.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Statuses => "Statuses",
            Self::Tasks => "Tasks",
            Self::Recipients => "Recipients",
            Self::Emails => "Emails",
        }
    }

    /// Singular noun for status-line messages ("task saved").
    pub const fn noun(self) -> &'static str {
        match self {
            Self::Statuses => "status",
            Self::Tasks => "task",
            Self::Recipients => "recipient",
            Self::Emails => "email",
        }
    }
}

/// What a column holds, declared once per column. Forms and tables are
/// driven entirely by this; nothing dispatches on column-name strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    /// Server-assigned, shown in tables, never editable.
    ReadOnly,
    Text,
    /// Single reference into another entity's list.
    ForeignOne(EntityKind),
    /// Ordered multi-reference into another entity's list.
    ForeignMany(EntityKind),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub id: StatusId,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub subject: String,
    pub body: String,
    /// Milliseconds since the Unix epoch, server-assigned.
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub id: RecipientId,
    pub address: String,
}

/// A scheduled outbound message. Reads embed the referenced records in
/// full; writes send them back the same way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    pub id: EmailId,
    /// Milliseconds since the Unix epoch, server-assigned.
    pub send_at: i64,
    pub status: Option<Status>,
    pub task: Task,
    pub recipient_list: Vec<Recipient>,
}

impl Email {
    pub fn status_name(&self) -> &str {
        self.status.as_ref().map_or("not set", |status| status.name.as_str())
    }

    pub fn recipient_summary(&self) -> String {
        if self.recipient_list.is_empty() {
            return "no recipients".to_owned();
        }
        self.recipient_list
            .iter()
            .map(|recipient| recipient.address.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Snapshot of all four entity lists, fetched together.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Lists {
    pub statuses: Vec<Status>,
    pub tasks: Vec<Task>,
    pub recipients: Vec<Recipient>,
    pub emails: Vec<Email>,
}

impl Lists {
    pub fn status_by_id(&self, id: StatusId) -> Option<&Status> {
        self.statuses.iter().find(|status| status.id == id)
    }

    pub fn task_by_id(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn recipient_by_id(&self, id: RecipientId) -> Option<&Recipient> {
        self.recipients.iter().find(|recipient| recipient.id == id)
    }
}

const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'_>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]");

/// Renders a millisecond epoch timestamp for table cells. Falls back to
/// the raw number if the value is outside the representable range.
pub fn format_timestamp(millis: i64) -> String {
    match OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000) {
        Ok(moment) => moment
            .format(TIMESTAMP_FORMAT)
            .unwrap_or_else(|_| millis.to_string()),
        Err(_) => millis.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{Email, EntityKind, Recipient, Status, Task, format_timestamp};
    use crate::{EmailId, RecipientId, StatusId, TaskId};

    fn sample_task() -> Task {
        Task {
            id: TaskId::new(5),
            subject: "Renewal notice".to_owned(),
            body: "Your plan renews soon.".to_owned(),
            created_at: 1_704_067_200_000,
        }
    }

    #[test]
    fn entity_kind_round_trips_through_strings() {
        for kind in EntityKind::ALL {
            assert_eq!(EntityKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(EntityKind::parse("letters"), None);
    }

    #[test]
    fn labels_are_display_cased_keys() {
        for kind in EntityKind::ALL {
            assert_eq!(kind.label().to_lowercase(), kind.as_str());
            assert_ne!(kind.label(), kind.as_str());
        }
    }

    #[test]
    fn timestamp_formats_as_minutes() {
        assert_eq!(format_timestamp(0), "1970-01-01 00:00");
        assert_eq!(format_timestamp(1_704_067_200_000), "2024-01-01 00:00");
    }

    #[test]
    fn email_without_status_reads_not_set() {
        let email = Email {
            id: EmailId::new(1),
            send_at: 0,
            status: None,
            task: sample_task(),
            recipient_list: Vec::new(),
        };
        assert_eq!(email.status_name(), "not set");
        assert_eq!(email.recipient_summary(), "no recipients");
    }

    #[test]
    fn email_summaries_use_embedded_records() {
        let email = Email {
            id: EmailId::new(2),
            send_at: 0,
            status: Some(Status {
                id: StatusId::new(3),
                name: "queued".to_owned(),
                description: String::new(),
            }),
            task: sample_task(),
            recipient_list: vec![
                Recipient {
                    id: RecipientId::new(1),
                    address: "a@example.com".to_owned(),
                },
                Recipient {
                    id: RecipientId::new(2),
                    address: "b@example.com".to_owned(),
                },
            ],
        };
        assert_eq!(email.status_name(), "queued");
        assert_eq!(email.recipient_summary(), "a@example.com, b@example.com");
    }
}
