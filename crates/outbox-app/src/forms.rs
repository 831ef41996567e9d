// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::{Email, EntityKind, Lists, Recipient, RecipientId, Status, StatusId, Task, TaskId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusFormInput {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFormInput {
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientFormInput {
    pub address: String,
}

/// Email form state holds flat ids; the embedded objects the backend
/// expects are resolved at submit time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailFormInput {
    pub status: Option<StatusId>,
    pub task: Option<TaskId>,
    pub recipient_list: Vec<RecipientId>,
}

/// Wire shape of an email write: the selected references embedded in
/// full, exactly as reads return them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailDraft {
    pub status: Option<Status>,
    pub task: Task,
    pub recipient_list: Vec<Recipient>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormPayload {
    Status(StatusFormInput),
    Task(TaskFormInput),
    Recipient(RecipientFormInput),
    Email(EmailFormInput),
}

impl FormPayload {
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Status(_) => EntityKind::Statuses,
            Self::Task(_) => EntityKind::Tasks,
            Self::Recipient(_) => EntityKind::Recipients,
            Self::Email(_) => EntityKind::Emails,
        }
    }

    pub fn blank_for(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Statuses => Self::Status(StatusFormInput {
                name: String::new(),
                description: String::new(),
            }),
            EntityKind::Tasks => Self::Task(TaskFormInput {
                subject: String::new(),
                body: String::new(),
            }),
            EntityKind::Recipients => Self::Recipient(RecipientFormInput {
                address: String::new(),
            }),
            EntityKind::Emails => Self::Email(EmailFormInput {
                status: None,
                task: None,
                recipient_list: Vec::new(),
            }),
        }
    }

    pub fn from_status(status: &Status) -> Self {
        Self::Status(StatusFormInput {
            name: status.name.clone(),
            description: status.description.clone(),
        })
    }

    pub fn from_task(task: &Task) -> Self {
        Self::Task(TaskFormInput {
            subject: task.subject.clone(),
            body: task.body.clone(),
        })
    }

    pub fn from_recipient(recipient: &Recipient) -> Self {
        Self::Recipient(RecipientFormInput {
            address: recipient.address.clone(),
        })
    }

    /// Edit prefill flattens the embedded records back to ids.
    pub fn from_email(email: &Email) -> Self {
        Self::Email(EmailFormInput {
            status: email.status.as_ref().map(|status| status.id),
            task: Some(email.task.id),
            recipient_list: email
                .recipient_list
                .iter()
                .map(|recipient| recipient.id)
                .collect(),
        })
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Status(status) => status.validate(),
            Self::Task(task) => task.validate(),
            Self::Recipient(recipient) => recipient.validate(),
            Self::Email(email) => email.validate(),
        }
    }
}

impl StatusFormInput {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            bail!("status name is required -- enter a name and retry");
        }
        if self.description.trim().is_empty() {
            bail!("status description is required -- enter a description and retry");
        }
        Ok(())
    }
}

impl TaskFormInput {
    pub fn validate(&self) -> Result<()> {
        if self.subject.trim().is_empty() {
            bail!("task subject is required -- enter a subject and retry");
        }
        if self.body.trim().is_empty() {
            bail!("task body is required -- enter a body and retry");
        }
        Ok(())
    }
}

impl RecipientFormInput {
    pub fn validate(&self) -> Result<()> {
        if self.address.trim().is_empty() {
            bail!("recipient address is required -- enter an address and retry");
        }
        Ok(())
    }
}

impl EmailFormInput {
    pub fn validate(&self) -> Result<()> {
        if self.task.is_none() {
            bail!("email task is required -- choose a task and retry");
        }
        if self.recipient_list.is_empty() {
            bail!("email needs at least one recipient -- select recipients and retry");
        }
        Ok(())
    }

    /// Looks the selected ids up in the current lists and builds the
    /// embedded-object payload the backend expects.
    pub fn resolve(&self, lists: &Lists) -> Result<EmailDraft> {
        self.validate()?;
        let status = match self.status {
            Some(id) => match lists.status_by_id(id) {
                Some(status) => Some(status.clone()),
                None => bail!("status {} is no longer listed -- refresh and retry", id.get()),
            },
            None => None,
        };
        let task_id = match self.task {
            Some(id) => id,
            None => bail!("email task is required -- choose a task and retry"),
        };
        let Some(task) = lists.task_by_id(task_id) else {
            bail!("task {} is no longer listed -- refresh and retry", task_id.get());
        };
        let mut recipient_list = Vec::with_capacity(self.recipient_list.len());
        for id in &self.recipient_list {
            let Some(recipient) = lists.recipient_by_id(*id) else {
                bail!("recipient {} is no longer listed -- refresh and retry", id.get());
            };
            recipient_list.push(recipient.clone());
        }
        Ok(EmailDraft {
            status,
            task: task.clone(),
            recipient_list,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{EmailFormInput, FormPayload, StatusFormInput, TaskFormInput};
    use crate::{
        EntityKind, Lists, Recipient, RecipientId, Status, StatusId, Task, TaskId,
    };

    fn reference_lists() -> Lists {
        Lists {
            statuses: (1..=3)
                .map(|n| Status {
                    id: StatusId::new(n),
                    name: format!("status-{n}"),
                    description: format!("description {n}"),
                })
                .collect(),
            tasks: (4..=6)
                .map(|n| Task {
                    id: TaskId::new(n),
                    subject: format!("subject {n}"),
                    body: format!("body {n}"),
                    created_at: n * 1_000,
                })
                .collect(),
            recipients: (1..=4)
                .map(|n| Recipient {
                    id: RecipientId::new(n),
                    address: format!("user{n}@example.com"),
                })
                .collect(),
            emails: Vec::new(),
        }
    }

    #[test]
    fn blank_payload_matches_requested_kind() {
        for kind in EntityKind::ALL {
            assert_eq!(FormPayload::blank_for(kind).kind(), kind);
        }
    }

    #[test]
    fn status_validation_rejects_empty_name() {
        let payload = FormPayload::Status(StatusFormInput {
            name: "  ".to_owned(),
            description: "ready to send".to_owned(),
        });
        assert!(payload.validate().is_err());
    }

    #[test]
    fn task_validation_rejects_empty_subject() {
        let payload = FormPayload::Task(TaskFormInput {
            subject: String::new(),
            body: "hello".to_owned(),
        });
        assert!(payload.validate().is_err());
    }

    #[test]
    fn email_validation_requires_task_and_recipients() {
        let missing_task = EmailFormInput {
            status: None,
            task: None,
            recipient_list: vec![RecipientId::new(1)],
        };
        assert!(missing_task.validate().is_err());

        let missing_recipients = EmailFormInput {
            status: None,
            task: Some(TaskId::new(4)),
            recipient_list: Vec::new(),
        };
        assert!(missing_recipients.validate().is_err());
    }

    #[test]
    fn email_resolution_embeds_full_records() {
        let lists = reference_lists();
        let input = EmailFormInput {
            status: Some(StatusId::new(2)),
            task: Some(TaskId::new(5)),
            recipient_list: vec![RecipientId::new(1), RecipientId::new(3)],
        };

        let draft = input.resolve(&lists).expect("resolve email draft");
        assert_eq!(
            draft.status.as_ref().map(|status| status.name.as_str()),
            Some("status-2"),
        );
        assert_eq!(draft.task.subject, "subject 5");
        assert_eq!(
            draft
                .recipient_list
                .iter()
                .map(|recipient| recipient.address.as_str())
                .collect::<Vec<_>>(),
            vec!["user1@example.com", "user3@example.com"],
        );
    }

    #[test]
    fn email_resolution_without_status_stays_unset() {
        let lists = reference_lists();
        let input = EmailFormInput {
            status: None,
            task: Some(TaskId::new(4)),
            recipient_list: vec![RecipientId::new(2)],
        };
        let draft = input.resolve(&lists).expect("resolve email draft");
        assert!(draft.status.is_none());
    }

    #[test]
    fn email_resolution_rejects_unknown_references() {
        let lists = reference_lists();
        let input = EmailFormInput {
            status: None,
            task: Some(TaskId::new(99)),
            recipient_list: vec![RecipientId::new(1)],
        };
        assert!(input.resolve(&lists).is_err());
    }
}
