// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};

use outbox_app::{
    Email, EmailId, EntityKind, FormPayload, Lists, Recipient, RecipientId, Status, StatusId,
    Task, TaskId, WriteCommand, WriteDraft,
};

use crate::client::Client;

/// Caches each entity list between reads. A `None` slot is stale and
/// refetched on the next snapshot. Writes go through `WriteCommand`
/// dispatch: run the call, then mark the command's declared
/// invalidation set stale. Cached rows are never patched in place.
pub struct ApiStore {
    client: Client,
    statuses: Option<Vec<Status>>,
    tasks: Option<Vec<Task>>,
    recipients: Option<Vec<Recipient>>,
    emails: Option<Vec<Email>>,
}

impl ApiStore {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            statuses: None,
            tasks: None,
            recipients: None,
            emails: None,
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn invalidate(&mut self, entity: EntityKind) {
        match entity {
            EntityKind::Statuses => self.statuses = None,
            EntityKind::Tasks => self.tasks = None,
            EntityKind::Recipients => self.recipients = None,
            EntityKind::Emails => self.emails = None,
        }
    }

    pub fn invalidate_all(&mut self) {
        for entity in EntityKind::ALL {
            self.invalidate(entity);
        }
    }

    /// Snapshot of all four lists, fetching whichever slots are stale.
    pub fn load_lists(&mut self) -> Result<Lists> {
        if self.statuses.is_none() {
            self.statuses = Some(self.client.list_statuses().context("load statuses")?);
        }
        if self.tasks.is_none() {
            self.tasks = Some(self.client.list_tasks().context("load tasks")?);
        }
        if self.recipients.is_none() {
            self.recipients = Some(self.client.list_recipients().context("load recipients")?);
        }
        if self.emails.is_none() {
            self.emails = Some(self.client.list_emails().context("load emails")?);
        }

        Ok(Lists {
            statuses: self.statuses.clone().unwrap_or_default(),
            tasks: self.tasks.clone().unwrap_or_default(),
            recipients: self.recipients.clone().unwrap_or_default(),
            emails: self.emails.clone().unwrap_or_default(),
        })
    }

    /// Reloads one record from the backend and returns it as form
    /// prefill, embedded references flattened to ids.
    pub fn fetch_record(&mut self, entity: EntityKind, id: i64) -> Result<FormPayload> {
        match entity {
            EntityKind::Statuses => {
                let status = self.client.get_status(StatusId::new(id)).context("load status")?;
                Ok(FormPayload::from_status(&status))
            }
            EntityKind::Tasks => {
                let task = self.client.get_task(TaskId::new(id)).context("load task")?;
                Ok(FormPayload::from_task(&task))
            }
            EntityKind::Recipients => {
                let recipient = self
                    .client
                    .get_recipient(RecipientId::new(id))
                    .context("load recipient")?;
                Ok(FormPayload::from_recipient(&recipient))
            }
            EntityKind::Emails => {
                let email = self.client.get_email(EmailId::new(id)).context("load email")?;
                Ok(FormPayload::from_email(&email))
            }
        }
    }

    pub fn execute(&mut self, command: &WriteCommand) -> Result<()> {
        match command {
            WriteCommand::Create(draft) => match draft {
                WriteDraft::Status(input) => {
                    self.client.create_status(input).context("create status")?;
                }
                WriteDraft::Task(input) => {
                    self.client.create_task(input).context("create task")?;
                }
                WriteDraft::Recipient(input) => {
                    self.client.create_recipient(input).context("create recipient")?;
                }
                WriteDraft::Email(draft) => {
                    self.client.create_email(draft).context("create email")?;
                }
            },
            WriteCommand::Update { id, draft } => match draft {
                WriteDraft::Status(input) => {
                    self.client
                        .update_status(StatusId::new(*id), input)
                        .context("update status")?;
                }
                WriteDraft::Task(input) => {
                    self.client
                        .update_task(TaskId::new(*id), input)
                        .context("update task")?;
                }
                WriteDraft::Recipient(input) => {
                    self.client
                        .update_recipient(RecipientId::new(*id), input)
                        .context("update recipient")?;
                }
                WriteDraft::Email(draft) => {
                    self.client
                        .update_email(EmailId::new(*id), draft)
                        .context("update email")?;
                }
            },
            WriteCommand::Delete { entity, id } => match entity {
                EntityKind::Statuses => self
                    .client
                    .delete_status(StatusId::new(*id))
                    .context("delete status")?,
                EntityKind::Tasks => self
                    .client
                    .delete_task(TaskId::new(*id))
                    .context("delete task")?,
                EntityKind::Recipients => self
                    .client
                    .delete_recipient(RecipientId::new(*id))
                    .context("delete recipient")?,
                EntityKind::Emails => self
                    .client
                    .delete_email(EmailId::new(*id))
                    .context("delete email")?,
            },
        }

        for entity in command.invalidates() {
            self.invalidate(*entity);
        }
        Ok(())
    }
}
