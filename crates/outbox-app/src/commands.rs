// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::forms::{EmailDraft, RecipientFormInput, StatusFormInput, TaskFormInput};
use crate::model::EntityKind;

/// A validated, fully resolved write payload for one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteDraft {
    Status(StatusFormInput),
    Task(TaskFormInput),
    Recipient(RecipientFormInput),
    Email(EmailDraft),
}

impl WriteDraft {
    pub const fn entity(&self) -> EntityKind {
        match self {
            Self::Status(_) => EntityKind::Statuses,
            Self::Task(_) => EntityKind::Tasks,
            Self::Recipient(_) => EntityKind::Recipients,
            Self::Email(_) => EntityKind::Emails,
        }
    }
}

/// One backend mutation. Each command declares which cached lists it
/// makes stale; the store invalidates exactly that set after the call
/// succeeds, and never patches cached rows in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteCommand {
    Create(WriteDraft),
    Update { id: i64, draft: WriteDraft },
    Delete { entity: EntityKind, id: i64 },
}

const fn only(entity: EntityKind) -> &'static [EntityKind] {
    match entity {
        EntityKind::Statuses => &[EntityKind::Statuses],
        EntityKind::Tasks => &[EntityKind::Tasks],
        EntityKind::Recipients => &[EntityKind::Recipients],
        EntityKind::Emails => &[EntityKind::Emails],
    }
}

impl WriteCommand {
    pub const fn entity(&self) -> EntityKind {
        match self {
            Self::Create(draft) | Self::Update { draft, .. } => draft.entity(),
            Self::Delete { entity, .. } => *entity,
        }
    }

    pub const fn invalidates(&self) -> &'static [EntityKind] {
        match self {
            // An email update can change which statuses, tasks, and
            // recipients are embedded where, so every list goes stale.
            Self::Update {
                draft: WriteDraft::Email(_),
                ..
            } => &EntityKind::ALL,
            other => only(other.entity()),
        }
    }

    /// Status-line message for a completed command.
    pub fn describe(&self) -> String {
        let noun = self.entity().noun();
        match self {
            Self::Create(_) => format!("{noun} created"),
            Self::Update { .. } => format!("{noun} saved"),
            Self::Delete { .. } => format!("{noun} deleted"),
        }
    }
}
