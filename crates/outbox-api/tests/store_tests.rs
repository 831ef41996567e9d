// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use outbox_api::{ApiStore, Client};
use outbox_app::{
    EmailFormInput, EntityKind, FormPayload, RecipientFormInput, RecipientId, StatusFormInput,
    StatusId, TaskFormInput, TaskId, WriteCommand, WriteDraft,
};
use outbox_testkit::MockBackend;
use std::time::Duration;

fn store_for(backend: &MockBackend) -> Result<ApiStore> {
    let client = Client::new(backend.base_url(), Duration::from_secs(5))?;
    Ok(ApiStore::new(client))
}

#[test]
fn created_records_appear_in_the_next_snapshot() -> Result<()> {
    let backend = MockBackend::start()?;
    let mut store = store_for(&backend)?;

    let before = store.load_lists()?;
    assert!(before.recipients.is_empty());

    store.execute(&WriteCommand::Create(WriteDraft::Recipient(
        RecipientFormInput {
            address: "erin@example.com".to_owned(),
        },
    )))?;

    let after = store.load_lists()?;
    assert_eq!(after.recipients.len(), 1);
    assert_eq!(after.recipients[0].address, "erin@example.com");
    Ok(())
}

#[test]
fn email_update_preserves_server_assigned_fields() -> Result<()> {
    let backend = MockBackend::start_seeded()?;
    let mut store = store_for(&backend)?;

    let lists = store.load_lists()?;
    let original = lists.emails[0].clone();

    // Repoint email 1 at a different recipient set; send_at is not in
    // the payload and must survive the patch.
    let input = EmailFormInput {
        status: original.status.as_ref().map(|status| status.id),
        task: Some(original.task.id),
        recipient_list: vec![RecipientId::new(2), RecipientId::new(4)],
    };
    let draft = input.resolve(&lists)?;
    store.execute(&WriteCommand::Update {
        id: original.id.get(),
        draft: WriteDraft::Email(draft),
    })?;

    let updated = store.client().get_email(original.id)?;
    assert_eq!(updated.send_at, original.send_at);
    assert_eq!(
        updated
            .recipient_list
            .iter()
            .map(|recipient| recipient.id)
            .collect::<Vec<_>>(),
        vec![RecipientId::new(2), RecipientId::new(4)],
    );
    Ok(())
}

#[test]
fn task_replace_keeps_created_at() -> Result<()> {
    let backend = MockBackend::start_seeded()?;
    let mut store = store_for(&backend)?;

    let before = store.client().get_task(TaskId::new(2))?;
    store.execute(&WriteCommand::Update {
        id: 2,
        draft: WriteDraft::Task(TaskFormInput {
            subject: "Renewal reminder".to_owned(),
            body: "Plan renews in a week.".to_owned(),
        }),
    })?;

    let after = store.client().get_task(TaskId::new(2))?;
    assert_eq!(after.subject, "Renewal reminder");
    assert_eq!(after.created_at, before.created_at);
    Ok(())
}

#[test]
fn deleted_records_leave_the_snapshot() -> Result<()> {
    let backend = MockBackend::start_seeded()?;
    let mut store = store_for(&backend)?;

    let before = store.load_lists()?;
    assert!(before
        .recipients
        .iter()
        .any(|recipient| recipient.id == RecipientId::new(4)));

    store.execute(&WriteCommand::Delete {
        entity: EntityKind::Recipients,
        id: 4,
    })?;

    let after = store.load_lists()?;
    assert!(after
        .recipients
        .iter()
        .all(|recipient| recipient.id != RecipientId::new(4)));
    Ok(())
}

#[test]
fn email_updates_invalidate_every_cached_list() -> Result<()> {
    let backend = MockBackend::start_seeded()?;
    let mut store = store_for(&backend)?;

    let lists = store.load_lists()?;

    // Write a status behind the store's back; the cached snapshot must
    // not see it yet.
    store.client().create_status(&StatusFormInput {
        name: "bounced".to_owned(),
        description: "address unknown".to_owned(),
    })?;
    let cached = store.load_lists()?;
    assert_eq!(cached.statuses.len(), lists.statuses.len());

    let input = EmailFormInput {
        status: Some(StatusId::new(2)),
        task: Some(TaskId::new(1)),
        recipient_list: vec![RecipientId::new(1)],
    };
    let draft = input.resolve(&lists)?;
    store.execute(&WriteCommand::Update {
        id: 1,
        draft: WriteDraft::Email(draft),
    })?;

    let refreshed = store.load_lists()?;
    assert_eq!(refreshed.statuses.len(), lists.statuses.len() + 1);
    Ok(())
}

#[test]
fn non_email_updates_leave_other_caches_alone() -> Result<()> {
    let backend = MockBackend::start_seeded()?;
    let mut store = store_for(&backend)?;

    let lists = store.load_lists()?;
    store.client().create_status(&StatusFormInput {
        name: "bounced".to_owned(),
        description: "address unknown".to_owned(),
    })?;

    store.execute(&WriteCommand::Update {
        id: 1,
        draft: WriteDraft::Recipient(RecipientFormInput {
            address: "ada+new@example.com".to_owned(),
        }),
    })?;

    let after = store.load_lists()?;
    // recipients slot was refetched, statuses slot was not
    assert_eq!(after.recipients[0].address, "ada+new@example.com");
    assert_eq!(after.statuses.len(), lists.statuses.len());
    Ok(())
}

#[test]
fn fetch_record_flattens_email_references() -> Result<()> {
    let backend = MockBackend::start_seeded()?;
    let mut store = store_for(&backend)?;

    let payload = store.fetch_record(EntityKind::Emails, 1)?;
    let FormPayload::Email(input) = payload else {
        panic!("expected an email payload");
    };
    assert_eq!(input.status, Some(StatusId::new(1)));
    assert_eq!(input.task, Some(TaskId::new(1)));
    assert_eq!(
        input.recipient_list,
        vec![RecipientId::new(1), RecipientId::new(3)],
    );
    Ok(())
}

#[test]
fn missing_records_surface_a_request_error() -> Result<()> {
    let backend = MockBackend::start_seeded()?;
    let mut store = store_for(&backend)?;

    let error = store
        .fetch_record(EntityKind::Statuses, 999)
        .expect_err("fetch should fail for an unknown id");
    let request_error = error
        .downcast_ref::<outbox_api::RequestError>()
        .expect("error should downcast to RequestError");
    assert_eq!(request_error.status, 404);
    Ok(())
}
