// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use outbox_api::ApiStore;
use outbox_app::{EntityKind, FormPayload, Lists, WriteCommand};

/// Bridges the terminal front end to the HTTP-backed store.
pub struct ApiRuntime {
    store: ApiStore,
}

impl ApiRuntime {
    pub fn new(store: ApiStore) -> Self {
        Self { store }
    }
}

impl outbox_tui::AppRuntime for ApiRuntime {
    fn load_lists(&mut self) -> Result<Lists> {
        self.store.load_lists()
    }

    fn load_record(&mut self, entity: EntityKind, id: i64) -> Result<FormPayload> {
        self.store.fetch_record(entity, id)
    }

    fn dispatch_write(&mut self, command: &WriteCommand) -> Result<()> {
        self.store.execute(command)
    }

    fn invalidate(&mut self) {
        self.store.invalidate_all();
    }
}
