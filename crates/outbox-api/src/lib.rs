// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod client;
pub mod error;
pub mod store;

pub use client::Client;
pub use error::RequestError;
pub use store::ApiStore;
