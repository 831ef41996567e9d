// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::time::Duration;

use anyhow::{Context, Result, bail};
use reqwest::Method;
use reqwest::blocking::Client as HttpClient;
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use outbox_app::{
    Email, EmailDraft, EmailId, Recipient, RecipientFormInput, RecipientId, Status,
    StatusFormInput, StatusId, Task, TaskFormInput, TaskId,
};

use crate::error::{connection_error, request_error};

/// Blocking HTTP client for the email backend. Paths mirror the
/// deployed routes exactly, trailing-slash quirks included; the
/// backend 404s on the other spelling.
#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
    timeout: Duration,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            bail!("api.base_url must not be empty");
        }
        Url::parse(&base_url)
            .with_context(|| format!("api.base_url {base_url:?} is not a valid URL"))?;

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn list_statuses(&self) -> Result<Vec<Status>> {
        self.fetch("statuses/")
    }

    pub fn get_status(&self, id: StatusId) -> Result<Status> {
        self.fetch(&format!("statuses/{}", id.get()))
    }

    pub fn create_status(&self, draft: &StatusFormInput) -> Result<Status> {
        self.send(Method::POST, "statuses/", draft)
    }

    pub fn update_status(&self, id: StatusId, draft: &StatusFormInput) -> Result<Status> {
        self.send(Method::PATCH, &format!("statuses/{}/", id.get()), draft)
    }

    pub fn delete_status(&self, id: StatusId) -> Result<()> {
        self.remove(&format!("statuses/{}", id.get()))
    }

    pub fn list_tasks(&self) -> Result<Vec<Task>> {
        self.fetch("tasks/")
    }

    pub fn get_task(&self, id: TaskId) -> Result<Task> {
        self.fetch(&format!("tasks/{}", id.get()))
    }

    pub fn create_task(&self, draft: &TaskFormInput) -> Result<Task> {
        self.send(Method::POST, "tasks/", draft)
    }

    /// Tasks have no PATCH route; updates are full replaces and must
    /// carry every editable field.
    pub fn update_task(&self, id: TaskId, draft: &TaskFormInput) -> Result<Task> {
        self.send(Method::PUT, &format!("tasks/{}/", id.get()), draft)
    }

    pub fn delete_task(&self, id: TaskId) -> Result<()> {
        self.remove(&format!("tasks/{}/", id.get()))
    }

    pub fn list_recipients(&self) -> Result<Vec<Recipient>> {
        self.fetch("recipients/")
    }

    pub fn get_recipient(&self, id: RecipientId) -> Result<Recipient> {
        self.fetch(&format!("recipients/{}", id.get()))
    }

    pub fn create_recipient(&self, draft: &RecipientFormInput) -> Result<Recipient> {
        self.send(Method::POST, "recipients/", draft)
    }

    pub fn update_recipient(&self, id: RecipientId, draft: &RecipientFormInput) -> Result<Recipient> {
        self.send(Method::PATCH, &format!("recipients/{}/", id.get()), draft)
    }

    pub fn delete_recipient(&self, id: RecipientId) -> Result<()> {
        self.remove(&format!("recipients/{}/", id.get()))
    }

    pub fn list_emails(&self) -> Result<Vec<Email>> {
        self.fetch("emails/")
    }

    pub fn get_email(&self, id: EmailId) -> Result<Email> {
        self.fetch(&format!("emails/{}/", id.get()))
    }

    pub fn create_email(&self, draft: &EmailDraft) -> Result<Email> {
        self.send(Method::POST, "emails/", draft)
    }

    pub fn update_email(&self, id: EmailId, draft: &EmailDraft) -> Result<Email> {
        self.send(Method::PATCH, &format!("emails/{}/", id.get()), draft)
    }

    pub fn delete_email(&self, id: EmailId) -> Result<()> {
        self.remove(&format!("emails/{}/", id.get()))
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    fn fetch<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .http
            .get(self.endpoint(path))
            .send()
            .map_err(|error| connection_error(&self.base_url, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(request_error(status, &body));
        }

        response
            .json()
            .with_context(|| format!("decode response for {path}"))
    }

    fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &impl Serialize,
    ) -> Result<T> {
        let response = self
            .http
            .request(method, self.endpoint(path))
            .json(body)
            .send()
            .map_err(|error| connection_error(&self.base_url, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(request_error(status, &body));
        }

        response
            .json()
            .with_context(|| format!("decode response for {path}"))
    }

    fn remove(&self, path: &str) -> Result<()> {
        let response = self
            .http
            .delete(self.endpoint(path))
            .send()
            .map_err(|error| connection_error(&self.base_url, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(request_error(status, &body));
        }
        Ok(())
    }
}
