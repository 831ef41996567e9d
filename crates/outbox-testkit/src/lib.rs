// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::io::Read;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use serde_json::{Map, Value, json};
use time::OffsetDateTime;
use tiny_http::{Header, Method, Request, Response, Server};

use outbox_app::{
    Email, EmailId, Lists, Recipient, RecipientId, Status, StatusId, Task, TaskId,
};

const SEED_CREATED_AT: i64 = 1_755_000_000_000;
const SEED_SEND_AT: i64 = 1_756_600_000_000;

/// Deterministic fixture data: three statuses, three tasks, four
/// recipients, and two emails wired across them.
pub fn seed_lists() -> Lists {
    let statuses = vec![
        seed_status(1, "queued", "waiting for the send window"),
        seed_status(2, "sent", "delivered to the relay"),
        seed_status(3, "failed", "relay rejected the message"),
    ];
    let tasks = vec![
        seed_task(1, "Welcome aboard", "Thanks for signing up."),
        seed_task(2, "Renewal notice", "Your plan renews next month."),
        seed_task(3, "Password reset", "Use the link below to reset."),
    ];
    let recipients = vec![
        seed_recipient(1, "ada@example.com"),
        seed_recipient(2, "brian@example.com"),
        seed_recipient(3, "chandra@example.com"),
        seed_recipient(4, "dmitri@example.com"),
    ];
    let emails = vec![
        Email {
            id: EmailId::new(1),
            send_at: SEED_SEND_AT,
            status: Some(statuses[0].clone()),
            task: tasks[0].clone(),
            recipient_list: vec![recipients[0].clone(), recipients[2].clone()],
        },
        Email {
            id: EmailId::new(2),
            send_at: SEED_SEND_AT + 3_600_000,
            status: None,
            task: tasks[1].clone(),
            recipient_list: vec![recipients[1].clone()],
        },
    ];

    Lists {
        statuses,
        tasks,
        recipients,
        emails,
    }
}

fn seed_status(id: i64, name: &str, description: &str) -> Status {
    Status {
        id: StatusId::new(id),
        name: name.to_owned(),
        description: description.to_owned(),
    }
}

fn seed_task(id: i64, subject: &str, body: &str) -> Task {
    Task {
        id: TaskId::new(id),
        subject: subject.to_owned(),
        body: body.to_owned(),
        created_at: SEED_CREATED_AT + id * 60_000,
    }
}

fn seed_recipient(id: i64, address: &str) -> Recipient {
    Recipient {
        id: RecipientId::new(id),
        address: address.to_owned(),
    }
}

/// In-process HTTP server implementing the backend's REST contract
/// with real CRUD semantics: id assignment, timestamp stamping on
/// create, PATCH merges, PUT full replaces. Backs the api tests and
/// the `--demo` flag.
pub struct MockBackend {
    base_url: String,
    server: Arc<Server>,
    handle: Option<JoinHandle<()>>,
}

impl MockBackend {
    pub fn start() -> Result<Self> {
        Self::with_state(BackendState::empty())
    }

    pub fn start_seeded() -> Result<Self> {
        Self::with_state(BackendState::from_lists(&seed_lists())?)
    }

    fn with_state(state: BackendState) -> Result<Self> {
        let server = Arc::new(
            Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock backend: {error}"))?,
        );
        let base_url = format!("http://{}", server.server_addr());
        let worker = Arc::clone(&server);
        let handle = thread::spawn(move || serve(worker, state));

        Ok(Self {
            base_url,
            server,
            handle: Some(handle),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

struct BackendState {
    statuses: Vec<Value>,
    tasks: Vec<Value>,
    recipients: Vec<Value>,
    emails: Vec<Value>,
    next_id: i64,
}

impl BackendState {
    fn empty() -> Self {
        Self {
            statuses: Vec::new(),
            tasks: Vec::new(),
            recipients: Vec::new(),
            emails: Vec::new(),
            next_id: 1,
        }
    }

    fn from_lists(lists: &Lists) -> Result<Self> {
        let mut state = Self {
            statuses: to_rows(&lists.statuses)?,
            tasks: to_rows(&lists.tasks)?,
            recipients: to_rows(&lists.recipients)?,
            emails: to_rows(&lists.emails)?,
            next_id: 1,
        };
        let highest = state
            .statuses
            .iter()
            .chain(&state.tasks)
            .chain(&state.recipients)
            .chain(&state.emails)
            .filter_map(|row| row.get("id").and_then(Value::as_i64))
            .max()
            .unwrap_or(0);
        state.next_id = highest + 1;
        Ok(state)
    }

    fn rows_mut(&mut self, resource: &str) -> Option<&mut Vec<Value>> {
        match resource {
            "statuses" => Some(&mut self.statuses),
            "tasks" => Some(&mut self.tasks),
            "recipients" => Some(&mut self.recipients),
            "emails" => Some(&mut self.emails),
            _ => None,
        }
    }

    fn take_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

fn to_rows<T: Serialize>(records: &[T]) -> Result<Vec<Value>> {
    records
        .iter()
        .map(|record| serde_json::to_value(record).context("serialize seed record"))
        .collect()
}

enum Reply {
    Json(u16, Value),
    Empty(u16),
}

fn serve(server: Arc<Server>, mut state: BackendState) {
    // recv returns Err once unblock() runs from Drop.
    while let Ok(mut request) = server.recv() {
        let reply = handle_request(&mut state, &mut request);
        let _ = respond(request, reply);
    }
}

fn handle_request(state: &mut BackendState, request: &mut Request) -> Reply {
    let mut body = String::new();
    let _ = request.as_reader().read_to_string(&mut body);
    let method = request.method().clone();

    let path = request.url().to_owned();
    let segments: Vec<&str> = path.split('/').filter(|part| !part.is_empty()).collect();
    match segments.as_slice() {
        [resource] => collection(state, &method, resource, &body),
        [resource, id] => match id.parse::<i64>() {
            Ok(id) => member(state, &method, resource, id, &body),
            Err(_) => not_found(),
        },
        _ => not_found(),
    }
}

fn collection(state: &mut BackendState, method: &Method, resource: &str, body: &str) -> Reply {
    // The server stamps its own timestamps on create.
    let stamped_field = match resource {
        "tasks" => Some("created_at"),
        "emails" => Some("send_at"),
        _ => None,
    };

    match method {
        Method::Get => {
            let Some(rows) = state.rows_mut(resource) else {
                return not_found();
            };
            Reply::Json(200, Value::Array(rows.clone()))
        }
        Method::Post => {
            if state.rows_mut(resource).is_none() {
                return not_found();
            }
            let Some(mut record) = parse_object(body) else {
                return bad_request("expected a JSON object");
            };
            if let Some(field) = stamped_field {
                record.insert(field.to_owned(), json!(now_millis()));
            }
            record.insert("id".to_owned(), json!(state.take_id()));
            let created = Value::Object(record);
            if let Some(rows) = state.rows_mut(resource) {
                rows.push(created.clone());
            }
            Reply::Json(201, created)
        }
        _ => Reply::Empty(405),
    }
}

fn member(state: &mut BackendState, method: &Method, resource: &str, id: i64, body: &str) -> Reply {
    // Tasks replace on PUT; everything else merges on PATCH.
    let replaces = resource == "tasks";
    let Some(rows) = state.rows_mut(resource) else {
        return not_found();
    };
    let Some(position) = rows
        .iter()
        .position(|row| row.get("id").and_then(Value::as_i64) == Some(id))
    else {
        return not_found();
    };

    match method {
        Method::Get => Reply::Json(200, rows[position].clone()),
        Method::Patch if !replaces => {
            let Some(patch) = parse_object(body) else {
                return bad_request("expected a JSON object");
            };
            let Some(row) = rows[position].as_object_mut() else {
                return not_found();
            };
            for (key, value) in patch {
                if key != "id" {
                    row.insert(key, value);
                }
            }
            Reply::Json(200, rows[position].clone())
        }
        Method::Put if replaces => {
            let Some(payload) = parse_object(body) else {
                return bad_request("expected a JSON object");
            };
            let mut replacement = Map::new();
            replacement.insert("id".to_owned(), json!(id));
            if let Some(created_at) = rows[position].get("created_at") {
                replacement.insert("created_at".to_owned(), created_at.clone());
            }
            for (key, value) in payload {
                if key != "id" && key != "created_at" {
                    replacement.insert(key, value);
                }
            }
            rows[position] = Value::Object(replacement);
            Reply::Json(200, rows[position].clone())
        }
        Method::Delete => {
            rows.remove(position);
            Reply::Empty(204)
        }
        _ => Reply::Empty(405),
    }
}

fn parse_object(body: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn not_found() -> Reply {
    Reply::Json(404, json!({ "detail": "Not found." }))
}

fn bad_request(message: &str) -> Reply {
    Reply::Json(400, json!({ "detail": message }))
}

fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

fn respond(request: Request, reply: Reply) -> std::io::Result<()> {
    match reply {
        Reply::Json(status, value) => {
            let mut response =
                Response::from_string(value.to_string()).with_status_code(status);
            if let Ok(header) =
                Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
            {
                response = response.with_header(header);
            }
            request.respond(response)
        }
        Reply::Empty(status) => request.respond(Response::empty(status)),
    }
}

#[cfg(test)]
mod tests {
    use super::seed_lists;

    #[test]
    fn seed_ids_are_unique_per_entity() {
        let lists = seed_lists();
        for (count, distinct) in [
            (
                lists.statuses.len(),
                lists
                    .statuses
                    .iter()
                    .map(|status| status.id)
                    .collect::<std::collections::HashSet<_>>()
                    .len(),
            ),
            (
                lists.recipients.len(),
                lists
                    .recipients
                    .iter()
                    .map(|recipient| recipient.id)
                    .collect::<std::collections::HashSet<_>>()
                    .len(),
            ),
        ] {
            assert_eq!(count, distinct);
        }
    }

    #[test]
    fn seed_emails_reference_seeded_records() {
        let lists = seed_lists();
        for email in &lists.emails {
            assert!(lists.task_by_id(email.task.id).is_some());
            if let Some(status) = &email.status {
                assert!(lists.status_by_id(status.id).is_some());
            }
            for recipient in &email.recipient_list {
                assert!(lists.recipient_by_id(recipient.id).is_some());
            }
            assert!(!email.recipient_list.is_empty());
        }
    }
}
