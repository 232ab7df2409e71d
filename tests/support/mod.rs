//! In-process fake journal server for integration tests.
//!
//! Implements enough of the Atom feed protocol to drive the real client
//! over loopback: range reads with self-consistent navigation links,
//! newest-first raw entry order (so client-side sorting is exercised),
//! appends, stream metadata, and competing-consumer groups with
//! available/parked queues, ack/nack dispositions, and parked replay.

// Each test crate compiles its own copy of this module and uses a subset.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};

/// One recorded event. The index in its stream vec is its event number.
#[derive(Debug, Clone)]
pub struct StoredEvent {
    pub event_id: String,
    pub event_type: String,
    pub data: Value,
}

#[derive(Debug, Default)]
struct Group {
    available: VecDeque<u64>,
    parked: Vec<u64>,
}

#[derive(Default)]
struct JournalState {
    host: String,
    streams: HashMap<String, Vec<StoredEvent>>,
    metadata: HashMap<String, Value>,
    groups: HashMap<(String, String), Group>,
    fail_writes_with: Option<u16>,
}

/// Shared handle to the fake journal's state.
#[derive(Clone, Default)]
pub struct Journal {
    inner: Arc<Mutex<JournalState>>,
}

impl Journal {
    /// Preload a stream with events, bypassing the write endpoint.
    pub fn seed(&self, stream: &str, events: Vec<(&str, Value)>) {
        let mut state = self.inner.lock().unwrap();
        let entries = state.streams.entry(stream.to_string()).or_default();
        for (index, (event_type, data)) in events.into_iter().enumerate() {
            entries.push(StoredEvent {
                event_id: format!("seeded-{index}"),
                event_type: event_type.to_string(),
                data,
            });
        }
    }

    /// All recorded events of a stream, in append order.
    pub fn events(&self, stream: &str) -> Vec<StoredEvent> {
        let state = self.inner.lock().unwrap();
        state.streams.get(stream).cloned().unwrap_or_default()
    }

    /// Recorded metadata document for a stream, if any.
    pub fn metadata(&self, stream: &str) -> Option<Value> {
        let state = self.inner.lock().unwrap();
        state.metadata.get(stream).cloned()
    }

    /// Whether a subscription group exists.
    pub fn has_group(&self, stream: &str, group: &str) -> bool {
        let state = self.inner.lock().unwrap();
        state
            .groups
            .contains_key(&(stream.to_string(), group.to_string()))
    }

    /// Event numbers currently parked for a group.
    pub fn parked(&self, stream: &str, group: &str) -> Vec<u64> {
        let state = self.inner.lock().unwrap();
        state
            .groups
            .get(&(stream.to_string(), group.to_string()))
            .map(|g| g.parked.clone())
            .unwrap_or_default()
    }

    /// Make every append fail with the given status.
    pub fn fail_writes(&self, status: u16) {
        self.inner.lock().unwrap().fail_writes_with = Some(status);
    }

    /// Restore normal append behaviour.
    pub fn heal_writes(&self) {
        self.inner.lock().unwrap().fail_writes_with = None;
    }
}

/// Bind on port 0, spawn the server, and return its base URL.
pub async fn start_journal() -> (String, Journal) {
    let journal = Journal::default();
    let app = router(journal.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    journal.inner.lock().unwrap().host = format!("http://{addr}/");
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), journal)
}

fn router(journal: Journal) -> Router {
    Router::new()
        .route("/streams/:stream", get(read_root).post(append))
        .route("/streams/:stream/metadata", post(write_metadata))
        .route("/streams/:stream/:pos/:dir/:count", get(read_range))
        .route(
            "/subscriptions/:stream/:group",
            put(create_group).get(read_batch_default),
        )
        .route("/subscriptions/:stream/:group/:count", get(read_batch))
        .route("/subscriptions/:stream/:group/ack", post(ack_bulk))
        .route("/subscriptions/:stream/:group/nack", post(nack_bulk))
        .route("/subscriptions/:stream/:group/ack/:n", post(ack_one))
        .route("/subscriptions/:stream/:group/nack/:n", post(nack_one))
        .route(
            "/subscriptions/:stream/:group/replayParked",
            post(replay_parked),
        )
        .with_state(journal)
}

// --- stream feed handlers ---

fn entry_json(host: &str, stream: &str, number: u64, event: &StoredEvent) -> Value {
    json!({
        "title": format!("{number}@{stream}"),
        "id": format!("{host}streams/{stream}/{number}"),
        "eventId": event.event_id,
        "eventNumber": number,
        "eventType": event.event_type,
        "data": event.data.to_string(),
        "streamId": stream,
        "isJson": true,
        "summary": event.event_type,
        "updated": "2019-04-01T00:00:00Z",
        "author": { "name": "journal" },
        "links": []
    })
}

/// Build a feed page for the window `[lo, hi]` (inclusive, may be empty).
///
/// Entries are rendered newest-first; clients must sort. Navigation links
/// follow the reading direction: `previous` continues the walk, `next`
/// goes back the way the reader came, both only where such a page exists.
#[allow(clippy::too_many_arguments)]
fn page_json(
    host: &str,
    stream: &str,
    events: &[StoredEvent],
    window: Option<(u64, u64)>,
    direction: &str,
    pos_label: &str,
    count: u64,
) -> Value {
    let last = events.len() as i64 - 1;
    let mut entries = Vec::new();
    let mut links = vec![
        json!({
            "uri": format!("{host}streams/{stream}/{pos_label}/{direction}/{count}"),
            "relation": "self"
        }),
        json!({
            "uri": format!("{host}streams/{stream}/head/backward/{count}"),
            "relation": "first"
        }),
        json!({
            "uri": format!("{host}streams/{stream}/0/forward/{count}"),
            "relation": "last"
        }),
    ];

    if let Some((lo, hi)) = window {
        for number in (lo..=hi).rev() {
            entries.push(entry_json(host, stream, number, &events[number as usize]));
        }

        if direction == "backward" {
            // Continue toward older events; an exhausted window still gets
            // a previous link so readers terminate on emptiness, not error.
            links.push(json!({
                "uri": format!("{host}streams/{stream}/{}/backward/{count}", lo as i64 - 1),
                "relation": "previous"
            }));
            if (hi as i64) < last {
                links.push(json!({
                    "uri": format!("{host}streams/{stream}/{}/backward/{count}", hi + count),
                    "relation": "next"
                }));
            }
        } else {
            // Continue toward newer events.
            links.push(json!({
                "uri": format!("{host}streams/{stream}/{}/forward/{count}", hi + 1),
                "relation": "previous"
            }));
            if lo > 0 {
                links.push(json!({
                    "uri": format!("{host}streams/{stream}/{}/forward/{count}", lo.saturating_sub(count)),
                    "relation": "next"
                }));
            }
        }
    }

    json!({
        "title": format!("Event stream '{stream}'"),
        "id": format!("{host}streams/{stream}"),
        "streamId": stream,
        "headOfStream": window.map(|(_, hi)| hi as i64 == last).unwrap_or(true),
        "eTag": "0;248368668",
        "updated": "2019-04-01T00:00:00Z",
        "author": { "name": "journal" },
        "links": links,
        "entries": entries
    })
}

fn backward_window(events_len: usize, pos: i64, count: u64) -> Option<(u64, u64)> {
    if events_len == 0 || pos < 0 {
        return None;
    }
    let last = events_len as i64 - 1;
    let hi = pos.min(last);
    if hi < 0 {
        return None;
    }
    let lo = (hi - count as i64 + 1).max(0);
    Some((lo as u64, hi as u64))
}

fn forward_window(events_len: usize, pos: i64, count: u64) -> Option<(u64, u64)> {
    let last = events_len as i64 - 1;
    if events_len == 0 || pos < 0 || pos > last {
        return None;
    }
    let hi = (pos + count as i64 - 1).min(last);
    Some((pos as u64, hi as u64))
}

async fn read_root(State(journal): State<Journal>, Path(stream): Path<String>) -> Response {
    let state = journal.inner.lock().unwrap();
    if !state.streams.contains_key(&stream) && !state.metadata.contains_key(&stream) {
        return StatusCode::NOT_FOUND.into_response();
    }
    let events = state.streams.get(&stream).cloned().unwrap_or_default();
    let window = backward_window(events.len(), events.len() as i64 - 1, 20);
    let body = page_json(&state.host, &stream, &events, window, "backward", "head", 20);
    Json(body).into_response()
}

async fn read_range(
    State(journal): State<Journal>,
    Path((stream, pos, dir, count)): Path<(String, String, String, u64)>,
) -> Response {
    let state = journal.inner.lock().unwrap();
    if !state.streams.contains_key(&stream) && !state.metadata.contains_key(&stream) {
        return StatusCode::NOT_FOUND.into_response();
    }
    let events = state.streams.get(&stream).cloned().unwrap_or_default();

    let position: i64 = if pos == "head" {
        events.len() as i64 - 1
    } else {
        match pos.parse() {
            Ok(n) => n,
            Err(_) => return StatusCode::BAD_REQUEST.into_response(),
        }
    };

    let window = match dir.as_str() {
        "backward" => backward_window(events.len(), position, count),
        "forward" => forward_window(events.len(), position, count),
        _ => return StatusCode::BAD_REQUEST.into_response(),
    };

    let body = page_json(&state.host, &stream, &events, window, &dir, &pos, count);
    Json(body).into_response()
}

async fn append(
    State(journal): State<Journal>,
    Path(stream): Path<String>,
    body: String,
) -> Response {
    let mut state = journal.inner.lock().unwrap();
    if let Some(status) = state.fail_writes_with {
        return StatusCode::from_u16(status).unwrap().into_response();
    }

    let events: Vec<Value> = match serde_json::from_str(&body) {
        Ok(events) => events,
        Err(_) => return StatusCode::BAD_REQUEST.into_response(),
    };

    let mut appended = Vec::new();
    for event in &events {
        let event_type = event["eventType"].as_str().unwrap_or_default();
        let event_id = event["eventId"].as_str().unwrap_or_default();
        if event_type.is_empty() || event_id.is_empty() {
            return StatusCode::BAD_REQUEST.into_response();
        }
        appended.push(StoredEvent {
            event_id: event_id.to_string(),
            event_type: event_type.to_string(),
            data: event["data"].clone(),
        });
    }

    // The whole batch lands or none of it does.
    let entries = state.streams.entry(stream.clone()).or_default();
    let first_new = entries.len() as u64;
    let new_count = appended.len() as u64;
    entries.extend(appended);

    // Feed new deliveries into every group on this stream.
    for ((group_stream, _), group) in state.groups.iter_mut() {
        if group_stream == &stream {
            group.available.extend(first_new..first_new + new_count);
        }
    }

    StatusCode::CREATED.into_response()
}

async fn write_metadata(
    State(journal): State<Journal>,
    Path(stream): Path<String>,
    body: String,
) -> Response {
    let mut state = journal.inner.lock().unwrap();
    let events: Vec<Value> = match serde_json::from_str(&body) {
        Ok(events) => events,
        Err(_) => return StatusCode::BAD_REQUEST.into_response(),
    };
    let Some(event) = events.first() else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    state.metadata.insert(stream.clone(), event["data"].clone());
    state.streams.entry(stream).or_default();
    StatusCode::CREATED.into_response()
}

// --- subscription handlers ---

async fn create_group(
    State(journal): State<Journal>,
    Path((stream, group)): Path<(String, String)>,
    Json(settings): Json<Value>,
) -> Response {
    let mut state = journal.inner.lock().unwrap();
    let key = (stream.clone(), group);
    if state.groups.contains_key(&key) {
        return StatusCode::CONFLICT.into_response();
    }

    let start_from = settings["startFrom"].as_u64().unwrap_or(0);
    let total = state
        .streams
        .get(&stream)
        .map(|events| events.len() as u64)
        .unwrap_or(0);
    state.groups.insert(
        key,
        Group {
            available: (start_from..total).collect(),
            parked: Vec::new(),
        },
    );
    StatusCode::CREATED.into_response()
}

fn batch_json(
    host: &str,
    stream: &str,
    group: &str,
    count: u64,
    events: &[StoredEvent],
    delivered: &[u64],
) -> Value {
    let base = format!("{host}subscriptions/{stream}/{group}");
    let ids = delivered
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(",");

    // Newest-first on the wire; clients must sort ascending.
    let entries: Vec<Value> = delivered
        .iter()
        .rev()
        .map(|&number| {
            let event = &events[number as usize];
            json!({
                "title": format!("{number}@{stream}"),
                "id": format!("{host}streams/{stream}/{number}"),
                "eventId": event.event_id,
                "eventNumber": number,
                "eventType": event.event_type,
                "data": event.data.to_string(),
                "streamId": stream,
                "summary": event.event_type,
                "links": [
                    { "uri": format!("{base}/ack/{number}"), "relation": "ack" },
                    { "uri": format!("{base}/nack/{number}"), "relation": "nack" }
                ]
            })
        })
        .collect();

    json!({
        "title": format!("{stream}::{group}"),
        "id": format!("{base}/{count}"),
        "updated": "2019-04-01T00:00:00Z",
        "author": { "name": "journal" },
        "links": [
            { "uri": format!("{base}/ack?ids={ids}"), "relation": "ackAll" },
            { "uri": format!("{base}/nack?ids={ids}"), "relation": "nackAll" },
            { "uri": format!("{base}/{count}"), "relation": "previous" },
            { "uri": format!("{base}/{count}"), "relation": "self" }
        ],
        "entries": entries
    })
}

fn deliver(journal: &Journal, stream: &str, group: &str, count: u64) -> Response {
    let mut state = journal.inner.lock().unwrap();
    let host = state.host.clone();
    let key = (stream.to_string(), group.to_string());
    let Some(group_state) = state.groups.get_mut(&key) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let mut delivered = Vec::new();
    while delivered.len() < count as usize {
        match group_state.available.pop_front() {
            Some(number) => delivered.push(number),
            None => break,
        }
    }

    let events = state.streams.get(stream).cloned().unwrap_or_default();
    Json(batch_json(&host, stream, group, count, &events, &delivered)).into_response()
}

async fn read_batch_default(
    State(journal): State<Journal>,
    Path((stream, group)): Path<(String, String)>,
) -> Response {
    deliver(&journal, &stream, &group, 20)
}

async fn read_batch(
    State(journal): State<Journal>,
    Path((stream, group, count)): Path<(String, String, u64)>,
) -> Response {
    deliver(&journal, &stream, &group, count)
}

#[derive(serde::Deserialize, Default)]
struct DispositionQuery {
    #[serde(default)]
    ids: String,
    #[serde(default)]
    action: Option<String>,
}

fn apply_nack(group: &mut Group, numbers: &[u64], action: &str) -> Option<()> {
    match action {
        "Park" => group.parked.extend(numbers),
        "Retry" | "Stop" => {
            for &number in numbers.iter().rev() {
                group.available.push_front(number);
            }
        }
        "Skip" => {}
        _ => return None,
    }
    Some(())
}

async fn ack_bulk(
    State(journal): State<Journal>,
    Path((stream, group)): Path<(String, String)>,
    Query(_query): Query<DispositionQuery>,
) -> Response {
    let state = journal.inner.lock().unwrap();
    if !state.groups.contains_key(&(stream, group)) {
        return StatusCode::NOT_FOUND.into_response();
    }
    // Delivered messages were already removed from the queue; an ack is final.
    StatusCode::ACCEPTED.into_response()
}

async fn nack_bulk(
    State(journal): State<Journal>,
    Path((stream, group)): Path<(String, String)>,
    Query(query): Query<DispositionQuery>,
) -> Response {
    let mut state = journal.inner.lock().unwrap();
    let Some(group_state) = state.groups.get_mut(&(stream, group)) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let numbers: Vec<u64> = query
        .ids
        .split(',')
        .filter_map(|id| id.parse().ok())
        .collect();
    let action = query.action.as_deref().unwrap_or("Retry");
    match apply_nack(group_state, &numbers, action) {
        Some(()) => StatusCode::ACCEPTED.into_response(),
        None => StatusCode::BAD_REQUEST.into_response(),
    }
}

async fn ack_one(
    State(journal): State<Journal>,
    Path((stream, group, _n)): Path<(String, String, u64)>,
) -> Response {
    let state = journal.inner.lock().unwrap();
    if !state.groups.contains_key(&(stream, group)) {
        return StatusCode::NOT_FOUND.into_response();
    }
    StatusCode::ACCEPTED.into_response()
}

async fn nack_one(
    State(journal): State<Journal>,
    Path((stream, group, n)): Path<(String, String, u64)>,
    Query(query): Query<DispositionQuery>,
) -> Response {
    let mut state = journal.inner.lock().unwrap();
    let Some(group_state) = state.groups.get_mut(&(stream, group)) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let action = query.action.as_deref().unwrap_or("Retry");
    match apply_nack(group_state, &[n], action) {
        Some(()) => StatusCode::ACCEPTED.into_response(),
        None => StatusCode::BAD_REQUEST.into_response(),
    }
}

async fn replay_parked(
    State(journal): State<Journal>,
    Path((stream, group)): Path<(String, String)>,
) -> Response {
    let mut state = journal.inner.lock().unwrap();
    let Some(group_state) = state.groups.get_mut(&(stream, group)) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let mut parked = std::mem::take(&mut group_state.parked);
    parked.sort_unstable();
    group_state.available.extend(parked);
    StatusCode::ACCEPTED.into_response()
}
