#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use serde_json::{json, Value};
use snap_core::{ItemId, Source};
use snap_engine::{
    BatchDispatcher, DispatchError, DispatchOp, ItemPayload, ItemProcessor, ObjectStore,
    PageRenderer, ProcessError, RenderError, StoreError,
};

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(snap_logging::initialize_for_tests);
}

pub fn id(raw: &str) -> ItemId {
    ItemId::parse(raw).unwrap()
}

pub fn ids(raw: &[&str]) -> Vec<ItemId> {
    raw.iter().map(|r| id(r)).collect()
}

pub fn payload_for(item_id: &ItemId) -> ItemPayload {
    match json!({ "id": item_id.as_str() }) {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

/// Infinite-scroll stand-in: every `render_more` reveals one more page of
/// hrefs, and everything revealed stays rendered.
pub struct ScriptedRenderer {
    pages: Vec<Vec<String>>,
    revealed: usize,
    fail_open: bool,
    fail_render_more_at: Option<usize>,
    pub opened: Option<String>,
    pub closed: bool,
}

impl ScriptedRenderer {
    pub fn new(pages: &[&[&str]]) -> Self {
        Self {
            pages: pages
                .iter()
                .map(|page| page.iter().map(|href| href.to_string()).collect())
                .collect(),
            revealed: 0,
            fail_open: false,
            fail_render_more_at: None,
            opened: None,
            closed: false,
        }
    }

    /// Snap hrefs for the given ids, one page.
    pub fn single_page(raw_ids: &[&str]) -> Self {
        let hrefs: Vec<String> = raw_ids.iter().map(|i| format!("/snap/{i}?gf=A")).collect();
        Self {
            pages: vec![hrefs],
            ..Self::new(&[])
        }
    }

    pub fn never_ready() -> Self {
        Self {
            fail_open: true,
            ..Self::new(&[])
        }
    }

    /// `render_more` fails once `page` pages are revealed.
    pub fn failing_after(mut self, page: usize) -> Self {
        self.fail_render_more_at = Some(page);
        self
    }
}

#[async_trait::async_trait]
impl PageRenderer for ScriptedRenderer {
    async fn open(&mut self, url: &str) -> Result<(), RenderError> {
        self.opened = Some(url.to_string());
        if self.fail_open {
            return Err(RenderError::NotReady("no item links".to_string()));
        }
        self.revealed = 1.min(self.pages.len());
        Ok(())
    }

    async fn item_links(&mut self) -> Result<Vec<String>, RenderError> {
        Ok(self.pages[..self.revealed].concat())
    }

    async fn render_more(&mut self) -> Result<(), RenderError> {
        if self.fail_render_more_at == Some(self.revealed) {
            return Err(RenderError::NotReady("scroll container detached".to_string()));
        }
        self.revealed = (self.revealed + 1).min(self.pages.len());
        Ok(())
    }

    async fn close(&mut self) {
        self.closed = true;
    }
}

/// Succeeds with a minimal payload unless the id is listed as failing.
pub struct FakeProcessor {
    failing: Vec<ItemId>,
    delay: Duration,
    pub calls: Mutex<Vec<ItemId>>,
    in_flight: Mutex<usize>,
    pub max_in_flight: Mutex<usize>,
}

impl FakeProcessor {
    pub fn new() -> Self {
        Self {
            failing: Vec::new(),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
            in_flight: Mutex::new(0),
            max_in_flight: Mutex::new(0),
        }
    }

    pub fn failing(mut self, raw_ids: &[&str]) -> Self {
        self.failing = ids(raw_ids);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait::async_trait]
impl ItemProcessor for FakeProcessor {
    async fn process(&self, item_id: &ItemId) -> Result<ItemPayload, ProcessError> {
        self.calls.lock().unwrap().push(item_id.clone());
        {
            let mut in_flight = self.in_flight.lock().unwrap();
            *in_flight += 1;
            let mut max = self.max_in_flight.lock().unwrap();
            *max = (*max).max(*in_flight);
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        *self.in_flight.lock().unwrap() -= 1;

        if self.failing.contains(item_id) {
            return Err(ProcessError::Parse {
                item_id: item_id.clone(),
                reason: "detail record not found".to_string(),
            });
        }
        Ok(payload_for(item_id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create(String),
    Send { batch_id: String, ids: Vec<String> },
    Complete {
        batch_id: String,
        total: usize,
        error: Option<String>,
    },
}

/// Records every call; can be told to fail a given operation.
#[derive(Default)]
pub struct RecordingDispatcher {
    pub calls: Mutex<Vec<Call>>,
    captured_at: Mutex<Vec<String>>,
    fail_create: bool,
    fail_send_number: Option<usize>,
    fail_complete: bool,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    /// Fails the n-th `send_chunk` call, counting from 1.
    pub fn failing_send(mut self, number: usize) -> Self {
        self.fail_send_number = Some(number);
        self
    }

    pub fn failing_complete(mut self) -> Self {
        self.fail_complete = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn sends(&self) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Send { ids, .. } => Some(ids),
                _ => None,
            })
            .collect()
    }

    /// `captured_at` of every `send_chunk` call, in call order.
    pub fn captured_at(&self) -> Vec<String> {
        self.captured_at.lock().unwrap().clone()
    }

    pub fn completes(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, Call::Complete { .. }))
            .collect()
    }
}

#[async_trait::async_trait]
impl BatchDispatcher for RecordingDispatcher {
    async fn create_batch(&self, source: &Source) -> Result<String, DispatchError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Create(source.as_str().to_string()));
        if self.fail_create {
            return Err(DispatchError::Status {
                op: DispatchOp::Create,
                status: 503,
            });
        }
        Ok("batch-1".to_string())
    }

    async fn send_chunk(
        &self,
        batch_id: &str,
        items: &[ItemPayload],
        captured_at: &str,
    ) -> Result<(), DispatchError> {
        self.captured_at
            .lock()
            .unwrap()
            .push(captured_at.to_string());
        let ids = items
            .iter()
            .filter_map(|item| item.get("id").and_then(Value::as_str))
            .map(str::to_string)
            .collect();
        let mut calls = self.calls.lock().unwrap();
        calls.push(Call::Send {
            batch_id: batch_id.to_string(),
            ids,
        });
        let number = calls
            .iter()
            .filter(|call| matches!(call, Call::Send { .. }))
            .count();
        if self.fail_send_number == Some(number) {
            return Err(DispatchError::Status {
                op: DispatchOp::Send,
                status: 500,
            });
        }
        Ok(())
    }

    async fn complete_batch(
        &self,
        batch_id: &str,
        total_count: usize,
        _completed_at: &str,
        error_summary: Option<&str>,
    ) -> Result<(), DispatchError> {
        self.calls.lock().unwrap().push(Call::Complete {
            batch_id: batch_id.to_string(),
            total: total_count,
            error: error_summary.map(str::to_string),
        });
        if self.fail_complete {
            return Err(DispatchError::Status {
                op: DispatchOp::Complete,
                status: 502,
            });
        }
        Ok(())
    }
}

/// In-memory object store counting writes.
#[derive(Default)]
pub struct MemoryStore {
    pub objects: Mutex<HashMap<String, (Vec<u8>, String)>>,
    pub puts: Mutex<usize>,
}

impl MemoryStore {
    pub fn with_object(key: &str) -> Self {
        let store = Self::default();
        store
            .objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (b"old".to_vec(), "image/jpeg".to_string()));
        store
    }

    pub fn put_count(&self) -> usize {
        *self.puts.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl ObjectStore for MemoryStore {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.objects.lock().unwrap().contains_key(key))
    }

    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StoreError> {
        *self.puts.lock().unwrap() += 1;
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (bytes, content_type.to_string()));
        Ok(())
    }
}

pub fn shared<T>(value: T) -> Arc<T> {
    Arc::new(value)
}
