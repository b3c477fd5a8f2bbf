//! Test fakes for the pipeline seams and a canned HTTP server.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::error::{AppError, Result};
use crate::models::{ChangeEvent, FeedDocument};
use crate::services::{FeedSource, JobBoard};
use crate::storage::{SyncState, SyncStore};

/// Build a `<jobs>` feed from `(id, status)` pairs.
pub fn feed_of(jobs: &[(&str, &str)]) -> FeedDocument {
    let body: String = jobs
        .iter()
        .map(|(id, status)| format!("<job><id>{id}</id><status>{status}</status></job>"))
        .collect();
    FeedDocument::parse(&format!("<jobs>{body}</jobs>")).unwrap()
}

/// Feed source replaying a queue of responses, then `None`.
#[derive(Default)]
pub struct ScriptedFeed {
    responses: Mutex<VecDeque<Option<FeedDocument>>>,
    calls: AtomicUsize,
}

impl ScriptedFeed {
    pub fn new(responses: Vec<Option<FeedDocument>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedSource for ScriptedFeed {
    async fn fetch(&self) -> Option<FeedDocument> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses.lock().unwrap().pop_front().flatten()
    }
}

/// Job board recording every attempt; ids can be set to fail N times or to
/// be rejected outright.
#[derive(Default)]
pub struct RecordingBoard {
    attempts: Mutex<Vec<String>>,
    failures: Mutex<HashMap<String, usize>>,
    rejections: Mutex<HashMap<String, u16>>,
}

impl RecordingBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `times` attempts for `id`.
    pub fn fail(&self, id: &str, times: usize) {
        self.failures.lock().unwrap().insert(id.to_string(), times);
    }

    /// Reject every attempt for `id` with a client error status.
    pub fn reject(&self, id: &str, status: u16) {
        self.rejections.lock().unwrap().insert(id.to_string(), status);
    }

    /// Attempts made so far, as `kind(id)` strings.
    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobBoard for RecordingBoard {
    async fn apply(&self, event: &ChangeEvent) -> Result<()> {
        self.attempts.lock().unwrap().push(event.to_string());

        let id = event.id().unwrap_or_default();
        if let Some(status) = self.rejections.lock().unwrap().get(id) {
            return Err(AppError::rejected(id, *status, "refused"));
        }

        let mut failures = self.failures.lock().unwrap();
        match failures.get_mut(id) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(AppError::dispatch(id, "HTTP 503"))
            }
            _ => Ok(()),
        }
    }
}

/// Store remembering the last saved state.
#[derive(Default)]
pub struct CapturingStore {
    saved: Mutex<Option<SyncState>>,
}

impl CapturingStore {
    pub fn saved(&self) -> Option<SyncState> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl SyncStore for CapturingStore {
    async fn load_state(&self) -> Result<SyncState> {
        Ok(self.saved().unwrap_or_default())
    }

    async fn save_state(&self, state: &SyncState) -> Result<()> {
        *self.saved.lock().unwrap() = Some(state.clone());
        Ok(())
    }
}

/// Serve a canned HTTP response to every connection on a local port.
///
/// Returns the base URL, e.g. `http://127.0.0.1:40123`.
pub async fn serve_canned(status: u16, body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                if read_request(&mut socket).await.is_err() {
                    return;
                }
                let response = format!(
                    "HTTP/1.1 {status} Canned\r\ncontent-type: text/plain\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{addr}")
}

/// Read one request, headers and body, so closing the socket stays clean.
async fn read_request(socket: &mut TcpStream) -> std::io::Result<()> {
    let mut data = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        data.extend_from_slice(&chunk[..n]);

        if let Some(end) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&data[..end]).to_ascii_lowercase();
            let length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if data.len() >= end + 4 + length {
                return Ok(());
            }
        }
    }
}
