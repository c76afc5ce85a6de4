//! Scripted collaborators for unit tests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_LENGTH, HeaderMap, HeaderValue};
use tokio::sync::{Notify, mpsc, watch};
use url::Url;

use crate::download::{DownloadError, HttpResponse, HttpTransport, WorkerEvent};
use crate::job::JobEntry;
use crate::store::{JobStore, MemoryJobStore, StoreError};

const WAIT: Duration = Duration::from_secs(5);

/// Sender half of a scripted response body. Dropping it ends the body.
pub(crate) type BodySender = mpsc::UnboundedSender<Result<Bytes, DownloadError>>;

enum Reply {
    Respond {
        status: u16,
        headers: HeaderMap,
        body: mpsc::UnboundedReceiver<Result<Bytes, DownloadError>>,
    },
    Fail(String),
    Hang,
}

/// Transport that answers each GET with the next scripted reply for its URL.
#[derive(Default)]
pub(crate) struct FakeTransport {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    requests: Mutex<HashMap<String, usize>>,
    requested: Notify,
}

fn key(url: &str) -> String {
    Url::parse(url).map_or_else(|_| url.to_string(), String::from)
}

impl FakeTransport {
    fn push(&self, url: &str, reply: Reply) {
        self.replies
            .lock()
            .unwrap()
            .entry(key(url))
            .or_default()
            .push_back(reply);
    }

    /// Scripts a response whose body is fed through the returned sender.
    pub(crate) fn respond(&self, url: &str, status: u16, headers: HeaderMap) -> BodySender {
        let (tx, rx) = mpsc::unbounded_channel();
        self.push(
            url,
            Reply::Respond {
                status,
                headers,
                body: rx,
            },
        );
        tx
    }

    /// Scripts a transport failure before headers.
    pub(crate) fn fail(&self, url: &str, message: &str) {
        self.push(url, Reply::Fail(message.to_string()));
    }

    /// Scripts a request that never receives headers.
    pub(crate) fn hang(&self, url: &str) {
        self.push(url, Reply::Hang);
    }

    /// Number of GETs issued for `url`.
    pub(crate) fn request_count(&self, url: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .get(&key(url))
            .copied()
            .unwrap_or(0)
    }

    /// Waits until at least one GET for `url` has been issued.
    pub(crate) async fn wait_for_request(&self, url: &str) {
        tokio::time::timeout(WAIT, async {
            loop {
                let notified = self.requested.notified();
                if self.request_count(url) > 0 {
                    return;
                }
                notified.await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("no request for {url}"));
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn get(&self, url: &Url) -> Result<HttpResponse, DownloadError> {
        let reply = self
            .replies
            .lock()
            .unwrap()
            .get_mut(url.as_str())
            .and_then(VecDeque::pop_front);
        *self
            .requests
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default() += 1;
        self.requested.notify_waiters();

        match reply {
            None => Err(DownloadError::transport(url.as_str(), "no scripted reply")),
            Some(Reply::Fail(message)) => Err(DownloadError::transport(url.as_str(), message)),
            Some(Reply::Hang) => std::future::pending().await,
            Some(Reply::Respond {
                status,
                headers,
                body,
            }) => {
                let reason = StatusCode::from_u16(status)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or_default()
                    .to_string();
                let body = stream::unfold(body, |mut rx| async move {
                    rx.recv().await.map(|item| (item, rx))
                });
                Ok(HttpResponse {
                    status,
                    reason,
                    headers,
                    body: Box::pin(body),
                })
            }
        }
    }
}

/// Headers carrying only `Content-Length`.
pub(crate) fn content_length_headers(length: u64) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
    headers
}

/// Receives the next worker event or panics after a timeout.
pub(crate) async fn recv_event(events: &mut mpsc::UnboundedReceiver<WorkerEvent>) -> WorkerEvent {
    tokio::time::timeout(WAIT, events.recv())
        .await
        .expect("timed out waiting for worker event")
        .expect("worker event channel closed")
}

/// Memory store that also keeps every list written to it.
#[derive(Default)]
pub(crate) struct RecordingJobStore {
    inner: MemoryJobStore,
    writes: Mutex<Vec<Vec<JobEntry>>>,
}

impl RecordingJobStore {
    pub(crate) fn new(entries: Vec<JobEntry>) -> Self {
        Self {
            inner: MemoryJobStore::new(entries),
            writes: Mutex::new(Vec::new()),
        }
    }

    /// The state of `url` in every write, in order.
    pub(crate) fn states_for(&self, url: &str) -> Vec<Option<String>> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .filter_map(|list| list.iter().find(|entry| entry.url == url))
            .map(|entry| entry.state.clone())
            .collect()
    }

    /// Number of writes so far.
    pub(crate) fn write_count(&self) -> usize {
        self.writes.lock().unwrap().len()
    }

    /// Replaces the list as an external editor would, without recording.
    pub(crate) fn edit(&self, entries: Vec<JobEntry>) {
        self.inner.write(entries).unwrap();
    }
}

impl JobStore for RecordingJobStore {
    fn read(&self) -> Vec<JobEntry> {
        self.inner.read()
    }

    fn write(&self, entries: Vec<JobEntry>) -> Result<(), StoreError> {
        self.writes.lock().unwrap().push(entries.clone());
        self.inner.write(entries)
    }

    fn subscribe(&self) -> watch::Receiver<Vec<JobEntry>> {
        self.inner.subscribe()
    }
}
