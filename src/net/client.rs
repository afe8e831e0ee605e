//! # Async Request Client
//!
//! The boundary to the engine's HTTP-style request collaborator.
//!
//! The transport itself is external: implement [`Fetcher`] with whatever
//! actually moves bytes. [`RequestClient`] wraps one fetcher in the
//! lifecycle the engine relies on:
//!
//! - one request at a time; starting while one is pending is
//!   [`WireError::Busy`]
//! - cancellation is cooperative, honored at the task's next suspension
//!   point, and a cancelled task must still be [`RequestClient::join`]ed
//!   before the client is reused — never silently abandoned
//! - completion is posted as a [`ClientEvent`] through a channel for the
//!   owner's event loop to drain, never a direct callback into caller
//!   state
//! - progress is a pair of atomic byte counters the fetcher updates and
//!   any thread may read

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::error::{Result, WireError};
use crate::net::addr::EndpointAddr;

/// One request: a URI and an optional POST body.
#[derive(Debug, Clone)]
pub struct Request {
    pub uri: String,
    pub post: Option<Bytes>,
}

impl Request {
    pub fn get(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            post: None,
        }
    }

    pub fn post(uri: impl Into<String>, body: Bytes) -> Self {
        Self {
            uri: uri.into(),
            post: Some(body),
        }
    }
}

/// A completed response: status code, decoded body, responding peer.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub body: Bytes,
    pub peer: EndpointAddr,
}

/// Byte counters the fetcher updates while a request runs.
#[derive(Debug, Default)]
pub struct Progress {
    received: AtomicU64,
    total: AtomicU64,
}

impl Progress {
    pub fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::Relaxed);
    }

    pub fn add_received(&self, bytes: u64) {
        self.received.fetch_add(bytes, Ordering::Relaxed);
    }

    /// `(received, total)`; total is 0 while unknown.
    pub fn snapshot(&self) -> (u64, u64) {
        (
            self.received.load(Ordering::Relaxed),
            self.total.load(Ordering::Relaxed),
        )
    }

    fn reset(&self) {
        self.received.store(0, Ordering::Relaxed);
        self.total.store(0, Ordering::Relaxed);
    }
}

/// How one request ended.
#[derive(Debug)]
pub enum ClientEvent {
    Completed(Response),
    Failed(WireError),
    Canceled,
}

/// The external transport behind the client.
///
/// Implementations should watch `cancel` at their suspension points and
/// keep `progress` current; both are shared with the owning client.
pub trait Fetcher: Send + Sync + 'static {
    fn fetch(
        &self,
        request: Request,
        progress: Arc<Progress>,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, Result<Response>>;
}

/// Single-request asynchronous client around a [`Fetcher`].
pub struct RequestClient {
    fetcher: Arc<dyn Fetcher>,
    task: Option<JoinHandle<()>>,
    cancel: CancellationToken,
    progress: Arc<Progress>,
    events_tx: mpsc::Sender<ClientEvent>,
    events_rx: Option<mpsc::Receiver<ClientEvent>>,
}

impl RequestClient {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        let (events_tx, events_rx) = mpsc::channel(8);
        Self {
            fetcher,
            task: None,
            cancel: CancellationToken::new(),
            progress: Arc::new(Progress::default()),
            events_tx,
            events_rx: Some(events_rx),
        }
    }

    /// The completion events, as a stream for the owner's event loop.
    ///
    /// May be taken once; `None` afterwards.
    pub fn events(&mut self) -> Option<ReceiverStream<ClientEvent>> {
        self.events_rx.take().map(ReceiverStream::new)
    }

    /// True while a task exists that has not been joined yet.
    pub fn is_busy(&self) -> bool {
        self.task.is_some()
    }

    /// Current progress counters of the running request.
    pub fn progress(&self) -> (u64, u64) {
        self.progress.snapshot()
    }

    /// Start `request` on a fresh task.
    ///
    /// # Errors
    /// [`WireError::Busy`] while a previous task has not been joined,
    /// finished or not: the join-before-reuse rule is enforced here.
    #[instrument(skip(self, request), fields(uri = %request.uri))]
    pub fn start(&mut self, request: Request) -> Result<()> {
        if self.task.is_some() {
            return Err(WireError::Busy);
        }
        self.cancel = CancellationToken::new();
        self.progress.reset();

        let fetcher = Arc::clone(&self.fetcher);
        let progress = Arc::clone(&self.progress);
        let cancel = self.cancel.clone();
        let events = self.events_tx.clone();
        debug!("request started");
        self.task = Some(tokio::spawn(async move {
            let outcome = tokio::select! {
                () = cancel.cancelled() => ClientEvent::Canceled,
                result = fetcher.fetch(request, progress, cancel.clone()) => match result {
                    Ok(response) => ClientEvent::Completed(response),
                    Err(WireError::Canceled) => ClientEvent::Canceled,
                    Err(err) => ClientEvent::Failed(err),
                },
            };
            if events.send(outcome).await.is_err() {
                warn!("request finished but nobody is listening");
            }
        }));
        Ok(())
    }

    /// Ask the running request to stop at its next suspension point.
    ///
    /// The task keeps existing until [`RequestClient::join`] is called.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Await the current task to completion, making the client reusable.
    ///
    /// # Errors
    /// [`WireError::Request`] if the task panicked.
    pub async fn join(&mut self) -> Result<()> {
        if let Some(task) = self.task.take() {
            task.await
                .map_err(|err| WireError::Request(format!("request task failed: {err}")))?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for RequestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestClient")
            .field("busy", &self.is_busy())
            .field("progress", &self.progress.snapshot())
            .finish()
    }
}

// ==========================================
// TESTS
// ==========================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use std::time::Duration;
    use tokio_stream::StreamExt;

    /// Fetcher that reports a canned body after a short, cancellable wait.
    struct CannedFetcher {
        delay: Duration,
    }

    impl Fetcher for CannedFetcher {
        fn fetch(
            &self,
            request: Request,
            progress: Arc<Progress>,
            cancel: CancellationToken,
        ) -> BoxFuture<'static, Result<Response>> {
            let delay = self.delay;
            Box::pin(async move {
                progress.set_total(4);
                tokio::select! {
                    () = cancel.cancelled() => return Err(WireError::Canceled),
                    () = tokio::time::sleep(delay) => {}
                }
                progress.add_received(4);
                Ok(Response {
                    status: 200,
                    body: Bytes::from(request.uri.into_bytes()),
                    peer: "127.0.0.1:80".parse().unwrap(),
                })
            })
        }
    }

    fn client(delay_ms: u64) -> RequestClient {
        RequestClient::new(Arc::new(CannedFetcher {
            delay: Duration::from_millis(delay_ms),
        }))
    }

    #[tokio::test]
    async fn completion_is_delivered_as_an_event() {
        let mut client = client(1);
        let mut events = client.events().unwrap();
        client.start(Request::get("ref/list")).unwrap();
        client.join().await.unwrap();
        match events.next().await.unwrap() {
            ClientEvent::Completed(response) => {
                assert_eq!(response.status, 200);
                assert_eq!(&response.body[..], b"ref/list");
            }
            other => panic!("got {other:?}"),
        }
        assert_eq!(client.progress(), (4, 4));
    }

    #[tokio::test]
    async fn second_start_while_pending_is_busy() {
        let mut client = client(1000);
        client.start(Request::get("a")).unwrap();
        let err = client.start(Request::get("b")).unwrap_err();
        assert!(matches!(err, WireError::Busy), "got {err:?}");
        client.cancel();
        client.join().await.unwrap();
    }

    #[tokio::test]
    async fn cancel_then_join_makes_the_client_reusable() {
        let mut client = client(1000);
        let mut events = client.events().unwrap();
        client.start(Request::get("slow")).unwrap();
        client.cancel();
        client.join().await.unwrap();
        assert!(matches!(events.next().await.unwrap(), ClientEvent::Canceled));

        // Reuse after the join; the fresh token must not be pre-cancelled.
        client.start(Request::get("again")).unwrap();
        assert!(client.is_busy());
        client.cancel();
        client.join().await.unwrap();
        assert!(matches!(events.next().await.unwrap(), ClientEvent::Canceled));
    }

    #[tokio::test]
    async fn finished_task_still_requires_join_before_reuse() {
        let mut client = client(1);
        client.start(Request::get("a")).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let err = client.start(Request::get("b")).unwrap_err();
        assert!(matches!(err, WireError::Busy), "got {err:?}");
        client.join().await.unwrap();
        client.start(Request::get("b")).unwrap();
        client.join().await.unwrap();
    }
}
