//! Single-consumer request serialization.
//!
//! The resident session must never have more than one command in flight:
//! every stdin write and every result await happens on one worker task
//! that drains requests in arrival order.

use tokio::sync::mpsc;

/// Drains one request at a time, in FIFO order.
pub trait RequestHandler<R>: Send {
    fn handle(&mut self, request: R) -> impl std::future::Future<Output = ()> + Send;
}

/// Handle for submitting requests to a worker task.
///
/// Submissions from any task are serialized; the worker finishes each
/// request before receiving the next.
pub struct RequestQueue<R> {
    tx: mpsc::UnboundedSender<R>,
}

impl<R: Send + 'static> RequestQueue<R> {
    /// Spawn the worker and return the submission handle. The worker exits
    /// when the handle is dropped and the backlog is drained.
    pub fn start<H>(mut handler: H) -> Self
    where
        H: RequestHandler<R> + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                handler.handle(request).await;
            }
        });
        Self { tx }
    }

    /// Enqueue a request. Returns false when the worker is gone.
    pub fn submit(&self, request: R) -> bool {
        self.tx.send(request).is_ok()
    }
}
