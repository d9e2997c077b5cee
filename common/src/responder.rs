//! Hand-off between HTTP server threads and the monitor loop.
//!
//! Server handlers never touch the reading. They queue a [`PageRequest`] and
//! wait for the loop thread to render the page and send it back, so all state
//! stays on the loop thread.

use std::{
    sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender, TrySendError},
    time::Duration,
};

use thiserror::Error;

pub const PAGE_CONTENT_TYPE: &str = "text/html";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ResponderError {
    #[error("too many page requests waiting")]
    Busy,
    #[error("monitor loop did not answer within {0:?}")]
    Timeout(Duration),
    #[error("monitor loop is gone")]
    Closed,
}

#[derive(Debug)]
pub struct PageRequest {
    reply: Sender<String>,
}

impl PageRequest {
    pub fn respond(self, body: String) {
        // The client may have timed out and dropped its receiver.
        let _ = self.reply.send(body);
    }
}

/// Server-side handle; cheap to clone into every handler.
#[derive(Debug, Clone)]
pub struct PageClient {
    tx: SyncSender<PageRequest>,
}

impl PageClient {
    /// Blocks the calling server thread until the loop renders the page.
    pub fn fetch(&self, timeout: Duration) -> Result<String, ResponderError> {
        let (reply, rx) = mpsc::channel();
        self.tx
            .try_send(PageRequest { reply })
            .map_err(|err| match err {
                TrySendError::Full(_) => ResponderError::Busy,
                TrySendError::Disconnected(_) => ResponderError::Closed,
            })?;

        rx.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => ResponderError::Timeout(timeout),
            RecvTimeoutError::Disconnected => ResponderError::Closed,
        })
    }
}

/// Loop-side queue of pending page requests.
#[derive(Debug)]
pub struct PageRequests {
    rx: Receiver<PageRequest>,
    served: u64,
}

impl PageRequests {
    /// Answers at most one pending request. Never blocks; `render` only runs
    /// when a request is actually waiting.
    pub fn service_pending<F>(&mut self, render: F) -> bool
    where
        F: FnOnce() -> String,
    {
        match self.rx.try_recv() {
            Ok(request) => {
                request.respond(render());
                self.served = self.served.saturating_add(1);
                true
            }
            Err(_) => false,
        }
    }

    pub fn served(&self) -> u64 {
        self.served
    }
}

pub fn page_channel(capacity: usize) -> (PageClient, PageRequests) {
    let (tx, rx) = mpsc::sync_channel(capacity.max(1));
    (PageClient { tx }, PageRequests { rx, served: 0 })
}
