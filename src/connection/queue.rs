//! In-flight request queue coordinating the writer and the reader.
//!
//! Requests enter at the tail in `Staged` state, are gathered into write
//! batches by the writer and matched against parsed replies by the reader.
//! All state lives behind one mutex; no lock is held across a suspension
//! point.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use bytes::{BufMut, Bytes, BytesMut};
use tokio::sync::{mpsc, Notify};

use crate::{
    error::SharedError,
    request::Request,
    resp3::Node,
};

/// One parsed top-level reply handed from the reader to a request.
#[derive(Clone, Debug)]
pub(crate) struct ReplyChunk {
    /// Flat node sequence of the reply.
    pub nodes: Vec<Node>,
    /// Bytes the reply occupied on the wire.
    pub read_size: usize,
}

/// Events delivered to the future awaiting a request.
#[derive(Debug)]
pub(crate) enum QueueEvent {
    /// One of the request's replies arrived.
    Reply(ReplyChunk),
    /// Every expected reply has been consumed (or none was expected and
    /// the request has been written).
    Completed,
    /// The request was cancelled before completion.
    Cancelled(SharedError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EntryState {
    Staged,
    Writing,
    Written,
    Completed,
    Cancelled,
}

#[derive(Debug)]
struct Entry {
    id: u64,
    payload: Bytes,
    remaining: usize,
    state: EntryState,
    coalesce: bool,
    retry_on_cancel: bool,
    contains_quit: bool,
    events: mpsc::UnboundedSender<QueueEvent>,
}

#[derive(Debug, Default)]
struct Inner {
    entries: VecDeque<Entry>,
    next_id: u64,
    quit_written: bool,
}

/// A batch of staged requests the writer may emit as one write.
#[derive(Debug, Default)]
pub(crate) struct WriteBatch {
    ids: Vec<u64>,
    payload: BytesMut,
}

impl WriteBatch {
    /// True when there is nothing to write.
    pub(crate) fn is_empty(&self) -> bool { self.ids.is_empty() }

    /// The concatenated wire bytes of the batch.
    pub(crate) fn payload(&self) -> &[u8] { &self.payload }

    /// Number of requests in the batch.
    pub(crate) fn len(&self) -> usize { self.ids.len() }
}

/// FIFO of in-flight requests, shared between callers and the engine.
#[derive(Clone, Debug, Default)]
pub(crate) struct RequestQueue {
    inner: Arc<Mutex<Inner>>,
    writer_wake: Arc<Notify>,
}

impl RequestQueue {
    pub(crate) fn new() -> Self { Self::default() }

    /// Place `req` at the tail and return the event stream its future
    /// consumes. A request carrying hello priority jumps ahead of every
    /// entry still waiting to be written.
    pub(crate) fn enqueue(&self, req: &Request) -> mpsc::UnboundedReceiver<QueueEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        {
            let mut inner = self.inner.lock().expect("queue poisoned");
            inner.next_id += 1;
            let entry = Entry {
                id: inner.next_id,
                payload: Bytes::copy_from_slice(req.payload()),
                remaining: req.expected_responses(),
                state: EntryState::Staged,
                coalesce: req.config().coalesce,
                retry_on_cancel: req.config().retry_on_cancel,
                contains_quit: req.contains_quit(),
                events: tx,
            };
            if req.has_hello_priority() {
                let at = inner
                    .entries
                    .iter()
                    .position(|e| e.state == EntryState::Staged)
                    .unwrap_or(inner.entries.len());
                inner.entries.insert(at, entry);
            } else {
                inner.entries.push_back(entry);
            }
        }
        self.writer_wake.notify_one();
        rx
    }

    /// Wait until new staged work may be available.
    pub(crate) async fn wait_for_work(&self) { self.writer_wake.notified().await; }

    /// Wake the writer; used when a fresh connection epoch begins with
    /// entries already staged.
    pub(crate) fn kick_writer(&self) { self.writer_wake.notify_one(); }

    /// Gather the contiguous run of staged requests the writer may emit,
    /// marking them `Writing`.
    ///
    /// When coalescing is off (globally or on the head request) the run is
    /// a single request.
    pub(crate) fn next_to_write(&self, coalesce_default: bool) -> WriteBatch {
        let mut inner = self.inner.lock().expect("queue poisoned");
        let mut batch = WriteBatch::default();
        for entry in inner.entries.iter_mut() {
            if entry.state != EntryState::Staged {
                continue;
            }
            let coalesce = coalesce_default && entry.coalesce;
            if !coalesce && !batch.is_empty() {
                break;
            }
            entry.state = EntryState::Writing;
            batch.ids.push(entry.id);
            batch.payload.put_slice(&entry.payload);
            if !coalesce {
                break;
            }
        }
        batch
    }

    /// Advance a written batch to `Written`. Requests expecting no reply
    /// complete here so the writer can proceed without ambiguity.
    pub(crate) fn mark_written(&self, batch: &WriteBatch) {
        let mut inner = self.inner.lock().expect("queue poisoned");
        for &id in &batch.ids {
            let Some(at) = inner.entries.iter().position(|e| e.id == id) else {
                continue;
            };
            let (remaining, contains_quit) = {
                let entry = &mut inner.entries[at];
                entry.state = EntryState::Written;
                (entry.remaining, entry.contains_quit)
            };
            if contains_quit {
                inner.quit_written = true;
            }
            if remaining == 0 {
                let entry = &mut inner.entries[at];
                entry.state = EntryState::Completed;
                let _ = entry.events.send(QueueEvent::Completed);
                inner.entries.remove(at);
            }
        }
    }

    /// True when the head request has been written and still waits for at
    /// least one reply. The reader routes frames to the push channel
    /// otherwise.
    pub(crate) fn expects_response(&self) -> bool {
        let inner = self.inner.lock().expect("queue poisoned");
        inner.entries.front().is_some_and(|entry| {
            matches!(entry.state, EntryState::Writing | EntryState::Written)
                && entry.remaining > 0
        })
    }

    /// Deliver one parsed reply to the head request. Returns false when no
    /// request was waiting for it.
    pub(crate) fn on_reply_chunk(&self, chunk: ReplyChunk) -> bool {
        let mut inner = self.inner.lock().expect("queue poisoned");
        let Some(entry) = inner.entries.front_mut() else {
            return false;
        };
        if !matches!(entry.state, EntryState::Writing | EntryState::Written)
            || entry.remaining == 0
        {
            return false;
        }
        entry.remaining -= 1;
        let _ = entry.events.send(QueueEvent::Reply(chunk));
        if entry.remaining == 0 {
            entry.state = EntryState::Completed;
            let _ = entry.events.send(QueueEvent::Completed);
            inner.entries.pop_front();
        }
        true
    }

    /// Cancel requests that have not been written yet. Returns how many
    /// were cancelled.
    pub(crate) fn cancel_unwritten(&self, reason: &SharedError) -> usize {
        let mut inner = self.inner.lock().expect("queue poisoned");
        let mut cancelled = 0;
        inner.entries.retain_mut(|entry| {
            if entry.state != EntryState::Staged {
                return true;
            }
            entry.state = EntryState::Cancelled;
            let _ = entry.events.send(QueueEvent::Cancelled(reason.clone()));
            cancelled += 1;
            false
        });
        cancelled
    }

    /// The connection was lost: cancel written requests with `reason` and
    /// unwritten ones unless they opted into surviving the reconnect, in
    /// which case they return to `Staged` for the next epoch.
    pub(crate) fn cancel_on_conn_lost(&self, reason: &SharedError) -> usize {
        let mut inner = self.inner.lock().expect("queue poisoned");
        let mut cancelled = 0;
        inner.entries.retain_mut(|entry| {
            let written = matches!(entry.state, EntryState::Writing | EntryState::Written);
            if !written && entry.retry_on_cancel {
                entry.state = EntryState::Staged;
                return true;
            }
            entry.state = EntryState::Cancelled;
            let _ = entry.events.send(QueueEvent::Cancelled(reason.clone()));
            cancelled += 1;
            false
        });
        cancelled
    }

    /// Cancel every queued request unconditionally. Used when the engine
    /// stops for good and no later epoch can pick survivors up.
    pub(crate) fn cancel_all(&self, reason: &SharedError) -> usize {
        let mut inner = self.inner.lock().expect("queue poisoned");
        let mut cancelled = 0;
        for entry in inner.entries.drain(..) {
            let _ = entry.events.send(QueueEvent::Cancelled(reason.clone()));
            cancelled += 1;
        }
        cancelled
    }

    /// True once a request containing `QUIT` has been written, making a
    /// server-side close the expected termination.
    pub(crate) fn quit_written(&self) -> bool {
        self.inner.lock().expect("queue poisoned").quit_written
    }

    /// Number of queued entries; used by tests and logging.
    pub(crate) fn len(&self) -> usize {
        self.inner.lock().expect("queue poisoned").entries.len()
    }
}
