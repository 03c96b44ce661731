//! Out-of-band delivery of server push frames.
//!
//! The reader task is the single producer and the caller is the single
//! consumer. The mailbox is bounded: a full queue blocks the reader, which
//! backpressures the whole connection rather than dropping frames. Once the
//! consumer cancels reception, later pushes are discarded and counted
//! instead of delivered.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use tokio::sync::{mpsc, Notify};

use crate::{
    adapter::{replay, ResponseAdapter},
    error::{Error, Result},
    resp3::Node,
};

/// Default mailbox capacity.
pub const DEFAULT_PUSH_CAPACITY: usize = 64;

/// One parsed server push, as its flat node sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PushFrame {
    nodes: Vec<Node>,
    read_size: usize,
}

impl PushFrame {
    pub(crate) fn new(nodes: Vec<Node>, read_size: usize) -> Self {
        Self { nodes, read_size }
    }

    /// The node sequence of the push, in traversal order.
    #[must_use]
    pub fn nodes(&self) -> &[Node] { &self.nodes }

    /// Bytes the push occupied on the wire.
    #[must_use]
    pub fn read_size(&self) -> usize { self.read_size }

    /// Feed the push into `adapter`, reproducing the parser's callbacks.
    pub fn deliver<A: ResponseAdapter + ?Sized>(&self, adapter: &mut A) -> Result<()> {
        replay(&self.nodes, adapter)
    }
}

#[derive(Debug, Default)]
struct Shared {
    cancelled: AtomicBool,
    discarded: AtomicU64,
    wake: Notify,
}

/// Producer half held by the reader task.
#[derive(Clone, Debug)]
pub(crate) struct PushSender {
    tx: mpsc::Sender<PushFrame>,
    shared: Arc<Shared>,
}

impl PushSender {
    /// Deliver one push, waiting for mailbox space.
    ///
    /// After consumer-side cancellation the frame is discarded and counted;
    /// delivery never fails the connection.
    pub(crate) async fn send(&self, frame: PushFrame) {
        if self.shared.cancelled.load(Ordering::Acquire) {
            self.shared.discarded.fetch_add(1, Ordering::Relaxed);
            return;
        }
        if self.tx.send(frame).await.is_err() {
            self.shared.discarded.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Drop `frame` without delivery, counting it. Used when push routing
    /// is disabled by configuration.
    pub(crate) fn discard(&self, frame: PushFrame) {
        drop(frame);
        self.shared.discarded.fetch_add(1, Ordering::Relaxed);
    }
}

/// Consumer half owned by the connection handle.
#[derive(Debug)]
pub(crate) struct PushReceiver {
    rx: mpsc::Receiver<PushFrame>,
    shared: Arc<Shared>,
}

impl PushReceiver {
    /// Receive one push frame.
    ///
    /// Fails with [`Error::Cancelled`] once reception has been cancelled,
    /// and with [`Error::Eof`] when the producer is gone and the mailbox
    /// has drained.
    pub(crate) async fn recv(&mut self) -> Result<PushFrame> {
        loop {
            if self.shared.cancelled.load(Ordering::Acquire) {
                return Err(Error::Cancelled);
            }
            tokio::select! {
                frame = self.rx.recv() => {
                    return frame.ok_or(Error::Eof);
                }
                () = self.shared.wake.notified() => {}
            }
        }
    }
}

/// Cancellation and telemetry handle shared with the connection.
#[derive(Clone, Debug)]
pub(crate) struct PushControl {
    shared: Arc<Shared>,
}

impl PushControl {
    /// Stop delivering pushes: pending `recv` calls fail with
    /// [`Error::Cancelled`] and later frames are discarded while counted.
    pub(crate) fn cancel(&self) {
        self.shared.cancelled.store(true, Ordering::Release);
        self.shared.wake.notify_waiters();
    }

    /// Number of pushes discarded since reception was cancelled.
    pub(crate) fn discarded(&self) -> u64 { self.shared.discarded.load(Ordering::Relaxed) }
}

/// Build the bounded push mailbox.
pub(crate) fn channel(capacity: usize) -> (PushSender, PushReceiver, PushControl) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let shared = Arc::new(Shared::default());
    (
        PushSender {
            tx,
            shared: Arc::clone(&shared),
        },
        PushReceiver {
            rx,
            shared: Arc::clone(&shared),
        },
        PushControl { shared },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resp3::Kind;

    fn frame(text: &str) -> PushFrame {
        PushFrame::new(
            vec![Node::leaf(Kind::SimpleString, 0, text.as_bytes().to_vec())],
            text.len() + 3,
        )
    }

    #[tokio::test]
    async fn frames_arrive_in_order() {
        let (tx, mut rx, _control) = channel(4);
        tx.send(frame("one")).await;
        tx.send(frame("two")).await;
        assert_eq!(rx.recv().await.unwrap(), frame("one"));
        assert_eq!(rx.recv().await.unwrap(), frame("two"));
    }

    #[tokio::test]
    async fn full_mailbox_blocks_the_producer() {
        let (tx, mut rx, _control) = channel(1);
        tx.send(frame("first")).await;
        let pending = {
            let tx = tx.clone();
            tokio::spawn(async move { tx.send(frame("second")).await })
        };
        tokio::task::yield_now().await;
        assert!(!pending.is_finished());
        assert_eq!(rx.recv().await.unwrap(), frame("first"));
        pending.await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), frame("second"));
    }

    #[tokio::test]
    async fn cancel_wakes_pending_receive() {
        let (_tx, mut rx, control) = channel(1);
        let receiver = tokio::spawn(async move { rx.recv().await });
        tokio::task::yield_now().await;
        control.cancel();
        let result = receiver.await.unwrap();
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn cancelled_channel_discards_and_counts() {
        let (tx, _rx, control) = channel(1);
        control.cancel();
        tx.send(frame("dropped")).await;
        tx.send(frame("dropped too")).await;
        assert_eq!(control.discarded(), 2);
    }

    #[tokio::test]
    async fn deliver_replays_into_adapter() {
        let frame = frame("notice");
        let mut sink = crate::adapter::FlatNodes::new();
        frame.deliver(&mut sink).unwrap();
        assert_eq!(sink.nodes(), frame.nodes());
    }
}
