//! In-memory transport for tests and offline runs.
//!
//! Every successful `open` produces a [`MockPeer`] the test drives as the
//! server side: it reads what the client sent and injects responses,
//! disconnects and failures.

use crate::error::{Result, VoxwireError};
use crate::protocol::frame::{Frame, decode_frame};
use crate::transport::{ConnectRequest, Connection, FrameReceiver, FrameSender, Inbound, Transport};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// How long peer helpers wait for the client before giving up.
const PEER_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
struct ScriptedFailure {
    message: String,
    transient: bool,
}

/// Scriptable transport.
#[derive(Clone)]
pub struct MockTransport {
    open_failures: Arc<Mutex<VecDeque<ScriptedFailure>>>,
    requests: Arc<Mutex<Vec<ConnectRequest>>>,
    peers: mpsc::UnboundedSender<MockPeer>,
}

/// Stream of server-side peers, one per opened connection.
pub struct MockPeers {
    rx: mpsc::UnboundedReceiver<MockPeer>,
}

impl MockPeers {
    /// Wait for the client to open its next connection.
    pub async fn next(&mut self) -> Option<MockPeer> {
        tokio::time::timeout(PEER_TIMEOUT, self.rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// Peer for an already opened connection, without waiting.
    pub fn try_next(&mut self) -> Option<MockPeer> {
        self.rx.try_recv().ok()
    }
}

impl MockTransport {
    pub fn new() -> (Self, MockPeers) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                open_failures: Arc::new(Mutex::new(VecDeque::new())),
                requests: Arc::new(Mutex::new(Vec::new())),
                peers: tx,
            },
            MockPeers { rx },
        )
    }

    /// Make the next `open` call fail.
    pub fn fail_next_open(&self, message: &str, transient: bool) {
        if let Ok(mut failures) = self.open_failures.lock() {
            failures.push_back(ScriptedFailure {
                message: message.to_string(),
                transient,
            });
        }
    }

    /// Connect requests seen so far, including failed ones.
    pub fn requests(&self) -> Vec<ConnectRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn open(&self, request: &ConnectRequest) -> Result<Connection> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let failure = self
            .open_failures
            .lock()
            .ok()
            .and_then(|mut failures| failures.pop_front());
        if let Some(failure) = failure {
            return Err(VoxwireError::Transport {
                message: failure.message,
                transient: failure.transient,
            });
        }

        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let link = Arc::new(LinkState::default());

        let peer = MockPeer {
            sent: sent_rx,
            inbound: Some(inbound_tx),
            link: Arc::clone(&link),
        };
        self.peers
            .send(peer)
            .map_err(|_| VoxwireError::fatal("mock server is gone"))?;

        Ok(Connection {
            sender: Box::new(MockSender {
                sent: sent_tx,
                link,
            }),
            receiver: Box::new(MockReceiver { inbound: inbound_rx }),
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[derive(Debug, Default)]
struct LinkState {
    broken: AtomicBool,
    closed_by_client: AtomicBool,
    /// Remaining successful sends before the link breaks; `usize::MAX` = never.
    sends_left: AtomicUsize,
    send_limit_set: AtomicBool,
}

struct MockSender {
    sent: mpsc::UnboundedSender<Vec<u8>>,
    link: Arc<LinkState>,
}

#[async_trait::async_trait]
impl FrameSender for MockSender {
    async fn send(&mut self, frame: Vec<u8>) -> Result<()> {
        if self.link.broken.load(Ordering::SeqCst)
            || self.link.closed_by_client.load(Ordering::SeqCst)
        {
            return Err(VoxwireError::transient("mock link is down"));
        }
        if self.link.send_limit_set.load(Ordering::SeqCst) {
            let left = self.link.sends_left.load(Ordering::SeqCst);
            if left == 0 {
                self.link.broken.store(true, Ordering::SeqCst);
                return Err(VoxwireError::transient("mock link dropped during send"));
            }
            self.link.sends_left.store(left - 1, Ordering::SeqCst);
        }
        self.sent
            .send(frame)
            .map_err(|_| VoxwireError::transient("mock peer hung up"))
    }

    async fn close(&mut self) -> Result<()> {
        self.link.closed_by_client.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct MockReceiver {
    inbound: mpsc::UnboundedReceiver<Result<Inbound>>,
}

#[async_trait::async_trait]
impl FrameReceiver for MockReceiver {
    async fn recv(&mut self) -> Option<Result<Inbound>> {
        self.inbound.recv().await
    }
}

/// Server side of one mock connection.
pub struct MockPeer {
    sent: mpsc::UnboundedReceiver<Vec<u8>>,
    inbound: Option<mpsc::UnboundedSender<Result<Inbound>>>,
    link: Arc<LinkState>,
}

impl MockPeer {
    /// Next raw message the client sent, waiting briefly.
    pub async fn next_sent(&mut self) -> Option<Vec<u8>> {
        tokio::time::timeout(PEER_TIMEOUT, self.sent.recv())
            .await
            .ok()
            .flatten()
    }

    /// Next frame the client sent, decoded.
    pub async fn next_frame(&mut self) -> Option<Frame> {
        let bytes = self.next_sent().await?;
        decode_frame(&bytes).ok()
    }

    /// Raw message already sent by the client, without waiting.
    pub fn try_next_sent(&mut self) -> Option<Vec<u8>> {
        self.sent.try_recv().ok()
    }

    /// Deliver raw bytes to the client as a binary message.
    pub fn send_binary(&self, bytes: Vec<u8>) {
        self.push(Ok(Inbound::Binary(bytes)));
    }

    pub fn send_frame(&self, frame: &Frame) {
        self.send_binary(frame.encode());
    }

    pub fn send_text(&self, text: &str) {
        self.push(Ok(Inbound::Text(text.to_string())));
    }

    /// Break the connection with a transport error on the client's receive side.
    pub fn fail(&mut self, transient: bool) {
        self.link.broken.store(true, Ordering::SeqCst);
        let error = VoxwireError::Transport {
            message: "mock connection failed".to_string(),
            transient,
        };
        self.push(Err(error));
        self.inbound = None;
    }

    /// Close the connection cleanly from the server side.
    pub fn close(&mut self) {
        self.link.broken.store(true, Ordering::SeqCst);
        self.inbound = None;
    }

    /// Let `n` more client sends through, then fail every send after that.
    pub fn fail_sends_after(&self, n: usize) {
        self.link.sends_left.store(n, Ordering::SeqCst);
        self.link.send_limit_set.store(true, Ordering::SeqCst);
    }

    /// True once the client closed its sending half.
    pub fn closed_by_client(&self) -> bool {
        self.link.closed_by_client.load(Ordering::SeqCst)
    }

    fn push(&self, item: Result<Inbound>) {
        if let Some(tx) = &self.inbound {
            // The client may already have dropped the connection.
            if tx.send(item).is_err() {
                self.link.broken.store(true, Ordering::SeqCst);
            }
        }
    }
}
