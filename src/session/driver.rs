//! Session actor and its public handle.
//!
//! One task owns the state, the encoder, the pending audio and the live
//! connection. Callers talk to it through [`Session`]; connection opening and
//! the per-connection receive loop run in their own tasks and report back
//! over an internal channel, tagged with the connection generation so that
//! messages from a torn-down connection are ignored.

use crate::error::{Result, VoxwireError};
use crate::log::LogSink;
use crate::protocol::encoder::FrameEncoder;
use crate::protocol::frame::decode_frame;
use crate::response::{ErrorKind, InboundEvent, ResponseParser, ServerEvent};
use crate::session::config::SessionConfig;
use crate::session::observer::{ErrorEvent, SessionObserver};
use crate::session::pipeline::{AudioChunk, AudioSendPipeline, SubmitOutcome};
use crate::session::state::{SessionState, Transition, next_state};
use crate::transport::{Connection, FrameReceiver, FrameSender, Inbound, Transport};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

const COMPONENT: &str = "session";

type Reply = oneshot::Sender<Result<()>>;

enum Command {
    Start(Reply),
    SendAudio { chunk: AudioChunk, reply: Reply },
    Stop(Reply),
    Close(Reply),
    Acknowledge(Reply),
    Shutdown(Reply),
}

enum Internal {
    Opened {
        generation: u64,
        result: Result<Connection>,
    },
    Link {
        generation: u64,
        event: LinkEvent,
    },
}

/// What the receive loop reports about its connection.
enum LinkEvent {
    Frame(InboundEvent),
    Violation(VoxwireError),
    Failed(VoxwireError),
    Closed,
}

/// Handle to a running session.
///
/// Dropping the handle stops the session task and closes its connection.
pub struct Session {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<SessionState>,
    task: JoinHandle<()>,
    log: Arc<dyn LogSink>,
}

impl Session {
    /// Spawn the session task on the current tokio runtime. The session
    /// starts in `Idle`; nothing is opened until [`Session::start`].
    pub fn spawn(
        config: SessionConfig,
        transport: Arc<dyn Transport>,
        observer: Arc<dyn SessionObserver>,
        log: Arc<dyn LogSink>,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);

        let driver = Driver {
            encoder: FrameEncoder::new(config.compression, Arc::clone(&log)),
            parser: ResponseParser::new(config.error_bands.clone()),
            log: Arc::clone(&log),
            pipeline: AudioSendPipeline::new(),
            config,
            transport,
            observer,
            state: SessionState::Idle,
            state_tx,
            link: None,
            connect_task: None,
            generation: 0,
            connections: 0,
            attempts: 0,
            reconnect_at: None,
            internal_tx,
        };
        let task = tokio::spawn(driver.run(commands_rx, internal_rx));

        Self {
            commands: commands_tx,
            state: state_rx,
            task,
            log,
        }
    }

    /// Current state snapshot.
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Receiver that sees every state the session settles in.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Wait until the state satisfies `predicate` and return that state.
    pub async fn wait_for_state(
        &self,
        mut predicate: impl FnMut(SessionState) -> bool,
    ) -> Result<SessionState> {
        let mut rx = self.state.clone();
        let state = rx
            .wait_for(|state| predicate(*state))
            .await
            .map_err(|_| VoxwireError::SessionClosed)?;
        Ok(*state)
    }

    /// Open a connection and send the handshake. A no-op unless `Idle`.
    pub async fn start(&self) -> Result<()> {
        self.request(Command::Start).await
    }

    /// Submit PCM audio. Accepted while connecting, recognizing or
    /// reconnecting; buffered until the connection is ready.
    ///
    /// # Errors
    /// Returns `VoxwireError::InvalidState` in any other state, or after a
    /// last-marked chunk has already been accepted.
    pub async fn send_audio(&self, bytes: Vec<u8>, is_last: bool) -> Result<()> {
        let chunk = AudioChunk::new(bytes, is_last);
        self.request(|reply| Command::SendAudio { chunk, reply }).await
    }

    /// Finish the audio stream with an empty last-marked frame. Repeated
    /// calls are no-ops.
    pub async fn stop(&self) -> Result<()> {
        self.request(Command::Stop).await
    }

    /// Leave `Completed` for `Idle`.
    pub async fn close(&self) -> Result<()> {
        self.request(Command::Close).await
    }

    /// Leave `Failed` for `Idle`.
    pub async fn acknowledge(&self) -> Result<()> {
        self.request(Command::Acknowledge).await
    }

    /// Close any connection and stop the session task.
    pub async fn shutdown(self) -> Result<()> {
        let result = self.request(Command::Shutdown).await;
        if let Err(e) = self.task.await {
            self.log
                .warn(COMPONENT, &format!("session task ended abnormally: {}", e));
        }
        result
    }

    async fn request(&self, build: impl FnOnce(Reply) -> Command) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .map_err(|_| VoxwireError::SessionClosed)?;
        response.await.map_err(|_| VoxwireError::SessionClosed)?
    }
}

struct Link {
    sender: Box<dyn FrameSender>,
    receive_task: JoinHandle<()>,
    handshake_acked: bool,
}

struct Driver {
    config: SessionConfig,
    transport: Arc<dyn Transport>,
    observer: Arc<dyn SessionObserver>,
    log: Arc<dyn LogSink>,
    encoder: FrameEncoder,
    parser: ResponseParser,
    pipeline: AudioSendPipeline,
    state: SessionState,
    state_tx: watch::Sender<SessionState>,
    link: Option<Link>,
    connect_task: Option<JoinHandle<()>>,
    /// Bumped whenever a connection is opened or torn down.
    generation: u64,
    /// Connections opened since `start()`.
    connections: u32,
    /// Consecutive reconnect attempts without a handshake acknowledgement.
    attempts: u32,
    reconnect_at: Option<Instant>,
    internal_tx: mpsc::UnboundedSender<Internal>,
}

impl Driver {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut internal: mpsc::UnboundedReceiver<Internal>,
    ) {
        loop {
            let reconnect_at = self.reconnect_at;
            tokio::select! {
                command = commands.recv() => {
                    let running = match command {
                        Some(command) => self.handle_command(command).await,
                        None => false,
                    };
                    if !running {
                        self.teardown().await;
                        break;
                    }
                }
                Some(message) = internal.recv() => self.handle_internal(message).await,
                _ = backoff(reconnect_at) => {
                    self.reconnect_at = None;
                    self.backoff_elapsed();
                }
            }
        }
        self.log.debug(COMPONENT, "session task stopped");
    }

    /// Returns false once the session task should exit.
    async fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Start(reply) => {
                let result = self.start();
                self.respond(reply, result);
            }
            Command::SendAudio { chunk, reply } => {
                let result = self.send_audio(chunk).await;
                self.respond(reply, result);
            }
            Command::Stop(reply) => {
                let result = self.stop().await;
                self.respond(reply, result);
            }
            Command::Close(reply) => {
                let result = self.leave_terminal(Transition::Close, "close");
                self.respond(reply, result);
            }
            Command::Acknowledge(reply) => {
                let result = self.leave_terminal(Transition::Acknowledge, "acknowledge");
                self.respond(reply, result);
            }
            Command::Shutdown(reply) => {
                self.teardown().await;
                self.respond(reply, Ok(()));
                return false;
            }
        }
        true
    }

    async fn handle_internal(&mut self, message: Internal) {
        match message {
            Internal::Opened { generation, result } => self.on_opened(generation, result).await,
            Internal::Link { generation, event } => {
                if generation != self.generation {
                    self.log.debug(
                        COMPONENT,
                        &format!("ignoring event from stale connection #{}", generation),
                    );
                    return;
                }
                match event {
                    LinkEvent::Frame(inbound) => self.on_server_event(inbound).await,
                    LinkEvent::Violation(e) => {
                        self.log.error(COMPONENT, &e.to_string());
                        self.fail(e.error_kind(), e.to_string()).await;
                    }
                    LinkEvent::Failed(e) => self.on_transport_error(e).await,
                    LinkEvent::Closed => self.on_closed().await,
                }
            }
        }
    }

    fn start(&mut self) -> Result<()> {
        if self.state != SessionState::Idle {
            self.log.debug(
                COMPONENT,
                &format!("start() ignored in state {}", self.state),
            );
            return Ok(());
        }

        self.pipeline.reset();
        self.encoder.reset_sequence();
        self.connections = 0;
        self.attempts = 0;
        self.transition(Transition::Start);
        self.open_connection();
        Ok(())
    }

    /// Open a new connection in the background. The outcome arrives as
    /// `Internal::Opened`.
    fn open_connection(&mut self) {
        self.generation += 1;
        let generation = self.generation;
        let request = self.config.credentials.connect_request();
        self.log.info(
            COMPONENT,
            &format!(
                "opening {} connection {} to {}",
                self.transport.name(),
                request.connect_id,
                request.endpoint
            ),
        );

        let transport = Arc::clone(&self.transport);
        let events = self.internal_tx.clone();
        self.connect_task = Some(tokio::spawn(async move {
            let result = transport.open(&request).await;
            // Err means the session task is gone.
            events.send(Internal::Opened { generation, result }).ok();
        }));
    }

    async fn on_opened(&mut self, generation: u64, result: Result<Connection>) {
        self.connect_task = None;
        if generation != self.generation || self.state != SessionState::Connecting {
            if let Ok(mut connection) = result
                && let Err(e) = connection.sender.close().await
            {
                self.log.debug(COMPONENT, &format!("closing stale connection: {}", e));
            }
            return;
        }

        let connection = match result {
            Ok(connection) => connection,
            Err(e) => {
                self.on_transport_error(e).await;
                return;
            }
        };

        let receive_task = tokio::spawn(receive_loop(
            connection.receiver,
            generation,
            self.parser.clone(),
            self.internal_tx.clone(),
            Arc::clone(&self.log),
        ));
        self.link = Some(Link {
            sender: connection.sender,
            receive_task,
            handshake_acked: false,
        });

        // Numbering restarts with the fresh handshake on reconnects.
        if self.connections > 0 && self.config.reconnect.reset_sequence {
            self.encoder.reset_sequence();
        }
        self.connections += 1;

        let frame = match self.encoder.handshake_frame(&self.config.handshake) {
            Ok(frame) => frame,
            Err(e) => {
                self.fail(ErrorKind::InvalidRequest, e.to_string()).await;
                return;
            }
        };
        let sent = match self.link.as_mut() {
            Some(link) => link.sender.send(frame).await,
            None => return,
        };
        match sent {
            Ok(()) => self.log.debug(COMPONENT, "handshake sent"),
            Err(e) => self.on_transport_error(e).await,
        }
    }

    async fn on_server_event(&mut self, inbound: InboundEvent) {
        if let ServerEvent::ServiceError(error) = &inbound.event {
            self.log.error(
                COMPONENT,
                &format!(
                    "service error {} ({}): {}",
                    error.code, error.kind, error.message
                ),
            );
            self.observer.on_error(&ErrorEvent::Service(error.clone()));
            let kind = error.kind;
            self.teardown().await;
            self.transition(Transition::Fail(kind));
            return;
        }

        let awaiting_ack = self.state == SessionState::Connecting
            && self.link.as_ref().is_some_and(|link| !link.handshake_acked);
        if awaiting_ack && !self.on_handshake_acked().await {
            return;
        }

        match self.state {
            SessionState::Recognizing if inbound.last => {
                let message = "server ended the stream before the last audio packet".to_string();
                self.log.error(COMPONENT, &message);
                self.fail(ErrorKind::Unknown, message).await;
            }
            SessionState::Recognizing | SessionState::Processing => {
                let mut finished = inbound.last;
                match inbound.event {
                    ServerEvent::Recognition(result) => {
                        finished |= result.is_final;
                        self.observer.on_result(&result);
                    }
                    ServerEvent::Unrecognized(raw) => {
                        self.log.debug(
                            COMPONENT,
                            &format!("ignoring unrecognized payload: {}", raw),
                        );
                    }
                    ServerEvent::NoOp | ServerEvent::ServiceError(_) => {}
                }
                if finished && self.state == SessionState::Processing {
                    self.complete().await;
                }
            }
            state => {
                self.log.debug(
                    COMPONENT,
                    &format!("dropping server response in state {}", state),
                );
            }
        }
    }

    /// First server response on a connection. Returns false if the session
    /// could not proceed to `Recognizing`.
    async fn on_handshake_acked(&mut self) -> bool {
        if let Some(link) = self.link.as_mut() {
            link.handshake_acked = true;
        }
        self.attempts = 0;
        self.transition(Transition::HandshakeAcked);
        self.log.info(COMPONENT, "handshake acknowledged");

        let queued = self.pipeline.pending().len();
        let flushed = match self.link.as_mut() {
            Some(link) => {
                self.pipeline
                    .flush_on_ready(&mut self.encoder, &mut *link.sender)
                    .await
            }
            None => return false,
        };
        match flushed {
            Ok(sent) => {
                if queued > 0 {
                    self.log
                        .debug(COMPONENT, &format!("flushed {} buffered chunks", sent));
                }
                self.after_audio_sent();
                true
            }
            Err(e) => {
                self.on_transport_error(e).await;
                false
            }
        }
    }

    async fn send_audio(&mut self, chunk: AudioChunk) -> Result<()> {
        if !self.state.accepts_audio() {
            let error = VoxwireError::InvalidState {
                operation: "send_audio".to_string(),
                state: self.state.to_string(),
            };
            self.log.warn(COMPONENT, &error.to_string());
            return Err(error);
        }
        self.submit(chunk).await
    }

    async fn stop(&mut self) -> Result<()> {
        // The last packet is already sent or queued for the next connection.
        if self.state.is_active() && self.pipeline.last_accepted() {
            self.log
                .debug(COMPONENT, &format!("stop() repeated in state {}", self.state));
            return Ok(());
        }

        match self.state {
            SessionState::Connecting | SessionState::Recognizing => {
                self.submit(AudioChunk::end_of_stream()).await
            }
            SessionState::Reconnecting => {
                self.fail(
                    ErrorKind::Network,
                    "stopped while reconnecting".to_string(),
                )
                .await;
                Ok(())
            }
            state => {
                self.log
                    .debug(COMPONENT, &format!("stop() ignored in state {}", state));
                Ok(())
            }
        }
    }

    async fn submit(&mut self, chunk: AudioChunk) -> Result<()> {
        let ready = self.state == SessionState::Recognizing;
        let outcome = match self.link.as_mut() {
            Some(link) if ready && link.handshake_acked => {
                self.pipeline
                    .submit(chunk, &mut self.encoder, Some(&mut *link.sender))
                    .await
            }
            _ => self.pipeline.submit(chunk, &mut self.encoder, None).await,
        };

        match outcome {
            Ok(SubmitOutcome::Sent) => {
                self.after_audio_sent();
                Ok(())
            }
            Ok(SubmitOutcome::Queued) => Ok(()),
            Ok(SubmitOutcome::SendFailed(e)) => {
                // The chunk stays queued for the next connection.
                self.on_transport_error(e).await;
                Ok(())
            }
            Err(e) => {
                self.log.warn(COMPONENT, &e.to_string());
                Err(e)
            }
        }
    }

    fn after_audio_sent(&mut self) {
        if self.pipeline.last_sent() && self.state == SessionState::Recognizing {
            self.transition(Transition::LastAudioSent);
        }
    }

    async fn on_transport_error(&mut self, error: VoxwireError) {
        if !error.is_transient() {
            self.log.error(COMPONENT, &error.to_string());
            self.fail(error.error_kind(), error.to_string()).await;
            return;
        }

        match self.state {
            SessionState::Connecting | SessionState::Recognizing => {
                self.attempts += 1;
                if self.config.reconnect.exhausted(self.attempts) {
                    let message = format!(
                        "giving up after {} reconnect attempts: {}",
                        self.attempts - 1,
                        error
                    );
                    self.log.error(COMPONENT, &message);
                    self.fail(ErrorKind::Network, message).await;
                    return;
                }

                let delay = self.config.reconnect.delay_for(self.attempts);
                self.log.warn(
                    COMPONENT,
                    &format!(
                        "{}; reconnecting in {} ms (attempt {})",
                        error,
                        delay.as_millis(),
                        self.attempts
                    ),
                );
                self.teardown().await;
                self.transition(Transition::TransientError);
                self.reconnect_at = Some(Instant::now() + delay);
            }
            SessionState::Processing => {
                let message = format!("connection lost while awaiting final result: {}", error);
                self.log.error(COMPONENT, &message);
                self.fail(ErrorKind::Network, message).await;
            }
            state => {
                self.log.debug(
                    COMPONENT,
                    &format!("ignoring transport error in state {}: {}", state, error),
                );
            }
        }
    }

    async fn on_closed(&mut self) {
        self.log.info(COMPONENT, "connection closed by server");
        self.on_transport_error(VoxwireError::transient("connection closed by server"))
            .await;
    }

    fn backoff_elapsed(&mut self) {
        if self.state != SessionState::Reconnecting {
            return;
        }
        self.transition(Transition::BackoffElapsed);
        self.open_connection();
    }

    async fn complete(&mut self) {
        self.teardown().await;
        self.transition(Transition::FinalResultReceived);
        self.log.info(COMPONENT, "recognition completed");
    }

    /// Report a terminal failure and move to `Failed(kind)`.
    async fn fail(&mut self, kind: ErrorKind, message: String) {
        self.observer.on_error(&ErrorEvent::Failed { kind, message });
        self.teardown().await;
        self.transition(Transition::Fail(kind));
    }

    fn leave_terminal(&mut self, transition: Transition, operation: &str) -> Result<()> {
        match next_state(self.state, transition) {
            Ok(_) => {
                self.pipeline.reset();
                self.transition(transition);
                Ok(())
            }
            Err(_) => {
                let error = VoxwireError::InvalidState {
                    operation: operation.to_string(),
                    state: self.state.to_string(),
                };
                self.log.warn(COMPONENT, &error.to_string());
                Err(error)
            }
        }
    }

    /// Drop the live connection, if any. Frames already handed to the
    /// transport are not recalled.
    async fn teardown(&mut self) {
        self.generation += 1;
        self.reconnect_at = None;
        if let Some(task) = self.connect_task.take() {
            task.abort();
        }
        if let Some(mut link) = self.link.take() {
            link.receive_task.abort();
            if let Err(e) = link.sender.close().await {
                self.log
                    .debug(COMPONENT, &format!("error while closing connection: {}", e));
            }
        }
    }

    fn transition(&mut self, transition: Transition) {
        match next_state(self.state, transition) {
            Ok(next) => {
                let previous = self.state;
                self.state = next;
                self.state_tx.send_replace(next);
                self.log
                    .debug(COMPONENT, &format!("{} -> {}", previous, next));
                self.observer.on_state_changed(previous, next);
            }
            Err(e) => self.log.warn(COMPONENT, &e.to_string()),
        }
    }

    fn respond(&self, reply: Reply, result: Result<()>) {
        if reply.send(result).is_err() {
            self.log
                .debug(COMPONENT, "caller went away before the reply was sent");
        }
    }
}

async fn backoff(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Read frames from one connection until it closes or fails.
async fn receive_loop(
    mut receiver: Box<dyn FrameReceiver>,
    generation: u64,
    parser: ResponseParser,
    events: mpsc::UnboundedSender<Internal>,
    log: Arc<dyn LogSink>,
) {
    loop {
        let event = match receiver.recv().await {
            None => LinkEvent::Closed,
            Some(Err(e)) => LinkEvent::Failed(e),
            Some(Ok(Inbound::Text(text))) => {
                log.debug(
                    "receive",
                    &format!("discarding text message ({} bytes)", text.len()),
                );
                continue;
            }
            Some(Ok(Inbound::Binary(bytes))) => {
                match decode_frame(&bytes).and_then(|frame| parser.parse_frame(frame)) {
                    Ok(inbound) => LinkEvent::Frame(inbound),
                    Err(e @ VoxwireError::ProtocolViolation { .. }) => LinkEvent::Violation(e),
                    Err(e) => {
                        log.warn("receive", &format!("discarding frame: {}", e));
                        continue;
                    }
                }
            }
        };

        let terminal = !matches!(event, LinkEvent::Frame(_));
        if events.send(Internal::Link { generation, event }).is_err() || terminal {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::{LogLevel, MemoryLog};
    use crate::protocol::compression::CompressionPolicy;
    use crate::session::config::Credentials;
    use crate::session::observer::CollectorObserver;
    use crate::transport::MockTransport;

    fn config() -> SessionConfig {
        SessionConfig::new(Credentials {
            endpoint: "mock://asr".to_string(),
            app_key: "app".to_string(),
            access_key: "access".to_string(),
            resource_id: "res".to_string(),
        })
        .with_compression(CompressionPolicy::none())
    }

    #[tokio::test]
    async fn test_new_session_is_idle() {
        let (transport, _peers) = MockTransport::new();
        let session = Session::spawn(
            config(),
            Arc::new(transport),
            Arc::new(CollectorObserver::new()),
            Arc::new(MemoryLog::new()),
        );
        assert_eq!(session.state(), SessionState::Idle);
        session.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_rejected_audio_is_logged() {
        let (transport, _peers) = MockTransport::new();
        let log = Arc::new(MemoryLog::new());
        let session = Session::spawn(
            config(),
            Arc::new(transport),
            Arc::new(CollectorObserver::new()),
            log.clone(),
        );

        let result = session.send_audio(vec![0; 4], false).await;
        assert!(matches!(result, Err(VoxwireError::InvalidState { .. })));
        assert!(log.contains(LogLevel::Warn, "send_audio"));
        session.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_close_and_acknowledge_require_terminal_state() {
        let (transport, _peers) = MockTransport::new();
        let session = Session::spawn(
            config(),
            Arc::new(transport),
            Arc::new(CollectorObserver::new()),
            Arc::new(MemoryLog::new()),
        );

        assert!(matches!(
            session.close().await,
            Err(VoxwireError::InvalidState { .. })
        ));
        assert!(matches!(
            session.acknowledge().await,
            Err(VoxwireError::InvalidState { .. })
        ));
        session.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_start_is_noop_outside_idle() {
        let (transport, mut peers) = MockTransport::new();
        let transport = Arc::new(transport);
        let session = Session::spawn(
            config(),
            transport.clone(),
            Arc::new(CollectorObserver::new()),
            Arc::new(MemoryLog::new()),
        );

        session.start().await.unwrap();
        session.start().await.unwrap();
        assert!(peers.next().await.is_some());
        assert_eq!(session.state(), SessionState::Connecting);
        assert_eq!(transport.requests().len(), 1);
        session.shutdown().await.unwrap();
    }

    struct PanickingObserver;

    impl SessionObserver for PanickingObserver {
        fn on_result(&self, _result: &crate::response::RecognitionResult) {}

        fn on_error(&self, _error: &ErrorEvent) {}

        fn on_state_changed(&self, _from: SessionState, _to: SessionState) {
            panic!("observer failure");
        }
    }

    #[tokio::test]
    async fn test_abnormal_task_exit_is_reported_to_log() {
        let (transport, _peers) = MockTransport::new();
        let log = Arc::new(MemoryLog::new());
        let session = Session::spawn(
            config(),
            Arc::new(transport),
            Arc::new(PanickingObserver),
            log.clone(),
        );

        assert!(matches!(
            session.start().await,
            Err(VoxwireError::SessionClosed)
        ));
        assert!(session.shutdown().await.is_err());
        assert!(log.contains(LogLevel::Warn, "session task ended abnormally"));
    }

    #[tokio::test]
    async fn test_commands_after_shutdown_fail() {
        let (transport, _peers) = MockTransport::new();
        let session = Session::spawn(
            config(),
            Arc::new(transport),
            Arc::new(CollectorObserver::new()),
            Arc::new(MemoryLog::new()),
        );
        let (tx, rx) = oneshot::channel();
        session.commands.send(Command::Shutdown(tx)).unwrap();
        rx.await.unwrap().unwrap();

        assert!(matches!(
            session.start().await,
            Err(VoxwireError::SessionClosed)
        ));
    }
}
