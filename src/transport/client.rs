//! High-level TETHER RPC client.
//!
//! `RpcClient` maintains exactly one logical connection to a configured
//! endpoint, multiplexes concurrent calls over it by correlation id, keeps
//! callers informed of connection/auth state, and survives transient
//! network failure without caller-visible corruption of in-flight work.
//!
//! All mutable transport state lives in a single actor task: one logical
//! thread of control, so Connection, the pending-request map and the
//! reconnect bookkeeping need no locking. Handles talk to the actor over
//! an `mpsc` channel and receive replies over `oneshot` channels; the
//! observable state flags are published through a `watch` channel.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::core::{
    TransportError, AUTH_NAMESPACE, CALL_TIMEOUT, ERR_ACCOUNT_BLACKLISTED, ERR_ACCOUNT_CLOSED,
    ERR_THROTTLED, PACER_LIMIT, RECONNECT_BASE, RECONNECT_CAP,
};

use super::connection::{reconnect_delay_with, Connection, ConnectionPhase, ReconnectState, TransportState};
use super::events::{is_known_event, EventRegistry, Listener, EVENT_AUTHENTICATED};
use super::pacer::Pacer;

/// Application error carried in a server reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReply {
    /// Application error code.
    pub code: i32,
    /// Human-readable message.
    pub message: String,
}

/// Frames sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientFrame {
    /// One RPC call.
    Call {
        /// Correlation id, unique for the process lifetime of the client.
        id: u64,
        /// Method name.
        method: String,
        /// Application payload.
        payload: Value,
        /// Whether the caller expects a binary-encoded reply.
        expects_binary: bool,
    },
}

/// Frames received from the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ServerFrame {
    /// Reply to a call, matched by correlation id.
    Reply {
        /// Correlation id of the originating call.
        id: u64,
        /// Payload or application error.
        result: Result<Value, ErrorReply>,
    },
    /// Server-initiated push event.
    Push {
        /// Event name.
        name: String,
        /// Event payload.
        payload: Value,
    },
    /// Server validated this connection's credentials.
    CredentialsAccepted,
}

/// One established wire connection: an outbound frame sink and an inbound
/// frame stream. Closure of the inbound stream signals disconnection.
pub struct WireConnection {
    /// Client-to-server frames.
    pub outbound: mpsc::Sender<ClientFrame>,
    /// Server-to-client frames.
    pub inbound: mpsc::Receiver<ServerFrame>,
}

/// Future returned by a connection attempt.
pub type ConnectFuture = Pin<Box<dyn Future<Output = std::io::Result<WireConnection>> + Send>>;

/// Pluggable connection factory.
///
/// The actual network encoding (websocket, QUIC, in-memory test pipe) is
/// out of scope for this layer; anything that can produce a
/// [`WireConnection`] for a URL can back the client.
pub trait Connector: Send + Sync + 'static {
    /// Attempt a single connection to `url`.
    fn connect(&self, url: &str) -> ConnectFuture;
}

/// Hooks on the current-user collaborator.
///
/// Flipped by the transport when the server reports the account closed or
/// blacklisted; both are durable, one-way transitions on the application
/// side.
pub trait CurrentUser: Send + Sync {
    /// The account was permanently closed.
    fn set_deleted(&self);
    /// The account was blacklisted.
    fn set_blacklisted(&self);
}

/// Client configuration.
#[derive(Clone)]
pub struct RpcConfig {
    /// Fixed per-call timeout.
    pub call_timeout: Duration,
    /// Concurrent in-flight calls allowed per method name.
    pub pacer_limit: usize,
    /// Base delay of the reconnect backoff.
    pub backoff_base: Duration,
    /// Upper bound of the reconnect backoff.
    pub backoff_cap: Duration,
    /// Current-user collaborator for account-level server errors.
    pub current_user: Option<Arc<dyn CurrentUser>>,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            call_timeout: CALL_TIMEOUT,
            pacer_limit: PACER_LIMIT,
            backoff_base: RECONNECT_BASE,
            backoff_cap: RECONNECT_CAP,
            current_user: None,
        }
    }
}

impl fmt::Debug for RpcConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcConfig")
            .field("call_timeout", &self.call_timeout)
            .field("pacer_limit", &self.pacer_limit)
            .field("backoff_base", &self.backoff_base)
            .field("backoff_cap", &self.backoff_cap)
            .field("current_user", &self.current_user.is_some())
            .finish()
    }
}

/// Debug introspection snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportStats {
    /// Calls currently awaiting a reply.
    pub pending_calls: usize,
    /// Consecutive failed reconnect attempts.
    pub reconnect_attempt: u32,
}

/// Active subscription to a named event.
///
/// Call [`Subscription::unsubscribe`] to stop delivery; dropping the
/// handle without unsubscribing leaves the listener registered.
#[derive(Debug)]
pub struct Subscription {
    event: String,
    id: u64,
    commands: mpsc::Sender<Command>,
}

impl Subscription {
    /// Subscription id within the client's registry.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Remove the listener.
    ///
    /// Awaits command delivery so the removal cannot be lost to a
    /// momentarily full command channel.
    pub async fn unsubscribe(self) {
        let _ = self
            .commands
            .send(Command::Unsubscribe {
                event: self.event,
                id: self.id,
            })
            .await;
    }
}

struct PendingRequest {
    method: String,
    created: Instant,
    reply: oneshot::Sender<Result<Value, TransportError>>,
}

enum Command {
    Start {
        url: String,
        ack: oneshot::Sender<Result<(), TransportError>>,
    },
    Call {
        id: u64,
        method: String,
        payload: Value,
        expects_binary: bool,
        reply: oneshot::Sender<Result<Value, TransportError>>,
    },
    Forget {
        id: u64,
    },
    Subscribe {
        event: String,
        once: bool,
        listener: Listener,
        ack: oneshot::Sender<u64>,
    },
    Unsubscribe {
        event: String,
        id: u64,
    },
    SetAuthenticated {
        value: bool,
        ack: oneshot::Sender<()>,
    },
    Open {
        ack: oneshot::Sender<()>,
    },
    Close {
        ack: oneshot::Sender<()>,
    },
    Reset {
        ack: oneshot::Sender<()>,
    },
    Stats {
        reply: oneshot::Sender<TransportStats>,
    },
}

enum ConnectOutcome {
    Connected(WireConnection),
    Failed(String),
}

/// RPC client handle.
///
/// Cheap to clone; all clones talk to the same underlying connection.
/// Construction spawns the transport actor, so a tokio runtime must be
/// current.
#[derive(Clone)]
pub struct RpcClient {
    commands: mpsc::Sender<Command>,
    next_id: Arc<AtomicU64>,
    pacer: Arc<Pacer>,
    state_rx: watch::Receiver<TransportState>,
    call_timeout: Duration,
}

impl fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcClient")
            .field("state", &*self.state_rx.borrow())
            .finish_non_exhaustive()
    }
}

impl RpcClient {
    /// Create a client over `connector` and spawn its actor task.
    pub fn new<C: Connector>(connector: C, config: RpcConfig) -> Self {
        let (command_tx, command_rx) = mpsc::channel(64);
        let (state_tx, state_rx) = watch::channel(TransportState::default());
        let (connect_tx, connect_rx) = mpsc::channel(4);
        let (send_failed_tx, send_failed_rx) = mpsc::channel(64);

        let pacer = Arc::new(Pacer::new(config.pacer_limit));
        let call_timeout = config.call_timeout;

        let actor = Actor {
            connector: Arc::new(connector),
            config,
            url: None,
            started: false,
            conn: Connection::new(),
            reconnect: ReconnectState::default(),
            connecting: false,
            resetting: false,
            outbound: None,
            inbound: None,
            pending: HashMap::new(),
            events: EventRegistry::new(),
            state_tx,
            connect_tx,
            connect_rx,
            send_failed_tx,
            send_failed_rx,
            commands: command_rx,
        };
        tokio::spawn(actor.run());

        Self {
            commands: command_tx,
            next_id: Arc::new(AtomicU64::new(0)),
            pacer,
            state_rx,
            call_timeout,
        }
    }

    /// Start the client against `url`.
    ///
    /// Idempotent: a second call is a no-op. An empty URL fails with
    /// [`TransportError::Config`] and leaves the client unstarted.
    pub async fn start(&self, url: &str) -> Result<(), TransportError> {
        let (ack, rx) = oneshot::channel();
        self.commands
            .send(Command::Start {
                url: url.to_string(),
                ack,
            })
            .await
            .map_err(|_| TransportError::Disconnected)?;
        rx.await.map_err(|_| TransportError::Disconnected)?
    }

    /// Send one RPC call and await its reply.
    ///
    /// Fails fast with [`TransportError::Disconnected`] when the link is
    /// down and [`TransportError::NotAuthenticated`] when `method` sits in
    /// the authenticated namespace before the auth gate has passed -
    /// neither case costs a network round trip or waits out the timeout.
    pub async fn send(&self, method: &str, payload: Value) -> Result<Value, TransportError> {
        self.send_inner(method, payload, false).await
    }

    /// [`Self::send`] for calls whose reply is binary-encoded.
    pub async fn send_expecting_binary(
        &self,
        method: &str,
        payload: Value,
    ) -> Result<Value, TransportError> {
        self.send_inner(method, payload, true).await
    }

    async fn send_inner(
        &self,
        method: &str,
        payload: Value,
        expects_binary: bool,
    ) -> Result<Value, TransportError> {
        // The pacer is the only gate between "call requested" and "call
        // sent on the wire"; the permit is held until the call settles.
        let permit = self.pacer.admit(method).await;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::Call {
                id,
                method: method.to_string(),
                payload,
                expects_binary,
                reply: reply_tx,
            })
            .await
            .map_err(|_| TransportError::Disconnected)?;

        let result = match tokio::time::timeout(self.call_timeout, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(TransportError::Disconnected),
            Err(_) => {
                let _ = self.commands.send(Command::Forget { id }).await;
                Err(TransportError::Timeout)
            }
        };
        drop(permit);
        result
    }

    /// Subscribe a listener to a named event.
    ///
    /// The name must belong to one of the closed event sets; unknown
    /// names fail immediately with [`TransportError::UnknownEvent`].
    /// Subscribing to `authenticated` while the connection is already
    /// authenticated still fires the listener, exactly once, on the
    /// actor's next turn.
    pub async fn subscribe(
        &self,
        event: &str,
        listener: Listener,
    ) -> Result<Subscription, TransportError> {
        self.subscribe_inner(event, false, listener).await
    }

    /// Subscribe a listener that fires at most once, when the connection
    /// becomes (or already is) authenticated.
    pub async fn once_authenticated(
        &self,
        listener: Listener,
    ) -> Result<Subscription, TransportError> {
        self.subscribe_inner(EVENT_AUTHENTICATED, true, listener).await
    }

    async fn subscribe_inner(
        &self,
        event: &str,
        once: bool,
        listener: Listener,
    ) -> Result<Subscription, TransportError> {
        if !is_known_event(event) {
            return Err(TransportError::UnknownEvent(event.to_string()));
        }
        let (ack, rx) = oneshot::channel();
        self.commands
            .send(Command::Subscribe {
                event: event.to_string(),
                once,
                listener,
                ack,
            })
            .await
            .map_err(|_| TransportError::Disconnected)?;
        let id = rx.await.map_err(|_| TransportError::Disconnected)?;
        Ok(Subscription {
            event: event.to_string(),
            id,
            commands: self.commands.clone(),
        })
    }

    /// Flip the application half of the two-phase auth gate.
    ///
    /// `preauthenticated` (server accepted credentials) and
    /// `authenticated` (application finished loading post-login state)
    /// are deliberately independent; this sets only the latter.
    pub async fn set_authenticated(&self, value: bool) {
        self.acked(|ack| Command::SetAuthenticated { value, ack }).await;
    }

    /// Tear down the connection and suppress reconnection.
    pub async fn close(&self) {
        self.acked(|ack| Command::Close { ack }).await;
    }

    /// Re-arm reconnection and open a new connection, unless a reset is
    /// already in progress.
    pub async fn open(&self) {
        self.acked(|ack| Command::Open { ack }).await;
    }

    /// Serialized close-then-reopen, for recovering from ambiguous
    /// transport states. Concurrent resets collapse into one.
    pub async fn reset(&self) {
        self.acked(|ack| Command::Reset { ack }).await;
    }

    async fn acked(&self, make: impl FnOnce(oneshot::Sender<()>) -> Command) {
        let (ack, rx) = oneshot::channel();
        if self.commands.send(make(ack)).await.is_ok() {
            let _ = rx.await;
        }
    }

    /// Watch channel carrying the observable state flags.
    pub fn watch_state(&self) -> watch::Receiver<TransportState> {
        self.state_rx.clone()
    }

    /// Current snapshot of the observable state flags.
    pub fn current_state(&self) -> TransportState {
        *self.state_rx.borrow()
    }

    /// Whether the transport-level link is up.
    pub fn is_connected(&self) -> bool {
        self.state_rx.borrow().connected
    }

    /// Debug introspection snapshot.
    pub async fn stats(&self) -> TransportStats {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(Command::Stats { reply }).await.is_err() {
            return TransportStats {
                pending_calls: 0,
                reconnect_attempt: 0,
            };
        }
        rx.await.unwrap_or(TransportStats {
            pending_calls: 0,
            reconnect_attempt: 0,
        })
    }
}

struct Actor {
    connector: Arc<dyn Connector>,
    config: RpcConfig,
    url: Option<String>,
    started: bool,
    conn: Connection,
    reconnect: ReconnectState,
    connecting: bool,
    resetting: bool,
    outbound: Option<mpsc::Sender<ClientFrame>>,
    inbound: Option<mpsc::Receiver<ServerFrame>>,
    pending: HashMap<u64, PendingRequest>,
    events: EventRegistry,
    state_tx: watch::Sender<TransportState>,
    connect_tx: mpsc::Sender<ConnectOutcome>,
    connect_rx: mpsc::Receiver<ConnectOutcome>,
    send_failed_tx: mpsc::Sender<u64>,
    send_failed_rx: mpsc::Receiver<u64>,
    commands: mpsc::Receiver<Command>,
}

async fn recv_inbound(rx: &mut Option<mpsc::Receiver<ServerFrame>>) -> Option<ServerFrame> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until_deadline(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

impl Actor {
    async fn run(mut self) {
        loop {
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    // Every handle dropped: stop the actor.
                    None => break,
                },
                Some(outcome) = self.connect_rx.recv() => {
                    self.handle_connect_outcome(outcome);
                }
                Some(id) = self.send_failed_rx.recv() => {
                    if let Some(pending) = self.pending.remove(&id) {
                        let _ = pending.reply.send(Err(TransportError::Disconnected));
                    }
                }
                frame = recv_inbound(&mut self.inbound) => match frame {
                    Some(frame) => self.handle_frame(frame),
                    None => self.handle_disconnect("connection lost"),
                },
                () = sleep_until_deadline(self.reconnect.deadline),
                    if self.reconnect.deadline.is_some() =>
                {
                    self.reconnect.deadline = None;
                    self.begin_connect();
                }
            }
        }
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Start { url, ack } => {
                let _ = ack.send(self.handle_start(url));
            }
            Command::Call {
                id,
                method,
                payload,
                expects_binary,
                reply,
            } => {
                self.handle_call(id, method, payload, expects_binary, reply);
            }
            Command::Forget { id } => {
                if let Some(pending) = self.pending.remove(&id) {
                    debug!(
                        id,
                        method = %pending.method,
                        age_ms = pending.created.elapsed().as_millis() as u64,
                        "call expired before a reply arrived"
                    );
                }
            }
            Command::Subscribe {
                event,
                once,
                listener,
                ack,
            } => {
                let id = self.events.subscribe(&event, once, listener);
                if event == EVENT_AUTHENTICATED && self.conn.flags.authenticated {
                    // Late subscriber, the condition already holds: replay
                    // the event to this listener alone.
                    self.events.emit_to(&event, id, &Value::Null);
                }
                let _ = ack.send(id);
            }
            Command::Unsubscribe { event, id } => {
                self.events.unsubscribe(&event, id);
            }
            Command::SetAuthenticated { value, ack } => {
                self.set_authenticated(value);
                let _ = ack.send(());
            }
            Command::Open { ack } => {
                self.conn.must_reconnect = true;
                if !self.conn.flags.connected && !self.connecting && !self.resetting {
                    self.begin_connect();
                }
                let _ = ack.send(());
            }
            Command::Close { ack } => {
                self.conn.must_reconnect = false;
                self.teardown();
                let _ = ack.send(());
            }
            Command::Reset { ack } => {
                // Before start() there is nothing to tear down or reopen;
                // raising `resetting` here would suppress a later open().
                if self.started && !self.resetting {
                    self.resetting = true;
                    self.teardown();
                    self.begin_connect();
                }
                let _ = ack.send(());
            }
            Command::Stats { reply } => {
                let _ = reply.send(TransportStats {
                    pending_calls: self.pending.len(),
                    reconnect_attempt: self.reconnect.attempt,
                });
            }
        }
    }

    fn handle_start(&mut self, url: String) -> Result<(), TransportError> {
        if self.started {
            return Ok(());
        }
        if url.trim().is_empty() {
            return Err(TransportError::Config(
                "endpoint url must not be empty".to_string(),
            ));
        }
        self.started = true;
        self.url = Some(url);
        self.conn.must_reconnect = true;
        self.begin_connect();
        Ok(())
    }

    /// The actor must never suspend on the wire: a congested outbound
    /// buffer would otherwise park every command, including `close()`,
    /// behind one stalled send.
    fn handle_call(
        &mut self,
        id: u64,
        method: String,
        payload: Value,
        expects_binary: bool,
        reply: oneshot::Sender<Result<Value, TransportError>>,
    ) {
        // Fail fast, without a network round trip.
        if !self.conn.flags.connected {
            let _ = reply.send(Err(TransportError::Disconnected));
            return;
        }
        if method.starts_with(AUTH_NAMESPACE) && !self.conn.flags.preauthenticated {
            let _ = reply.send(Err(TransportError::NotAuthenticated));
            return;
        }

        let Some(outbound) = self.outbound.clone() else {
            let _ = reply.send(Err(TransportError::Disconnected));
            return;
        };

        self.pending.insert(
            id,
            PendingRequest {
                method: method.clone(),
                created: Instant::now(),
                reply,
            },
        );

        let frame = ClientFrame::Call {
            id,
            method,
            payload,
            expects_binary,
        };
        match outbound.try_send(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(frame)) => {
                // Wire backpressure: park only this call's send in its own
                // task so command processing stays live. The call still
                // settles via reply, timeout, or disconnect.
                debug!(id, "outbound wire congested, parking send");
                let failed = self.send_failed_tx.clone();
                tokio::spawn(async move {
                    if outbound.send(frame).await.is_err() {
                        let _ = failed.send(id).await;
                    }
                });
            }
            Err(TrySendError::Closed(_)) => {
                // Wire went away between the connected check and the send.
                if let Some(pending) = self.pending.remove(&id) {
                    let _ = pending.reply.send(Err(TransportError::Disconnected));
                }
            }
        }
    }

    fn handle_frame(&mut self, frame: ServerFrame) {
        match frame {
            ServerFrame::Reply { id, result } => {
                let Some(pending) = self.pending.remove(&id) else {
                    debug!(id, "reply for unknown or expired call");
                    return;
                };
                match result {
                    Ok(value) => {
                        let _ = pending.reply.send(Ok(value));
                    }
                    Err(err) => {
                        self.apply_error_side_effects(&err);
                        let _ = pending.reply.send(Err(TransportError::Server {
                            code: err.code,
                            message: err.message,
                        }));
                    }
                }
            }
            ServerFrame::Push { name, payload } => {
                self.events.emit(&name, &payload);
            }
            ServerFrame::CredentialsAccepted => {
                debug!("server accepted credentials");
                self.conn.flags.preauthenticated = true;
                self.publish();
            }
        }
    }

    /// Account-level error codes carry one-time side effects beyond the
    /// call's own rejection.
    fn apply_error_side_effects(&mut self, err: &ErrorReply) {
        match err.code {
            ERR_ACCOUNT_CLOSED => {
                warn!("server reported account closed");
                if let Some(user) = &self.config.current_user {
                    user.set_deleted();
                }
                self.conn.must_reconnect = false;
                self.teardown();
            }
            ERR_ACCOUNT_BLACKLISTED => {
                warn!("server reported account blacklisted");
                if let Some(user) = &self.config.current_user {
                    user.set_blacklisted();
                }
                self.conn.must_reconnect = false;
                self.teardown();
            }
            ERR_THROTTLED => {
                self.conn.flags.throttled = true;
                self.publish();
            }
            _ => {}
        }
    }

    fn set_authenticated(&mut self, value: bool) {
        if value && !self.conn.flags.authenticated {
            self.conn.flags.authenticated = true;
            self.publish();
            self.events.emit(EVENT_AUTHENTICATED, &Value::Null);
        } else if !value && self.conn.flags.authenticated {
            self.conn.flags.authenticated = false;
            self.publish();
        }
    }

    fn begin_connect(&mut self) {
        if self.connecting {
            return;
        }
        let Some(url) = self.url.clone() else {
            return;
        };
        self.connecting = true;
        self.conn.phase = ConnectionPhase::Opening;
        self.reconnect.deadline = None;

        let connector = self.connector.clone();
        let outcome_tx = self.connect_tx.clone();
        tokio::spawn(async move {
            let outcome = match connector.connect(&url).await {
                Ok(wire) => ConnectOutcome::Connected(wire),
                Err(e) => ConnectOutcome::Failed(e.to_string()),
            };
            let _ = outcome_tx.send(outcome).await;
        });
    }

    fn handle_connect_outcome(&mut self, outcome: ConnectOutcome) {
        self.connecting = false;
        self.resetting = false;
        match outcome {
            ConnectOutcome::Connected(wire) => {
                if !self.conn.must_reconnect {
                    // close() raced the attempt; this wire is unwanted.
                    debug!("discarding connection established after close");
                    self.conn.phase = ConnectionPhase::Closed;
                    return;
                }
                info!("connected");
                self.conn.on_connected();
                self.reconnect.on_connected();
                self.outbound = Some(wire.outbound);
                self.inbound = Some(wire.inbound);
                self.publish();
                self.events.emit("connect", &Value::Null);
            }
            ConnectOutcome::Failed(reason) => {
                warn!(%reason, "connection attempt failed");
                self.conn.phase = ConnectionPhase::Closed;
                self.events.emit("error", &Value::String(reason));
                if self.conn.must_reconnect {
                    self.schedule_reconnect();
                }
            }
        }
    }

    /// Non-explicit disconnect: reject in-flight work, then schedule a
    /// reconnect. The rejections must come first - callers never wait out
    /// the call timeout when the transport already knows the link is down.
    fn handle_disconnect(&mut self, reason: &str) {
        info!(reason, "disconnected");
        self.outbound = None;
        self.inbound = None;
        self.conn.on_disconnected();
        self.publish();
        self.reject_all_pending();
        self.events.emit("disconnect", &Value::Null);
        if self.conn.must_reconnect && !self.connecting {
            self.schedule_reconnect();
        }
    }

    /// Explicit teardown (close, reset, account-level errors). Never
    /// schedules a reconnect and cancels any already-armed timer.
    fn teardown(&mut self) {
        self.reconnect.deadline = None;
        self.outbound = None;
        self.inbound = None;
        if self.conn.flags.connected {
            self.conn.phase = ConnectionPhase::Closing;
            self.conn.on_disconnected();
            self.publish();
            self.reject_all_pending();
            self.events.emit("disconnect", &Value::Null);
        } else {
            self.conn.phase = ConnectionPhase::Closed;
        }
    }

    fn schedule_reconnect(&mut self) {
        let attempt = self.reconnect.attempt;
        let delay = reconnect_delay_with(attempt, self.config.backoff_base, self.config.backoff_cap);
        self.reconnect.deadline = Some(tokio::time::Instant::now() + delay);
        self.reconnect.attempt += 1;
        debug!(attempt, delay_ms = delay.as_millis() as u64, "reconnect scheduled");
        self.events.emit(
            "reconnecting",
            &serde_json::json!({ "attempt": attempt, "delay_ms": delay.as_millis() as u64 }),
        );
    }

    fn reject_all_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        debug!(count = self.pending.len(), "rejecting in-flight calls");
        for (_, pending) in self.pending.drain() {
            let _ = pending.reply.send(Err(TransportError::Disconnected));
        }
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.conn.flags);
    }
}
