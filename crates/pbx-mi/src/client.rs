use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, oneshot, watch, Mutex};

use crate::backoff;
use crate::error::{PbxMiError, Result};
use crate::frame::Frame;
use crate::reader::read_frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Greeted,
    Authenticated,
}

#[derive(Debug, Clone)]
pub struct PbxMiConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Event classes to subscribe to, e.g. `"call,cdr"`.
    pub event_classes: String,
    pub max_reconnect_attempts: u32,
}

impl Default for PbxMiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5038,
            username: String::new(),
            password: String::new(),
            event_classes: "call,cdr".to_string(),
            max_reconnect_attempts: 10,
        }
    }
}

const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_secs(5);
const RELOAD_ACTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Whether a timed-out action should resolve successfully (tolerant) or
/// surface `timeout` (strict), per §7: `db_del_tree`/`reload` are tolerant
/// because the PBX may legitimately lack the family being torn down, or the
/// response may simply arrive after our watchdog fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tolerance {
    Strict,
    Tolerant,
}

struct Waiter {
    tx: oneshot::Sender<Frame>,
}

/// C3: the PBX-MI client. Owns the action-correlation table and the current
/// outbound channel; the reconnect loop (`run`) replaces the outbound
/// channel on every fresh connection.
pub struct PbxMiClient {
    config: PbxMiConfig,
    state_tx: watch::Sender<ConnectionState>,
    events_tx: broadcast::Sender<Frame>,
    outbound: Mutex<Option<mpsc::UnboundedSender<Frame>>>,
    waiters: Mutex<HashMap<String, Waiter>>,
    next_action_id: AtomicU64,
}

impl PbxMiClient {
    pub fn new(config: PbxMiConfig) -> Arc<Self> {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (events_tx, _) = broadcast::channel(1024);
        Arc::new(Self {
            config,
            state_tx,
            events_tx,
            outbound: Mutex::new(None),
            waiters: Mutex::new(HashMap::new()),
            next_action_id: AtomicU64::new(1),
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<Frame> {
        self.events_tx.subscribe()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state() == ConnectionState::Authenticated
    }

    fn next_action_id(&self) -> String {
        self.next_action_id.fetch_add(1, Ordering::Relaxed).to_string()
    }

    /// Drives the connect -> authenticate -> read-events loop, reconnecting
    /// with exponential back-off on unexpected disconnect (§4.3). Returns
    /// once `shutdown` reports `true` or the attempt cap is exhausted.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut attempt: u32 = 0;
        loop {
            if *shutdown.borrow() {
                break;
            }
            let _ = self.state_tx.send(ConnectionState::Connecting);

            match self.connect_and_run(&mut shutdown).await {
                Ok(()) => {
                    attempt = 0;
                }
                Err(err) => {
                    tracing::warn!(error = %err, attempt, "pbx-mi connection lost");
                }
            }

            self.fail_all_waiters().await;
            let _ = self.state_tx.send(ConnectionState::Disconnected);

            if *shutdown.borrow() {
                break;
            }

            attempt += 1;
            if attempt > self.config.max_reconnect_attempts {
                tracing::error!(
                    max = self.config.max_reconnect_attempts,
                    "pbx-mi exceeded max reconnect attempts; giving up"
                );
                break;
            }

            let delay = backoff::compute(attempt, self.config.max_reconnect_attempts);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }

    async fn connect_and_run(&self, shutdown: &mut watch::Receiver<bool>) -> std::io::Result<()> {
        let stream = TcpStream::connect((self.config.host.as_str(), self.config.port)).await?;
        let (read_half, mut write_half) = tokio::io::split(stream);
        let mut reader = BufReader::new(read_half);

        // Await the greeting banner before anything else.
        let _greeting = read_frame(&mut reader).await?;
        let _ = self.state_tx.send(ConnectionState::Greeted);

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Frame>();
        *self.outbound.lock().await = Some(out_tx.clone());

        let writer_task = tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                if write_half.write_all(&frame.encode()).await.is_err() {
                    break;
                }
            }
        });

        let login_ok = self
            .login_and_subscribe(&out_tx)
            .await
            .unwrap_or(false);

        if !login_ok {
            writer_task.abort();
            return Ok(());
        }
        let _ = self.state_tx.send(ConnectionState::Authenticated);

        loop {
            tokio::select! {
                frame = read_frame(&mut reader) => {
                    match frame? {
                        None => break,
                        Some(frame) => self.dispatch_frame(frame).await,
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        writer_task.abort();
        *self.outbound.lock().await = None;
        Ok(())
    }

    async fn login_and_subscribe(&self, out_tx: &mpsc::UnboundedSender<Frame>) -> std::io::Result<bool> {
        let login_id = self.next_action_id();
        let login = Frame::new()
            .with("Action", "Login")
            .with("ActionID", login_id.clone())
            .with("Username", &self.config.username)
            .with("Secret", &self.config.password);

        let (tx, rx) = oneshot::channel();
        self.waiters.lock().await.insert(login_id.clone(), Waiter { tx });
        let _ = out_tx.send(login);

        let response = match tokio::time::timeout(DEFAULT_ACTION_TIMEOUT, rx).await {
            Ok(Ok(frame)) => frame,
            _ => {
                self.waiters.lock().await.remove(&login_id);
                return Ok(false);
            }
        };
        if !response.is_success() {
            return Ok(false);
        }

        let subscribe_id = self.next_action_id();
        let subscribe = Frame::new()
            .with("Action", "Events")
            .with("ActionID", subscribe_id.clone())
            .with("EventMask", self.config.event_classes.clone());
        let (tx, rx) = oneshot::channel();
        self.waiters.lock().await.insert(subscribe_id.clone(), Waiter { tx });
        let _ = out_tx.send(subscribe);
        let _ = tokio::time::timeout(DEFAULT_ACTION_TIMEOUT, rx).await;

        Ok(true)
    }

    async fn dispatch_frame(&self, frame: Frame) {
        let action_id = frame.action_id().map(|s| s.to_string());
        if let Some(id) = action_id {
            if let Some(waiter) = self.waiters.lock().await.remove(&id) {
                let _ = waiter.tx.send(frame);
                return;
            }
        }
        if frame.event_name().is_some() {
            let _ = self.events_tx.send(frame);
        }
    }

    async fn fail_all_waiters(&self) {
        let mut waiters = self.waiters.lock().await;
        waiters.clear();
    }

    /// Sends an arbitrary action and awaits its correlated response.
    pub async fn send_action(&self, mut frame: Frame) -> Result<Frame> {
        self.send_action_with(frame_action_id(&mut frame), frame, DEFAULT_ACTION_TIMEOUT, Tolerance::Strict)
            .await
    }

    async fn send_action_with(
        &self,
        action_id: String,
        frame: Frame,
        timeout: Duration,
        tolerance: Tolerance,
    ) -> Result<Frame> {
        let outbound = self.outbound.lock().await.clone();
        let Some(outbound) = outbound else {
            return Err(PbxMiError::Unavailable);
        };

        let (tx, rx) = oneshot::channel();
        self.waiters.lock().await.insert(action_id.clone(), Waiter { tx });
        if outbound.send(frame).is_err() {
            self.waiters.lock().await.remove(&action_id);
            return Err(PbxMiError::Disconnected);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(PbxMiError::Disconnected),
            Err(_) => {
                self.waiters.lock().await.remove(&action_id);
                match tolerance {
                    Tolerance::Tolerant => {
                        tracing::warn!(action_id, "pbx-mi action timed out; treating as success (tolerant)");
                        Ok(Frame::new().with("Response", "Success").with("ActionID", action_id))
                    }
                    Tolerance::Strict => Err(PbxMiError::Timeout),
                }
            }
        }
    }

    pub async fn send_cli(&self, command: &str) -> Result<String> {
        let id = self.next_action_id();
        let frame = Frame::new()
            .with("Action", "Command")
            .with("ActionID", id.clone())
            .with("Command", command);
        let response = self
            .send_action_with(id, frame, DEFAULT_ACTION_TIMEOUT, Tolerance::Strict)
            .await?;
        Ok(response.get("Output").unwrap_or_default().to_string())
    }

    pub async fn db_put(&self, family: &str, key: &str, value: &str) -> Result<()> {
        let id = self.next_action_id();
        let frame = Frame::new()
            .with("Action", "DBPut")
            .with("ActionID", id.clone())
            .with("Family", family)
            .with("Key", key)
            .with("Val", value);
        let response = self
            .send_action_with(id, frame, DEFAULT_ACTION_TIMEOUT, Tolerance::Strict)
            .await?;
        if response.is_success() {
            Ok(())
        } else {
            Err(PbxMiError::Unavailable)
        }
    }

    pub async fn db_del_tree(&self, family: &str) -> Result<()> {
        let id = self.next_action_id();
        let frame = Frame::new()
            .with("Action", "DBDelTree")
            .with("ActionID", id.clone())
            .with("Family", family);
        self.send_action_with(id, frame, DEFAULT_ACTION_TIMEOUT, Tolerance::Tolerant)
            .await
            .map(|_| ())
    }

    pub async fn reload(&self, module: &str) -> Result<()> {
        let id = self.next_action_id();
        let frame = Frame::new()
            .with("Action", "Command")
            .with("ActionID", id.clone())
            .with("Command", format!("{module} reload"));
        self.send_action_with(id, frame, RELOAD_ACTION_TIMEOUT, Tolerance::Tolerant)
            .await
            .map(|_| ())
    }

    pub async fn originate(&self, params: HashMap<String, String>) -> Result<Frame> {
        let id = self.next_action_id();
        let mut frame = Frame::new().with("Action", "Originate").with("ActionID", id.clone());
        for (k, v) in params {
            frame.insert(k, v);
        }
        self.send_action_with(id, frame, DEFAULT_ACTION_TIMEOUT, Tolerance::Strict)
            .await
    }

    pub async fn redirect(&self, channel: &str, extension: &str, context: &str) -> Result<Frame> {
        let id = self.next_action_id();
        let frame = Frame::new()
            .with("Action", "Redirect")
            .with("ActionID", id.clone())
            .with("Channel", channel)
            .with("Exten", extension)
            .with("Context", context)
            .with("Priority", "1");
        self.send_action_with(id, frame, DEFAULT_ACTION_TIMEOUT, Tolerance::Strict)
            .await
    }

    pub async fn hangup(&self, channel: &str, cause: &str) -> Result<Frame> {
        let id = self.next_action_id();
        let frame = Frame::new()
            .with("Action", "Hangup")
            .with("ActionID", id.clone())
            .with("Channel", channel)
            .with("Cause", cause);
        self.send_action_with(id, frame, DEFAULT_ACTION_TIMEOUT, Tolerance::Strict)
            .await
    }
}

fn frame_action_id(frame: &mut Frame) -> String {
    if let Some(existing) = frame.action_id() {
        return existing.to_string();
    }
    let id = uuid_like();
    frame.insert("ActionID", id.clone());
    id
}

fn uuid_like() -> String {
    format!(
        "{:x}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    )
}
