use std::{
  collections::BTreeMap,
  fmt,
  path::Path,
  sync::{
    Arc,
    mpsc::{
      Receiver,
      Sender,
      TryRecvError,
      channel,
    },
  },
};

use serde_json::{
  Value,
  json,
};
use thiserror::Error;
use tracing::{
  debug,
  warn,
};

use crate::{
  capabilities::CapabilitySet,
  config::{
    ClientConfig,
    ConfigError,
    TransportMode,
  },
  event::ClientEvent,
  jsonrpc,
  position,
  transport::{
    StdioTransport,
    TcpTransport,
    Transport,
    TransportError,
    TransportEvent,
  },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
  Starting,
  Ready,
  Stopping,
}

impl fmt::Display for ClientState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Self::Starting => "starting",
      Self::Ready => "ready",
      Self::Stopping => "stopping",
    };
    f.write_str(name)
  }
}

/// Terminal result of one request. Delivered through the `ResponseHandle`
/// exactly once per successfully dispatched request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestOutcome {
  Success(Value),
  Failure { code: i64, message: String },
  /// The owning client stopped before the server answered.
  Cancelled,
}

/// The receiving end of one in-flight request. Replaces a raw callback: the
/// outcome arrives at most once, and dropping the handle merely discards it.
#[derive(Debug)]
pub struct ResponseHandle {
  rx:   Receiver<RequestOutcome>,
  done: bool,
}

impl ResponseHandle {
  /// Non-blocking poll; `None` while the request is still in flight and
  /// after the outcome has been consumed.
  pub fn try_outcome(&mut self) -> Option<RequestOutcome> {
    if self.done {
      return None;
    }
    match self.rx.try_recv() {
      Ok(outcome) => {
        self.done = true;
        Some(outcome)
      },
      Err(TryRecvError::Empty) => None,
      Err(TryRecvError::Disconnected) => {
        self.done = true;
        Some(RequestOutcome::Cancelled)
      },
    }
  }

  /// Blocks until the outcome arrives. Only safe off the UI thread; the
  /// editor integration polls instead.
  pub fn wait(self) -> RequestOutcome {
    if self.done {
      return RequestOutcome::Cancelled;
    }
    self.rx.recv().unwrap_or(RequestOutcome::Cancelled)
  }
}

#[derive(Debug, Error)]
pub enum ClientError {
  /// Dispatch attempted while not READY. This client rejects explicitly
  /// rather than silently dropping the request.
  #[error("request dispatched while client is {state}")]
  NotReady { state: ClientState },
  #[error(transparent)]
  Config(#[from] ConfigError),
  #[error(transparent)]
  Transport(#[from] TransportError),
}

/// One language-server connection: lifecycle state machine plus request
/// dispatcher. Owned and pumped by a single thread; the transport's reader
/// thread never touches the pending table directly, it hands frames over a
/// channel that `pump` drains.
pub struct Client {
  config:        Arc<ClientConfig>,
  state:         ClientState,
  transport:     Box<dyn Transport>,
  next_id:       u64,
  initialize_id: u64,
  // BTreeMap keeps issue order: ids are allocated monotonically, and
  // cancellation must fire in the order requests were sent.
  pending:       BTreeMap<u64, Sender<RequestOutcome>>,
  capabilities:  CapabilitySet,
  exit_code:     Option<i32>,
}

impl Client {
  /// Launches the transport the config declares and begins the initialize
  /// handshake. The returned client is STARTING until `pump` observes the
  /// handshake response.
  pub fn start(config: Arc<ClientConfig>, workspace_root: &Path) -> Result<Self, ClientError> {
    let transport: Box<dyn Transport> = match config.transport_mode()? {
      TransportMode::Stdio { command, args } => {
        let env = config.env.iter().map(|(key, value)| (key.clone(), value.clone()));
        Box::new(StdioTransport::spawn(command, args, env, workspace_root)?)
      },
      TransportMode::Tcp { host, port } => Box::new(TcpTransport::connect(host, port)?),
    };
    Self::with_transport(config, transport, workspace_root)
  }

  /// Runs the client over an already-established transport.
  pub fn with_transport(
    config: Arc<ClientConfig>,
    transport: Box<dyn Transport>,
    workspace_root: &Path,
  ) -> Result<Self, ClientError> {
    let mut client = Self {
      config,
      state: ClientState::Starting,
      transport,
      next_id: 0,
      initialize_id: 0,
      pending: BTreeMap::new(),
      capabilities: CapabilitySet::default(),
      exit_code: None,
    };
    client.send_initialize(workspace_root)?;
    Ok(client)
  }

  pub fn config(&self) -> &Arc<ClientConfig> {
    &self.config
  }

  pub fn state(&self) -> ClientState {
    self.state
  }

  pub fn is_ready(&self) -> bool {
    self.state == ClientState::Ready
  }

  pub fn capabilities(&self) -> &CapabilitySet {
    &self.capabilities
  }

  /// Dispatches a request and returns the handle its outcome will arrive
  /// on. Fails with `NotReady` while the handshake is incomplete or the
  /// client is stopping.
  pub fn send_request(
    &mut self,
    method: &str,
    params: Value,
  ) -> Result<ResponseHandle, ClientError> {
    if self.state != ClientState::Ready {
      return Err(ClientError::NotReady { state: self.state });
    }

    let id = self.allocate_id();
    let (tx, rx) = channel();
    self.pending.insert(id, tx);

    if let Err(err) = self
      .transport
      .send(jsonrpc::Message::request(id, method, Some(params)))
    {
      self.pending.remove(&id);
      self.enter_stopping();
      return Err(err.into());
    }

    debug!(server = %self.config.name, id, method, "request dispatched");
    Ok(ResponseHandle { rx, done: false })
  }

  pub fn send_notification(&mut self, method: &str, params: Value) -> Result<(), ClientError> {
    if self.state != ClientState::Ready {
      return Err(ClientError::NotReady { state: self.state });
    }
    self
      .transport
      .send(jsonrpc::Message::notification(method, Some(params)))?;
    Ok(())
  }

  /// Drains decoded transport events on the caller's thread: completes the
  /// handshake, correlates responses to pending requests, forwards server
  /// notifications and stderr.
  pub fn pump(&mut self) -> Vec<ClientEvent> {
    let mut events = Vec::new();

    while let Some(event) = self.transport.try_recv_event() {
      match event {
        TransportEvent::Message(message) => self.handle_message(message, &mut events),
        TransportEvent::Stderr(line) => events.push(ClientEvent::ServerStderr { line }),
        TransportEvent::ReadError(reason) | TransportEvent::WriteError(reason) => {
          warn!(server = %self.config.name, %reason, "transport failed");
          self.enter_stopping();
          events.push(ClientEvent::TransportFailed { reason });
        },
        TransportEvent::Closed => {
          self.enter_stopping();
          events.push(ClientEvent::Stopped {
            exit_code: self.exit_code,
          });
        },
      }

      if self.state == ClientState::Stopping {
        break;
      }
    }

    events
  }

  /// Explicit shutdown: best-effort `shutdown`/`exit` to the server, then
  /// STOPPING with all pending requests cancelled.
  pub fn shutdown(&mut self) {
    if self.state != ClientState::Stopping {
      let id = self.allocate_id();
      let _ = self
        .transport
        .send(jsonrpc::Message::request(id, "shutdown", None));
      let _ = self.transport.send(jsonrpc::Message::notification("exit", None));
    }
    self.enter_stopping();

    match self.transport.shutdown() {
      Ok(exit_code) => self.exit_code = exit_code,
      Err(err) => {
        warn!(server = %self.config.name, error = %err, "transport shutdown failed");
      },
    }
  }

  fn allocate_id(&mut self) -> u64 {
    self.next_id += 1;
    self.next_id
  }

  fn send_initialize(&mut self, workspace_root: &Path) -> Result<(), ClientError> {
    let id = self.allocate_id();
    self.initialize_id = id;

    let params = json!({
      "processId": std::process::id(),
      "rootUri": position::file_uri_for_path(workspace_root),
      "capabilities": {
        "textDocument": {
          "synchronization": { "didSave": true },
          "rename": {},
        },
      },
      "initializationOptions": Value::Object(self.config.init_options.clone()),
    });
    self
      .transport
      .send(jsonrpc::Message::request(id, "initialize", Some(params)))?;
    debug!(server = %self.config.name, "initialize sent");
    Ok(())
  }

  fn handle_message(&mut self, message: jsonrpc::Message, events: &mut Vec<ClientEvent>) {
    match message {
      jsonrpc::Message::Response(response) => self.handle_response(response, events),
      jsonrpc::Message::Notification(notification) => {
        events.push(ClientEvent::Notification {
          method: notification.method,
          params: notification.params,
        });
      },
      jsonrpc::Message::Request(request) => {
        // Server-to-client requests (workspace/configuration and friends)
        // are not implemented; answer so the server is not left waiting.
        debug!(server = %self.config.name, method = %request.method, "server request declined");
        let _ = self.transport.send(jsonrpc::Message::error_response(
          request.id,
          jsonrpc::code::METHOD_NOT_FOUND,
          format!("unsupported client method: {}", request.method),
        ));
      },
    }
  }

  fn handle_response(&mut self, response: jsonrpc::Response, events: &mut Vec<ClientEvent>) {
    let Some(id) = response.id.as_number() else {
      warn!(server = %self.config.name, "response with non-numeric id dropped");
      return;
    };

    if self.state == ClientState::Starting && id == self.initialize_id {
      self.finish_handshake(response, events);
      return;
    }

    let Some(tx) = self.pending.remove(&id) else {
      warn!(server = %self.config.name, id, "response does not match any pending request");
      return;
    };

    let outcome = match response.error {
      Some(error) => {
        RequestOutcome::Failure {
          code:    error.code,
          message: error.message,
        }
      },
      None => RequestOutcome::Success(response.result.unwrap_or(Value::Null)),
    };
    debug!(server = %self.config.name, id, "request completed");
    // The handle may have been dropped; that only discards the outcome.
    let _ = tx.send(outcome);
  }

  fn finish_handshake(&mut self, response: jsonrpc::Response, events: &mut Vec<ClientEvent>) {
    if let Some(error) = response.error {
      warn!(server = %self.config.name, code = error.code, message = %error.message, "initialize rejected");
      self.enter_stopping();
      events.push(ClientEvent::HandshakeFailed {
        code:    error.code,
        message: error.message,
      });
      return;
    }

    let raw_capabilities = response
      .result
      .as_ref()
      .and_then(|result| result.get("capabilities"))
      .cloned()
      .unwrap_or(Value::Null);
    self.capabilities = CapabilitySet::from_raw(raw_capabilities);
    self.state = ClientState::Ready;

    let _ = self
      .transport
      .send(jsonrpc::Message::notification("initialized", Some(json!({}))));
    debug!(server = %self.config.name, "client ready");
    events.push(ClientEvent::Ready);
  }

  /// STOPPING is terminal. Every pending request resolves `Cancelled`, in
  /// the order the requests were issued.
  fn enter_stopping(&mut self) {
    if self.state == ClientState::Stopping {
      return;
    }
    self.state = ClientState::Stopping;

    for (id, tx) in std::mem::take(&mut self.pending) {
      debug!(server = %self.config.name, id, "pending request cancelled");
      let _ = tx.send(RequestOutcome::Cancelled);
    }
  }
}

impl Drop for Client {
  fn drop(&mut self) {
    self.shutdown();
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use super::*;

  /// Channel-backed stand-in for a server process: records what the client
  /// sends and lets the test inject inbound transport events.
  struct LoopbackTransport {
    sent:     Arc<Mutex<Vec<jsonrpc::Message>>>,
    event_rx: Receiver<TransportEvent>,
  }

  impl Transport for LoopbackTransport {
    fn send(&self, message: jsonrpc::Message) -> Result<(), TransportError> {
      self.sent.lock().expect("sent lock").push(message);
      Ok(())
    }

    fn try_recv_event(&self) -> Option<TransportEvent> {
      self.event_rx.try_recv().ok()
    }

    fn shutdown(&mut self) -> Result<Option<i32>, TransportError> {
      Ok(None)
    }
  }

  struct Harness {
    client:   Client,
    sent:     Arc<Mutex<Vec<jsonrpc::Message>>>,
    event_tx: Sender<TransportEvent>,
  }

  impl Harness {
    fn starting() -> Self {
      let sent = Arc::new(Mutex::new(Vec::new()));
      let (event_tx, event_rx) = channel();
      let transport = LoopbackTransport {
        sent: Arc::clone(&sent),
        event_rx,
      };
      let config = Arc::new(ClientConfig::new("pyls", vec!["pyls".into()]).with_language(
        "python",
        vec!["source.python".into()],
        vec!["Python".into()],
      ));
      let client = Client::with_transport(config, Box::new(transport), Path::new("/tmp"))
        .expect("client start");
      Self {
        client,
        sent,
        event_tx,
      }
    }

    fn ready() -> Self {
      let mut harness = Self::starting();
      harness.respond_ok(1, json!({ "capabilities": { "renameProvider": true } }));
      let events = harness.client.pump();
      assert!(events.contains(&ClientEvent::Ready));
      harness
    }

    fn respond_ok(&self, id: u64, result: Value) {
      let response = jsonrpc::Response {
        jsonrpc: jsonrpc::Version::V2,
        id:      jsonrpc::Id::Number(id),
        result:  Some(result),
        error:   None,
      };
      self
        .event_tx
        .send(TransportEvent::Message(jsonrpc::Message::Response(response)))
        .expect("event send");
    }

    fn respond_err(&self, id: u64, code: i64, message: &str) {
      let response = jsonrpc::Response {
        jsonrpc: jsonrpc::Version::V2,
        id:      jsonrpc::Id::Number(id),
        result:  None,
        error:   Some(jsonrpc::ResponseError {
          code,
          message: message.to_string(),
          data: None,
        }),
      };
      self
        .event_tx
        .send(TransportEvent::Message(jsonrpc::Message::Response(response)))
        .expect("event send");
    }

    fn sent_methods(&self) -> Vec<String> {
      self
        .sent
        .lock()
        .expect("sent lock")
        .iter()
        .filter_map(|message| {
          match message {
            jsonrpc::Message::Request(request) => Some(request.method.clone()),
            jsonrpc::Message::Notification(notification) => Some(notification.method.clone()),
            jsonrpc::Message::Response(_) => None,
          }
        })
        .collect()
    }
  }

  #[test]
  fn handshake_reaches_ready_and_snapshots_capabilities() {
    let harness = Harness::ready();
    assert_eq!(harness.client.state(), ClientState::Ready);
    assert!(
      harness
        .client
        .capabilities()
        .supports(crate::capabilities::Capability::Rename)
    );
    assert_eq!(harness.sent_methods(), vec!["initialize", "initialized"]);
  }

  #[test]
  fn dispatch_before_ready_is_rejected() {
    let mut harness = Harness::starting();
    let err = harness
      .client
      .send_request("textDocument/rename", json!({}))
      .unwrap_err();
    assert!(matches!(err, ClientError::NotReady {
      state: ClientState::Starting,
    }));
  }

  #[test]
  fn handshake_error_stops_the_client() {
    let mut harness = Harness::starting();
    harness.respond_err(1, -32603, "init blew up");
    let events = harness.client.pump();
    assert!(matches!(events[0], ClientEvent::HandshakeFailed { .. }));
    assert_eq!(harness.client.state(), ClientState::Stopping);
  }

  #[test]
  fn responses_resolve_out_of_order_exactly_once() {
    let mut harness = Harness::ready();
    let mut first = harness
      .client
      .send_request("textDocument/hover", json!({}))
      .expect("dispatch");
    let mut second = harness
      .client
      .send_request("textDocument/rename", json!({}))
      .expect("dispatch");

    // ids 2 and 3 (1 went to initialize); answer in reverse order.
    harness.respond_ok(3, json!({ "changes": {} }));
    harness.respond_ok(2, json!(null));
    harness.client.pump();

    assert_eq!(
      second.try_outcome(),
      Some(RequestOutcome::Success(json!({ "changes": {} })))
    );
    assert_eq!(first.try_outcome(), Some(RequestOutcome::Success(json!(null))));
    // A second poll finds nothing more.
    assert_eq!(first.try_outcome(), None);
  }

  #[test]
  fn server_error_payload_becomes_failure_outcome() {
    let mut harness = Harness::ready();
    let mut handle = harness
      .client
      .send_request("textDocument/rename", json!({}))
      .expect("dispatch");
    harness.respond_err(2, -32602, "no symbol here");
    harness.client.pump();

    assert_eq!(
      handle.try_outcome(),
      Some(RequestOutcome::Failure {
        code:    -32602,
        message: "no symbol here".to_string(),
      })
    );
  }

  #[test]
  fn shutdown_cancels_pending_in_issue_order() {
    let mut harness = Harness::ready();
    let mut handles: Vec<ResponseHandle> = (0..3)
      .map(|_| {
        harness
          .client
          .send_request("textDocument/hover", json!({}))
          .expect("dispatch")
      })
      .collect();

    harness.client.shutdown();
    assert_eq!(harness.client.state(), ClientState::Stopping);

    for handle in &mut handles {
      assert_eq!(handle.try_outcome(), Some(RequestOutcome::Cancelled));
    }

    let err = harness
      .client
      .send_request("textDocument/hover", json!({}))
      .unwrap_err();
    assert!(matches!(err, ClientError::NotReady {
      state: ClientState::Stopping,
    }));
  }

  #[test]
  fn transport_close_stops_and_cancels() {
    let mut harness = Harness::ready();
    let mut handle = harness
      .client
      .send_request("textDocument/rename", json!({}))
      .expect("dispatch");

    harness
      .event_tx
      .send(TransportEvent::Closed)
      .expect("event send");
    let events = harness.client.pump();

    assert!(matches!(events[0], ClientEvent::Stopped { .. }));
    assert_eq!(handle.try_outcome(), Some(RequestOutcome::Cancelled));
    assert_eq!(harness.client.state(), ClientState::Stopping);
  }

  #[test]
  fn unknown_response_id_is_dropped() {
    let mut harness = Harness::ready();
    harness.respond_ok(999, json!("stray"));
    let events = harness.client.pump();
    assert!(events.is_empty());
    assert_eq!(harness.client.state(), ClientState::Ready);
  }

  #[test]
  fn server_request_gets_method_not_found() {
    let mut harness = Harness::ready();
    let request = jsonrpc::Message::request(42, "workspace/configuration", None);
    harness
      .event_tx
      .send(TransportEvent::Message(request))
      .expect("event send");
    harness.client.pump();

    let sent = harness.sent.lock().expect("sent lock");
    let reply = sent
      .iter()
      .find_map(|message| {
        match message {
          jsonrpc::Message::Response(response) => Some(response.clone()),
          _ => None,
        }
      })
      .expect("a reply");
    assert_eq!(
      reply.error.map(|error| error.code),
      Some(jsonrpc::code::METHOD_NOT_FOUND)
    );
  }

  #[test]
  fn server_notification_is_surfaced() {
    let mut harness = Harness::ready();
    let notification =
      jsonrpc::Message::notification("textDocument/publishDiagnostics", Some(json!({})));
    harness
      .event_tx
      .send(TransportEvent::Message(notification))
      .expect("event send");
    let events = harness.client.pump();
    assert!(matches!(
      events[0],
      ClientEvent::Notification { ref method, .. } if method == "textDocument/publishDiagnostics"
    ));
  }
}
