//! Test doubles shared by the session and rename tests.

use std::{
  path::{
    Path,
    PathBuf,
  },
  sync::{
    Arc,
    Mutex,
    mpsc::{
      Receiver,
      Sender,
      channel,
    },
  },
};

use ropey::Rope;
use serde_json::{
  Value,
  json,
};

use quill_lsp::{
  Client,
  ClientConfig,
  Transport,
  TransportError,
  TransportEvent,
  WorkspaceEdit,
  jsonrpc,
};

use crate::view::{
  EditApplier,
  ViewLike,
  WindowLike,
};

pub struct FakeView {
  text:       Rope,
  syntax:     String,
  file:       Option<PathBuf>,
  cursor:     usize,
  pub status: Vec<(String, String)>,
}

impl FakeView {
  pub fn new(text: &str, syntax: &str) -> Self {
    Self {
      text:   Rope::from_str(text),
      syntax: syntax.to_string(),
      file:   None,
      cursor: 0,
      status: Vec::new(),
    }
  }

  pub fn with_file(mut self, path: &str) -> Self {
    self.file = Some(PathBuf::from(path));
    self
  }

  pub fn with_cursor(mut self, cursor: usize) -> Self {
    self.cursor = cursor;
    self
  }
}

impl ViewLike for FakeView {
  fn file_name(&self) -> Option<&Path> {
    self.file.as_deref()
  }

  fn syntax_name(&self) -> &str {
    &self.syntax
  }

  fn text(&self) -> &Rope {
    &self.text
  }

  fn primary_cursor(&self) -> usize {
    self.cursor
  }

  fn set_status(&mut self, key: &str, value: &str) {
    self.status.push((key.to_string(), value.to_string()));
  }
}

#[derive(Default)]
pub struct FakeWindow {
  pub messages: Vec<String>,
}

impl WindowLike for FakeWindow {
  fn status_message(&mut self, message: &str) {
    self.messages.push(message.to_string());
  }

  fn is_open(&self) -> bool {
    true
  }
}

#[derive(Default)]
pub struct RecordingApplier {
  pub applied: Vec<WorkspaceEdit>,
}

impl EditApplier for RecordingApplier {
  fn apply_edit(&mut self, edit: &WorkspaceEdit) {
    self.applied.push(edit.clone());
  }
}

/// Channel-backed transport standing in for a server process.
pub struct LoopbackTransport {
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

/// The test's view of the fake server: what the client sent, plus a way to
/// inject inbound frames.
pub struct ServerEnd {
  sent:     Arc<Mutex<Vec<jsonrpc::Message>>>,
  event_tx: Sender<TransportEvent>,
}

impl ServerEnd {
  pub fn respond_ok(&self, id: u64, result: Value) {
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

  pub fn respond_err(&self, id: u64, code: i64, message: &str) {
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

  pub fn close(&self) {
    self.event_tx.send(TransportEvent::Closed).expect("event send");
  }

  pub fn sent(&self) -> Vec<jsonrpc::Message> {
    self.sent.lock().expect("sent lock").clone()
  }

  pub fn sent_methods(&self) -> Vec<String> {
    self
      .sent()
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

  pub fn last_request(&self, method: &str) -> Option<jsonrpc::Request> {
    self
      .sent()
      .iter()
      .rev()
      .find_map(|message| {
        match message {
          jsonrpc::Message::Request(request) if request.method == method => {
            Some(request.clone())
          },
          _ => None,
        }
      })
  }
}

pub fn loopback() -> (LoopbackTransport, ServerEnd) {
  let sent = Arc::new(Mutex::new(Vec::new()));
  let (event_tx, event_rx) = channel();
  let transport = LoopbackTransport {
    sent: Arc::clone(&sent),
    event_rx,
  };
  let server = ServerEnd { sent, event_tx };
  (transport, server)
}

pub fn pyls_config() -> ClientConfig {
  ClientConfig::new("pyls", vec!["pyls".into()]).with_language(
    "python",
    vec!["source.python".into()],
    vec!["Python".into()],
  )
}

/// A client that has completed its handshake and reports `renameProvider`.
pub fn ready_client(config: Arc<ClientConfig>) -> (Client, ServerEnd) {
  let (transport, server) = loopback();
  let mut client = Client::with_transport(config, Box::new(transport), Path::new("/tmp"))
    .expect("client start");
  server.respond_ok(1, json!({ "capabilities": { "renameProvider": true } }));
  client.pump();
  assert!(client.is_ready());
  (client, server)
}
