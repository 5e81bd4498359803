use serde_json::Value;

/// What `Client::pump` surfaces to the embedding editor. Request completion
/// is not an event; it resolves the per-request `ResponseHandle` instead.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
  /// Initialize handshake completed; the client accepts requests now.
  Ready,
  /// Handshake was rejected by the server. The client is stopping.
  HandshakeFailed { code: i64, message: String },
  /// The transport failed mid-flight. The client is stopping.
  TransportFailed { reason: String },
  /// The server closed the connection or exited.
  Stopped { exit_code: Option<i32> },
  /// A server-initiated notification (diagnostics, log messages, ...).
  Notification {
    method: String,
    params: Option<Value>,
  },
  /// One line of the server's stderr.
  ServerStderr { line: String },
}
