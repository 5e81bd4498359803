//! Language-server client plumbing: configuration and syntax matching,
//! framed JSON-RPC transports, and the per-server connection state machine.

pub mod capabilities;
pub mod client;
pub mod config;
pub mod event;
pub mod jsonrpc;
pub mod matcher;
pub mod position;
pub mod text_sync;
pub mod transport;
pub mod workspace_edit;

pub use capabilities::{
  Capability,
  CapabilitySet,
};
pub use client::{
  Client,
  ClientError,
  ClientState,
  RequestOutcome,
  ResponseHandle,
};
pub use config::{
  ClientConfig,
  ConfigError,
  LanguageConfig,
  TransportMode,
};
pub use event::ClientEvent;
pub use matcher::{
  MatchError,
  SyntaxMatch,
  config_supports_syntax,
  syntax_match,
};
pub use position::{
  Position,
  Range,
  char_idx_of_position,
  file_uri_for_path,
  path_for_file_uri,
  position_of_char_idx,
};
pub use transport::{
  StdioTransport,
  TcpTransport,
  Transport,
  TransportError,
  TransportEvent,
};
pub use workspace_edit::{
  DocumentEdit,
  TextEdit,
  WorkspaceEdit,
  WorkspaceEditParseError,
  parse_workspace_edit,
  rename_params,
};
