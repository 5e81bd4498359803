use std::{
  collections::{
    HashMap,
    HashSet,
  },
  path::Path,
  sync::Arc,
};

use tracing::{
  debug,
  warn,
};

use quill_lsp::{
  Client,
  ClientConfig,
  ClientEvent,
  ClientState,
  config_supports_syntax,
  file_uri_for_path,
  syntax_match,
  text_sync,
};

use crate::view::ViewLike;

/// Owns the config registry and the running clients, and routes views to
/// the server that claims their syntax. One session per editor window.
pub struct Session {
  configs:  Vec<Arc<ClientConfig>>,
  disabled: HashSet<String>,
  clients:  HashMap<String, Client>,
  // Per client, the URIs opened with it and their sync versions.
  opened:   HashMap<String, HashMap<String, i32>>,
}

impl Session {
  pub fn new(configs: Vec<ClientConfig>) -> Self {
    Self {
      configs:  configs.into_iter().map(Arc::new).collect(),
      disabled: HashSet::new(),
      clients:  HashMap::new(),
      opened:   HashMap::new(),
    }
  }

  /// First enabled config whose matcher accepts the syntax; declaration
  /// order decides ties.
  pub fn config_for_syntax(&self, syntax: &str) -> Option<&Arc<ClientConfig>> {
    self
      .configs
      .iter()
      .filter(|config| config.enabled && !self.disabled.contains(&config.name))
      .find(|config| config_supports_syntax(config, syntax))
  }

  pub fn running(&self, name: &str) -> Option<&Client> {
    self.clients.get(name)
  }

  /// The already-running client that would serve this syntax, if any. Never
  /// starts one; `client_for_view` does that.
  pub fn running_for_syntax(&self, syntax: &str) -> Option<&Client> {
    let config = self.config_for_syntax(syntax)?;
    self.clients.get(&config.name)
  }

  /// Routes a view to its serving client, starting one on first use and
  /// opening the view's document with it once the client is ready.
  pub fn client_for_view(
    &mut self,
    view: &dyn ViewLike,
    workspace_root: &Path,
  ) -> Option<&mut Client> {
    let config = Arc::clone(self.config_for_syntax(view.syntax_name())?);
    let name = config.name.clone();

    if !self.clients.contains_key(&name) {
      match Client::start(config, workspace_root) {
        Ok(client) => {
          debug!(server = %name, "language server started");
          self.clients.insert(name.clone(), client);
        },
        Err(err) => {
          warn!(server = %name, error = %err, "language server failed to start");
          return None;
        },
      }
    }

    self.ensure_document_open(&name, view);
    self.clients.get_mut(&name)
  }

  /// Pumps every client and reaps the ones that stopped. Events come back
  /// tagged with the owning config name.
  pub fn poll(&mut self) -> Vec<(String, ClientEvent)> {
    let mut events = Vec::new();
    for (name, client) in &mut self.clients {
      for event in client.pump() {
        events.push((name.clone(), event));
      }
    }

    let stopped: Vec<String> = self
      .clients
      .iter()
      .filter(|(_, client)| client.state() == ClientState::Stopping)
      .map(|(name, _)| name.clone())
      .collect();
    for name in stopped {
      debug!(server = %name, "client reaped");
      self.clients.remove(&name);
      self.opened.remove(&name);
    }

    events
  }

  /// Full-document sync after a buffer change, routed to the serving client
  /// if the document was opened with it.
  pub fn note_document_change(&mut self, view: &dyn ViewLike) {
    let Some(config) = self.config_for_syntax(view.syntax_name()) else {
      return;
    };
    let name = config.name.clone();
    let Some(uri) = view.file_name().and_then(file_uri_for_path) else {
      return;
    };
    let Some(client) = self.clients.get_mut(&name) else {
      return;
    };
    let Some(version) = self
      .opened
      .get_mut(&name)
      .and_then(|documents| documents.get_mut(&uri))
    else {
      return;
    };

    *version += 1;
    let params = text_sync::did_change_full_params(&uri, *version, view.text());
    if let Err(err) = client.send_notification("textDocument/didChange", params) {
      warn!(server = %name, error = %err, "didChange not delivered");
    }
  }

  pub fn close_document(&mut self, view: &dyn ViewLike) {
    let Some(config) = self.config_for_syntax(view.syntax_name()) else {
      return;
    };
    let name = config.name.clone();
    let Some(uri) = view.file_name().and_then(file_uri_for_path) else {
      return;
    };
    let was_open = self
      .opened
      .get_mut(&name)
      .and_then(|documents| documents.remove(&uri))
      .is_some();
    if !was_open {
      return;
    }
    if let Some(client) = self.clients.get_mut(&name) {
      let _ = client.send_notification("textDocument/didClose", text_sync::did_close_params(&uri));
    }
  }

  /// Disables a config for the rest of the session and stops its client.
  pub fn disable_config(&mut self, name: &str) {
    self.disabled.insert(name.to_string());
    if let Some(mut client) = self.clients.remove(name) {
      debug!(server = %name, "client stopped: config disabled");
      client.shutdown();
    }
    self.opened.remove(name);
  }

  pub fn shutdown(&mut self) {
    for (name, mut client) in self.clients.drain() {
      debug!(server = %name, "client stopped: session shutdown");
      client.shutdown();
    }
    self.opened.clear();
  }

  #[cfg(test)]
  pub(crate) fn install_client(&mut self, client: Client) {
    let name = client.config().name.clone();
    self.clients.insert(name, client);
  }

  fn ensure_document_open(&mut self, name: &str, view: &dyn ViewLike) {
    let Some(client) = self.clients.get_mut(name) else {
      return;
    };
    // didOpen has to wait for the handshake; until then the document stays
    // unopened and a later routing attempt retries.
    if !client.is_ready() {
      return;
    }
    let Some(uri) = view.file_name().and_then(file_uri_for_path) else {
      return;
    };

    let documents = self.opened.entry(name.to_string()).or_default();
    if documents.contains_key(&uri) {
      return;
    }

    let language_id = language_id_for_syntax(client.config(), view.syntax_name());
    let params = text_sync::did_open_params(&uri, &language_id, 1, view.text());
    match client.send_notification("textDocument/didOpen", params) {
      Ok(()) => {
        debug!(server = %name, %uri, "document opened");
        documents.insert(uri, 1);
      },
      Err(err) => {
        warn!(server = %name, %uri, error = %err, "didOpen not delivered");
      },
    }
  }
}

fn language_id_for_syntax(config: &ClientConfig, syntax: &str) -> String {
  syntax_match(config, syntax)
    .language
    .or_else(|| config.languages.first())
    .map(|language| language.id.clone())
    .unwrap_or_else(|| "plaintext".to_string())
}
