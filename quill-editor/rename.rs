use std::path::Path;

use thiserror::Error;
use tracing::{
  debug,
  warn,
};

use quill_lsp::{
  Capability,
  ClientError,
  RequestOutcome,
  ResponseHandle,
  parse_workspace_edit,
  rename_params,
};

use crate::{
  resolver::{
    DocumentPosition,
    PointerEvent,
    document_position,
    is_at_word,
    resolve_char_idx,
    word_at,
  },
  session::Session,
  view::{
    EditApplier,
    ViewLike,
    WindowLike,
  },
};

#[derive(Debug, Error)]
pub enum RenameError {
  #[error("no language server serves syntax `{syntax}`")]
  NoClient { syntax: String },
  #[error("server `{server}` does not support rename")]
  Unsupported { server: String },
  #[error(transparent)]
  Client(#[from] ClientError),
}

/// The symbol-rename command. Enablement, prompt capture, and dispatch are
/// split so the host's input panel sits between prepare and submit.
pub struct RenameCommand;

impl RenameCommand {
  /// Enabled only with a word under the resolved position and a ready
  /// serving client that reports rename support.
  pub fn is_enabled(view: &dyn ViewLike, session: &Session, event: &PointerEvent) -> bool {
    if !is_at_word(view, event) {
      return false;
    }
    let Some(client) = session.running_for_syntax(view.syntax_name()) else {
      return false;
    };
    client.is_ready() && client.capabilities().supports(Capability::Rename)
  }

  /// Captures the target position and the current word as the suggested
  /// name. `None` for unsaved buffers. If the host never calls `submit`,
  /// the prompt was cancelled and no request is sent.
  pub fn prepare(view: &dyn ViewLike, event: &PointerEvent) -> Option<RenamePrompt> {
    let target = document_position(view, event)?;
    let suggested_name = word_at(view, resolve_char_idx(view, event))
      .map(|span| span.text)
      .unwrap_or_default();
    Some(RenamePrompt {
      target,
      suggested_name,
    })
  }
}

pub struct RenamePrompt {
  pub target:         DocumentPosition,
  pub suggested_name: String,
}

impl RenamePrompt {
  /// Dispatches `textDocument/rename` through the serving client.
  pub fn submit(
    self,
    session: &mut Session,
    view: &dyn ViewLike,
    workspace_root: &Path,
    new_name: &str,
  ) -> Result<PendingRename, RenameError> {
    let client = session.client_for_view(view, workspace_root).ok_or_else(|| {
      RenameError::NoClient {
        syntax: view.syntax_name().to_string(),
      }
    })?;
    if !client.capabilities().supports(Capability::Rename) {
      return Err(RenameError::Unsupported {
        server: client.config().name.clone(),
      });
    }

    let params = rename_params(&self.target.uri, self.target.position, new_name);
    let handle = client.send_request("textDocument/rename", params)?;
    Ok(PendingRename {
      server: client.config().name.clone(),
      handle,
    })
  }
}

/// An in-flight rename. Poll until it reports completion; the workspace
/// edit reaches the applier at most once.
pub struct PendingRename {
  server: String,
  handle: ResponseHandle,
}

impl PendingRename {
  /// `true` once the outcome has been consumed. An empty or absent edit
  /// completes silently; failures go to the window's status line.
  pub fn poll(&mut self, applier: &mut dyn EditApplier, window: &mut dyn WindowLike) -> bool {
    let Some(outcome) = self.handle.try_outcome() else {
      return false;
    };

    match outcome {
      RequestOutcome::Success(result) => {
        match parse_workspace_edit(Some(&result)) {
          Ok(Some(edit)) if !edit.is_empty() => applier.apply_edit(&edit),
          Ok(_) => debug!(server = %self.server, "rename produced no edits"),
          Err(err) => {
            warn!(server = %self.server, error = %err, "rename response malformed");
            window.status_message(&format!("rename failed: bad response from {}", self.server));
          },
        }
      },
      RequestOutcome::Failure { code, message } => {
        warn!(server = %self.server, code, %message, "rename rejected");
        window.status_message(&format!("rename failed: {message}"));
      },
      RequestOutcome::Cancelled => {
        window.status_message(&format!("rename cancelled: {} stopped", self.server));
      },
    }
    true
  }
}
