use std::path::Path;

use ropey::Rope;

use quill_lsp::WorkspaceEdit;

/// Read-only window into one editor buffer. The client core inspects views
/// but never mutates buffer contents through this trait; text changes go
/// through an `EditApplier`.
pub trait ViewLike {
  fn file_name(&self) -> Option<&Path>;
  fn syntax_name(&self) -> &str;
  fn text(&self) -> &Rope;
  fn primary_cursor(&self) -> usize;
  fn set_status(&mut self, key: &str, value: &str);
}

/// The hosting window, for user-facing messages and liveness checks.
pub trait WindowLike {
  fn status_message(&mut self, message: &str);
  fn is_open(&self) -> bool;
}

/// Applies a parsed workspace edit to the host's buffers. The core hands
/// over only non-empty edits; what the host does with them is its business.
pub trait EditApplier {
  fn apply_edit(&mut self, edit: &WorkspaceEdit);
}
