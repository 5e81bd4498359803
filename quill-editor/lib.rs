//! Editor-boundary half of the language-server client: capability traits
//! for views and windows, position resolution, process-wide settings, the
//! per-window client session, and the rename command workflow.

pub mod rename;
pub mod resolver;
pub mod session;
pub mod settings;
pub mod view;

#[cfg(test)]
mod fixtures;

pub use rename::{
  PendingRename,
  RenameCommand,
  RenameError,
  RenamePrompt,
};
pub use resolver::{
  DocumentPosition,
  PointerEvent,
  WordSpan,
  document_position,
  is_at_word,
  resolve_char_idx,
  word_at,
};
pub use session::Session;
pub use settings::{
  DiagnosticsHighlightStyle,
  DocumentHighlightStyle,
  LogTarget,
  Settings,
};
pub use view::{
  EditApplier,
  ViewLike,
  WindowLike,
};
