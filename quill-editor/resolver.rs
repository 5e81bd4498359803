use quill_lsp::{
  Position,
  file_uri_for_path,
  position_of_char_idx,
};

use crate::view::ViewLike;

/// An input event that may carry an explicit buffer location (mouse click,
/// context menu). Events without one resolve to the primary cursor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PointerEvent {
  pub char_idx: Option<usize>,
}

impl PointerEvent {
  pub fn at(char_idx: usize) -> Self {
    Self {
      char_idx: Some(char_idx),
    }
  }
}

/// A protocol-addressable location: the view's file URI plus the converted
/// position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPosition {
  pub uri:      String,
  pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordSpan {
  pub start: usize,
  pub end:   usize,
  pub text:  String,
}

pub fn resolve_char_idx(view: &dyn ViewLike, event: &PointerEvent) -> usize {
  event.char_idx.unwrap_or_else(|| view.primary_cursor())
}

/// `None` when the view has no backing file; unsaved buffers cannot be
/// addressed by URI.
pub fn document_position(view: &dyn ViewLike, event: &PointerEvent) -> Option<DocumentPosition> {
  let uri = file_uri_for_path(view.file_name()?)?;
  let position = position_of_char_idx(view.text(), resolve_char_idx(view, event));
  Some(DocumentPosition { uri, position })
}

/// The identifier-like token containing or ending at `char_idx`. A caret
/// sitting immediately after a word still counts as being on it.
pub fn word_at(view: &dyn ViewLike, char_idx: usize) -> Option<WordSpan> {
  let text = view.text();
  let len = text.len_chars();
  let char_idx = char_idx.min(len);

  let anchor = if char_idx < len && is_word_char(text.char(char_idx)) {
    char_idx
  } else if char_idx > 0 && is_word_char(text.char(char_idx - 1)) {
    char_idx - 1
  } else {
    return None;
  };

  let mut start = anchor;
  while start > 0 && is_word_char(text.char(start - 1)) {
    start -= 1;
  }
  let mut end = anchor + 1;
  while end < len && is_word_char(text.char(end)) {
    end += 1;
  }

  Some(WordSpan {
    start,
    end,
    text: text.slice(start..end).to_string(),
  })
}

/// Gates command enablement; a `false` here is not an error.
pub fn is_at_word(view: &dyn ViewLike, event: &PointerEvent) -> bool {
  word_at(view, resolve_char_idx(view, event)).is_some()
}

fn is_word_char(ch: char) -> bool {
  ch.is_alphanumeric() || ch == '_'
}
