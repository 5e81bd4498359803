use std::path::{
  Path,
  PathBuf,
};

use ropey::Rope;
use serde::{
  Deserialize,
  Serialize,
};

/// Zero-based line and UTF-16 code-unit column, the protocol's native
/// position representation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
  pub line:      u32,
  pub character: u32,
}

impl Position {
  pub fn new(line: u32, character: u32) -> Self {
    Self { line, character }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
  pub start: Position,
  pub end:   Position,
}

/// Converts an editor character index into a protocol position. Out-of-range
/// indices clamp to the end of the document.
pub fn position_of_char_idx(text: &Rope, char_idx: usize) -> Position {
  let char_idx = char_idx.min(text.len_chars());
  let line = text.char_to_line(char_idx);
  let line_start = text.line_to_char(line);
  let character = text
    .slice(line_start..char_idx)
    .chars()
    .map(|ch| ch.len_utf16() as u32)
    .sum::<u32>();

  Position {
    line: line as u32,
    character,
  }
}

/// Inverse of `position_of_char_idx`. Columns past the end of the line clamp
/// to the last character of that line.
pub fn char_idx_of_position(text: &Rope, position: Position) -> usize {
  if text.len_chars() == 0 {
    return 0;
  }

  let line = (position.line as usize).min(text.len_lines().saturating_sub(1));
  let line_start = text.line_to_char(line);
  let line_end = if line + 1 < text.len_lines() {
    text.line_to_char(line + 1)
  } else {
    text.len_chars()
  };

  let mut utf16_count = 0u32;
  let mut char_idx = line_start;
  for ch in text.slice(line_start..line_end).chars() {
    let next = utf16_count.saturating_add(ch.len_utf16() as u32);
    if next > position.character {
      break;
    }
    utf16_count = next;
    char_idx = char_idx.saturating_add(1);
  }

  char_idx
}

pub fn file_uri_for_path(path: &Path) -> Option<String> {
  let absolute = if path.is_absolute() {
    path.to_path_buf()
  } else {
    std::env::current_dir().ok()?.join(path)
  };
  url::Url::from_file_path(absolute).ok().map(Into::into)
}

pub fn path_for_file_uri(uri: &str) -> Option<PathBuf> {
  let parsed = url::Url::parse(uri).ok()?;
  if parsed.scheme() != "file" {
    return None;
  }
  parsed.to_file_path().ok()
}
