use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{
  Value,
  json,
};
use thiserror::Error;

use crate::position::{
  Position,
  Range,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
  pub range:    Range,
  pub new_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentEdit {
  pub uri:     String,
  pub version: Option<i32>,
  pub edits:   Vec<TextEdit>,
}

/// Text changes across one or more documents, merged per URI in stable
/// (sorted) order regardless of which wire form the server used.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspaceEdit {
  pub documents: Vec<DocumentEdit>,
}

impl WorkspaceEdit {
  pub fn is_empty(&self) -> bool {
    self.documents.iter().all(|document| document.edits.is_empty())
  }
}

#[derive(Debug, Error)]
pub enum WorkspaceEditParseError {
  #[error("failed to decode workspace edit payload: {0}")]
  Decode(#[from] serde_json::Error),
}

pub fn rename_params(uri: &str, position: Position, new_name: &str) -> Value {
  json!({
    "textDocument": { "uri": uri },
    "position": {
      "line": position.line,
      "character": position.character,
    },
    "newName": new_name,
  })
}

/// Accepts both the legacy `changes` map and the `documentChanges` array.
/// Resource operations (create/rename/delete file) are skipped; this client
/// only applies text edits. Absent or null result means no edit.
pub fn parse_workspace_edit(
  result: Option<&Value>,
) -> Result<Option<WorkspaceEdit>, WorkspaceEditParseError> {
  let Some(result) = result else {
    return Ok(None);
  };
  if result.is_null() {
    return Ok(None);
  }

  let wire: WorkspaceEditWire = serde_json::from_value(result.clone())?;
  let mut per_uri: BTreeMap<String, DocumentEdit> = BTreeMap::new();

  for (uri, edits) in wire.changes {
    let entry = per_uri.entry(uri.clone()).or_insert_with(|| {
      DocumentEdit {
        uri,
        version: None,
        edits: Vec::new(),
      }
    });
    entry.edits.extend(edits.into_iter().map(TextEditWire::into_edit));
  }

  for change in wire.document_changes {
    let DocumentChangeWire::Edit {
      text_document,
      edits,
    } = change
    else {
      continue;
    };

    let entry = per_uri.entry(text_document.uri.clone()).or_insert_with(|| {
      DocumentEdit {
        uri:     text_document.uri,
        version: text_document.version,
        edits:   Vec::new(),
      }
    });
    if entry.version.is_none() {
      entry.version = text_document.version;
    }
    entry
      .edits
      .extend(edits.into_iter().map(MaybeAnnotatedEditWire::into_edit));
  }

  Ok(Some(WorkspaceEdit {
    documents: per_uri.into_values().collect(),
  }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorkspaceEditWire {
  #[serde(default)]
  changes:          BTreeMap<String, Vec<TextEditWire>>,
  #[serde(default)]
  document_changes: Vec<DocumentChangeWire>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DocumentChangeWire {
  Edit {
    #[serde(rename = "textDocument")]
    text_document: VersionedDocumentWire,
    edits:         Vec<MaybeAnnotatedEditWire>,
  },
  // create/rename/delete file operations
  ResourceOperation {
    kind: String,
  },
}

#[derive(Debug, Deserialize)]
struct VersionedDocumentWire {
  uri:     String,
  version: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MaybeAnnotatedEditWire {
  range:         Range,
  new_text:      String,
  #[serde(default)]
  annotation_id: Option<String>,
}

impl MaybeAnnotatedEditWire {
  fn into_edit(self) -> TextEdit {
    TextEdit {
      range:    self.range,
      new_text: self.new_text,
    }
  }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TextEditWire {
  range:    Range,
  new_text: String,
}

impl TextEditWire {
  fn into_edit(self) -> TextEdit {
    TextEdit {
      range:    self.range,
      new_text: self.new_text,
    }
  }
}
