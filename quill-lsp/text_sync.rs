use ropey::Rope;
use serde_json::{
  Value,
  json,
};

pub fn did_open_params(uri: &str, language_id: &str, version: i32, text: &Rope) -> Value {
  json!({
    "textDocument": {
      "uri": uri,
      "languageId": language_id,
      "version": version,
      "text": text.to_string(),
    }
  })
}

/// Full-document sync. Incremental sync needs a change-tracking text engine
/// this client does not carry.
pub fn did_change_full_params(uri: &str, version: i32, text: &Rope) -> Value {
  json!({
    "textDocument": {
      "uri": uri,
      "version": version,
    },
    "contentChanges": [
      { "text": text.to_string() }
    ],
  })
}

pub fn did_close_params(uri: &str) -> Value {
  json!({
    "textDocument": { "uri": uri }
  })
}
