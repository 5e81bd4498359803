use serde::{
  Deserialize,
  Serialize,
};
use serde_json::Value;

/// Error codes the client itself produces or inspects. Server-defined codes
/// pass through untouched.
pub mod code {
  pub const PARSE_ERROR: i64 = -32700;
  pub const INVALID_REQUEST: i64 = -32600;
  pub const METHOD_NOT_FOUND: i64 = -32601;
  pub const REQUEST_CANCELLED: i64 = -32800;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Version {
  #[serde(rename = "2.0")]
  V2,
}

impl Default for Version {
  fn default() -> Self {
    Self::V2
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
  Null,
  Number(u64),
  String(String),
}

impl Id {
  pub fn as_number(&self) -> Option<u64> {
    match self {
      Self::Number(id) => Some(*id),
      Self::Null | Self::String(_) => None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
  #[serde(default)]
  pub jsonrpc: Version,
  pub id:      Id,
  pub method:  String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub params:  Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
  #[serde(default)]
  pub jsonrpc: Version,
  pub method:  String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub params:  Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseError {
  pub code:    i64,
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub data:    Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
  #[serde(default)]
  pub jsonrpc: Version,
  pub id:      Id,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub result:  Option<Value>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error:   Option<ResponseError>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
  Request(Request),
  Notification(Notification),
  Response(Response),
}

impl Message {
  pub fn request(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
    Self::Request(Request {
      jsonrpc: Version::V2,
      id:      Id::Number(id),
      method:  method.into(),
      params,
    })
  }

  pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
    Self::Notification(Notification {
      jsonrpc: Version::V2,
      method: method.into(),
      params,
    })
  }

  pub fn error_response(id: Id, code: i64, message: impl Into<String>) -> Self {
    Self::Response(Response {
      jsonrpc: Version::V2,
      id,
      result: None,
      error: Some(ResponseError {
        code,
        message: message.into(),
        data: None,
      }),
    })
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn request_serializes_without_null_params() {
    let message = Message::request(7, "shutdown", None);
    let value = serde_json::to_value(&message).expect("serialize");
    assert_eq!(
      value,
      json!({ "jsonrpc": "2.0", "id": 7, "method": "shutdown" })
    );
  }

  #[test]
  fn response_with_error_round_trips() {
    let value = json!({
      "jsonrpc": "2.0",
      "id": 3,
      "error": { "code": -32601, "message": "method not found" }
    });
    let message: Message = serde_json::from_value(value).expect("deserialize");
    let Message::Response(response) = message else {
      panic!("expected a response");
    };
    assert_eq!(response.id.as_number(), Some(3));
    assert_eq!(
      response.error.map(|error| error.code),
      Some(code::METHOD_NOT_FOUND)
    );
  }

  #[test]
  fn notification_has_no_id() {
    let value = json!({
      "jsonrpc": "2.0",
      "method": "initialized",
      "params": {}
    });
    let message: Message = serde_json::from_value(value).expect("deserialize");
    assert!(matches!(message, Message::Notification(_)));
  }
}
