use std::collections::BTreeMap;

use serde::{
  Deserialize,
  Serialize,
};
use serde_json::Value;
use thiserror::Error;

/// One language grammar a server can handle. Immutable after construction;
/// `syntaxes` entries are matched against syntax names by the matcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageConfig {
  pub id:       String,
  #[serde(default)]
  pub scopes:   Vec<String>,
  #[serde(default)]
  pub syntaxes: Vec<String>,
}

impl LanguageConfig {
  pub fn new(
    id: impl Into<String>,
    scopes: Vec<String>,
    syntaxes: Vec<String>,
  ) -> Self {
    Self {
      id: id.into(),
      scopes,
      syntaxes,
    }
  }
}

/// Declarative description of one language server. Shared read-only once a
/// client is running; a config with no languages matches nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
  pub name:         String,
  #[serde(default)]
  pub binary_args:  Vec<String>,
  #[serde(default)]
  pub tcp_port:     Option<u16>,
  #[serde(default)]
  pub tcp_host:     Option<String>,
  #[serde(default)]
  pub languages:    Vec<LanguageConfig>,
  #[serde(default = "enabled_default")]
  pub enabled:      bool,
  #[serde(default)]
  pub init_options: serde_json::Map<String, Value>,
  #[serde(default)]
  pub settings:     serde_json::Map<String, Value>,
  #[serde(default)]
  pub env:          BTreeMap<String, String>,
}

fn enabled_default() -> bool {
  true
}

impl ClientConfig {
  pub fn new(name: impl Into<String>, binary_args: Vec<String>) -> Self {
    Self {
      name:         name.into(),
      binary_args,
      tcp_port:     None,
      tcp_host:     None,
      languages:    Vec::new(),
      enabled:      true,
      init_options: serde_json::Map::new(),
      settings:     serde_json::Map::new(),
      env:          BTreeMap::new(),
    }
  }

  pub fn over_tcp(name: impl Into<String>, host: Option<String>, port: u16) -> Self {
    let mut config = Self::new(name, Vec::new());
    config.tcp_host = host;
    config.tcp_port = Some(port);
    config
  }

  /// Single flattened language form: `languageId` + `scopes` + `syntaxes`
  /// become a one-element `languages` list.
  pub fn with_language(
    mut self,
    language_id: impl Into<String>,
    scopes: Vec<String>,
    syntaxes: Vec<String>,
  ) -> Self {
    self.languages = vec![LanguageConfig::new(language_id, scopes, syntaxes)];
    self
  }

  pub fn with_languages(mut self, languages: Vec<LanguageConfig>) -> Self {
    self.languages = languages;
    self
  }

  /// Resolves the declared transport. Exactly one of stdio args and tcp port
  /// must be set; anything else is a config error surfaced when a connection
  /// is attempted, never earlier.
  pub fn transport_mode(&self) -> Result<TransportMode<'_>, ConfigError> {
    match (self.binary_args.split_first(), self.tcp_port) {
      (Some((command, args)), None) => Ok(TransportMode::Stdio { command, args }),
      (None, Some(port)) => {
        Ok(TransportMode::Tcp {
          host: self.tcp_host.as_deref().unwrap_or("127.0.0.1"),
          port,
        })
      },
      (Some(_), Some(_)) => {
        Err(ConfigError::AmbiguousTransport {
          name: self.name.clone(),
        })
      },
      (None, None) => {
        Err(ConfigError::NoTransport {
          name: self.name.clone(),
        })
      },
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode<'a> {
  Stdio { command: &'a str, args: &'a [String] },
  Tcp { host: &'a str, port: u16 },
}

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("config `{name}` declares no transport (empty binary_args and no tcp_port)")]
  NoTransport { name: String },
  #[error("config `{name}` declares both a stdio and a tcp transport")]
  AmbiguousTransport { name: String },
}
