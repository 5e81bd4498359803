use std::collections::HashSet;

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
  Completion,
  GotoDefinition,
  References,
  Hover,
  SignatureHelp,
  DocumentHighlight,
  Rename,
  Diagnostics,
}

impl Capability {
  const ALL: [Capability; 8] = [
    Capability::Completion,
    Capability::GotoDefinition,
    Capability::References,
    Capability::Hover,
    Capability::SignatureHelp,
    Capability::DocumentHighlight,
    Capability::Rename,
    Capability::Diagnostics,
  ];

  fn provider_key(self) -> &'static str {
    match self {
      Capability::Completion => "completionProvider",
      Capability::GotoDefinition => "definitionProvider",
      Capability::References => "referencesProvider",
      Capability::Hover => "hoverProvider",
      Capability::SignatureHelp => "signatureHelpProvider",
      Capability::DocumentHighlight => "documentHighlightProvider",
      Capability::Rename => "renameProvider",
      Capability::Diagnostics => "diagnosticProvider",
    }
  }
}

/// What one server reported in its `initialize` result. The raw value is kept
/// around for callers that need provider options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapabilitySet {
  raw:       Value,
  supported: HashSet<Capability>,
}

impl CapabilitySet {
  pub fn from_raw(raw: Value) -> Self {
    let mut supported = HashSet::new();
    for capability in Capability::ALL {
      if provider_enabled(&raw, capability.provider_key()) {
        supported.insert(capability);
      }
    }
    Self { raw, supported }
  }

  pub fn raw(&self) -> &Value {
    &self.raw
  }

  pub fn supports(&self, capability: Capability) -> bool {
    self.supported.contains(&capability)
  }
}

fn provider_enabled(raw: &Value, key: &str) -> bool {
  match raw.get(key) {
    Some(Value::Bool(enabled)) => *enabled,
    Some(Value::Null) | None => false,
    // Any provider options object counts as supported.
    Some(_) => true,
  }
}
