use std::path::{
  Path,
  PathBuf,
};

use serde::{
  Deserialize,
  Serialize,
};
use tracing::debug;

/// Styles are spelled in lowercase in host settings data ("underline").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticsHighlightStyle {
  Underline,
  Box,
  Fill,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentHighlightStyle {
  Fill,
  Stippled,
  Underline,
}

/// Which logging channel a `set_level` call targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
  Debug,
  Server,
  Stderr,
  Payloads,
}

/// Process-wide behavior toggles. Constructed once at startup and passed
/// around by reference; mutation happens only through the explicit setters.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
  pub show_status_messages: bool,
  pub show_view_status: bool,
  pub auto_show_diagnostics_panel: bool,
  pub auto_show_diagnostics_panel_level: u8,
  pub show_diagnostics_phantoms: bool,
  pub show_diagnostics_count_in_view_status: bool,
  pub show_diagnostics_in_view_status: bool,
  pub show_diagnostics_severity_level: u8,
  pub only_show_lsp_completions: bool,
  pub diagnostics_highlight_style: DiagnosticsHighlightStyle,
  pub highlight_active_signature_parameter: bool,
  pub document_highlight_style: DocumentHighlightStyle,
  pub complete_all_chars: bool,
  pub complete_using_text_edit: bool,
  pub resolve_completion_for_snippets: bool,
  pub log_debug: bool,
  pub log_server: bool,
  pub log_stderr: bool,
  pub log_payloads: bool,
  log_file: Option<PathBuf>,
  base_dir: PathBuf,
}

impl Settings {
  /// `base_dir` anchors relative log-file paths; injected rather than read
  /// from the process environment so hosts control the resolution root.
  pub fn new(base_dir: impl Into<PathBuf>) -> Self {
    Self {
      show_status_messages: true,
      show_view_status: true,
      auto_show_diagnostics_panel: true,
      auto_show_diagnostics_panel_level: 3,
      show_diagnostics_phantoms: false,
      show_diagnostics_count_in_view_status: false,
      show_diagnostics_in_view_status: true,
      show_diagnostics_severity_level: 3,
      only_show_lsp_completions: false,
      diagnostics_highlight_style: DiagnosticsHighlightStyle::Underline,
      highlight_active_signature_parameter: true,
      document_highlight_style: DocumentHighlightStyle::Stippled,
      complete_all_chars: false,
      complete_using_text_edit: false,
      resolve_completion_for_snippets: false,
      log_debug: true,
      log_server: true,
      log_stderr: false,
      log_payloads: false,
      log_file: None,
      base_dir: base_dir.into(),
    }
  }

  pub fn set_level(&mut self, target: LogTarget, enabled: bool) {
    match target {
      LogTarget::Debug => self.log_debug = enabled,
      LogTarget::Server => self.log_server = enabled,
      LogTarget::Stderr => self.log_stderr = enabled,
      LogTarget::Payloads => self.log_payloads = enabled,
    }
    debug!(?target, enabled, "log level changed");
  }

  pub fn set_log_file(&mut self, path: impl AsRef<Path>) {
    let path = path.as_ref();
    let resolved = if path.is_absolute() {
      path.to_path_buf()
    } else {
      self.base_dir.join(path)
    };
    debug!(path = %resolved.display(), "log file set");
    self.log_file = Some(resolved);
  }

  pub fn log_file(&self) -> Option<&Path> {
    self.log_file.as_deref()
  }
}
