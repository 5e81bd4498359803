use regex::RegexBuilder;
use thiserror::Error;
use tracing::warn;

use crate::config::{
  ClientConfig,
  LanguageConfig,
};

#[derive(Debug, Error)]
pub enum MatchError {
  #[error("syntax pattern for language `{language}` failed to compile: {source}")]
  InvalidPattern {
    language: String,
    #[source]
    source:   regex::Error,
  },
}

/// Result of matching a syntax name against one config: the first language
/// whose pattern matched (declared order wins, no best-match search), plus
/// any pattern failures hit along the way. A failed pattern never aborts the
/// search, it is recorded and the next language is tried.
#[derive(Debug)]
pub struct SyntaxMatch<'a> {
  pub language: Option<&'a LanguageConfig>,
  pub failures: Vec<MatchError>,
}

impl SyntaxMatch<'_> {
  pub fn is_match(&self) -> bool {
    self.language.is_some()
  }
}

pub fn syntax_match<'a>(config: &'a ClientConfig, syntax_name: &str) -> SyntaxMatch<'a> {
  let mut failures = Vec::new();

  for language in &config.languages {
    // An empty syntax list matches nothing; joining it would produce an
    // empty pattern that matches everything.
    if language.syntaxes.is_empty() {
      continue;
    }

    let pattern = language
      .syntaxes
      .iter()
      .map(|syntax| format!(r"\b(?:{syntax})\b"))
      .collect::<Vec<_>>()
      .join("|");

    let regex = match RegexBuilder::new(&pattern).case_insensitive(true).build() {
      Ok(regex) => regex,
      Err(source) => {
        failures.push(MatchError::InvalidPattern {
          language: language.id.clone(),
          source,
        });
        continue;
      },
    };

    if regex.is_match(syntax_name) {
      return SyntaxMatch {
        language: Some(language),
        failures,
      };
    }
  }

  SyntaxMatch {
    language: None,
    failures,
  }
}

/// Boolean convenience over `syntax_match`: pattern failures are logged and
/// treated as non-matching.
pub fn config_supports_syntax(config: &ClientConfig, syntax_name: &str) -> bool {
  let matched = syntax_match(config, syntax_name);
  for failure in &matched.failures {
    warn!(server = %config.name, syntax = syntax_name, error = %failure, "syntax pattern skipped");
  }
  matched.is_match()
}
