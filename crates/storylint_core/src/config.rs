//! Analyzer configuration.
//!
//! # Responsibility
//! - Load lexicon overrides, rule thresholds and tagger settings from JSON.
//! - Build a ready-to-use [`Analyzer`] from those settings.
//!
//! # Invariants
//! - Missing fields take their defaults; an empty object is a valid config.
//! - A config is validated before any analyzer is built from it.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::analysis::lexicon::{Lexicon, LexiconError};
use crate::analysis::rules::RuleSettings;
use crate::analysis::tagger::{ProcessTagger, RuleTagger, Tagger, TaggerError, TimeoutPolicy};
use crate::analysis::Analyzer;

/// Root configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub lexicon: Lexicon,
    pub rules: RuleSettings,
    pub tagger: TaggerConfig,
}

/// External tagger settings. An empty command selects the built-in tagger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaggerConfig {
    /// Program followed by its arguments.
    pub command: Vec<String>,
    /// Line printed by the tagger once it accepts input.
    pub ready_marker: Option<String>,
    pub startup_timeout_secs: u64,
    pub base_secs: f64,
    pub chars_per_sec: f64,
    pub max_secs: f64,
}

impl Default for TaggerConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            ready_marker: None,
            startup_timeout_secs: 60,
            base_secs: 3.0,
            chars_per_sec: 20.0,
            max_secs: 40.0,
        }
    }
}

impl TaggerConfig {
    pub fn timeout_policy(&self) -> TimeoutPolicy {
        TimeoutPolicy {
            base: Duration::from_secs_f64(self.base_secs),
            chars_per_sec: self.chars_per_sec,
            max: Duration::from_secs_f64(self.max_secs),
        }
    }
}

/// Configuration failure.
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: io::Error },
    Parse(serde_json::Error),
    Invalid(String),
    Lexicon(LexiconError),
    Tagger(TaggerError),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config json: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
            Self::Lexicon(err) => write!(f, "{err}"),
            Self::Tagger(err) => write!(f, "failed to start tagger: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Lexicon(err) => Some(err),
            Self::Tagger(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

impl From<LexiconError> for ConfigError {
    fn from(value: LexiconError) -> Self {
        Self::Lexicon(value)
    }
}

impl From<TaggerError> for ConfigError {
    fn from(value: TaggerError) -> Self {
        Self::Tagger(value)
    }
}

impl AnalyzerConfig {
    /// Reads and validates a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.lexicon.validate()?;
        let tagger = &self.tagger;
        if !(tagger.base_secs >= 0.0 && tagger.base_secs.is_finite()) {
            return Err(ConfigError::Invalid("tagger.base_secs must be >= 0".to_string()));
        }
        if !(tagger.max_secs > 0.0 && tagger.max_secs.is_finite()) {
            return Err(ConfigError::Invalid("tagger.max_secs must be > 0".to_string()));
        }
        if !(tagger.chars_per_sec > 0.0 && tagger.chars_per_sec.is_finite()) {
            return Err(ConfigError::Invalid(
                "tagger.chars_per_sec must be > 0".to_string(),
            ));
        }
        if tagger.command.first().is_some_and(|program| program.trim().is_empty()) {
            return Err(ConfigError::Invalid("tagger.command program is blank".to_string()));
        }
        Ok(())
    }

    /// Builds the analyzer, spawning the external tagger when configured.
    pub fn build_analyzer(&self) -> Result<Analyzer, ConfigError> {
        self.validate()?;
        let tagger: Box<dyn Tagger + Send + Sync> = if self.tagger.command.is_empty() {
            Box::new(RuleTagger::new())
        } else {
            Box::new(ProcessTagger::spawn(
                &self.tagger.command,
                self.tagger.timeout_policy(),
                self.tagger.ready_marker.as_deref(),
                Duration::from_secs(self.tagger.startup_timeout_secs),
            )?)
        };
        Ok(Analyzer::new(self.lexicon.clone(), tagger, self.rules)?)
    }
}
