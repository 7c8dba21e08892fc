//! Component configuration.
//!
//! Both configs deserialize from TOML with every field optional:
//!
//! ```rust
//! use coref::config::{CorefConfig, SpanPredictorConfig};
//! use coref::span::InvalidSpanPolicy;
//!
//! let coref = CorefConfig::from_toml_str("rough_k = 20").unwrap();
//! assert_eq!(coref.rough_k, 20);
//! assert_eq!(coref.span_cluster_prefix, "coref_clusters");
//!
//! let spans = SpanPredictorConfig::from_toml_str("invalid_spans = \"clamp\"").unwrap();
//! assert_eq!(spans.invalid_spans, InvalidSpanPolicy::Clamp);
//! ```

use crate::span::InvalidSpanPolicy;
use crate::{Error, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::Path;

/// Default key of the candidate mention span group.
pub const DEFAULT_SPAN_MENTIONS: &str = "coref_mentions";
/// Default prefix of predicted cluster span groups.
pub const DEFAULT_CLUSTER_PREFIX: &str = "coref_clusters";
/// Default prefix of head-only cluster span groups read by the span predictor.
pub const DEFAULT_HEAD_PREFIX: &str = "coref_head_clusters";

// =============================================================================
// CorefResolver
// =============================================================================

/// Configuration for [`crate::pipeline::CorefResolver`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorefConfig {
    /// Component name; also the key losses are recorded under.
    pub name: String,
    /// Span group holding candidate mentions.
    pub span_mentions: String,
    /// Prefix of the `<prefix>_<i>` cluster span groups.
    pub span_cluster_prefix: String,
    /// Candidate antecedents kept per mention by the scorer; wider score
    /// matrices are rejected.
    pub rough_k: usize,
}

impl Default for CorefConfig {
    fn default() -> Self {
        Self {
            name: "coref".to_string(),
            span_mentions: DEFAULT_SPAN_MENTIONS.to_string(),
            span_cluster_prefix: DEFAULT_CLUSTER_PREFIX.to_string(),
            rough_k: 50,
        }
    }
}

impl CorefConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = parse(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    /// Builder: set the cluster prefix.
    #[must_use]
    pub fn with_cluster_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.span_cluster_prefix = prefix.into();
        self
    }

    /// Check field constraints.
    pub fn validate(&self) -> Result<()> {
        require_non_empty("name", &self.name)?;
        require_non_empty("span_mentions", &self.span_mentions)?;
        require_non_empty("span_cluster_prefix", &self.span_cluster_prefix)?;
        if self.rough_k == 0 {
            return Err(Error::config("rough_k must be positive"));
        }
        Ok(())
    }
}

// =============================================================================
// SpanPredictor
// =============================================================================

/// Configuration for [`crate::pipeline::SpanPredictor`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpanPredictorConfig {
    /// Component name; also the key losses are recorded under.
    pub name: String,
    /// Prefix of the head-only cluster span groups to expand.
    pub input_prefix: String,
    /// Prefix the expanded clusters are written under.
    pub output_prefix: String,
    /// Handling of predicted spans that end before they start.
    pub invalid_spans: InvalidSpanPolicy,
}

impl Default for SpanPredictorConfig {
    fn default() -> Self {
        Self {
            name: "span_predictor".to_string(),
            input_prefix: DEFAULT_HEAD_PREFIX.to_string(),
            output_prefix: DEFAULT_CLUSTER_PREFIX.to_string(),
            invalid_spans: InvalidSpanPolicy::default(),
        }
    }
}

impl SpanPredictorConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = parse(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    /// Builder: set the invalid span policy.
    #[must_use]
    pub fn with_invalid_spans(mut self, policy: InvalidSpanPolicy) -> Self {
        self.invalid_spans = policy;
        self
    }

    /// Check field constraints.
    pub fn validate(&self) -> Result<()> {
        require_non_empty("name", &self.name)?;
        require_non_empty("input_prefix", &self.input_prefix)?;
        require_non_empty("output_prefix", &self.output_prefix)?;
        if self.input_prefix == self.output_prefix {
            return Err(Error::config(format!(
                "input_prefix and output_prefix are both '{}'",
                self.input_prefix
            )));
        }
        Ok(())
    }
}

fn parse<T: DeserializeOwned>(s: &str) -> Result<T> {
    Ok(toml::from_str(s)?)
}

fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::config(format!("{} must not be empty", field)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CorefConfig::default();
        assert_eq!(config.name, "coref");
        assert_eq!(config.span_mentions, "coref_mentions");
        assert_eq!(config.span_cluster_prefix, "coref_clusters");
        assert_eq!(config.rough_k, 50);
        assert!(config.validate().is_ok());

        let spans = SpanPredictorConfig::default();
        assert_eq!(spans.name, "span_predictor");
        assert_eq!(spans.input_prefix, "coref_head_clusters");
        assert_eq!(spans.output_prefix, "coref_clusters");
        assert_eq!(spans.invalid_spans, InvalidSpanPolicy::PassThrough);
        assert!(spans.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(CorefConfig::from_toml_str("").unwrap(), CorefConfig::default());
        assert_eq!(
            SpanPredictorConfig::from_toml_str("").unwrap(),
            SpanPredictorConfig::default()
        );
    }

    #[test]
    fn test_partial_toml() {
        let config = CorefConfig::from_toml_str(
            r#"
            name = "coref_v2"
            span_cluster_prefix = "clusters"
            "#,
        )
        .unwrap();
        assert_eq!(config.name, "coref_v2");
        assert_eq!(config.span_cluster_prefix, "clusters");
        assert_eq!(config.rough_k, 50);
    }

    #[test]
    fn test_zero_rough_k_rejected() {
        let err = CorefConfig::from_toml_str("rough_k = 0").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_same_prefixes_rejected() {
        let err = SpanPredictorConfig::from_toml_str(
            r#"
            input_prefix = "x"
            output_prefix = "x"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_bad_toml() {
        let err = CorefConfig::from_toml_str("rough_k = \"many\"").unwrap_err();
        assert!(matches!(err, Error::Toml(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = CorefConfig::from_path("/nonexistent/coref.toml").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
