// Markup Engine - Markup Policy
//
// Loads per-category calculation sequences and their markup parameters from
// JSON and exposes the single calculation entry point used by every caller
// (live preview, save-time calculation, verification).

use crate::markup::calculator::{calculate, CalculationError, CalculationResult};
use crate::markup::types::{Category, ParameterSet, Sequence};
use crate::markup::validation::{validate, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

/// Complete markup configuration
///
/// This is the root object deserialized from stored configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkupConfig {
    /// Schema version (currently "1.0")
    pub version: String,

    /// Unique identifier for this configuration
    pub config_id: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Named markup percentages shared by all categories
    #[serde(default)]
    pub parameters: ParameterSet,

    /// One sequence per configured category
    #[serde(default)]
    pub sequences: BTreeMap<Category, Sequence>,
}

/// A structural error tagged with the category it was found in
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[error("{category}: {error}")]
pub struct CategoryValidationError {
    pub category: Category,
    pub error: ValidationError,
}

/// Errors that can occur when loading a MarkupPolicy
#[derive(Debug, Error)]
pub enum MarkupPolicyError {
    #[error("Failed to load configuration from file: {0}")]
    LoadError(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Configuration validation failed: {0:?}")]
    ValidationFailed(Vec<CategoryValidationError>),
}

/// Markup calculation policy for one tender
///
/// # Example
///
/// ```rust
/// use tender_markup_engine::markup::{Category, MarkupPolicy};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let json = r#"{
///   "version": "1.0",
///   "config_id": "default",
///   "parameters": { "overhead": 10.0 },
///   "sequences": {
///     "work": [
///       { "base_index": -1, "operations": [
///         { "action": "multiply", "operand": { "type": "parameter", "name": "overhead" } }
///       ]}
///     ]
///   }
/// }"#;
///
/// let policy = MarkupPolicy::from_json(json)?.validated()?;
/// let calc = policy.calculate(Category::Work, 200.0);
/// assert_eq!(calc.result, 220.0);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MarkupPolicy {
    config: MarkupConfig,
}

impl MarkupPolicy {
    pub fn new(config: MarkupConfig) -> Self {
        Self { config }
    }

    /// Load a policy from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, MarkupPolicyError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let policy = Self::from_json(&contents)?;
        info!(path = %path.display(), config_id = %policy.config_id(), "loaded markup configuration");
        Ok(policy)
    }

    /// Load a policy from a JSON string
    pub fn from_json(json: &str) -> Result<Self, MarkupPolicyError> {
        let config: MarkupConfig = serde_json::from_str(json)?;
        Ok(Self::new(config))
    }

    /// Validate every configured category
    ///
    /// Returns all errors found across categories. A configured category
    /// with no steps is an error here, since it could never be calculated.
    pub fn validate(&self) -> Result<(), Vec<CategoryValidationError>> {
        let errors: Vec<CategoryValidationError> = self
            .config
            .sequences
            .iter()
            .flat_map(|(category, sequence)| {
                let structural = if sequence.is_empty() {
                    vec![ValidationError::EmptySequence]
                } else {
                    validate(sequence)
                };
                structural
                    .into_iter()
                    .map(move |error| CategoryValidationError {
                        category: *category,
                        error,
                    })
            })
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            warn!(count = errors.len(), config_id = %self.config_id(), "markup configuration is invalid");
            Err(errors)
        }
    }

    /// Validate and return self, failing fast on structural errors
    pub fn validated(self) -> Result<Self, MarkupPolicyError> {
        self.validate().map_err(MarkupPolicyError::ValidationFailed)?;
        Ok(self)
    }

    /// Copy of this policy with parameter overrides merged over the defaults
    pub fn with_parameters(&self, overrides: &ParameterSet) -> Self {
        let mut config = self.config.clone();
        config
            .parameters
            .extend(overrides.iter().map(|(name, value)| (name.clone(), *value)));
        Self::new(config)
    }

    /// Calculate the commercial cost of one category's base amount
    ///
    /// An unconfigured category is reported as a malformed sequence and the
    /// base amount is returned unchanged.
    pub fn calculate(&self, category: Category, base_amount: f64) -> CalculationResult {
        match self.config.sequences.get(&category) {
            Some(sequence) => calculate(sequence, base_amount, &self.config.parameters),
            None => CalculationResult {
                base_amount,
                result: base_amount,
                per_step_results: Vec::new(),
                errors: vec![CalculationError::MalformedSequence(format!(
                    "no sequence configured for category {category}"
                ))],
            },
        }
    }

    pub fn sequence(&self, category: Category) -> Option<&Sequence> {
        self.config.sequences.get(&category)
    }

    pub fn parameters(&self) -> &ParameterSet {
        &self.config.parameters
    }

    pub fn config(&self) -> &MarkupConfig {
        &self.config
    }

    pub fn config_id(&self) -> &str {
        &self.config.config_id
    }

    pub fn version(&self) -> &str {
        &self.config.version
    }
}

// ============================================================================
// TESTS
// ============================================================================
