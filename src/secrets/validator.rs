//! Secret strength validation.
//!
//! The validator checks a candidate value against its [`SecretDefinition`].
//! Whether a broken rule fails or only warns depends on the [`Environment`]:
//! hard failures happen only in production, and only for secrets that are
//! required or explicitly enforced there. Low-entropy heuristics never fail.

use super::definitions::SecretDefinition;
use super::types::{Environment, SecretString};
use crate::errors::{Result, SecretsError};

/// Prefixes that suggest a placeholder rather than a generated value.
const PLACEHOLDER_PREFIXES: [&str; 5] = ["test", "dev", "demo", "temp", "sample"];

/// Length of a run (repeated, ascending) that triggers an advisory.
const RUN_THRESHOLD: usize = 4;

/// Advisory finding from the low-entropy scan. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advisory {
    /// Same character repeated `RUN_THRESHOLD` or more times in a row.
    RepeatedCharacters,
    /// Starts with a placeholder prefix such as `test` or `dev`.
    PlaceholderPrefix(&'static str),
    /// Contains an ascending run such as `1234` or `abcd`.
    SequentialRun,
    /// Uses fewer than three of lowercase, uppercase, digit, symbol.
    LowCharacterVariety,
}

impl Advisory {
    pub fn describe(&self) -> String {
        match self {
            Self::RepeatedCharacters => "contains a run of repeated characters".to_string(),
            Self::PlaceholderPrefix(prefix) => format!("starts with placeholder prefix '{}'", prefix),
            Self::SequentialRun => "contains a sequential character run".to_string(),
            Self::LowCharacterVariety => "uses fewer than three character classes".to_string(),
        }
    }
}

/// Validates secret values for one environment.
#[derive(Debug, Clone, Copy)]
pub struct StrengthValidator {
    environment: Environment,
}

impl StrengthValidator {
    pub fn new(environment: Environment) -> Self {
        Self { environment }
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Whether strength violations on `definition` are fatal here.
    pub fn is_enforced(&self, definition: &SecretDefinition) -> bool {
        self.environment.is_production() && (definition.required || definition.enforce_in_production)
    }

    /// Checks `value` against `definition`.
    ///
    /// Returns the value unchanged when it passes or when violations are only
    /// warnings, `None` when the secret is absent and that is acceptable here,
    /// and an error for the first hard violation.
    pub fn validate(
        &self,
        definition: &SecretDefinition,
        value: Option<SecretString>,
    ) -> Result<Option<SecretString>> {
        let name = definition.name.as_str();

        let Some(value) = value.filter(|v| !v.is_empty()) else {
            return self.check_absent(definition);
        };

        let enforced = self.is_enforced(definition);

        let actual = value.char_len();
        if actual < definition.min_length {
            if enforced {
                tracing::error!(
                    secret = %name,
                    min_length = definition.min_length,
                    actual,
                    environment = %self.environment,
                    "Secret is shorter than its minimum length"
                );
                return Err(SecretsError::weak(name, definition.min_length, actual));
            }
            tracing::warn!(
                secret = %name,
                min_length = definition.min_length,
                actual,
                environment = %self.environment,
                "Secret is shorter than its minimum length; not enforced here"
            );
        }

        if let Some(pattern) =
            definition.forbidden_substrings.iter().find(|p| value.contains_ignore_case(p))
        {
            if enforced {
                tracing::error!(
                    secret = %name,
                    pattern = %pattern,
                    environment = %self.environment,
                    "Secret contains a forbidden value"
                );
                return Err(SecretsError::forbidden(name, pattern.clone()));
            }
            tracing::warn!(
                secret = %name,
                pattern = %pattern,
                environment = %self.environment,
                "Secret contains a forbidden value; not enforced here"
            );
        }

        for advisory in advisories(value.expose_secret()) {
            tracing::warn!(
                secret = %name,
                advisory = %advisory.describe(),
                "Secret looks low-entropy"
            );
        }

        tracing::debug!(secret = %name, environment = %self.environment, "Secret passed validation");
        Ok(Some(value))
    }

    fn check_absent(&self, definition: &SecretDefinition) -> Result<Option<SecretString>> {
        let name = definition.name.as_str();
        if !definition.required {
            tracing::debug!(secret = %name, "Optional secret not configured");
            return Ok(None);
        }
        if self.environment.is_production() {
            tracing::error!(
                secret = %name,
                source_key = %definition.source_key,
                description = %definition.description,
                "Required secret is missing"
            );
            return Err(SecretsError::missing(name));
        }
        tracing::warn!(
            secret = %name,
            source_key = %definition.source_key,
            environment = %self.environment,
            "Required secret is missing; not enforced here"
        );
        Ok(None)
    }
}

/// Runs the low-entropy heuristics against a raw value.
pub fn advisories(value: &str) -> Vec<Advisory> {
    let mut found = Vec::new();
    let chars: Vec<char> = value.chars().collect();

    if has_repeated_run(&chars) {
        found.push(Advisory::RepeatedCharacters);
    }

    let lowered = value.to_lowercase();
    if let Some(prefix) = PLACEHOLDER_PREFIXES.iter().find(|p| lowered.starts_with(**p)) {
        found.push(Advisory::PlaceholderPrefix(*prefix));
    }

    if has_sequential_run(&chars) {
        found.push(Advisory::SequentialRun);
    }

    if character_classes(&chars) < 3 {
        found.push(Advisory::LowCharacterVariety);
    }

    found
}

fn has_repeated_run(chars: &[char]) -> bool {
    chars.windows(RUN_THRESHOLD).any(|w| w.iter().all(|c| *c == w[0]))
}

fn has_sequential_run(chars: &[char]) -> bool {
    chars.windows(RUN_THRESHOLD).any(|w| {
        w.iter().all(|c| c.is_ascii_alphanumeric())
            && w.iter().all(|c| c.is_ascii_digit() == w[0].is_ascii_digit())
            && w.windows(2).all(|pair| {
                let (a, b) = (pair[0].to_ascii_lowercase(), pair[1].to_ascii_lowercase());
                b as u32 == a as u32 + 1
            })
    })
}

fn character_classes(chars: &[char]) -> usize {
    let lower = chars.iter().any(|c| c.is_lowercase());
    let upper = chars.iter().any(|c| c.is_uppercase());
    let digit = chars.iter().any(|c| c.is_ascii_digit());
    let symbol = chars.iter().any(|c| !c.is_alphanumeric());
    [lower, upper, digit, symbol].into_iter().filter(|present| *present).count()
}
