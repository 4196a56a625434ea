//! Secret definition registry.
//!
//! Every secret the process consumes is declared once here, together with the
//! policy it has to satisfy. The registry is built at startup and is immutable
//! afterwards; callers share it behind an `Arc`.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::errors::{Result, SecretsError};

/// Policy and source for a single secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretDefinition {
    /// Unique logical key, e.g. `JWT_SECRET`.
    pub name: String,
    /// Environment variable or vault label the value is read from.
    pub source_key: String,
    /// A missing value is fatal in production.
    pub required: bool,
    /// Minimum acceptable length in characters.
    pub min_length: usize,
    /// Enforce strength rules in production even when the secret is optional.
    pub enforce_in_production: bool,
    /// Lowercased substrings that disqualify a value.
    pub forbidden_substrings: BTreeSet<String>,
    /// Human-readable purpose, used in diagnostics only.
    pub description: String,
}

impl SecretDefinition {
    /// New required definition with no length floor whose source key equals its name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            source_key: name.clone(),
            name,
            required: true,
            min_length: 0,
            enforce_in_production: true,
            forbidden_substrings: BTreeSet::new(),
            description: String::new(),
        }
    }

    pub fn source_key(mut self, key: impl Into<String>) -> Self {
        self.source_key = key.into();
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn min_length(mut self, length: usize) -> Self {
        self.min_length = length;
        self
    }

    pub fn enforce_in_production(mut self, enforce: bool) -> Self {
        self.enforce_in_production = enforce;
        self
    }

    /// Adds forbidden substrings; matching is case-insensitive.
    pub fn forbid<I, S>(mut self, substrings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.forbidden_substrings.extend(
            substrings.into_iter().map(|s| s.as_ref().to_lowercase()).filter(|s| !s.is_empty()),
        );
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Rule relating two secrets to each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretConstraint {
    /// Both secrets must hold different values when both are present.
    MustDiffer(String, String),
}

impl SecretConstraint {
    /// Names of the secrets this constraint reads.
    pub fn names(&self) -> (&str, &str) {
        match self {
            Self::MustDiffer(a, b) => (a, b),
        }
    }
}

/// Immutable table of every secret the process needs.
#[derive(Debug, Clone)]
pub struct SecretRegistry {
    definitions: Arc<Vec<SecretDefinition>>,
    index: Arc<HashMap<String, usize>>,
    constraints: Arc<Vec<SecretConstraint>>,
}

impl SecretRegistry {
    pub fn builder() -> SecretRegistryBuilder {
        SecretRegistryBuilder::default()
    }

    /// The secrets this application ships with.
    pub fn standard() -> Result<Self> {
        const COMMON_WEAK: [&str; 8] =
            ["secret", "password", "changeme", "default", "example", "test", "admin", "12345"];

        Self::builder()
            .define(
                SecretDefinition::new("JWT_SECRET")
                    .min_length(32)
                    .forbid(COMMON_WEAK)
                    .forbid(["jwt"])
                    .description("HMAC key signing access tokens"),
            )
            .define(
                SecretDefinition::new("JWT_REFRESH_SECRET")
                    .min_length(32)
                    .forbid(COMMON_WEAK)
                    .forbid(["jwt", "refresh"])
                    .description("HMAC key signing refresh tokens"),
            )
            .define(
                SecretDefinition::new("SESSION_SECRET")
                    .min_length(32)
                    .forbid(COMMON_WEAK)
                    .description("Key signing session cookies"),
            )
            .define(
                SecretDefinition::new("ENCRYPTION_KEY")
                    .min_length(32)
                    .forbid(COMMON_WEAK)
                    .description("Symmetric key encrypting sensitive columns at rest"),
            )
            .define(
                SecretDefinition::new("DB_PASSWORD")
                    .source_key("DATABASE_PASSWORD")
                    .min_length(12)
                    .forbid(["password", "admin", "test", "postgres", "root", "12345"])
                    .description("Relational database password"),
            )
            .define(
                SecretDefinition::new("WEBHOOK_SIGNING_SECRET")
                    .required(false)
                    .enforce_in_production(false)
                    .min_length(24)
                    .forbid(COMMON_WEAK)
                    .description("Signs outbound webhook payloads; webhooks are unsigned without it"),
            )
            .must_differ("JWT_SECRET", "JWT_REFRESH_SECRET")
            .build()
    }

    /// Looks up a definition by logical name.
    pub fn get(&self, name: &str) -> Option<&SecretDefinition> {
        self.index.get(name).map(|&i| &self.definitions[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Like [`get`](Self::get) but fails with `UnknownSecret`.
    pub fn require(&self, name: &str) -> Result<&SecretDefinition> {
        self.get(name).ok_or_else(|| SecretsError::unknown(name))
    }

    /// Definitions in declaration order.
    pub fn definitions(&self) -> impl Iterator<Item = &SecretDefinition> {
        self.definitions.iter()
    }

    pub fn constraints(&self) -> &[SecretConstraint] {
        &self.constraints
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

/// Collects definitions and constraints before freezing them into a registry.
#[derive(Debug, Default)]
pub struct SecretRegistryBuilder {
    definitions: Vec<SecretDefinition>,
    constraints: Vec<SecretConstraint>,
}

impl SecretRegistryBuilder {
    pub fn define(mut self, definition: SecretDefinition) -> Self {
        self.definitions.push(definition);
        self
    }

    pub fn must_differ(mut self, a: impl Into<String>, b: impl Into<String>) -> Self {
        self.constraints.push(SecretConstraint::MustDiffer(a.into(), b.into()));
        self
    }

    /// Freezes the registry.
    ///
    /// Fails on duplicate names, empty names or source keys, and constraints
    /// referring to undefined secrets.
    pub fn build(self) -> Result<SecretRegistry> {
        let mut index = HashMap::with_capacity(self.definitions.len());
        for (i, definition) in self.definitions.iter().enumerate() {
            if definition.name.trim().is_empty() {
                return Err(SecretsError::config("Secret definition name cannot be empty"));
            }
            if definition.source_key.trim().is_empty() {
                return Err(SecretsError::config(format!(
                    "Secret '{}' has an empty source key",
                    definition.name
                )));
            }
            if index.insert(definition.name.clone(), i).is_some() {
                return Err(SecretsError::config(format!(
                    "Secret '{}' is defined more than once",
                    definition.name
                )));
            }
        }

        for constraint in &self.constraints {
            let (a, b) = constraint.names();
            for name in [a, b] {
                if !index.contains_key(name) {
                    return Err(SecretsError::config(format!(
                        "Constraint references undefined secret '{}'",
                        name
                    )));
                }
            }
        }

        Ok(SecretRegistry {
            definitions: Arc::new(self.definitions),
            index: Arc::new(index),
            constraints: Arc::new(self.constraints),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definition_defaults() {
        let definition = SecretDefinition::new("API_KEY");
        assert_eq!(definition.source_key, "API_KEY");
        assert!(definition.required);
        assert!(definition.enforce_in_production);
        assert_eq!(definition.min_length, 0);
        assert!(definition.forbidden_substrings.is_empty());
    }

    #[test]
    fn test_forbid_normalizes_case_and_drops_empty() {
        let definition = SecretDefinition::new("API_KEY").forbid(["Admin", "TEST", ""]);
        let forbidden: Vec<&str> =
            definition.forbidden_substrings.iter().map(String::as_str).collect();
        assert_eq!(forbidden, vec!["admin", "test"]);
    }

    #[test]
    fn test_standard_registry() {
        let registry = SecretRegistry::standard().unwrap();
        assert_eq!(registry.len(), 6);
        assert!(registry.contains("JWT_SECRET"));
        assert_eq!(registry.get("DB_PASSWORD").unwrap().source_key, "DATABASE_PASSWORD");
        assert!(!registry.get("WEBHOOK_SIGNING_SECRET").unwrap().required);
        assert_eq!(
            registry.constraints(),
            &[SecretConstraint::MustDiffer("JWT_SECRET".into(), "JWT_REFRESH_SECRET".into())]
        );
    }

    #[test]
    fn test_definitions_keep_declaration_order() {
        let registry = SecretRegistry::builder()
            .define(SecretDefinition::new("B"))
            .define(SecretDefinition::new("A"))
            .build()
            .unwrap();
        let names: Vec<&str> = registry.definitions().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["B", "A"]);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = SecretRegistry::builder()
            .define(SecretDefinition::new("JWT_SECRET"))
            .define(SecretDefinition::new("JWT_SECRET").source_key("OTHER"))
            .build();
        let err = result.unwrap_err();
        assert!(err.to_string().contains("defined more than once"));
    }

    #[test]
    fn test_empty_source_key_rejected() {
        let result = SecretRegistry::builder().define(SecretDefinition::new("A").source_key(" ")).build();
        assert!(matches!(result, Err(SecretsError::Config { .. })));
    }

    #[test]
    fn test_constraint_on_undefined_secret_rejected() {
        let result = SecretRegistry::builder()
            .define(SecretDefinition::new("A"))
            .must_differ("A", "B")
            .build();
        assert!(result.unwrap_err().to_string().contains("undefined secret 'B'"));
    }

    #[test]
    fn test_require_unknown_secret() {
        let registry = SecretRegistry::standard().unwrap();
        assert!(registry.require("JWT_SECRET").is_ok());
        assert!(matches!(registry.require("JWT_SECRT"), Err(SecretsError::UnknownSecret { .. })));
    }
}
