use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Field-level validation failures, keyed by the JSON field name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    fields: BTreeMap<String, String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields.entry(field.into()).or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    pub fn into_fields(self) -> BTreeMap<String, String> {
        self.fields
    }

    /// `Ok(())` when nothing was recorded
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// Record a serde decode failure against the document body
    pub fn from_decode(err: &serde_json::Error) -> Self {
        Self::single("body", err.to_string())
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.fields.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
        write!(f, "validation failed ({})", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Require a non-blank string, optionally bounded in length
pub(crate) fn require_text(errors: &mut ValidationErrors, field: &str, value: &str, max_len: Option<usize>) {
    if value.trim().is_empty() {
        errors.add(field, "This field is required");
    } else if let Some(max) = max_len {
        if value.chars().count() > max {
            errors.add(field, format!("Must be at most {} characters", max));
        }
    }
}
