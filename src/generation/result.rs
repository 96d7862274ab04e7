//! Flat structured results and the generator seam the batch runner drives.

use crate::error::PipelineError;
use async_trait::async_trait;

/// Ordered record of named string fields produced for one case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationResult {
    fields: Vec<(String, String)>,
}

impl GenerationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Set `name` to `value`, keeping the field's original position if it already exists.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for GenerationResult {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut result = GenerationResult::new();
        for (name, value) in iter {
            result.insert(name, value);
        }
        result
    }
}

/// Turns one case's text into a structured result using a live client handle.
///
/// Any error returned is treated as transient by the batch runner.
#[async_trait]
pub trait CaseGenerator<C: ?Sized + Sync>: Send + Sync {
    async fn generate(&self, case_text: &str, client: &C)
        -> Result<GenerationResult, PipelineError>;
}
