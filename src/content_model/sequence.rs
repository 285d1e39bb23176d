//! Sequence validator
//!
//! A [`Sequence`] is a declared element order. Validation checks that the
//! declared names appear contiguously and in declared order within the
//! actual element arrival order captured during parsing, starting at the
//! first occurrence of the first declared name.

use crate::error::ValidationError;
use crate::instance::OrderEntry;

/// Declared element-order constraint
#[derive(Debug, Clone)]
pub struct Sequence {
    names: Vec<String>,
}

impl Sequence {
    /// Create a sequence over the given element names
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Get the declared names
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Validate the actual element arrival order against the declared one.
    ///
    /// Consecutive repeats of the current declared name are accepted
    /// (repeated collection elements); text segments are ignored. Once the
    /// declared subsequence has started, the next declared name must follow
    /// immediately; a mismatch names the expected and actual element.
    pub fn validate(&self, order: &[OrderEntry]) -> Result<(), ValidationError> {
        if self.names.is_empty() {
            return Ok(());
        }

        let actual: Vec<&str> = order
            .iter()
            .filter_map(|entry| match entry {
                OrderEntry::Element(name) => Some(name.as_str()),
                OrderEntry::Text => None,
            })
            .collect();

        let Some(start) = actual.iter().position(|name| *name == self.names[0]) else {
            // The sequence never started; absence is a cardinality concern,
            // not an order violation.
            return Ok(());
        };

        let mut declared = 0;
        for name in &actual[start..] {
            if *name == self.names[declared] {
                continue;
            }
            if declared + 1 < self.names.len() && *name == self.names[declared + 1] {
                declared += 1;
                continue;
            }
            if declared + 1 >= self.names.len() {
                // Sequence complete; trailing elements are unconstrained.
                break;
            }
            return Err(ValidationError::new("incorrect element sequence")
                .with_attribute((*name).to_string())
                .with_expected(self.names[declared + 1].clone())
                .with_actual((*name).to_string()));
        }

        Ok(())
    }
}
