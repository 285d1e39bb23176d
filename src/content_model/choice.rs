//! Choice validator
//!
//! A [`Choice`] holds occurrence bounds and a list of member attributes or
//! nested choices. Validation counts the populated members of one instance
//! and checks the count against the bounds.

use crate::error::{DefinitionError, Error, Result, ValidationError};
use crate::instance::{Instance, ValueState};

/// One member of a choice: an attribute reference or a nested choice
#[derive(Debug, Clone)]
pub enum ChoiceMember {
    /// Direct attribute reference
    Attribute(String),
    /// Nested choice
    Choice(Choice),
}

/// Alternation constraint with occurrence bounds
#[derive(Debug, Clone)]
pub struct Choice {
    min: u32,
    max: u32,
    members: Vec<ChoiceMember>,
}

impl Choice {
    /// Create a choice with the given occurrence bounds.
    ///
    /// Negative bounds, a zero upper bound and `min > max` are
    /// definition-time errors.
    pub fn new(min: i64, max: i64) -> Result<Self> {
        if min < 0 || max < 0 {
            return Err(Error::Definition(DefinitionError::new(format!(
                "choice bounds may not be negative (got min: {}, max: {})",
                min, max
            ))));
        }
        if max == 0 {
            return Err(Error::Definition(DefinitionError::new(
                "choice upper bound must be at least 1",
            )));
        }
        if min > max {
            return Err(Error::Definition(DefinitionError::new(format!(
                "choice lower bound {} exceeds upper bound {}",
                min, max
            ))));
        }
        Ok(Self {
            min: min as u32,
            max: max as u32,
            members: Vec::new(),
        })
    }

    /// Add an attribute member
    pub fn with_attribute(mut self, name: impl Into<String>) -> Self {
        self.members.push(ChoiceMember::Attribute(name.into()));
        self
    }

    /// Add a nested choice member
    pub fn with_choice(mut self, choice: Choice) -> Self {
        self.members.push(ChoiceMember::Choice(choice));
        self
    }

    /// Get the lower occurrence bound
    pub fn min(&self) -> u32 {
        self.min
    }

    /// Get the upper occurrence bound
    pub fn max(&self) -> u32 {
        self.max
    }

    /// Get the members
    pub fn members(&self) -> &[ChoiceMember] {
        &self.members
    }

    /// Validate the populated-member count of one instance against the
    /// bounds.
    ///
    /// A member counts as populated when it was explicitly assigned a
    /// present value; defaults do not count. A nested choice counts one
    /// when it satisfies its own lower bound and zero otherwise; its
    /// lower-bound failure does not propagate.
    pub fn validate(&self, instance: &Instance) -> std::result::Result<(), ValidationError> {
        let count = self.count_populated(instance)?;

        if count > self.max {
            return Err(ValidationError::new("too many populated attributes for choice")
                .with_expected(format!("at most {}", self.max))
                .with_actual(count.to_string()));
        }
        if count < self.min {
            return Err(ValidationError::new("too few populated attributes for choice")
                .with_expected(format!("at least {}", self.min))
                .with_actual(count.to_string()));
        }
        Ok(())
    }

    /// Count the populated direct members; nested upper-bound violations
    /// propagate as errors
    fn count_populated(&self, instance: &Instance) -> std::result::Result<u32, ValidationError> {
        let mut count = 0;
        for member in &self.members {
            match member {
                ChoiceMember::Attribute(name) => {
                    if member_populated(instance, name) {
                        count += 1;
                    }
                }
                ChoiceMember::Choice(nested) => {
                    let nested_count = nested.count_populated(instance)?;
                    if nested_count > nested.max {
                        return Err(ValidationError::new(
                            "too many populated attributes for choice",
                        )
                        .with_expected(format!("at most {}", nested.max))
                        .with_actual(nested_count.to_string()));
                    }
                    if nested_count >= nested.min {
                        count += 1;
                    }
                }
            }
        }
        Ok(count)
    }
}

/// An attribute is populated when it was explicitly assigned a present value
fn member_populated(instance: &Instance, name: &str) -> bool {
    instance.state(name) == ValueState::Explicit
        && instance.get(name).map(|v| v.is_present()).unwrap_or(false)
}
