//! Group validator
//!
//! A [`Group`] collects top-level content-model entries. At most one entry
//! may be a choice; nested groups and loose attributes directly inside a
//! group are definition-time errors.

use crate::content_model::{Choice, Sequence};
use crate::error::{DefinitionError, Error, Result, ValidationError};
use crate::instance::Instance;

/// One declared entry of a group, before validation
#[derive(Debug, Clone)]
pub enum GroupEntry {
    /// A choice entry (at most one per group)
    Choice(Choice),
    /// A sequence entry
    Sequence(Sequence),
    /// A loose attribute (rejected at build)
    Attribute(String),
    /// A nested group (rejected at build)
    Group(Box<GroupBuilder>),
}

/// Builder collecting group entries; structural errors surface from
/// [`GroupBuilder::build`]
#[derive(Debug, Clone, Default)]
pub struct GroupBuilder {
    entries: Vec<GroupEntry>,
}

impl GroupBuilder {
    /// Start a new group
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a choice entry
    pub fn with_choice(mut self, choice: Choice) -> Self {
        self.entries.push(GroupEntry::Choice(choice));
        self
    }

    /// Add a sequence entry
    pub fn with_sequence(mut self, sequence: Sequence) -> Self {
        self.entries.push(GroupEntry::Sequence(sequence));
        self
    }

    /// Add a loose attribute entry; rejected at build
    pub fn with_attribute(mut self, name: impl Into<String>) -> Self {
        self.entries.push(GroupEntry::Attribute(name.into()));
        self
    }

    /// Add a nested group entry; rejected at build
    pub fn with_group(mut self, group: GroupBuilder) -> Self {
        self.entries.push(GroupEntry::Group(Box::new(group)));
        self
    }

    /// Validate the structure and build the group
    pub fn build(self) -> Result<Group> {
        let mut choice = None;
        let mut sequences = Vec::new();

        for entry in self.entries {
            match entry {
                GroupEntry::Choice(c) => {
                    if choice.is_some() {
                        return Err(Error::Definition(DefinitionError::new(
                            "a group may contain at most one choice",
                        )));
                    }
                    choice = Some(c);
                }
                GroupEntry::Sequence(s) => sequences.push(s),
                GroupEntry::Attribute(name) => {
                    return Err(Error::Definition(DefinitionError::new(format!(
                        "loose attribute '{}' is not allowed directly inside a group",
                        name
                    ))));
                }
                GroupEntry::Group(_) => {
                    return Err(Error::Definition(DefinitionError::new(
                        "groups cannot be nested inside groups",
                    )));
                }
            }
        }

        Ok(Group { choice, sequences })
    }
}

/// Validated group of content-model constraints
#[derive(Debug, Clone)]
pub struct Group {
    choice: Option<Choice>,
    sequences: Vec<Sequence>,
}

impl Group {
    /// Get the choice entry, if any
    pub fn choice(&self) -> Option<&Choice> {
        self.choice.as_ref()
    }

    /// Get the sequence entries
    pub fn sequences(&self) -> &[Sequence] {
        &self.sequences
    }

    /// Validate an instance against every constraint in the group
    pub fn validate(&self, instance: &Instance) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if let Some(ref choice) = self.choice {
            if let Err(error) = choice.validate(instance) {
                errors.push(error);
            }
        }
        for sequence in &self.sequences {
            if let Err(error) = sequence.validate(instance.element_order()) {
                errors.push(error);
            }
        }
        errors
    }
}
