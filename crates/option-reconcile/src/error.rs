/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Error types for option reconciliation.
 */

use option_merge::MergeError;
use thiserror::Error;

/// Error raised by a component factory hook.
///
/// Factories report problems that only the component family can detect,
/// such as a layout directive that a later processing stage cannot honor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ComponentError {
    /// Human-readable description of the problem
    pub message: String,
    /// The offending option directive, if one can be named (e.g. `seriesLayoutBy`)
    pub directive: Option<String>,
}

impl ComponentError {
    /// Create an error from any message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            directive: None,
        }
    }

    /// Name the directive that caused the error.
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directive = Some(directive.into());
        self
    }
}

#[derive(Error, Debug)]
pub enum ReconcileError {
    /// Two fragments of one kind declare the same id.
    #[error("Duplicate id '{id}' in component kind '{kind}'")]
    DuplicateId { kind: String, id: String },

    /// A fragment names a subtype its kind's factory does not provide.
    #[error("Component {kind}.{subtype} is used but not registered")]
    UnknownSubtype { kind: String, subtype: String },

    /// A factory rejected the option it was given.
    #[error("Component {kind}.{subtype} rejected its option: {source}")]
    Component {
        kind: String,
        subtype: String,
        #[source]
        source: ComponentError,
    },

    /// The submitted document is not an object.
    #[error("Option document must be an object, found {found}")]
    InvalidDocument { found: &'static str },

    /// An operation that replays the last document ran before any document was applied.
    #[error("No option document has been applied yet")]
    NoDocument,

    #[error(transparent)]
    Merge(#[from] MergeError),
}

impl ReconcileError {
    /// The offending directive of a component error, if any.
    pub fn directive(&self) -> Option<&str> {
        match self {
            ReconcileError::Component { source, .. } => source.directive.as_deref(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReconcileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_id_message() {
        let error = ReconcileError::DuplicateId {
            kind: "series".into(),
            id: "20".into(),
        };
        insta::assert_snapshot!(error.to_string(), @"Duplicate id '20' in component kind 'series'");
    }

    #[test]
    fn test_component_error_carries_directive() {
        let error = ReconcileError::Component {
            kind: "series".into(),
            subtype: "line".into(),
            source: ComponentError::new("row layout is not supported after a transform")
                .with_directive("seriesLayoutBy"),
        };
        insta::assert_snapshot!(
            error.to_string(),
            @"Component series.line rejected its option: row layout is not supported after a transform"
        );
        assert_eq!(error.directive(), Some("seriesLayoutBy"));
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn test_merge_error_is_transparent() {
        let error: ReconcileError = MergeError::NestingTooDeep {
            max_depth: 1,
            path: vec!["a".into()],
        }
        .into();
        assert_eq!(error.to_string(), "Option nesting too deep (max depth: 1) at path: a");
        assert_eq!(error.directive(), None);
    }
}
