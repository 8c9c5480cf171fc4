//! Field validation errors and their flattening into error records.
//!
//! A [`ValidationDetail`] mirrors the shape of the request payload: each field
//! maps either to a nested detail (for nested objects) or to the list of leaf
//! errors raised for that field. Flattening walks the tree and emits one
//! `validation_error` record per leaf, with the ancestors joined by
//! [`DEPTH_MARK`] in the code.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::codes::{ErrorType, DEPTH_MARK, NON_FIELD_ERRORS};
use super::record::ErrorRecord;

/// A leaf validation error: a machine code plus its message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub code: String,
    pub message: String,
}

impl FieldError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn required() -> Self {
        Self::new("required", "This field is required.")
    }

    pub fn blank() -> Self {
        Self::new("blank", "This field may not be blank.")
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new("invalid", message)
    }

    pub fn max_length(max: usize) -> Self {
        Self::new(
            "max_length",
            format!("Ensure this field has no more than {} characters.", max),
        )
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Errors attached to one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldErrors {
    Nested(ValidationDetail),
    List(Vec<FieldError>),
}

/// Per-field validation errors, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationDetail {
    fields: IndexMap<String, FieldErrors>,
}

impl ValidationDetail {
    pub fn new() -> Self {
        Self::default()
    }

    /// Detail for errors not tied to any field
    pub fn non_field(errors: impl IntoIterator<Item = FieldError>) -> Self {
        let mut detail = Self::new();
        for error in errors {
            detail.add(NON_FIELD_ERRORS, error);
        }
        detail
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn get(&self, field: &str) -> Option<&FieldErrors> {
        self.fields.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldErrors)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Append a leaf error to `field`.
    ///
    /// If `field` already holds a nested detail, the error lands in that
    /// detail's `non_field_errors`.
    pub fn add(&mut self, field: impl Into<String>, error: FieldError) {
        match self
            .fields
            .entry(field.into())
            .or_insert_with(|| FieldErrors::List(Vec::new()))
        {
            FieldErrors::List(errors) => errors.push(error),
            FieldErrors::Nested(inner) => inner.add(NON_FIELD_ERRORS, error),
        }
    }

    /// Attach the errors of a nested object. Empty details are dropped.
    pub fn nest(&mut self, field: impl Into<String>, detail: ValidationDetail) {
        if detail.is_empty() {
            return;
        }
        let slot = self
            .fields
            .entry(field.into())
            .or_insert_with(|| FieldErrors::Nested(ValidationDetail::new()));
        if let FieldErrors::List(errors) = slot {
            let errors = std::mem::take(errors);
            *slot = FieldErrors::Nested(ValidationDetail::non_field(errors));
        }
        if let FieldErrors::Nested(existing) = slot {
            existing.fields.extend(detail.fields);
        }
    }

    pub fn with_error(mut self, field: impl Into<String>, error: FieldError) -> Self {
        self.add(field, error);
        self
    }

    pub fn with_nested(mut self, field: impl Into<String>, detail: ValidationDetail) -> Self {
        self.nest(field, detail);
        self
    }

    /// Flatten into `validation_error` records, depth-first in field order
    pub fn unpack(&self) -> Vec<ErrorRecord> {
        unpack_at(self, &FieldPath::root())
    }
}

/// Names of the fields enclosing the one being unpacked
#[derive(Debug, Clone, Default)]
struct FieldPath<'a>(Vec<&'a str>);

impl<'a> FieldPath<'a> {
    fn root() -> Self {
        Self::default()
    }

    fn child(&self, field: &'a str) -> Self {
        let mut segments = self.0.clone();
        segments.push(field);
        Self(segments)
    }

    fn joined(&self) -> String {
        self.0.join(DEPTH_MARK)
    }
}

fn unpack_at<'a>(detail: &'a ValidationDetail, path: &FieldPath<'a>) -> Vec<ErrorRecord> {
    detail
        .fields
        .iter()
        .flat_map(|(field, errors)| {
            let path = path.child(field);
            match errors {
                FieldErrors::Nested(inner) => unpack_at(inner, &path),
                FieldErrors::List(leaves) => {
                    let segment = path.joined();
                    leaves
                        .iter()
                        .map(|leaf| {
                            ErrorRecord::new(
                                ErrorType::ValidationError,
                                format!("validation.{}.{}", segment, leaf.code),
                                leaf.to_string(),
                            )
                        })
                        .collect()
                }
            }
        })
        .collect()
}
