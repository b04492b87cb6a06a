//! Device template schema: the field table every raw record is checked against.

use crate::models::template_key;

/// Semantic type of a template field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// One of the known emulation backends
    Backend,
    /// Free-form text, empty allowed
    Text,
    /// Integer strictly greater than zero
    PositiveInt,
    /// Integer greater than or equal to zero
    NonNegativeInt,
}

impl FieldKind {
    /// Label used in type mismatch errors
    pub fn expected(&self) -> &'static str {
        match self {
            FieldKind::Backend => "string",
            FieldKind::Text => "string",
            FieldKind::PositiveInt | FieldKind::NonNegativeInt => "integer",
        }
    }

    /// Human readable constraint, reported in constraint violations
    pub fn rule(&self) -> &'static str {
        match self {
            FieldKind::Backend => "member of {iol, dynamips, qemu}",
            FieldKind::Text => "any string",
            FieldKind::PositiveInt => "integer > 0",
            FieldKind::NonNegativeInt => "integer >= 0",
        }
    }

    /// Constraint predicate for integer kinds
    pub fn accepts_int(&self, value: i128) -> bool {
        match self {
            FieldKind::PositiveInt => value > 0,
            FieldKind::NonNegativeInt => value >= 0,
            FieldKind::Backend | FieldKind::Text => false,
        }
    }
}

/// One schema entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub key: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    /// Value used when an optional field is absent
    pub default: Option<&'static str>,
}

impl FieldSpec {
    const fn required(key: &'static str, kind: FieldKind) -> Self {
        Self {
            key,
            kind,
            required: true,
            default: None,
        }
    }

    const fn optional(key: &'static str, kind: FieldKind, default: &'static str) -> Self {
        Self {
            key,
            kind,
            required: false,
            default: Some(default),
        }
    }
}

/// The device template schema, in validation and reporting order
pub const FIELDS: &[FieldSpec] = &[
    FieldSpec::required(template_key::TYPE, FieldKind::Backend),
    FieldSpec::optional(template_key::NAME, FieldKind::Text, ""),
    FieldSpec::optional(template_key::ICON, FieldKind::Text, ""),
    FieldSpec::required(template_key::NVRAM, FieldKind::PositiveInt),
    FieldSpec::required(template_key::RAM, FieldKind::PositiveInt),
    FieldSpec::required(template_key::ETHERNET, FieldKind::NonNegativeInt),
    FieldSpec::required(template_key::SERIAL, FieldKind::NonNegativeInt),
];

/// Look up a field by its raw key
pub fn field(key: &str) -> Option<&'static FieldSpec> {
    FIELDS.iter().find(|f| f.key == key)
}

/// Whether a raw key is part of the schema
pub fn is_known(key: &str) -> bool {
    field(key).is_some()
}
