//! Template validation with complete error collection.
//!
//! A raw record is checked against every field of [`crate::schema::FIELDS`];
//! all problems are gathered before returning so a template author sees the
//! whole diagnostic in one pass.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::models::{template_key, Backend, DeviceTemplate, RawTemplate};
use crate::schema::{self, FieldKind, FieldSpec};

/// A single problem with one field of a raw template
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldError {
    #[error("missing required field '{field}'")]
    MissingField { field: String },

    #[error("field '{field}' must be {expected}, got {got}")]
    TypeMismatch {
        field: String,
        expected: String,
        got: String,
    },

    #[error("field '{field}' violates '{rule}': {value}")]
    ConstraintViolation {
        field: String,
        rule: String,
        value: String,
    },
}

impl FieldError {
    pub fn field(&self) -> &str {
        match self {
            FieldError::MissingField { field }
            | FieldError::TypeMismatch { field, .. }
            | FieldError::ConstraintViolation { field, .. } => field,
        }
    }
}

/// Non-fatal observation made while validating
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationWarning {
    UnknownField { field: String },
}

/// A successfully validated template plus any warnings
#[derive(Debug, Clone)]
pub struct Validated {
    pub template: DeviceTemplate,
    pub warnings: Vec<ValidationWarning>,
}

/// Validate a raw record into a [`DeviceTemplate`]
pub fn validate(raw: &RawTemplate) -> Result<DeviceTemplate, Vec<FieldError>> {
    validate_report(raw).map(|v| v.template)
}

/// Validate a raw record, also reporting unknown keys as warnings
pub fn validate_report(raw: &RawTemplate) -> Result<Validated, Vec<FieldError>> {
    let mut errors = Vec::new();
    let mut backend = None;
    let mut texts: Vec<(&str, String)> = Vec::new();
    let mut ints: Vec<(&str, u64)> = Vec::new();

    for spec in schema::FIELDS {
        let value = match raw.get(spec.key) {
            Some(Value::Null) | None => {
                match spec.default {
                    Some(default) if !spec.required => texts.push((spec.key, default.to_string())),
                    _ => errors.push(FieldError::MissingField {
                        field: spec.key.to_string(),
                    }),
                }
                continue;
            }
            Some(value) => value,
        };

        match check_field(spec, value) {
            Ok(Checked::Backend(b)) => backend = Some(b),
            Ok(Checked::Text(s)) => texts.push((spec.key, s)),
            Ok(Checked::Int(n)) => ints.push((spec.key, n)),
            Err(e) => errors.push(e),
        }
    }

    let warnings = raw
        .keys()
        .filter(|k| !schema::is_known(k))
        .map(|k| ValidationWarning::UnknownField { field: k.clone() })
        .collect();

    let type_id = match backend {
        Some(b) if errors.is_empty() => b,
        _ => return Err(errors),
    };

    let text = |key: &str| {
        texts
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.clone())
            .unwrap_or_default()
    };
    let int = |key: &str| ints.iter().find(|(k, _)| *k == key).map(|(_, v)| *v).unwrap_or_default();

    let template = DeviceTemplate::from_parts(
        type_id,
        text(template_key::NAME),
        text(template_key::ICON),
        int(template_key::NVRAM),
        int(template_key::RAM),
        int(template_key::ETHERNET),
        int(template_key::SERIAL),
    );

    Ok(Validated { template, warnings })
}

enum Checked {
    Backend(Backend),
    Text(String),
    Int(u64),
}

/// Coerce a present value to the field's semantic type, then apply its constraint
fn check_field(spec: &FieldSpec, value: &Value) -> Result<Checked, FieldError> {
    let mismatch = || FieldError::TypeMismatch {
        field: spec.key.to_string(),
        expected: spec.kind.expected().to_string(),
        got: describe(value),
    };
    let violation = |shown: String| FieldError::ConstraintViolation {
        field: spec.key.to_string(),
        rule: spec.kind.rule().to_string(),
        value: shown,
    };

    match spec.kind {
        FieldKind::Backend => {
            let name = value.as_str().ok_or_else(mismatch)?;
            name.parse::<Backend>()
                .map(Checked::Backend)
                .map_err(|_| violation(name.to_string()))
        }
        FieldKind::Text => match value {
            Value::String(s) => Ok(Checked::Text(s.clone())),
            Value::Number(n) => Ok(Checked::Text(n.to_string())),
            _ => Err(mismatch()),
        },
        FieldKind::PositiveInt | FieldKind::NonNegativeInt => {
            let n = coerce_int(value).ok_or_else(mismatch)?;
            if !spec.kind.accepts_int(n) {
                return Err(violation(n.to_string()));
            }
            u64::try_from(n).map(Checked::Int).map_err(|_| violation(n.to_string()))
        }
    }
}

/// Integers, integral floats, and strings holding an integer are accepted.
///
/// The result is wide enough for every `u64` and every negative `i64`, so
/// range checks happen on the exact value and nothing saturates.
fn coerce_int(value: &Value) -> Option<i128> {
    // 2^64 and -2^63 are exact in f64
    const FLOAT_UPPER: f64 = 18_446_744_073_709_551_616.0;
    const FLOAT_LOWER: f64 = -9_223_372_036_854_775_808.0;

    match value {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                return Some(i128::from(u));
            }
            if let Some(i) = n.as_i64() {
                return Some(i128::from(i));
            }
            let f = n.as_f64()?;
            (f.fract() == 0.0 && f >= FLOAT_LOWER && f < FLOAT_UPPER).then_some(f as i128)
        }
        Value::String(s) => s.trim().parse::<i128>().ok(),
        _ => None,
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("boolean {}", b),
        Value::Number(n) => format!("number {}", n),
        Value::String(s) => format!("string {:?}", s),
        Value::Array(_) => "array".to_string(),
        Value::Object(_) => "object".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawTemplate {
        match value {
            Value::Object(map) => map,
            _ => panic!("test fixture must be an object"),
        }
    }

    fn iol_router() -> RawTemplate {
        raw(json!({
            "type": "iol",
            "name": "R",
            "icon": "Router.png",
            "nvram": "1024",
            "ram": "256",
            "ethernet": "1",
            "serial": "1",
        }))
    }

    #[test]
    fn test_iol_router_example() {
        let t = validate(&iol_router()).unwrap();
        assert_eq!(t.type_id(), Backend::Iol);
        assert_eq!(t.display_name_prefix(), "R");
        assert_eq!(t.icon_ref(), "Router.png");
        assert_eq!(t.nvram_kib(), 1024);
        assert_eq!(t.ram_mib(), 256);
        assert_eq!(t.ethernet_port_count(), 1);
        assert_eq!(t.serial_port_count(), 1);
    }

    #[test]
    fn test_native_integers_accepted() {
        let t = validate(&raw(json!({
            "type": "qemu", "nvram": 64, "ram": 4096.0, "ethernet": 8, "serial": 0,
        })))
        .unwrap();
        assert_eq!(t.type_id(), Backend::Qemu);
        assert_eq!(t.ram_mib(), 4096);
        assert_eq!(t.serial_port_count(), 0);
        assert_eq!(t.display_name_prefix(), "");
        assert_eq!(t.icon_ref(), "");
    }

    #[test]
    fn test_missing_field_named_once() {
        for key in ["type", "nvram", "ram", "ethernet", "serial"] {
            let mut input = iol_router();
            input.remove(key);
            let errors = validate(&input).unwrap_err();
            assert_eq!(errors, vec![FieldError::MissingField { field: key.to_string() }]);
        }
    }

    #[test]
    fn test_null_counts_as_missing() {
        let mut input = iol_router();
        input.insert("ram".into(), Value::Null);
        let errors = validate(&input).unwrap_err();
        assert_eq!(errors, vec![FieldError::MissingField { field: "ram".into() }]);
    }

    #[test]
    fn test_empty_name_and_icon_valid() {
        let mut input = iol_router();
        input.insert("name".into(), json!(""));
        input.insert("icon".into(), json!(""));
        let t = validate(&input).unwrap();
        assert_eq!(t.display_name_prefix(), "");
        assert_eq!(t.icon_ref(), "");
    }

    #[test]
    fn test_zero_memory_rejected() {
        for key in ["nvram", "ram"] {
            for bad in [json!(0), json!("0"), json!(-5)] {
                let mut input = iol_router();
                input.insert(key.into(), bad);
                let errors = validate(&input).unwrap_err();
                assert_eq!(errors.len(), 1);
                assert!(matches!(&errors[0], FieldError::ConstraintViolation { field, .. } if field == key));
            }
        }
    }

    #[test]
    fn test_port_counts() {
        for key in ["ethernet", "serial"] {
            let mut input = iol_router();
            input.insert(key.into(), json!(0));
            assert!(validate(&input).is_ok());

            input.insert(key.into(), json!("-1"));
            let errors = validate(&input).unwrap_err();
            assert_eq!(
                errors,
                vec![FieldError::ConstraintViolation {
                    field: key.to_string(),
                    rule: "integer >= 0".into(),
                    value: "-1".into(),
                }]
            );
        }
    }

    #[test]
    fn test_unknown_backend_rejected() {
        for bad in ["vpcs", "IOL", ""] {
            let mut input = iol_router();
            input.insert("type".into(), json!(bad));
            let errors = validate(&input).unwrap_err();
            assert!(matches!(&errors[0], FieldError::ConstraintViolation { field, .. } if field == "type"));
        }

        let mut input = iol_router();
        input.insert("type".into(), json!(1));
        let errors = validate(&input).unwrap_err();
        assert!(matches!(&errors[0], FieldError::TypeMismatch { field, .. } if field == "type"));
    }

    #[test]
    fn test_type_mismatch() {
        let mut input = iol_router();
        input.insert("nvram".into(), json!("lots"));
        input.insert("ethernet".into(), json!(1.5));
        input.insert("serial".into(), json!(true));
        input.insert("icon".into(), json!(["a.png"]));
        let errors = validate(&input).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field()).collect();
        assert_eq!(fields, ["icon", "nvram", "ethernet", "serial"]);
        assert!(errors.iter().all(|e| matches!(e, FieldError::TypeMismatch { .. })));
        assert_eq!(
            errors[1],
            FieldError::TypeMismatch {
                field: "nvram".into(),
                expected: "integer".into(),
                got: "string \"lots\"".into(),
            }
        );
    }

    #[test]
    fn test_collects_all_errors() {
        let input = raw(json!({ "type": "docker", "nvram": 0, "name": "R" }));
        let errors = validate(&input).unwrap_err();
        assert_eq!(errors.len(), 5);
        assert!(matches!(errors[0], FieldError::ConstraintViolation { .. }));
        assert!(matches!(errors[1], FieldError::ConstraintViolation { .. }));
        assert_eq!(errors[2], FieldError::MissingField { field: "ram".into() });
    }

    #[test]
    fn test_unknown_fields_warn() {
        let mut input = iol_router();
        input.insert("console".into(), json!("telnet"));
        let report = validate_report(&input).unwrap();
        assert_eq!(
            report.warnings,
            vec![ValidationWarning::UnknownField { field: "console".into() }]
        );
        assert_eq!(report.template, validate(&iol_router()).unwrap());
    }

    #[test]
    fn test_numeric_name_rendered_as_text() {
        let mut input = iol_router();
        input.insert("name".into(), json!(7200));
        assert_eq!(validate(&input).unwrap().display_name_prefix(), "7200");
    }

    #[test]
    fn test_integer_bounds_are_exact() {
        let mut input = iol_router();
        input.insert("nvram".into(), json!(u64::MAX));
        input.insert("ram".into(), json!("18446744073709551615"));
        let t = validate(&input).unwrap();
        assert_eq!(t.nvram_kib(), u64::MAX);
        assert_eq!(t.ram_mib(), u64::MAX);

        // 2^63 as a float must not saturate to i64::MAX
        input.insert("nvram".into(), json!(9223372036854775808.0_f64));
        assert_eq!(validate(&input).unwrap().nvram_kib(), 1u64 << 63);

        input.insert("nvram".into(), json!("18446744073709551616"));
        let errors = validate(&input).unwrap_err();
        assert_eq!(
            errors,
            vec![FieldError::ConstraintViolation {
                field: "nvram".into(),
                rule: "integer > 0".into(),
                value: "18446744073709551616".into(),
            }]
        );

        input.insert("nvram".into(), json!(18446744073709551616.0_f64));
        let errors = validate(&input).unwrap_err();
        assert!(matches!(&errors[0], FieldError::TypeMismatch { field, .. } if field == "nvram"));
    }

    #[test]
    fn test_error_serialization() {
        let err = FieldError::MissingField { field: "ram".into() };
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({ "kind": "missing_field", "field": "ram" })
        );
        assert_eq!(err.to_string(), "missing required field 'ram'");
    }
}
