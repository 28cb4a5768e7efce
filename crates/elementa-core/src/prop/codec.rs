#![forbid(unsafe_code)]

//! Attribute codec: property values to and from HTML attribute strings.
//!
//! | Kind | Decode (attribute present) | Encode |
//! |------|----------------------------|--------|
//! | string | raw text | text; nullish removes |
//! | number | integer truncation, `NaN` if unparsable | decimal text; nullish removes |
//! | bool | presence, or `== "true"` when strict | `""` (or `"true"` when strict); falsy removes |
//! | complex | URL-decode then JSON | JSON then URL-encode; unencodable is `"_"` |
//!
//! An absent attribute always decodes to `undefined`.
//!
//! Complex attributes starting with [`REF_PREFIX`] name a value an ancestor
//! registered; resolving them needs the element hierarchy, so this module
//! only recognizes them.

use super::spec::{PropKind, Primitive};
use crate::error::{DecodeError, EncodeError};
use crate::value::Value;

/// Prefix marking a complex attribute as a reference to an ancestor value.
pub const REF_PREFIX: &str = "___complex_ref";

/// Attribute text written when a complex value cannot be encoded.
pub const ENCODE_FAILURE: &str = "_";

/// `parseInt(text, 10)`: optional sign and leading decimal digits after
/// leading whitespace; anything else is `NaN`.
#[must_use]
pub fn parse_int(text: &str) -> f64 {
    let trimmed = text.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let end = digits
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return f64::NAN;
    }
    let magnitude = digits[..end]
        .bytes()
        .fold(0.0_f64, |acc, b| acc.mul_add(10.0, f64::from(b - b'0')));
    if negative { -magnitude } else { magnitude }
}

/// Whether `raw` is a reference to an ancestor-registered value.
#[must_use]
pub fn is_ref(raw: &str) -> bool {
    raw.starts_with(REF_PREFIX)
}

/// Decode a primitive attribute. `None` means the attribute is absent.
#[must_use]
pub fn decode_primitive(kind: Primitive, strict: bool, raw: Option<&str>) -> Value {
    let Some(raw) = raw else {
        return Value::Undefined;
    };
    match kind {
        Primitive::String => Value::String(raw.to_owned()),
        Primitive::Number => Value::Number(parse_int(raw)),
        Primitive::Bool if strict => Value::Bool(raw == "true"),
        Primitive::Bool => Value::Bool(true),
    }
}

/// Decode a complex attribute that is not a reference.
///
/// # Errors
///
/// - [`DecodeError::Url`] if the percent-encoding is not valid UTF-8.
/// - [`DecodeError::Json`] if the decoded text is not JSON.
pub fn decode_complex(raw: &str) -> Result<Value, DecodeError> {
    let text = urlencoding::decode(raw).map_err(|e| DecodeError::Url(e.to_string()))?;
    let json: serde_json::Value =
        serde_json::from_str(&text).map_err(|e| DecodeError::Json(e.to_string()))?;
    Ok(Value::from_json(&json))
}

/// A decoded attribute: a value, or a reference still to be resolved
/// against the element hierarchy.
#[derive(Debug, Clone)]
pub enum Decoded {
    /// The decoded value.
    Value(Value),
    /// A [`REF_PREFIX`] reference name.
    Ref(String),
}

/// Decode an attribute for a property of type `kind`. `None` means the
/// attribute is absent.
///
/// # Errors
///
/// See [`decode_complex`]; primitive decoding never fails.
pub fn decode_attribute(
    kind: PropKind,
    strict: bool,
    raw: Option<&str>,
) -> Result<Decoded, DecodeError> {
    match (kind, raw) {
        (PropKind::Primitive(p), _) => Ok(Decoded::Value(decode_primitive(p, strict, raw))),
        (PropKind::Complex, None) => Ok(Decoded::Value(Value::Undefined)),
        (PropKind::Complex, Some(raw)) if is_ref(raw) => Ok(Decoded::Ref(raw.to_owned())),
        (PropKind::Complex, Some(raw)) => decode_complex(raw).map(Decoded::Value),
    }
}

/// Encode a value for its attribute. `Ok(None)` means remove the attribute.
///
/// # Errors
///
/// Returns [`EncodeError`] for complex values that cannot be serialized;
/// callers write [`ENCODE_FAILURE`] instead.
pub fn encode_attribute(
    kind: PropKind,
    strict: bool,
    value: &Value,
) -> Result<Option<String>, EncodeError> {
    match kind {
        PropKind::Primitive(Primitive::Bool) => {
            Ok(truthy(value).then(|| if strict { "true" } else { "" }.to_owned()))
        }
        _ if value.is_nullish() => Ok(None),
        PropKind::Primitive(_) => Ok(Some(value.to_string())),
        PropKind::Complex => {
            let json = value.to_json()?;
            let text = serde_json::to_string(&json).map_err(|e| EncodeError::Json(e.to_string()))?;
            Ok(Some(urlencoding::encode(&text).into_owned()))
        }
    }
}

/// The value read for an `undefined` property with coercion enabled.
#[must_use]
pub fn coerced(kind: PropKind) -> Value {
    match kind {
        PropKind::Primitive(Primitive::String) => Value::String(String::new()),
        PropKind::Primitive(Primitive::Number) => Value::Number(0.0),
        PropKind::Primitive(Primitive::Bool) => Value::Bool(false),
        PropKind::Complex => Value::Undefined,
    }
}

/// Apply read coercion to a stored value.
#[must_use]
pub fn coerce_read(kind: PropKind, coerce: bool, value: Value) -> Value {
    if coerce && value.is_undefined() {
        coerced(kind)
    } else {
        value
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Undefined | Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => *n != 0.0 && !n.is_nan(),
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Key;
    use proptest::prelude::*;

    #[test]
    fn parse_int_truncates() {
        assert_eq!(parse_int("10"), 10.0);
        assert_eq!(parse_int("10.9"), 10.0);
        assert_eq!(parse_int("  -3px"), -3.0);
        assert_eq!(parse_int("+7"), 7.0);
        assert!(parse_int("abc").is_nan());
        assert!(parse_int("").is_nan());
        assert!(parse_int("-").is_nan());
    }

    #[test]
    fn absent_attribute_is_undefined() {
        for kind in [Primitive::String, Primitive::Number, Primitive::Bool] {
            assert!(decode_primitive(kind, false, None).is_undefined());
        }
    }

    #[test]
    fn bool_decoding_respects_strict() {
        assert_eq!(decode_primitive(Primitive::Bool, false, Some("")).as_bool(), Some(true));
        assert_eq!(decode_primitive(Primitive::Bool, false, Some("false")).as_bool(), Some(true));
        assert_eq!(decode_primitive(Primitive::Bool, true, Some("")).as_bool(), Some(false));
        assert_eq!(decode_primitive(Primitive::Bool, true, Some("true")).as_bool(), Some(true));
    }

    #[test]
    fn bool_encoding() {
        assert_eq!(encode_attribute(PropKind::BOOL, false, &Value::Bool(true)), Ok(Some(String::new())));
        assert_eq!(encode_attribute(PropKind::BOOL, true, &Value::Bool(true)), Ok(Some("true".into())));
        assert_eq!(encode_attribute(PropKind::BOOL, false, &Value::Bool(false)), Ok(None));
        assert_eq!(encode_attribute(PropKind::BOOL, false, &Value::Undefined), Ok(None));
    }

    #[test]
    fn primitive_encoding() {
        assert_eq!(encode_attribute(PropKind::NUMBER, false, &Value::from(5)), Ok(Some("5".into())));
        assert_eq!(encode_attribute(PropKind::STRING, false, &Value::from("hi")), Ok(Some("hi".into())));
        assert_eq!(encode_attribute(PropKind::STRING, false, &Value::Null), Ok(None));
    }

    #[test]
    fn complex_encoding_is_url_encoded_json() {
        let value = Value::object([("a", Value::from(1)), ("b", Value::from("x y"))]);
        let encoded = encode_attribute(PropKind::Complex, false, &value).unwrap().unwrap();
        assert_eq!(encoded, "%7B%22a%22%3A1%2C%22b%22%3A%22x%20y%22%7D");
        let decoded = decode_complex(&encoded).unwrap();
        assert!(decoded.deep_eq(&value));
    }

    #[test]
    fn cyclic_value_fails_to_encode() {
        let value = Value::object([("x", Value::from(1))]);
        if let Value::Object(obj) = &value {
            obj.write("self", value.clone());
        }
        assert_eq!(
            encode_attribute(PropKind::Complex, false, &value),
            Err(EncodeError::Cyclic)
        );
        assert_eq!(value.get(&Key::from("x")).as_f64(), Some(1.0));
    }

    #[test]
    fn malformed_complex_attribute_is_an_error() {
        assert!(matches!(decode_complex("%7Bnot json"), Err(DecodeError::Json(_))));
        assert!(matches!(decode_complex("%FF"), Err(DecodeError::Url(_))));
    }

    #[test]
    fn refs_are_recognized() {
        assert!(is_ref("___complex_ref0"));
        assert!(!is_ref("%5B%5D"));
        assert!(matches!(
            decode_attribute(PropKind::Complex, false, Some("___complex_ref3")),
            Ok(Decoded::Ref(r)) if r == "___complex_ref3"
        ));
        assert!(matches!(
            decode_attribute(PropKind::Complex, false, None),
            Ok(Decoded::Value(Value::Undefined))
        ));
        assert!(matches!(
            decode_attribute(PropKind::NUMBER, false, Some("12.5")),
            Ok(Decoded::Value(Value::Number(n))) if n == 12.0
        ));
    }

    #[test]
    fn coercion_only_replaces_undefined() {
        assert_eq!(coerce_read(PropKind::STRING, true, Value::Undefined).as_str(), Some(""));
        assert_eq!(coerce_read(PropKind::NUMBER, true, Value::Undefined).as_f64(), Some(0.0));
        assert_eq!(coerce_read(PropKind::BOOL, true, Value::Undefined).as_bool(), Some(false));
        assert!(coerce_read(PropKind::Complex, true, Value::Undefined).is_undefined());
        assert!(coerce_read(PropKind::NUMBER, false, Value::Undefined).is_undefined());
        assert!(coerce_read(PropKind::STRING, true, Value::Null).is_nullish());
    }

    proptest! {
        #[test]
        fn integers_survive_parse_int(n in -1_000_000i32..1_000_000) {
            prop_assert_eq!(parse_int(&n.to_string()), f64::from(n));
        }
    }
}
