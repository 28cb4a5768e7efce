#![forbid(unsafe_code)]

//! Property key and attribute name canonicalization.
//!
//! Property keys are `camelCase`; HTML attribute names are `kebab-case`.
//! Both directions are lossless for keys made of ASCII letters and digits.

/// `"foo-bar-baz"` to `"fooBarBaz"`.
#[must_use]
pub fn dash_to_camel(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for ch in name.chars() {
        if ch == '-' {
            upper_next = !out.is_empty();
        } else if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// `"fooBarBaz"` to `"foo-bar-baz"`.
#[must_use]
pub fn camel_to_dash(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for ch in key.chars() {
        if ch.is_uppercase() {
            if !out.is_empty() {
                out.push('-');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}
