//! ES module text generation.
//!
//! With named exports enabled and an object value, every key that is a legal
//! identifier gets its own `export const`, and the default export refers back
//! to those bindings:
//!
//! ```text
//! export const src = "/@imagetools/3f2a...";
//! export const w = 400;
//! export default {
//! 	src,
//! 	w
//! };
//! ```
//!
//! Any other value becomes a plain `export default <json>;`.

use serde_json::Value;

/// Words that cannot be used as a binding name.
const RESERVED_WORDS: &[&str] = &[
    "abstract", "arguments", "await", "boolean", "break", "byte", "case", "catch", "char",
    "class", "const", "continue", "debugger", "default", "delete", "do", "double", "else",
    "enum", "eval", "export", "extends", "false", "final", "finally", "float", "for",
    "function", "goto", "if", "implements", "import", "in", "instanceof", "int", "interface",
    "let", "long", "native", "new", "null", "package", "private", "protected", "public",
    "return", "short", "static", "super", "switch", "synchronized", "this", "throw", "throws",
    "transient", "true", "try", "typeof", "var", "void", "volatile", "while", "with", "yield",
    "NaN", "Infinity", "undefined",
];

/// Whether `key` can be exported under its own name.
pub fn is_legal_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    let first_ok = match chars.next() {
        Some(c) => c.is_ascii_alphabetic() || c == '_' || c == '$',
        None => false,
    };

    first_ok
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        && !RESERVED_WORDS.contains(&key)
}

/// Render `value` as the text of an ES module.
pub fn to_es_module(value: &Value, named_exports: bool, compact: bool) -> String {
    let (space, newline, tab) = if compact { ("", "", "") } else { (" ", "\n", "\t") };
    let json = |v: &Value| {
        if compact {
            v.to_string()
        } else {
            // Pretty printing cannot fail for a `Value`
            serde_json::to_string_pretty(v).unwrap_or_else(|_| v.to_string())
        }
    };

    let object = match value {
        Value::Object(map) if named_exports => map,
        _ => return format!("export default{space}{};{newline}", json(value)),
    };

    let mut named = String::new();
    let mut rows = Vec::with_capacity(object.len());

    for (key, value) in object {
        if is_legal_identifier(key) {
            named.push_str(&format!(
                "export const {key}{space}={space}{};{newline}",
                json(value)
            ));
            rows.push(key.clone());
        } else {
            rows.push(format!("{}:{space}{}", Value::String(key.clone()), json(value)));
        }
    }

    let separator = format!(",{newline}{tab}");
    format!(
        "{named}export default{space}{{{newline}{tab}{}{newline}}};{newline}",
        rows.join(&separator)
    )
}
