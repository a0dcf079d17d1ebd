//! Values produced while interpreting a script.

use std::fmt;
use std::fmt::Write;

use linked_hash_map::LinkedHashMap;
use nbgen_syntax::Constant;

use crate::cell::Cell;
use crate::error::{Error, Result};
use crate::modules::{Builtin, Module};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    /// An integer outside the `i64` range, as decimal digits.
    BigInt(String),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    Ellipsis,
    List(Vec<Value>),
    Dict(LinkedHashMap<String, Value>),
    Module(Module),
    Builtin(Builtin),
    Cell(Cell),
}

impl Value {
    /// The Python name of the value's type, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) | Value::BigInt(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Bytes(_) => "bytes",
            Value::Ellipsis => "ellipsis",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
            Value::Module(_) => "module",
            Value::Builtin(_) => "builtin_function_or_method",
            Value::Cell(_) => "cell",
        }
    }

    pub fn into_cell(self) -> Option<Cell> {
        match self {
            Value::Cell(cell) => Some(cell),
            _ => None,
        }
    }

    /// Python `repr()` of the value.
    pub fn repr(&self) -> String {
        let mut out = String::new();
        self.write_repr(&mut out, false);
        out
    }

    /// Python `ascii()` of the value: like `repr()` with non-ASCII characters escaped.
    pub fn ascii(&self) -> String {
        let mut out = String::new();
        self.write_repr(&mut out, true);
        out
    }

    fn write_repr(&self, out: &mut String, ascii: bool) {
        match self {
            Value::None => out.push_str("None"),
            Value::Bool(true) => out.push_str("True"),
            Value::Bool(false) => out.push_str("False"),
            Value::Int(i) => {
                let _ = write!(out, "{i}");
            }
            Value::BigInt(digits) => out.push_str(digits),
            Value::Float(f) => out.push_str(&float_repr(*f)),
            Value::Str(s) => write_str_repr(out, s, ascii),
            Value::Bytes(b) => write_bytes_repr(out, b),
            Value::Ellipsis => out.push_str("Ellipsis"),
            Value::List(items) => {
                out.push('[');
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        out.push_str(", ");
                    }
                    item.write_repr(out, ascii);
                }
                out.push(']');
            }
            Value::Dict(entries) => {
                out.push('{');
                for (idx, (key, value)) in entries.iter().enumerate() {
                    if idx > 0 {
                        out.push_str(", ");
                    }
                    write_str_repr(out, key, ascii);
                    out.push_str(": ");
                    value.write_repr(out, ascii);
                }
                out.push('}');
            }
            Value::Module(m) => {
                let _ = write!(out, "<module '{}'>", m.name());
            }
            Value::Builtin(b) => {
                let _ = write!(out, "<built-in function {}>", b.name());
            }
            Value::Cell(c) => {
                let _ = write!(out, "<{} cell>", c.kind());
            }
        }
    }

    /// Python source that evaluates to this value. Only data values have one.
    pub fn literal(&self) -> Result<String> {
        Ok(match self {
            Value::Float(f) if f.is_nan() => "float('nan')".to_string(),
            Value::Float(f) if f.is_infinite() => {
                if *f > 0.0 {
                    "float('inf')".to_string()
                } else {
                    "float('-inf')".to_string()
                }
            }
            Value::Ellipsis => "...".to_string(),
            Value::List(items) => {
                let items = items
                    .iter()
                    .map(Value::literal)
                    .collect::<Result<Vec<_>>>()?;
                format!("[{}]", items.join(", "))
            }
            Value::Dict(entries) => {
                let entries = entries
                    .iter()
                    .map(|(k, v)| Ok(format!("{}: {}", Value::Str(k.clone()).repr(), v.literal()?)))
                    .collect::<Result<Vec<_>>>()?;
                format!("{{{}}}", entries.join(", "))
            }
            Value::Module(_) | Value::Builtin(_) | Value::Cell(_) => {
                return Err(Error::NotLiteral(self.type_name().to_string()))
            }
            _ => self.repr(),
        })
    }

    /// Resolves `value.attr`.
    pub fn attribute(&self, attr: &str) -> Result<Value> {
        let found = match self {
            Value::Module(module) => module.member(attr).cloned(),
            Value::Cell(cell) => cell.attribute(attr),
            _ => None,
        };
        found.ok_or_else(|| Error::Attribute {
            type_name: self.type_name().to_string(),
            attr: attr.to_string(),
        })
    }

    /// Converts a data value to JSON, for cell metadata.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(match self {
            Value::None => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::BigInt(digits) => digits
                .parse::<u64>()
                .map(serde_json::Value::from)
                .map_err(|_| Error::IntegerRange(digits.clone()))?,
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .ok_or_else(|| Error::NotLiteral("float".to_string()))?,
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => serde_json::Value::Array(
                items.iter().map(Value::to_json).collect::<Result<_>>()?,
            ),
            Value::Dict(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), v.to_json()?)))
                    .collect::<Result<_>>()?,
            ),
            _ => return Err(Error::NotLiteral(self.type_name().to_string())),
        })
    }
}

/// Python `str()`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            other => f.write_str(&other.repr()),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::None,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match (n.as_i64(), n.as_u64()) {
                (Some(i), _) => Value::Int(i),
                (None, Some(u)) => Value::BigInt(u.to_string()),
                _ => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(entries) => Value::Dict(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<Constant> for Value {
    fn from(value: Constant) -> Self {
        match value {
            Constant::None => Value::None,
            Constant::Bool(b) => Value::Bool(b),
            Constant::Int(i) => Value::Int(i),
            Constant::BigInt(digits) => Value::BigInt(digits),
            Constant::Float(f) => Value::Float(f),
            Constant::Str(s) => Value::Str(s),
            Constant::Bytes(b) => Value::Bytes(b),
            Constant::Ellipsis => Value::Ellipsis,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

pub(crate) fn float_repr(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let abs = f.abs();
    if abs == 0.0 || (1e-4..1e16).contains(&abs) {
        let s = format!("{f:?}");
        if s.contains('.') || s.contains('e') {
            s
        } else {
            format!("{s}.0")
        }
    } else {
        python_exponent(&format!("{f:e}"))
    }
}

/// Rewrites Rust exponent notation (`1.5e-7`) the way Python prints it (`1.5e-07`).
pub(crate) fn python_exponent(s: &str) -> String {
    match s.split_once(['e', 'E']) {
        Some((mantissa, exp)) => {
            let marker = if s.contains('E') { 'E' } else { 'e' };
            let exp: i32 = exp.parse().unwrap_or(0);
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{mantissa}{marker}{sign}{:02}", exp.abs())
        }
        None => s.to_string(),
    }
}

fn write_str_repr(out: &mut String, s: &str, ascii: bool) {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() || (ascii && !c.is_ascii()) => {
                let code = c as u32;
                let _ = if code <= 0xff {
                    write!(out, "\\x{code:02x}")
                } else if code <= 0xffff {
                    write!(out, "\\u{code:04x}")
                } else {
                    write!(out, "\\U{code:08x}")
                };
            }
            c => out.push(c),
        }
    }
    out.push(quote);
}

fn write_bytes_repr(out: &mut String, bytes: &[u8]) {
    let quote = if bytes.contains(&b'\'') && !bytes.contains(&b'"') {
        b'"'
    } else {
        b'\''
    };
    out.push('b');
    out.push(quote as char);
    for &b in bytes {
        match b {
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            b if b == quote => {
                out.push('\\');
                out.push(b as char);
            }
            0x20..=0x7e => out.push(b as char),
            b => {
                let _ = write!(out, "\\x{b:02x}");
            }
        }
    }
    out.push(quote as char);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_repr_picks_quotes_like_python() {
        assert_eq!(Value::from("Ada").repr(), "'Ada'");
        assert_eq!(Value::from("it's").repr(), "\"it's\"");
        assert_eq!(Value::from("a'b\"c").repr(), "'a\\'b\"c'");
        assert_eq!(Value::from("tab\tnew\n").repr(), "'tab\\tnew\\n'");
        assert_eq!(Value::from("é").ascii(), "'\\xe9'");
    }

    #[test]
    fn float_repr_matches_python() {
        assert_eq!(float_repr(2.0), "2.0");
        assert_eq!(float_repr(0.1), "0.1");
        assert_eq!(float_repr(1e16), "1e+16");
        assert_eq!(float_repr(1.5e-7), "1.5e-07");
        assert_eq!(float_repr(-0.0), "-0.0");
    }

    #[test]
    fn literals_round_trip_data() {
        let json = serde_json::json!({"n": 1, "xs": [true, null, 2.5], "s": "x"});
        let value = Value::from(json.clone());
        assert_eq!(
            value.literal().unwrap(),
            "{'n': 1, 'xs': [True, None, 2.5], 's': 'x'}"
        );
        assert_eq!(value.to_json().unwrap(), json);
        assert_eq!(Value::Float(f64::INFINITY).literal().unwrap(), "float('inf')");
        assert_eq!(Value::Bytes(b"a\x00".to_vec()).literal().unwrap(), "b'a\\x00'");
    }

    #[test]
    fn big_integers_keep_their_digits() {
        let big = Value::from(Constant::BigInt("99999999999999999999".into()));
        assert_eq!(big.type_name(), "int");
        assert_eq!(big.literal().unwrap(), "99999999999999999999");
        assert_eq!(big.to_string(), "99999999999999999999");
        assert!(matches!(big.to_json(), Err(Error::IntegerRange(ref d)) if d == "99999999999999999999"));

        let unsigned = Value::from(serde_json::json!(u64::MAX));
        assert_eq!(unsigned, Value::BigInt(u64::MAX.to_string()));
        assert_eq!(unsigned.to_json().unwrap(), serde_json::json!(u64::MAX));
    }

    #[test]
    fn opaque_values_have_no_literal() {
        let module = Value::Module(Module::new("nb_generator"));
        assert!(matches!(module.literal(), Err(Error::NotLiteral(_))));
        assert_eq!(module.to_string(), "<module 'nb_generator'>");
    }

    #[test]
    fn display_is_python_str() {
        assert_eq!(Value::from("plain").to_string(), "plain");
        assert_eq!(Value::Int(2).to_string(), "2");
        assert_eq!(Value::Bool(true).to_string(), "True");
        assert_eq!(Value::List(vec![Value::from("a")]).to_string(), "['a']");
    }
}
