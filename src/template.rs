//! Rendering of narrative cell templates.
//!
//! Templates use Python's `str.format` syntax with the context store as keyword arguments:
//! `{name}`, `{name.attr}`, `{name[key]}`, conversions (`!r`, `!s`, `!a`) and the format
//! specification mini-language. Doubled braces produce literal braces.

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use thiserror::Error;

use crate::context::ContextStore;
use crate::value::{float_repr, python_exponent, Value};

#[derive(Parser)]
#[grammar = "grammars/template.pest"]
pub struct TemplateParser;

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("invalid template")]
    Syntax(#[from] Box<pest::error::Error<Rule>>),
    #[error("no value named '{0}' in the context")]
    MissingKey(String),
    #[error("positional field '{{{0}}}' cannot be filled from the context")]
    Positional(String),
    #[error("cannot resolve '{field}': {message}")]
    Lookup { field: String, message: String },
    #[error("unknown format code '{code}' for value of type '{type_name}'")]
    FormatCode { code: char, type_name: String },
    #[error("{0}")]
    InvalidSpec(String),
}

type Result<T> = std::result::Result<T, TemplateError>;

/// Renders `template` with the values in `context`.
pub fn render(template: &str, context: &ContextStore) -> Result<String> {
    let mut pairs = TemplateParser::parse(Rule::template, template).map_err(Box::new)?;
    let Some(root) = pairs.next() else {
        return Ok(String::new());
    };

    let mut out = String::with_capacity(template.len());
    for pair in root.into_inner() {
        match pair.as_rule() {
            Rule::escaped_open => out.push('{'),
            Rule::escaped_close => out.push('}'),
            Rule::text => out.push_str(pair.as_str()),
            Rule::field => out.push_str(&render_field(pair, context)?),
            _ => {}
        }
    }
    Ok(out)
}

fn render_field(pair: Pair<'_, Rule>, context: &ContextStore) -> Result<String> {
    let mut value = Value::None;
    let mut conversion = None;
    let mut spec = FormatSpec::default();

    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::field_name => value = resolve(part, context)?,
            Rule::conversion => {
                conversion = part
                    .into_inner()
                    .next()
                    .and_then(|c| c.as_str().chars().next())
            }
            Rule::format_spec => spec = FormatSpec::from_pair(part),
            _ => {}
        }
    }

    let value = match conversion {
        Some('r') => Value::Str(value.repr()),
        Some('a') => Value::Str(value.ascii()),
        Some(_) => Value::Str(value.to_string()),
        None => value,
    };
    spec.apply(&value)
}

fn resolve(pair: Pair<'_, Rule>, context: &ContextStore) -> Result<Value> {
    let field = pair.as_str().to_string();
    let mut inner = pair.into_inner();
    let name = inner.next().map(|p| p.as_str()).unwrap_or_default();
    if name.is_empty() || name.chars().all(|c| c.is_ascii_digit()) {
        return Err(TemplateError::Positional(name.to_string()));
    }

    let mut value = context
        .get(name)
        .cloned()
        .ok_or_else(|| TemplateError::MissingKey(name.to_string()))?;

    for accessor in inner {
        let key = accessor
            .clone()
            .into_inner()
            .next()
            .map(|p| p.as_str())
            .unwrap_or_default();
        value = match accessor.as_rule() {
            Rule::attribute => value.attribute(key).map_err(|e| TemplateError::Lookup {
                field: field.clone(),
                message: e.to_string(),
            })?,
            _ => index(&value, key).ok_or_else(|| TemplateError::Lookup {
                field: field.clone(),
                message: format!("'{}' has no item {}", value.type_name(), key),
            })?,
        };
    }
    Ok(value)
}

fn index(value: &Value, key: &str) -> Option<Value> {
    match value {
        Value::List(items) => key.parse::<usize>().ok().and_then(|i| items.get(i).cloned()),
        Value::Dict(entries) => entries.get(key).cloned(),
        Value::Str(s) => key
            .parse::<usize>()
            .ok()
            .and_then(|i| s.chars().nth(i))
            .map(|c| Value::Str(c.to_string())),
        _ => None,
    }
}

/// A parsed `[[fill]align][sign][#][0][width][grouping][.precision][type]` specification.
#[derive(Debug, Default, Clone, PartialEq)]
struct FormatSpec {
    fill: Option<char>,
    align: Option<char>,
    sign: Option<char>,
    alternate: bool,
    zero: bool,
    width: usize,
    grouping: Option<char>,
    precision: Option<usize>,
    kind: Option<char>,
}

fn first_char(pair: &Pair<'_, Rule>) -> Option<char> {
    pair.as_str().chars().next()
}

impl FormatSpec {
    fn from_pair(pair: Pair<'_, Rule>) -> Self {
        let mut spec = FormatSpec::default();
        let Some(inner) = pair.into_inner().next() else {
            return spec;
        };
        for part in inner.into_inner() {
            match part.as_rule() {
                Rule::fill_align => {
                    for p in part.into_inner() {
                        match p.as_rule() {
                            Rule::fill => spec.fill = first_char(&p),
                            _ => spec.align = first_char(&p),
                        }
                    }
                }
                Rule::align => spec.align = first_char(&part),
                Rule::sign => spec.sign = first_char(&part),
                Rule::alternate => spec.alternate = true,
                Rule::zero => spec.zero = true,
                Rule::width => spec.width = part.as_str().parse().unwrap_or_default(),
                Rule::grouping => spec.grouping = first_char(&part),
                Rule::precision => {
                    spec.precision = part
                        .into_inner()
                        .next()
                        .and_then(|d| d.as_str().parse().ok())
                }
                Rule::spec_type => spec.kind = first_char(&part),
                _ => {}
            }
        }
        spec
    }

    fn is_empty(&self) -> bool {
        *self == FormatSpec::default()
    }

    fn apply(&self, value: &Value) -> Result<String> {
        match value {
            Value::Str(s) => self.format_str(s),
            Value::Bool(b) if self.is_empty() => Ok(Value::Bool(*b).to_string()),
            Value::Bool(b) => self.format_int(i64::from(*b), value),
            Value::Int(i) => self.format_int(*i, value),
            Value::BigInt(digits) if matches!(self.kind, None | Some('d' | 'n')) => {
                self.pad_number(self.sign_str(false), &group(digits, self.grouping, 3))
            }
            Value::Float(f) => self.format_float(*f, value),
            other if self.is_empty() => Ok(other.to_string()),
            other => Err(TemplateError::InvalidSpec(format!(
                "unsupported format string passed to {}.__format__",
                other.type_name()
            ))),
        }
    }

    fn format_str(&self, s: &str) -> Result<String> {
        if let Some(code) = self.kind.filter(|k| *k != 's') {
            return Err(TemplateError::FormatCode {
                code,
                type_name: "str".to_string(),
            });
        }
        if self.sign.is_some() {
            return Err(TemplateError::InvalidSpec(
                "sign not allowed in string format specifier".to_string(),
            ));
        }
        if self.alternate {
            return Err(TemplateError::InvalidSpec(
                "alternate form (#) not allowed in string format specifier".to_string(),
            ));
        }
        if self.align == Some('=') {
            return Err(TemplateError::InvalidSpec(
                "'=' alignment not allowed in string format specifier".to_string(),
            ));
        }
        let body: String = match self.precision {
            Some(p) => s.chars().take(p).collect(),
            None => s.to_string(),
        };
        let fill = self.fill.unwrap_or(if self.zero { '0' } else { ' ' });
        Ok(pad(&body, "", self.align.unwrap_or('<'), fill, self.width))
    }

    fn format_int(&self, i: i64, value: &Value) -> Result<String> {
        let abs = i.unsigned_abs();
        let (prefix, digits) = match self.kind {
            None | Some('d') | Some('n') => ("", group(&abs.to_string(), self.grouping, 3)),
            Some('b') => ("0b", group(&format!("{abs:b}"), self.underscore()?, 4)),
            Some('o') => ("0o", group(&format!("{abs:o}"), self.underscore()?, 4)),
            Some('x') => ("0x", group(&format!("{abs:x}"), self.underscore()?, 4)),
            Some('X') => ("0X", group(&format!("{abs:X}"), self.underscore()?, 4)),
            Some('c') => {
                let c = u32::try_from(i).ok().and_then(char::from_u32).ok_or_else(|| {
                    TemplateError::InvalidSpec(format!("%c arg not in range: {i}"))
                })?;
                return Ok(pad(&c.to_string(), "", self.align.unwrap_or('<'), self.fill_char(), self.width));
            }
            Some('e' | 'E' | 'f' | 'F' | 'g' | 'G' | '%') => {
                return self.format_float(i as f64, value)
            }
            Some(code) => {
                return Err(TemplateError::FormatCode {
                    code,
                    type_name: value.type_name().to_string(),
                })
            }
        };
        let prefix = if self.alternate { prefix } else { "" };
        let sign = self.sign_str(i < 0);
        self.pad_number(&format!("{sign}{prefix}"), &digits)
    }

    fn format_float(&self, f: f64, value: &Value) -> Result<String> {
        let negative = f.is_sign_negative() && !f.is_nan();
        let abs = f.abs();
        let upper = matches!(self.kind, Some('E' | 'F' | 'G'));

        let body = if !abs.is_finite() {
            let s = if abs.is_nan() { "nan" } else { "inf" };
            let s = if upper { s.to_uppercase() } else { s.to_string() };
            if self.kind == Some('%') {
                format!("{s}%")
            } else {
                s
            }
        } else {
            match self.kind {
                None => match self.precision {
                    None => float_repr(abs),
                    Some(p) => {
                        // Without a type, exponent notation starts one digit earlier than `g`.
                        let s = general(abs, p, self.alternate, p.max(1) as i32 - 1);
                        if s.contains(['.', 'e']) {
                            s
                        } else {
                            format!("{s}.0")
                        }
                    }
                },
                Some('f' | 'F') => format!("{:.*}", self.precision.unwrap_or(6), abs),
                Some('e' | 'E') => {
                    python_exponent(&format!("{:.*e}", self.precision.unwrap_or(6), abs))
                }
                Some('g' | 'G' | 'n') => {
                    let p = self.precision.unwrap_or(6);
                    general(abs, p, self.alternate, p.max(1) as i32)
                }
                Some('%') => format!("{:.*}%", self.precision.unwrap_or(6), abs * 100.0),
                Some(code) => {
                    return Err(TemplateError::FormatCode {
                        code,
                        type_name: value.type_name().to_string(),
                    })
                }
            }
        };
        let body = if upper { body.to_uppercase() } else { body };

        let body = match (self.grouping, body.find(|c: char| !c.is_ascii_digit())) {
            (Some(sep), Some(end)) if abs.is_finite() => {
                format!("{}{}", group(&body[..end], Some(sep), 3), &body[end..])
            }
            (Some(sep), None) => group(&body, Some(sep), 3),
            _ => body,
        };
        self.pad_number(self.sign_str(negative), &body)
    }

    fn underscore(&self) -> Result<Option<char>> {
        match self.grouping {
            Some(',') => Err(TemplateError::InvalidSpec(format!(
                "cannot specify ',' with '{}'",
                self.kind.unwrap_or('d')
            ))),
            other => Ok(other),
        }
    }

    fn sign_str(&self, negative: bool) -> &'static str {
        match (negative, self.sign) {
            (true, _) => "-",
            (false, Some('+')) => "+",
            (false, Some(' ')) => " ",
            _ => "",
        }
    }

    fn fill_char(&self) -> char {
        self.fill.unwrap_or(' ')
    }

    fn pad_number(&self, sign: &str, digits: &str) -> Result<String> {
        let (fill, align) = match (self.fill, self.align) {
            (fill, Some(align)) => (fill.unwrap_or(' '), align),
            (_, None) if self.zero => ('0', '='),
            (fill, None) => (fill.unwrap_or(' '), '>'),
        };
        Ok(pad(digits, sign, align, fill, self.width))
    }
}

/// Pads `sign` + `body` to `width` characters. `=` alignment pads between sign and body.
fn pad(body: &str, sign: &str, align: char, fill: char, width: usize) -> String {
    let len = sign.chars().count() + body.chars().count();
    let n = width.saturating_sub(len);
    let fill_n = |n: usize| std::iter::repeat(fill).take(n).collect::<String>();
    match align {
        '<' => format!("{sign}{body}{}", fill_n(n)),
        '^' => format!("{}{sign}{body}{}", fill_n(n / 2), fill_n(n - n / 2)),
        '=' => format!("{sign}{}{body}", fill_n(n)),
        _ => format!("{}{sign}{body}", fill_n(n)),
    }
}

/// Inserts `sep` every `every` digits from the right.
fn group(digits: &str, sep: Option<char>, every: usize) -> String {
    let Some(sep) = sep else {
        return digits.to_string();
    };
    let count = digits.chars().count();
    let mut out = String::with_capacity(count + count / every);
    for (idx, c) in digits.chars().enumerate() {
        if idx > 0 && (count - idx) % every == 0 {
            out.push(sep);
        }
        out.push(c);
    }
    out
}

/// The `g` presentation type: fixed notation for exponents in `-4..switch_at`, exponent
/// notation otherwise, trailing zeros removed unless `alternate` is set.
fn general(abs: f64, precision: usize, alternate: bool, switch_at: i32) -> String {
    let p = precision.max(1);
    let exp = if abs == 0.0 {
        0
    } else {
        let sci = format!("{:.*e}", p - 1, abs);
        sci.split_once('e')
            .and_then(|(_, e)| e.parse::<i32>().ok())
            .unwrap_or(0)
    };

    if -4 <= exp && exp < switch_at {
        let decimals = (p as i32 - 1 - exp).max(0) as usize;
        let s = format!("{abs:.decimals$}");
        if alternate {
            s
        } else {
            strip_zeros(&s)
        }
    } else {
        let s = format!("{:.*e}", p - 1, abs);
        let s = match s.split_once('e') {
            Some((mantissa, e)) if !alternate => format!("{}e{}", strip_zeros(mantissa), e),
            _ => s,
        };
        python_exponent(&s)
    }
}

fn strip_zeros(s: &str) -> String {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s.to_string()
    }
}
