//! Decoding of Python literal tokens into [Constant] values.

use thiserror::Error;

use crate::node::Constant;

const PREFIX_CHARS: &[char] = &['r', 'R', 'b', 'B', 'u', 'U', 'f', 'F', 't', 'T'];

/// A literal Python itself would reject at compile time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LiteralError {
    #[error("malformed \\N character escape")]
    NamedEscape,
    #[error("truncated \\{0} escape")]
    Truncated(char),
    #[error("escape \\{0} is not a valid code point")]
    CodePoint(char),
    #[error("bytes can only contain ASCII literal characters")]
    NonAsciiBytes,
    #[error("cannot mix bytes and nonbytes literals")]
    MixedBytes,
}

type Result<T> = std::result::Result<T, LiteralError>;

/// Decodes a single string or bytes literal, including its prefix and quotes. f-strings and
/// template strings are not constants and decode to `None`.
pub(crate) fn decode_string(text: &str) -> Result<Option<Constant>> {
    let prefix_len = text
        .find(|c: char| !PREFIX_CHARS.contains(&c))
        .unwrap_or(text.len());
    let prefix = text[..prefix_len].to_ascii_lowercase();
    if prefix.contains('f') || prefix.contains('t') {
        return Ok(None);
    }
    let raw = prefix.contains('r');
    let bytes = prefix.contains('b');

    let rest = &text[prefix_len..];
    let quote_len = if rest.starts_with("\"\"\"") || rest.starts_with("'''") {
        3
    } else {
        1
    };
    if rest.len() < quote_len * 2 {
        return Ok(None);
    }
    let body = &rest[quote_len..rest.len() - quote_len];

    let value = if bytes {
        Constant::Bytes(decode_bytes(body, raw)?)
    } else if raw {
        Constant::Str(body.to_string())
    } else {
        Constant::Str(decode_str(body)?)
    };
    Ok(Some(value))
}

/// Joins the parts of an implicitly concatenated literal (`"a" "b"`).
pub(crate) fn concatenate(parts: Vec<Constant>) -> Result<Constant> {
    let mut parts = parts.into_iter();
    let Some(mut acc) = parts.next() else {
        return Ok(Constant::Str(String::new()));
    };
    for part in parts {
        acc = match (acc, part) {
            (Constant::Str(mut a), Constant::Str(b)) => {
                a.push_str(&b);
                Constant::Str(a)
            }
            (Constant::Bytes(mut a), Constant::Bytes(b)) => {
                a.extend(b);
                Constant::Bytes(a)
            }
            _ => return Err(LiteralError::MixedBytes),
        };
    }
    Ok(acc)
}

/// Decodes an integer literal. Values outside `i64` become [Constant::BigInt]. Imaginary and
/// legacy long suffixes are not integers and decode to `None`.
pub(crate) fn decode_integer(text: &str) -> Option<Constant> {
    if text.ends_with(['j', 'J', 'l', 'L']) {
        return None;
    }
    let digits: String = text.chars().filter(|c| *c != '_').collect();
    let lower = digits.to_ascii_lowercase();
    let (radix, digits) = if let Some(hex) = lower.strip_prefix("0x") {
        (16, hex)
    } else if let Some(oct) = lower.strip_prefix("0o") {
        (8, oct)
    } else if let Some(bin) = lower.strip_prefix("0b") {
        (2, bin)
    } else {
        (10, lower.as_str())
    };
    if digits.is_empty() {
        return None;
    }
    match i64::from_str_radix(digits, radix) {
        Ok(value) => Some(Constant::Int(value)),
        Err(_) => to_decimal(digits, radix).map(Constant::BigInt),
    }
}

/// Converts digits in `radix` to decimal without a size limit.
fn to_decimal(digits: &str, radix: u32) -> Option<String> {
    // Little-endian decimal digits.
    let mut out: Vec<u8> = vec![0];
    for c in digits.chars() {
        let mut carry = c.to_digit(radix)?;
        for d in out.iter_mut() {
            let v = u32::from(*d) * radix + carry;
            *d = (v % 10) as u8;
            carry = v / 10;
        }
        while carry > 0 {
            out.push((carry % 10) as u8);
            carry /= 10;
        }
    }
    while out.len() > 1 && out.last() == Some(&0) {
        out.pop();
    }
    Some(out.iter().rev().map(|d| char::from(b'0' + d)).collect())
}

pub(crate) fn decode_float(text: &str) -> Option<Constant> {
    if text.ends_with(['j', 'J']) {
        return None;
    }
    let digits: String = text.chars().filter(|c| *c != '_').collect();
    digits.parse().ok().map(Constant::Float)
}

fn decode_str(body: &str) -> Result<String> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(esc) = chars.next() else {
            out.push('\\');
            break;
        };
        match esc {
            '\n' => {}
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
            }
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'a' => out.push('\u{07}'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0c}'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'v' => out.push('\u{0b}'),
            '0'..='7' => out.push(code_point(esc, take_octal(esc, &mut chars))?),
            'x' => out.push(code_point(esc, take_hex(&mut chars, esc, 2)?)?),
            'u' => out.push(code_point(esc, take_hex(&mut chars, esc, 4)?)?),
            'U' => out.push(code_point(esc, take_hex(&mut chars, esc, 8)?)?),
            'N' => out.push(take_name(&mut chars)?),
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    Ok(out)
}

fn decode_bytes(body: &str, raw: bool) -> Result<Vec<u8>> {
    if !body.is_ascii() {
        return Err(LiteralError::NonAsciiBytes);
    }
    if raw {
        return Ok(body.as_bytes().to_vec());
    }
    let mut out = Vec::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c as u8);
            continue;
        }
        let Some(esc) = chars.next() else {
            out.push(b'\\');
            break;
        };
        match esc {
            '\n' => {}
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
            }
            '\\' => out.push(b'\\'),
            '\'' => out.push(b'\''),
            '"' => out.push(b'"'),
            'a' => out.push(0x07),
            'b' => out.push(0x08),
            'f' => out.push(0x0c),
            'n' => out.push(b'\n'),
            'r' => out.push(b'\r'),
            't' => out.push(b'\t'),
            'v' => out.push(0x0b),
            '0'..='7' => out.push((take_octal(esc, &mut chars) & 0xff) as u8),
            'x' => out.push(take_hex(&mut chars, esc, 2)? as u8),
            other => {
                out.push(b'\\');
                out.push(other as u8);
            }
        }
    }
    Ok(out)
}

type Chars<'a> = std::iter::Peekable<std::str::Chars<'a>>;

fn code_point(esc: char, code: u32) -> Result<char> {
    char::from_u32(code).ok_or(LiteralError::CodePoint(esc))
}

fn take_octal(first: char, chars: &mut Chars<'_>) -> u32 {
    let mut code = first.to_digit(8).unwrap_or(0);
    for _ in 0..2 {
        match chars.peek().and_then(|c| c.to_digit(8)) {
            Some(d) => {
                code = code * 8 + d;
                chars.next();
            }
            None => break,
        }
    }
    code
}

fn take_hex(chars: &mut Chars<'_>, esc: char, len: usize) -> Result<u32> {
    let mut code = 0;
    for _ in 0..len {
        let digit = chars
            .next()
            .and_then(|c| c.to_digit(16))
            .ok_or(LiteralError::Truncated(esc))?;
        code = code * 16 + digit;
    }
    Ok(code)
}

/// Reads the `{NAME}` part of a `\N{NAME}` escape and looks the name up in the Unicode table.
fn take_name(chars: &mut Chars<'_>) -> Result<char> {
    if chars.next() != Some('{') {
        return Err(LiteralError::NamedEscape);
    }
    let mut name = String::new();
    loop {
        match chars.next() {
            Some('}') => break,
            Some(c) => name.push(c),
            None => return Err(LiteralError::NamedEscape),
        }
    }
    unicode_names2::character(&name).ok_or(LiteralError::NamedEscape)
}
