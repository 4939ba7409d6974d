//! Byte arrays as written by Java's `Arrays.toString(byte[])`: signed
//! decimals in brackets, e.g. `"[1, -2, 3]"`.

use serde::de::Error as _;
use serde::Deserialize;
use serde::Deserializer;
use serde_json::Value;

pub fn parse(text: &str) -> Result<Vec<u8>, String> {
    let inner = text
        .trim()
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(|| format!("not a bracketed byte array: '{}'", abbreviate(text)))?;
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    inner.split(',').map(|element| parse_byte(element.trim())).collect()
}

fn parse_byte(element: &str) -> Result<u8, String> {
    let value: i16 = element
        .parse()
        .map_err(|_| format!("'{element}' is not a byte"))?;
    to_byte(value.into())
}

/// Signed bytes map into `0..=255`; unsigned values are taken as-is.
fn to_byte(value: i64) -> Result<u8, String> {
    match value {
        -128..=-1 => Ok((value + 256) as u8),
        0..=255 => Ok(value as u8),
        _ => Err(format!("{value} is out of byte range")),
    }
}

fn abbreviate(text: &str) -> String {
    text.chars().take(16).collect()
}

/// Accepts the stringified form as well as a plain JSON array of numbers.
pub(crate) fn from_value(value: &Value) -> Result<Vec<u8>, String> {
    match value {
        Value::String(text) => parse(text),
        Value::Array(elements) => elements
            .iter()
            .map(|element| {
                element
                    .as_i64()
                    .ok_or_else(|| format!("{element} is not a byte"))
                    .and_then(to_byte)
            })
            .collect(),
        other => Err(format!("expected byte array, found {other}")),
    }
}

pub(crate) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    from_value(&value).map_err(D::Error::custom)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use test_strategy::proptest;

    use super::*;

    #[test]
    fn negative_bytes_wrap() {
        assert_eq!(vec![1, 254, 3], parse("[1,-2,3]").unwrap());
        assert_eq!(vec![128, 127, 0], parse("[-128, 127, 0]").unwrap());
    }

    #[test]
    fn empty_and_whitespace() {
        assert!(parse("[]").unwrap().is_empty());
        assert!(parse(" [ ] ").unwrap().is_empty());
        assert_eq!(vec![5], parse(" [ 5 ] ").unwrap());
    }

    #[test]
    fn malformed_rejected() {
        assert!(parse("1,2").is_err());
        assert!(parse("[1,,2]").is_err());
        assert!(parse("[300]").is_err());
        assert!(parse("[-129]").is_err());
        assert!(parse("[x]").is_err());
    }

    #[test]
    fn json_arrays_accepted() {
        let value: Value = serde_json::from_str("[-1, 2]").unwrap();
        assert_eq!(vec![255, 2], from_value(&value).unwrap());
        assert!(from_value(&Value::Bool(true)).is_err());
    }

    #[proptest]
    fn java_rendering_parses_back(bytes: Vec<u8>) {
        let rendered = format!(
            "[{}]",
            bytes
                .iter()
                .map(|&b| (b as i8).to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
        assert_eq!(bytes, parse(&rendered).unwrap());
    }
}
