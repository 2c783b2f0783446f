//! Text encoding of result blocks.
//!
//! A block is written as `timestamp,value[,value...]@@` per row. Every row,
//! including the last, is terminated by the block separator; clients split
//! on it and rely on the trailing separator being present.

use thiserror::Error;

use sos_common::time::{format_timestamp, parse_timestamp};

use crate::types::{FieldKind, ResultBlock, ResultRow, ResultStructure, ScalarValue, TextEncoding};

#[derive(Debug, Error, PartialEq)]
pub enum CodecError {
    #[error("Declared element count {declared} does not match the {actual} rows present")]
    ElementCount { declared: usize, actual: usize },

    #[error("Block {block}: expected {expected} tokens, found {found}")]
    TokenCount {
        block: usize,
        expected: usize,
        found: usize,
    },

    #[error("Block {block}: invalid time token '{token}'")]
    InvalidTime { block: usize, token: String },

    #[error("Block {block}: invalid value '{token}' for field '{field}'")]
    InvalidValue {
        block: usize,
        field: String,
        token: String,
    },

    #[error("Result structure must start with its only time field")]
    InvalidStructure,

    #[error("Separators must be non-empty and must not contain one another")]
    InvalidEncoding,

    #[error("Block {block}: value '{value}' cannot be written with these separators")]
    Unencodable { block: usize, value: String },
}

/// Encode a whole result block, checking its declared element count.
pub fn encode(block: &ResultBlock) -> Result<String, CodecError> {
    if block.rows.len() != block.element_count {
        return Err(CodecError::ElementCount {
            declared: block.element_count,
            actual: block.rows.len(),
        });
    }
    check_rows(&block.rows, &block.encoding)?;
    Ok(encode_rows(&block.rows, &block.encoding))
}

/// Rows that [`decode`] would read back unchanged: finite quantities and
/// text free of separators and of surrounding whitespace.
pub fn check_rows(rows: &[ResultRow], encoding: &TextEncoding) -> Result<(), CodecError> {
    if !encoding.is_valid() {
        return Err(CodecError::InvalidEncoding);
    }
    for (block, row) in rows.iter().enumerate() {
        for value in &row.values {
            let encodable = match value {
                ScalarValue::Quantity(v) => v.is_finite(),
                ScalarValue::Boolean(_) => true,
                ScalarValue::Text(text) => {
                    text.trim() == text
                        && !text.contains(encoding.token_separator.as_str())
                        && !text.contains(encoding.block_separator.as_str())
                }
            };
            if !encodable {
                return Err(CodecError::Unencodable {
                    block,
                    value: value.to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Encode rows without any count check.
pub fn encode_rows(rows: &[ResultRow], encoding: &TextEncoding) -> String {
    let mut out = String::new();
    for row in rows {
        out.push_str(&format_timestamp(&row.time));
        for value in &row.values {
            out.push_str(&encoding.token_separator);
            out.push_str(&encode_value(value, encoding));
        }
        out.push_str(&encoding.block_separator);
    }
    out
}

fn encode_value(value: &ScalarValue, encoding: &TextEncoding) -> String {
    match value {
        ScalarValue::Quantity(_) if encoding.decimal_separator != "." => value
            .to_string()
            .replace('.', &encoding.decimal_separator),
        _ => value.to_string(),
    }
}

/// Decode a result string against a result structure.
///
/// Any malformed block fails the whole payload; no partial result is
/// returned. Empty blocks (trailing separator, blank lines) are skipped.
pub fn decode(
    values: &str,
    structure: &ResultStructure,
    encoding: &TextEncoding,
) -> Result<Vec<ResultRow>, CodecError> {
    if !structure.is_valid() {
        return Err(CodecError::InvalidStructure);
    }
    if !encoding.is_valid() {
        return Err(CodecError::InvalidEncoding);
    }

    let expected = structure.fields.len();
    let mut rows = Vec::new();

    for (block, raw) in values
        .split(encoding.block_separator.as_str())
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .enumerate()
    {
        let tokens: Vec<&str> = raw
            .split(encoding.token_separator.as_str())
            .map(str::trim)
            .collect();
        if tokens.len() != expected {
            return Err(CodecError::TokenCount {
                block,
                expected,
                found: tokens.len(),
            });
        }

        let time = parse_timestamp(tokens[0]).map_err(|_| CodecError::InvalidTime {
            block,
            token: tokens[0].to_string(),
        })?;

        let values = structure.fields[1..]
            .iter()
            .zip(&tokens[1..])
            .map(|(field, token)| {
                decode_value(&field.kind, token, encoding).ok_or_else(|| CodecError::InvalidValue {
                    block,
                    field: field.name.clone(),
                    token: token.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        rows.push(ResultRow::new(time, values));
    }

    Ok(rows)
}

fn decode_value(kind: &FieldKind, token: &str, encoding: &TextEncoding) -> Option<ScalarValue> {
    match kind {
        FieldKind::Quantity { .. } => {
            let normalized = if encoding.decimal_separator == "." {
                token.to_string()
            } else {
                token.replace(encoding.decimal_separator.as_str(), ".")
            };
            normalized
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(ScalarValue::Quantity)
        }
        FieldKind::Boolean => match token {
            "true" | "1" => Some(ScalarValue::Boolean(true)),
            "false" | "0" => Some(ScalarValue::Boolean(false)),
            _ => None,
        },
        FieldKind::Text => Some(ScalarValue::Text(token.to_string())),
        // Only the first column may be a time column.
        FieldKind::Time => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Field;
    use chrono::{TimeZone, Utc};

    fn depth_structure() -> ResultStructure {
        ResultStructure::for_properties(&["urn:ogc:def:phenomenon:GEOM:depth"])
    }

    fn row(h: u32, m: u32, v: f64) -> ResultRow {
        ResultRow::quantity(Utc.with_ymd_and_hms(2007, 5, 1, h, m, 0).unwrap(), v)
    }

    #[test]
    fn test_encode_trailing_separator() {
        let block = ResultBlock::new(
            depth_structure(),
            TextEncoding::default(),
            vec![row(2, 59, 6.56), row(3, 59, 6.56)],
        );
        assert_eq!(
            encode(&block).unwrap(),
            "2007-05-01T02:59:00.0,6.56@@2007-05-01T03:59:00.0,6.56@@"
        );
    }

    #[test]
    fn test_encode_empty_block() {
        let block = ResultBlock::empty(depth_structure(), TextEncoding::default());
        assert_eq!(encode(&block).unwrap(), "");
    }

    #[test]
    fn test_encode_rejects_count_mismatch() {
        let mut block = ResultBlock::new(
            depth_structure(),
            TextEncoding::default(),
            vec![row(2, 59, 6.56)],
        );
        block.element_count = 3;
        assert_eq!(
            encode(&block),
            Err(CodecError::ElementCount {
                declared: 3,
                actual: 1
            })
        );
    }

    #[test]
    fn test_decode_accepts_encoder_output() {
        let rows = decode(
            "2007-05-01T02:59:00.0,6.56@@2007-05-01T03:59:00.0,7.1@@",
            &depth_structure(),
            &TextEncoding::default(),
        )
        .unwrap();
        assert_eq!(rows, vec![row(2, 59, 6.56), row(3, 59, 7.1)]);
    }

    #[test]
    fn test_decode_tolerates_newlines() {
        let rows = decode(
            "2007-05-01T02:59:00Z,1.0@@\n2007-05-01T03:59:00Z,2.0@@\n",
            &depth_structure(),
            &TextEncoding::default(),
        )
        .unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_decode_token_count_mismatch() {
        let result = decode(
            "2007-05-01T02:59:00.0,6.56@@2007-05-01T03:59:00.0,6.56,1.2@@",
            &depth_structure(),
            &TextEncoding::default(),
        );
        assert_eq!(
            result,
            Err(CodecError::TokenCount {
                block: 1,
                expected: 2,
                found: 3
            })
        );
    }

    #[test]
    fn test_decode_bad_number() {
        let result = decode(
            "2007-05-01T02:59:00.0,deep@@",
            &depth_structure(),
            &TextEncoding::default(),
        );
        assert!(matches!(result, Err(CodecError::InvalidValue { .. })));
    }

    #[test]
    fn test_decode_bad_time() {
        let result = decode("6.56,2007-05-01@@", &depth_structure(), &TextEncoding::default());
        assert!(matches!(result, Err(CodecError::InvalidTime { .. })));
    }

    #[test]
    fn test_decode_rejects_non_finite() {
        for token in ["NaN", "inf", "-infinity"] {
            let values = format!("2007-05-01T02:59:00.0,{}@@", token);
            let result = decode(&values, &depth_structure(), &TextEncoding::default());
            assert!(
                matches!(result, Err(CodecError::InvalidValue { .. })),
                "accepted {}",
                token
            );
        }
    }

    #[test]
    fn test_decode_rejects_ambiguous_encoding() {
        let encoding = TextEncoding {
            token_separator: "@@".to_string(),
            ..TextEncoding::default()
        };
        let result = decode("2007-05-01T02:59:00.0@@6.56@@", &depth_structure(), &encoding);
        assert_eq!(result, Err(CodecError::InvalidEncoding));
    }

    #[test]
    fn test_unencodable_values() {
        let time = Utc.with_ymd_and_hms(2007, 5, 1, 2, 59, 0).unwrap();
        let encoding = TextEncoding::default();

        let nan = vec![row(2, 59, 6.56), ResultRow::quantity(time, f64::NAN)];
        assert!(matches!(
            check_rows(&nan, &encoding),
            Err(CodecError::Unencodable { block: 1, .. })
        ));

        for text in ["a,b", "a@@b", " padded"] {
            let rows = vec![ResultRow::new(time, vec![ScalarValue::Text(text.to_string())])];
            assert!(check_rows(&rows, &encoding).is_err(), "accepted {:?}", text);
        }

        let plain = vec![ResultRow::new(time, vec![ScalarValue::Text("calm".to_string())])];
        assert_eq!(check_rows(&plain, &encoding), Ok(()));

        let block = ResultBlock::new(
            depth_structure(),
            TextEncoding::default(),
            vec![ResultRow::quantity(time, f64::INFINITY)],
        );
        assert!(matches!(encode(&block), Err(CodecError::Unencodable { .. })));
    }

    #[test]
    fn test_custom_separators() {
        let encoding = TextEncoding {
            token_separator: ";".to_string(),
            block_separator: "\n".to_string(),
            decimal_separator: ",".to_string(),
        };
        let structure = ResultStructure::new(vec![
            Field::time(),
            Field::quantity("temperature", "Cel"),
            Field {
                name: "valid".to_string(),
                definition: String::new(),
                kind: FieldKind::Boolean,
            },
        ]);
        let rows = decode("2007-05-01T02:59:00Z;12,5;true\n", &structure, &encoding).unwrap();
        assert_eq!(
            rows[0].values,
            vec![ScalarValue::Quantity(12.5), ScalarValue::Boolean(true)]
        );
        assert_eq!(encode_rows(&rows, &encoding), "2007-05-01T02:59:00.0;12,5;true\n");
    }
}
