//! Row (tuple) encoding and decoding.
//!
//! A row is encoded as:
//!
//! ```text
//! [NULL bitmap: ceil(n/8) bytes, bit i set => column i is NULL]
//! [column 0 payload if not NULL]
//! [column 1 payload if not NULL]
//! ...
//! ```
//!
//! Fixed-width columns (`INT32`, `INT64`, `BOOLEAN`, `DATE`, `TIMESTAMP`)
//! are encoded little-endian at their natural width. `VARCHAR` is a
//! `u16` byte length prefix followed by the UTF-8 bytes. `DECIMAL` is a
//! 16-byte big-endian two's-complement `i128` holding the value scaled
//! by `10^scale` (the scale itself lives in the column definition, not
//! in the row).

use crate::catalog::Column;
use crate::error::{GraniteError, Result};
use crate::types::{ColumnType, Decimal, Value};

/// Encode one row against its table's column list. Returns an error if
/// a value's runtime type doesn't match its column's declared type, or
/// a constraint (`NOT NULL`, `VARCHAR` length, `DECIMAL` precision) is
/// violated.
pub fn encode(columns: &[Column], values: &[Value]) -> Result<Vec<u8>> {
    if values.len() != columns.len() {
        return Err(GraniteError::Type(format!(
            "expected {} values, got {}",
            columns.len(),
            values.len()
        )));
    }

    let bitmap_len = (columns.len() + 7) / 8;
    let mut bitmap = vec![0u8; bitmap_len];
    let mut payload = Vec::new();

    for (i, (column, value)) in columns.iter().zip(values.iter()).enumerate() {
        if value.is_null() {
            if !column.nullable {
                return Err(GraniteError::Constraint(format!(
                    "NOT NULL violated on column {}",
                    column.name
                )));
            }
            bitmap[i / 8] |= 1 << (i % 8);
            continue;
        }
        encode_value(&mut payload, column, value)?;
    }

    let mut out = Vec::with_capacity(bitmap_len + payload.len());
    out.extend_from_slice(&bitmap);
    out.extend_from_slice(&payload);
    Ok(out)
}

fn encode_value(out: &mut Vec<u8>, column: &Column, value: &Value) -> Result<()> {
    match (&column.column_type, value) {
        (ColumnType::Int32, Value::Int32(v)) => {
            out.extend_from_slice(&v.to_le_bytes());
            Ok(())
        }
        (ColumnType::Int64, Value::Int64(v)) => {
            out.extend_from_slice(&v.to_le_bytes());
            Ok(())
        }
        (ColumnType::Varchar(max_len), Value::Varchar(s)) => {
            if s.len() > *max_len as usize {
                return Err(GraniteError::Constraint(format!(
                    "value for column {} exceeds VARCHAR({}) length",
                    column.name, max_len
                )));
            }
            let bytes = s.as_bytes();
            out.extend_from_slice(&(bytes.len() as u16).to_le_bytes());
            out.extend_from_slice(bytes);
            Ok(())
        }
        (ColumnType::Decimal(precision, scale), Value::Decimal(d)) => {
            let rescaled = d.rescale(*scale);
            let max = 10i128.pow(*precision as u32) - 1;
            if rescaled.raw.abs() > max {
                return Err(GraniteError::Constraint(format!(
                    "value for column {} exceeds DECIMAL({},{}) range",
                    column.name, precision, scale
                )));
            }
            out.extend_from_slice(&rescaled.raw.to_be_bytes());
            Ok(())
        }
        (ColumnType::Boolean, Value::Boolean(b)) => {
            out.push(if *b { 1 } else { 0 });
            Ok(())
        }
        (ColumnType::Date, Value::Date(d)) => {
            out.extend_from_slice(&d.to_le_bytes());
            Ok(())
        }
        (ColumnType::Timestamp, Value::Timestamp(t)) => {
            out.extend_from_slice(&t.to_le_bytes());
            Ok(())
        }
        (expected, got) => Err(GraniteError::Type(format!(
            "column {} expects {expected}, got {got:?}",
            column.name
        ))),
    }
}

/// Decode a row against its table's column list.
pub fn decode(columns: &[Column], bytes: &[u8]) -> Result<Vec<Value>> {
    let bitmap_len = (columns.len() + 7) / 8;
    if bytes.len() < bitmap_len {
        return Err(GraniteError::Corruption("row shorter than NULL bitmap".into()));
    }
    let bitmap = &bytes[..bitmap_len];
    let mut cursor = bitmap_len;
    let mut values = Vec::with_capacity(columns.len());

    for (i, column) in columns.iter().enumerate() {
        let is_null = bitmap[i / 8] & (1 << (i % 8)) != 0;
        if is_null {
            values.push(Value::Null);
            continue;
        }
        let (value, consumed) = decode_value(column, &bytes[cursor..])?;
        cursor += consumed;
        values.push(value);
    }

    Ok(values)
}

fn decode_value(column: &Column, bytes: &[u8]) -> Result<(Value, usize)> {
    macro_rules! need {
        ($n:expr) => {
            if bytes.len() < $n {
                return Err(GraniteError::Corruption(format!(
                    "truncated row while decoding column {}",
                    column.name
                )));
            }
        };
    }

    match column.column_type {
        ColumnType::Int32 => {
            need!(4);
            Ok((Value::Int32(i32::from_le_bytes(bytes[0..4].try_into().unwrap())), 4))
        }
        ColumnType::Int64 => {
            need!(8);
            Ok((Value::Int64(i64::from_le_bytes(bytes[0..8].try_into().unwrap())), 8))
        }
        ColumnType::Varchar(_) => {
            need!(2);
            let len = u16::from_le_bytes(bytes[0..2].try_into().unwrap()) as usize;
            need!(2 + len);
            let s = String::from_utf8(bytes[2..2 + len].to_vec())
                .map_err(|_| GraniteError::Corruption("invalid UTF-8 in VARCHAR".into()))?;
            Ok((Value::Varchar(s), 2 + len))
        }
        ColumnType::Decimal(_, scale) => {
            need!(16);
            let raw = i128::from_be_bytes(bytes[0..16].try_into().unwrap());
            Ok((Value::Decimal(Decimal::new(raw, scale)), 16))
        }
        ColumnType::Boolean => {
            need!(1);
            Ok((Value::Boolean(bytes[0] != 0), 1))
        }
        ColumnType::Date => {
            need!(4);
            Ok((Value::Date(i32::from_le_bytes(bytes[0..4].try_into().unwrap())), 4))
        }
        ColumnType::Timestamp => {
            need!(8);
            Ok((Value::Timestamp(i64::from_le_bytes(bytes[0..8].try_into().unwrap())), 8))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str, t: ColumnType, nullable: bool) -> Column {
        Column {
            name: name.to_string(),
            column_type: t,
            nullable,
        }
    }

    #[test]
    fn round_trips_mixed_row() {
        let columns = vec![
            col("id", ColumnType::Int32, false),
            col("name", ColumnType::Varchar(20), true),
            col("balance", ColumnType::Decimal(10, 2), false),
            col("active", ColumnType::Boolean, false),
        ];
        let values = vec![
            Value::Int32(7),
            Value::Varchar("alice".into()),
            Value::Decimal(Decimal::new(12345, 2)),
            Value::Boolean(true),
        ];
        let encoded = encode(&columns, &values).unwrap();
        let decoded = decode(&columns, &encoded).unwrap();
        assert_eq!(decoded[0].to_string(), "7");
        assert_eq!(decoded[1].to_string(), "alice");
        assert_eq!(decoded[2].to_string(), "123.45");
        assert_eq!(decoded[3].to_string(), "TRUE");
    }

    #[test]
    fn null_values_round_trip() {
        let columns = vec![col("name", ColumnType::Varchar(20), true)];
        let values = vec![Value::Null];
        let encoded = encode(&columns, &values).unwrap();
        let decoded = decode(&columns, &encoded).unwrap();
        assert!(decoded[0].is_null());
    }

    #[test]
    fn not_null_violation_rejected() {
        let columns = vec![col("id", ColumnType::Int32, false)];
        let values = vec![Value::Null];
        assert!(matches!(
            encode(&columns, &values).unwrap_err(),
            GraniteError::Constraint(_)
        ));
    }

    #[test]
    fn varchar_overflow_rejected() {
        let columns = vec![col("name", ColumnType::Varchar(3), false)];
        let values = vec![Value::Varchar("toolong".into())];
        assert!(matches!(
            encode(&columns, &values).unwrap_err(),
            GraniteError::Constraint(_)
        ));
    }

    #[test]
    fn decimal_out_of_range_rejected() {
        let columns = vec![col("amount", ColumnType::Decimal(3, 1), false)];
        let values = vec![Value::Decimal(Decimal::new(99999, 1))];
        assert!(matches!(
            encode(&columns, &values).unwrap_err(),
            GraniteError::Constraint(_)
        ));
    }

    #[test]
    fn type_mismatch_rejected() {
        let columns = vec![col("id", ColumnType::Int32, false)];
        let values = vec![Value::Varchar("x".into())];
        assert!(matches!(
            encode(&columns, &values).unwrap_err(),
            GraniteError::Type(_)
        ));
    }

    #[test]
    fn bitmap_sizing_for_nine_columns() {
        let columns: Vec<Column> = (0..9)
            .map(|i| col(&format!("c{i}"), ColumnType::Boolean, true))
            .collect();
        let values: Vec<Value> = (0..9).map(|i| Value::Boolean(i % 2 == 0)).collect();
        let encoded = encode(&columns, &values).unwrap();
        // ceil(9/8) == 2 bitmap bytes + 9 bool bytes
        assert_eq!(encoded.len(), 2 + 9);
        let decoded = decode(&columns, &encoded).unwrap();
        assert_eq!(decoded.len(), 9);
    }
}
