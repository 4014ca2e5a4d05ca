use super::error::BencodeError;
use super::value::Value;
use std::io::Write;

/// Encodes a value to its bencode byte representation.
///
/// Dictionary keys come out in sorted order, so encoding is canonical:
/// decoding and re-encoding a standard-compliant document reproduces the
/// original bytes.
pub fn encode(value: &Value) -> Result<Vec<u8>, BencodeError> {
    let mut buf = Vec::new();
    write_value(value, &mut buf)?;
    Ok(buf)
}

fn write_value<W: Write>(value: &Value, out: &mut W) -> Result<(), BencodeError> {
    match value {
        Value::Integer(i) => write!(out, "i{}e", i)?,
        Value::Bytes(b) => {
            write!(out, "{}:", b.len())?;
            out.write_all(b)?;
        }
        Value::List(items) => {
            out.write_all(b"l")?;
            for item in items {
                write_value(item, out)?;
            }
            out.write_all(b"e")?;
        }
        Value::Dict(entries) => {
            out.write_all(b"d")?;
            for (key, val) in entries {
                write!(out, "{}:", key.len())?;
                out.write_all(key)?;
                write_value(val, out)?;
            }
            out.write_all(b"e")?;
        }
    }
    Ok(())
}
