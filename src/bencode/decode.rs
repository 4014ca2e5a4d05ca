use std::collections::BTreeMap;

use bytes::Bytes;

use super::error::BencodeError;
use super::value::Value;

const MAX_DEPTH: usize = 64;

/// Decodes a single complete bencode value from a byte slice.
///
/// Trailing data after the value is an error, as are truncated input,
/// malformed integers (leading zeros, `-0`), and nesting deeper than
/// 64 levels.
///
/// # Examples
///
/// ```
/// use pixbit::bencode::decode;
///
/// assert_eq!(decode(b"i42e").unwrap().as_integer(), Some(42));
/// assert_eq!(decode(b"5:hello").unwrap().as_str(), Some("hello"));
/// assert_eq!(decode(b"li1ei2ee").unwrap().as_list().unwrap().len(), 2);
/// ```
pub fn decode(data: &[u8]) -> Result<Value, BencodeError> {
    let mut cursor = Cursor { data, pos: 0 };
    let value = cursor.value(0)?;

    if cursor.pos != data.len() {
        return Err(BencodeError::TrailingData);
    }

    Ok(value)
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn peek(&self) -> Result<u8, BencodeError> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or(BencodeError::UnexpectedEof)
    }

    fn value(&mut self, depth: usize) -> Result<Value, BencodeError> {
        if depth > MAX_DEPTH {
            return Err(BencodeError::NestingTooDeep);
        }

        match self.peek()? {
            b'i' => self.integer(),
            b'l' => self.list(depth),
            b'd' => self.dict(depth),
            b'0'..=b'9' => self.byte_string().map(Value::Bytes),
            c => Err(BencodeError::UnexpectedChar(c as char)),
        }
    }

    fn integer(&mut self) -> Result<Value, BencodeError> {
        self.pos += 1;
        let start = self.pos;

        while self.peek()? != b'e' {
            self.pos += 1;
        }

        let digits = std::str::from_utf8(&self.data[start..self.pos])
            .map_err(|_| BencodeError::InvalidInteger("invalid utf8".into()))?;

        if digits.is_empty() || digits == "-" {
            return Err(BencodeError::InvalidInteger("empty".into()));
        }
        if digits.starts_with("-0") || (digits.len() > 1 && digits.starts_with('0')) {
            return Err(BencodeError::InvalidInteger("leading zeros".into()));
        }

        let value: i64 = digits
            .parse()
            .map_err(|_| BencodeError::InvalidInteger(digits.into()))?;

        self.pos += 1;
        Ok(Value::Integer(value))
    }

    fn byte_string(&mut self) -> Result<Bytes, BencodeError> {
        let start = self.pos;
        while self.peek()? != b':' {
            self.pos += 1;
        }

        let len: usize = std::str::from_utf8(&self.data[start..self.pos])
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or(BencodeError::InvalidStringLength)?;

        self.pos += 1;
        if self.pos + len > self.data.len() {
            return Err(BencodeError::UnexpectedEof);
        }

        let bytes = Bytes::copy_from_slice(&self.data[self.pos..self.pos + len]);
        self.pos += len;
        Ok(bytes)
    }

    fn list(&mut self, depth: usize) -> Result<Value, BencodeError> {
        self.pos += 1;
        let mut items = Vec::new();

        while self.peek()? != b'e' {
            items.push(self.value(depth + 1)?);
        }

        self.pos += 1;
        Ok(Value::List(items))
    }

    fn dict(&mut self, depth: usize) -> Result<Value, BencodeError> {
        self.pos += 1;
        let mut entries = BTreeMap::new();

        while self.peek()? != b'e' {
            let key = match self.peek()? {
                b'0'..=b'9' => self.byte_string()?,
                c => return Err(BencodeError::UnexpectedChar(c as char)),
            };
            let value = self.value(depth + 1)?;
            entries.insert(key, value);
        }

        self.pos += 1;
        Ok(Value::Dict(entries))
    }
}
