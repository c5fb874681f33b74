//! Recursive Length Prefix codec
//!
//! Only what legacy transactions need: byte strings, unsigned integers and
//! one level of list nesting on the encode side; arbitrary nesting on the
//! decode side.

use primitive_types::U256;
use thiserror::Error;

/// RLP decoding errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RlpError {
    #[error("Unexpected end of input")]
    UnexpectedEnd,
    #[error("Expected a list")]
    ExpectedList,
    #[error("Expected a byte string")]
    ExpectedBytes,
    #[error("Non-canonical encoding")]
    NonCanonical,
    #[error("Trailing bytes after item")]
    TrailingBytes,
    #[error("Integer does not fit in {0} bytes")]
    Overflow(usize),
}

/// Builds an RLP list item by item
#[derive(Debug, Default)]
pub struct RlpStream {
    payload: Vec<u8>,
}

impl RlpStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a byte string
    pub fn append_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        encode_bytes(bytes, &mut self.payload);
        self
    }

    /// Append an unsigned integer as its minimal big-endian encoding
    pub fn append_u64(&mut self, value: u64) -> &mut Self {
        let bytes = value.to_be_bytes();
        let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
        encode_bytes(&bytes[start..], &mut self.payload);
        self
    }

    /// Append a 256-bit unsigned integer
    pub fn append_u256(&mut self, value: &U256) -> &mut Self {
        let mut bytes = [0u8; 32];
        value.to_big_endian(&mut bytes);
        let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
        encode_bytes(&bytes[start..], &mut self.payload);
        self
    }

    /// Close the list and return its full encoding
    pub fn finish(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.payload.len() + 9);
        encode_length(self.payload.len(), 0xc0, &mut out);
        out.extend_from_slice(&self.payload);
        out
    }
}

fn encode_bytes(bytes: &[u8], out: &mut Vec<u8>) {
    if bytes.len() == 1 && bytes[0] < 0x80 {
        out.push(bytes[0]);
    } else {
        encode_length(bytes.len(), 0x80, out);
        out.extend_from_slice(bytes);
    }
}

fn encode_length(len: usize, offset: u8, out: &mut Vec<u8>) {
    if len < 56 {
        out.push(offset + len as u8);
    } else {
        let be = (len as u64).to_be_bytes();
        let start = be.iter().position(|b| *b != 0).unwrap_or(be.len() - 1);
        let len_bytes = &be[start..];
        out.push(offset + 55 + len_bytes.len() as u8);
        out.extend_from_slice(len_bytes);
    }
}

/// A decoded RLP item borrowing from the input buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RlpItem<'a> {
    Bytes(&'a [u8]),
    List(Vec<RlpItem<'a>>),
}

impl<'a> RlpItem<'a> {
    pub fn as_bytes(&self) -> Result<&'a [u8], RlpError> {
        match self {
            RlpItem::Bytes(b) => Ok(b),
            RlpItem::List(_) => Err(RlpError::ExpectedBytes),
        }
    }

    pub fn as_list(&self) -> Result<&[RlpItem<'a>], RlpError> {
        match self {
            RlpItem::List(items) => Ok(items),
            RlpItem::Bytes(_) => Err(RlpError::ExpectedList),
        }
    }

    pub fn as_u64(&self) -> Result<u64, RlpError> {
        let bytes = self.integer_bytes(8)?;
        Ok(bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
    }

    pub fn as_u256(&self) -> Result<U256, RlpError> {
        let bytes = self.integer_bytes(32)?;
        Ok(U256::from_big_endian(bytes))
    }

    fn integer_bytes(&self, max: usize) -> Result<&'a [u8], RlpError> {
        let bytes = self.as_bytes()?;
        if bytes.len() > max {
            return Err(RlpError::Overflow(max));
        }
        if bytes.first() == Some(&0) {
            return Err(RlpError::NonCanonical);
        }
        Ok(bytes)
    }
}

/// Decode exactly one item spanning the whole input
pub fn decode(data: &[u8]) -> Result<RlpItem<'_>, RlpError> {
    let (item, consumed) = decode_item(data)?;
    if consumed != data.len() {
        return Err(RlpError::TrailingBytes);
    }
    Ok(item)
}

fn decode_item(data: &[u8]) -> Result<(RlpItem<'_>, usize), RlpError> {
    let prefix = *data.first().ok_or(RlpError::UnexpectedEnd)?;

    match prefix {
        0x00..=0x7f => Ok((RlpItem::Bytes(&data[..1]), 1)),
        0x80..=0xb7 => {
            let len = usize::from(prefix - 0x80);
            let body = slice(data, 1, len)?;
            if len == 1 && body[0] < 0x80 {
                return Err(RlpError::NonCanonical);
            }
            Ok((RlpItem::Bytes(body), 1 + len))
        }
        0xb8..=0xbf => {
            let len_of_len = usize::from(prefix - 0xb7);
            let len = read_long_length(data, len_of_len)?;
            let body = slice(data, 1 + len_of_len, len)?;
            Ok((RlpItem::Bytes(body), 1 + len_of_len + len))
        }
        0xc0..=0xf7 => {
            let len = usize::from(prefix - 0xc0);
            let body = slice(data, 1, len)?;
            Ok((RlpItem::List(decode_list(body)?), 1 + len))
        }
        0xf8..=0xff => {
            let len_of_len = usize::from(prefix - 0xf7);
            let len = read_long_length(data, len_of_len)?;
            let body = slice(data, 1 + len_of_len, len)?;
            Ok((RlpItem::List(decode_list(body)?), 1 + len_of_len + len))
        }
    }
}

fn decode_list(mut body: &[u8]) -> Result<Vec<RlpItem<'_>>, RlpError> {
    let mut items = Vec::new();
    while !body.is_empty() {
        let (item, consumed) = decode_item(body)?;
        items.push(item);
        body = &body[consumed..];
    }
    Ok(items)
}

fn read_long_length(data: &[u8], len_of_len: usize) -> Result<usize, RlpError> {
    let bytes = slice(data, 1, len_of_len)?;
    if bytes[0] == 0 || len_of_len > std::mem::size_of::<usize>() {
        return Err(RlpError::NonCanonical);
    }
    let len = bytes
        .iter()
        .fold(0usize, |acc, b| (acc << 8) | usize::from(*b));
    if len < 56 {
        return Err(RlpError::NonCanonical);
    }
    Ok(len)
}

fn slice(data: &[u8], start: usize, len: usize) -> Result<&[u8], RlpError> {
    let end = start.checked_add(len).ok_or(RlpError::UnexpectedEnd)?;
    data.get(start..end).ok_or(RlpError::UnexpectedEnd)
}
