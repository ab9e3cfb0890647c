//! RESP2 values and the codec that moves them on and off the wire.
//!
//! The same decoder serves two callers: client connections, which feed it
//! whatever bytes the socket has produced so far and retry on
//! [`RespValue::decode_next`] returning `Ok(None)`, and the command catalog,
//! which decodes its embedded resources with [`RespValue::decode_resource`]
//! where a truncated value is as fatal as a malformed one.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Largest bulk string accepted from the wire.
pub const MAX_BULK_LENGTH: usize = 512 * 1024 * 1024;
/// Largest array element count accepted from the wire.
pub const MAX_ARRAY_LENGTH: usize = 1024 * 1024;
/// A header line (`$123`, `:42`, `+OK` ...) longer than this is rejected
/// without waiting for its terminator.
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

const MAX_NESTING_DEPTH: usize = 1024;

/// A single RESP2 value.
///
/// `Null` and `NullArray` are the absent bulk string (`$-1`) and the absent
/// array (`*-1`); they never compare equal to an empty bulk string or an
/// empty array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    SimpleString(String),
    Error(String),
    Integer(i64),
    BulkString(Bytes),
    Null,
    Array(Vec<RespValue>),
    NullArray,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RespError {
    #[error("malformed RESP at byte {position} (line {line}): {reason}")]
    Malformed {
        position: usize,
        line: usize,
        reason: String,
    },
    #[error("incomplete RESP value at byte {position} (line {line})")]
    Incomplete { position: usize, line: usize },
    #[error("unexpected data after RESP value at byte {position} (line {line})")]
    TrailingData { position: usize, line: usize },
}

impl RespError {
    /// Byte offset the error was detected at.
    pub fn position(&self) -> usize {
        match self {
            RespError::Malformed { position, .. }
            | RespError::Incomplete { position, .. }
            | RespError::TrailingData { position, .. } => *position,
        }
    }

    /// 1-based line number of [`RespError::position`].
    pub fn line(&self) -> usize {
        match self {
            RespError::Malformed { line, .. }
            | RespError::Incomplete { line, .. }
            | RespError::TrailingData { line, .. } => *line,
        }
    }
}

impl RespValue {
    pub fn ok() -> Self {
        RespValue::SimpleString("OK".to_string())
    }

    /// Line breaks in `text` become spaces; a simple string is one line.
    pub fn simple(text: impl Into<String>) -> Self {
        RespValue::SimpleString(single_line(text.into()))
    }

    /// Line breaks in `text` become spaces, as for [`RespValue::simple`].
    pub fn error(text: impl Into<String>) -> Self {
        RespValue::Error(single_line(text.into()))
    }

    pub fn bulk(data: impl Into<Bytes>) -> Self {
        RespValue::BulkString(data.into())
    }

    /// Builds an array of bulk strings, e.g. a command request.
    pub fn bulk_array<I, B>(items: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        RespValue::Array(items.into_iter().map(|item| RespValue::bulk(item)).collect())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RespValue::Error(_))
    }

    /// Payload of a bulk or simple string.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            RespValue::BulkString(data) => Some(data),
            RespValue::SimpleString(text) => Some(text.as_bytes()),
            _ => None,
        }
    }

    /// Text of a bulk or simple string, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|data| std::str::from_utf8(data).ok())
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            RespValue::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[RespValue]> {
        match self {
            RespValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buffer = BytesMut::new();
        self.encode_into(&mut buffer);
        buffer.to_vec()
    }

    pub fn encode_into(&self, buffer: &mut BytesMut) {
        match self {
            RespValue::SimpleString(text) => put_text_line(buffer, b'+', text),
            RespValue::Error(text) => put_text_line(buffer, b'-', text),
            RespValue::Integer(value) => put_line(buffer, b':', value.to_string().as_bytes()),
            RespValue::BulkString(data) => {
                put_line(buffer, b'$', data.len().to_string().as_bytes());
                buffer.put_slice(data);
                buffer.put_slice(b"\r\n");
            }
            RespValue::Null => buffer.put_slice(b"$-1\r\n"),
            RespValue::Array(items) => {
                put_line(buffer, b'*', items.len().to_string().as_bytes());
                for item in items {
                    item.encode_into(buffer);
                }
            }
            RespValue::NullArray => buffer.put_slice(b"*-1\r\n"),
        }
    }

    /// Decodes one value from the front of `input`.
    ///
    /// Returns `Ok(None)` when `input` holds only a prefix of a value; the
    /// caller should retry once more bytes have arrived. On success the
    /// number of bytes the value occupied is returned alongside it.
    pub fn decode_next(input: &[u8]) -> Result<Option<(RespValue, usize)>, RespError> {
        let mut decoder = Decoder::new(input, false);
        match decoder.value(0)? {
            Some(value) => Ok(Some((value, decoder.position))),
            None => Ok(None),
        }
    }

    /// Decodes a complete embedded resource holding exactly one value.
    ///
    /// Blank lines and `#` comment lines are allowed between values so that
    /// resource files can be laid out by hand. A truncated value is an
    /// error here, not a request for more input.
    pub fn decode_resource(input: &[u8]) -> Result<RespValue, RespError> {
        let mut decoder = Decoder::new(input, true);
        let value = match decoder.value(0)? {
            Some(value) => value,
            None => return Err(decoder.incomplete()),
        };

        decoder.skip_padding();
        if decoder.position < input.len() {
            return Err(RespError::TrailingData {
                position: decoder.position,
                line: line_of(input, decoder.position),
            });
        }

        Ok(value)
    }
}

fn put_line(buffer: &mut BytesMut, prefix: u8, body: &[u8]) {
    buffer.put_u8(prefix);
    buffer.put_slice(body);
    buffer.put_slice(b"\r\n");
}

/// Like `put_line`, but never lets CR or LF from `text` end the frame early.
fn put_text_line(buffer: &mut BytesMut, prefix: u8, text: &str) {
    buffer.put_u8(prefix);
    buffer.extend(text.bytes().map(|byte| match byte {
        b'\r' | b'\n' => b' ',
        other => other,
    }));
    buffer.put_slice(b"\r\n");
}

fn single_line(text: String) -> String {
    if text.contains(['\r', '\n']) {
        text.replace(['\r', '\n'], " ")
    } else {
        text
    }
}

fn line_of(input: &[u8], position: usize) -> usize {
    let end = position.min(input.len());
    input[..end].iter().filter(|&&byte| byte == b'\n').count() + 1
}

struct Decoder<'a> {
    input: &'a [u8],
    position: usize,
    resource: bool,
}

impl<'a> Decoder<'a> {
    fn new(input: &'a [u8], resource: bool) -> Self {
        Self {
            input,
            position: 0,
            resource,
        }
    }

    fn malformed(&self, position: usize, reason: impl Into<String>) -> RespError {
        RespError::Malformed {
            position,
            line: line_of(self.input, position),
            reason: reason.into(),
        }
    }

    fn incomplete(&self) -> RespError {
        RespError::Incomplete {
            position: self.input.len(),
            line: line_of(self.input, self.input.len()),
        }
    }

    fn skip_padding(&mut self) {
        while let Some(&byte) = self.input.get(self.position) {
            match byte {
                b' ' | b'\t' | b'\r' | b'\n' => self.position += 1,
                b'#' => {
                    match self.input[self.position..].iter().position(|&b| b == b'\n') {
                        Some(offset) => self.position += offset + 1,
                        None => self.position = self.input.len(),
                    }
                }
                _ => break,
            }
        }
    }

    /// Reads the rest of a header line after its type byte. The returned
    /// slice excludes the CRLF, which is consumed.
    fn line(&mut self) -> Result<Option<&'a [u8]>, RespError> {
        let input = self.input;
        let start = self.position;
        let rest = &input[start..];

        let Some(end) = rest.windows(2).position(|window| window == b"\r\n") else {
            if rest.len() > MAX_LINE_LENGTH {
                return Err(self.malformed(start, "header line too long"));
            }
            return Ok(None);
        };

        if end > MAX_LINE_LENGTH {
            return Err(self.malformed(start, "header line too long"));
        }

        self.position = start + end + 2;
        Ok(Some(&rest[..end]))
    }

    fn length(&self, position: usize, line: &[u8], limit: usize) -> Result<Option<usize>, RespError> {
        let value = parse_integer(line).ok_or_else(|| self.malformed(position, "invalid length"))?;

        match value {
            -1 => Ok(None),
            n if n < -1 => Err(self.malformed(position, "negative length")),
            n => {
                let length = usize::try_from(n).map_err(|_| self.malformed(position, "invalid length"))?;
                if length > limit {
                    return Err(self.malformed(position, "length exceeds limit"));
                }
                Ok(Some(length))
            }
        }
    }

    fn text(&self, position: usize, line: &[u8]) -> Result<String, RespError> {
        std::str::from_utf8(line)
            .map(str::to_string)
            .map_err(|_| self.malformed(position, "invalid UTF-8 in simple string"))
    }

    fn value(&mut self, depth: usize) -> Result<Option<RespValue>, RespError> {
        if depth > MAX_NESTING_DEPTH {
            return Err(self.malformed(self.position, "arrays nested too deeply"));
        }

        if self.resource {
            self.skip_padding();
        }

        let start = self.position;
        let Some(&type_byte) = self.input.get(start) else {
            return Ok(None);
        };
        self.position += 1;

        let Some(line) = self.line()? else {
            return Ok(None);
        };

        match type_byte {
            b'+' => Ok(Some(RespValue::SimpleString(self.text(start, line)?))),
            b'-' => Ok(Some(RespValue::Error(self.text(start, line)?))),
            b':' => parse_integer(line)
                .map(|value| Some(RespValue::Integer(value)))
                .ok_or_else(|| self.malformed(start, "invalid integer")),
            b'$' => {
                let Some(length) = self.length(start, line, MAX_BULK_LENGTH)? else {
                    return Ok(Some(RespValue::Null));
                };

                let body_start = self.position;
                let body_end = body_start + length;
                if self.input.len() < body_end + 2 {
                    return Ok(None);
                }
                if &self.input[body_end..body_end + 2] != b"\r\n" {
                    return Err(self.malformed(body_end, "bulk string not terminated by CRLF"));
                }

                self.position = body_end + 2;
                Ok(Some(RespValue::BulkString(Bytes::copy_from_slice(
                    &self.input[body_start..body_end],
                ))))
            }
            b'*' => {
                let Some(count) = self.length(start, line, MAX_ARRAY_LENGTH)? else {
                    return Ok(Some(RespValue::NullArray));
                };

                let mut items = Vec::with_capacity(count.min(64));
                for _ in 0..count {
                    match self.value(depth + 1)? {
                        Some(item) => items.push(item),
                        None => return Ok(None),
                    }
                }
                Ok(Some(RespValue::Array(items)))
            }
            other => Err(self.malformed(
                start,
                format!("unexpected type byte '{}'", char::from(other).escape_default()),
            )),
        }
    }
}

/// Strict decimal parse: optional leading `-`, digits only.
fn parse_integer(line: &[u8]) -> Option<i64> {
    let digits = line.strip_prefix(b"-").unwrap_or(line);
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(line).ok()?.parse::<i64>().ok()
}
