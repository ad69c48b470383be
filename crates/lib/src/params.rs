//! Build parameters passed into the container as a single argument.
//!
//! # Format (v1)
//!
//! The payload is UTF-8 text: a `# drb-params v1` header line followed by
//! one `NAME=VALUE` line per parameter, sorted by name. Values are written
//! as shell would read them:
//!
//! - integers as plain decimal (`CALLING_UID=1000`)
//! - empty values as nothing (`GPG_PRIVATE_KEY=`)
//! - strings single-quoted, with `'` written as `'\''` (`NAME='a b'`)
//!
//! The token handed to the container is the standard base64 encoding of the
//! payload, so it is one shell word with no quoting concerns. The entry-point
//! script loads it with `eval "$(printf '%s' "$1" | base64 -d)"`.

use std::collections::BTreeMap;
use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

use crate::template::is_identifier;

/// First line of every payload.
pub const HEADER: &str = "# drb-params v1";

pub const CALLING_UID: &str = "CALLING_UID";
pub const CALLING_GID: &str = "CALLING_GID";
pub const BASH_ON_FAIL: &str = "BASH_ON_FAIL";
pub const GPG_PRIVATE_KEY: &str = "GPG_PRIVATE_KEY";

/// A single parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
  Str(String),
  Int(i64),
  Empty,
}

impl From<&str> for ParamValue {
  fn from(s: &str) -> Self {
    ParamValue::Str(s.to_string())
  }
}

impl From<String> for ParamValue {
  fn from(s: String) -> Self {
    ParamValue::Str(s)
  }
}

impl From<i64> for ParamValue {
  fn from(n: i64) -> Self {
    ParamValue::Int(n)
  }
}

impl From<u32> for ParamValue {
  fn from(n: u32) -> Self {
    ParamValue::Int(i64::from(n))
  }
}

impl fmt::Display for ParamValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ParamValue::Str(s) => {
        f.write_str("'")?;
        f.write_str(&s.replace('\'', r"'\''"))?;
        f.write_str("'")
      }
      ParamValue::Int(n) => write!(f, "{}", n),
      ParamValue::Empty => Ok(()),
    }
  }
}

/// Errors from encoding or decoding parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamsError {
  #[error("invalid parameter name: '{0}'")]
  InvalidName(String),

  #[error("parameter token is not valid base64: {0}")]
  Base64(String),

  #[error("parameter payload is not valid UTF-8")]
  Utf8,

  #[error("missing '{HEADER}' header")]
  MissingHeader,

  #[error("malformed parameter payload at byte {pos}: {message}")]
  Malformed { pos: usize, message: String },
}

/// An order-independent set of named build parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameters(BTreeMap<String, ParamValue>);

impl Parameters {
  pub fn new() -> Self {
    Self::default()
  }

  /// Set a parameter, replacing any previous value.
  pub fn set(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> &mut Self {
    self.0.insert(name.into(), value.into());
    self
  }

  pub fn get(&self, name: &str) -> Option<&ParamValue> {
    self.0.get(name)
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  /// Render the plain-text payload.
  pub fn to_payload(&self) -> Result<String, ParamsError> {
    let mut payload = String::from(HEADER);
    payload.push('\n');

    for (name, value) in &self.0 {
      if !is_identifier(name) {
        return Err(ParamsError::InvalidName(name.clone()));
      }
      payload.push_str(name);
      payload.push('=');
      payload.push_str(&value.to_string());
      payload.push('\n');
    }

    Ok(payload)
  }

  /// Encode into a single base64 token.
  pub fn encode(&self) -> Result<String, ParamsError> {
    Ok(STANDARD.encode(self.to_payload()?))
  }

  /// Decode a token produced by [`Parameters::encode`].
  pub fn decode(token: &str) -> Result<Self, ParamsError> {
    let bytes = STANDARD
      .decode(token.trim())
      .map_err(|e| ParamsError::Base64(e.to_string()))?;
    let payload = String::from_utf8(bytes).map_err(|_| ParamsError::Utf8)?;
    Self::from_payload(&payload)
  }

  /// Parse a plain-text payload.
  pub fn from_payload(payload: &str) -> Result<Self, ParamsError> {
    let body = payload
      .strip_prefix(HEADER)
      .and_then(|rest| rest.strip_prefix('\n'))
      .ok_or(ParamsError::MissingHeader)?;
    let offset = HEADER.len() + 1;

    let mut params = Parameters::new();
    let mut cursor = Cursor {
      src: body.as_bytes(),
      pos: 0,
      offset,
    };

    while !cursor.at_end() {
      let name = cursor.read_name()?;
      let value = cursor.read_value()?;
      cursor.expect_newline()?;
      params.0.insert(name, value);
    }

    Ok(params)
  }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for Parameters {
  fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
    Parameters(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
  }
}

struct Cursor<'a> {
  src: &'a [u8],
  pos: usize,
  offset: usize,
}

impl Cursor<'_> {
  fn at_end(&self) -> bool {
    self.pos >= self.src.len()
  }

  fn peek(&self) -> Option<u8> {
    self.src.get(self.pos).copied()
  }

  fn malformed(&self, message: impl Into<String>) -> ParamsError {
    ParamsError::Malformed {
      pos: self.offset + self.pos,
      message: message.into(),
    }
  }

  fn read_name(&mut self) -> Result<String, ParamsError> {
    let start = self.pos;
    while let Some(b) = self.peek() {
      if b == b'=' {
        break;
      }
      if b == b'\n' {
        return Err(self.malformed("expected '='"));
      }
      self.pos += 1;
    }
    if self.at_end() {
      return Err(self.malformed("expected '='"));
    }

    let src = self.src;
    let name = String::from_utf8_lossy(&src[start..self.pos]).into_owned();
    if !is_identifier(&name) {
      return Err(ParamsError::InvalidName(name));
    }
    self.pos += 1;
    Ok(name)
  }

  fn read_value(&mut self) -> Result<ParamValue, ParamsError> {
    match self.peek() {
      None | Some(b'\n') => Ok(ParamValue::Empty),
      Some(b'\'') => self.read_quoted().map(ParamValue::Str),
      Some(_) => {
        let src = self.src;
        let start = self.pos;
        while let Some(b) = self.peek() {
          if b == b'\n' {
            break;
          }
          self.pos += 1;
        }
        let raw = String::from_utf8_lossy(&src[start..self.pos]);
        raw.parse::<i64>().map(ParamValue::Int).map_err(|_| ParamsError::Malformed {
          pos: self.offset + start,
          message: format!("unquoted value '{}' is not an integer", raw),
        })
      }
    }
  }

  /// Reads `'...'` runs joined by `\'`.
  fn read_quoted(&mut self) -> Result<String, ParamsError> {
    let mut value = Vec::new();

    loop {
      // opening quote
      self.pos += 1;
      loop {
        match self.peek() {
          None => return Err(self.malformed("unterminated quoted value")),
          Some(b'\'') => {
            self.pos += 1;
            break;
          }
          Some(b) => {
            value.push(b);
            self.pos += 1;
          }
        }
      }

      if self.src[self.pos..].starts_with(b"\\''") {
        value.push(b'\'');
        self.pos += 2;
        continue;
      }
      break;
    }

    String::from_utf8(value).map_err(|_| ParamsError::Utf8)
  }

  fn expect_newline(&mut self) -> Result<(), ParamsError> {
    match self.peek() {
      Some(b'\n') => {
        self.pos += 1;
        Ok(())
      }
      None => Ok(()),
      Some(_) => Err(self.malformed("expected end of line")),
    }
  }
}
