//! Double-delimiter templates for specification files.
//!
//! A `.spectemplate` is an RPM spec in which `$${NAME}` placeholders are
//! replaced with values from a variable mapping before the build starts.
//! The doubled `$` keeps templates clear of RPM macros (`%{name}`) and of
//! shell variables in scriptlets (`$RPM_BUILD_ROOT`, `${var}`), which pass
//! through untouched.
//!
//! # Escaping
//!
//! Use `$$${` to produce a literal `$${` sequence.
//!
//! # Example
//!
//! ```
//! use std::collections::BTreeMap;
//! use drb_lib::template::expand;
//!
//! let mut vars = BTreeMap::new();
//! vars.insert("VERSION".to_string(), "1.2.0".to_string());
//!
//! let spec = expand("Version: $${VERSION}\n%{?dist}", &vars).unwrap();
//! assert_eq!(spec, "Version: 1.2.0\n%{?dist}");
//! ```

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

/// A segment of parsed template text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  /// Literal text (no placeholders)
  Literal(String),

  /// A `$${NAME}` placeholder
  Variable(String),
}

/// Errors that can occur while parsing or expanding a template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
  #[error("unclosed placeholder at position {0}")]
  Unclosed(usize),

  #[error("invalid placeholder name '{name}' at position {pos}")]
  InvalidName { name: String, pos: usize },

  #[error("undefined template variable: {0}")]
  Undefined(String),
}

/// Source of values for template placeholders.
pub trait Variables {
  /// Look up the value of a variable, `None` if it is not defined.
  fn lookup(&self, name: &str) -> Option<&str>;
}

impl Variables for BTreeMap<String, String> {
  fn lookup(&self, name: &str) -> Option<&str> {
    self.get(name).map(String::as_str)
  }
}

impl Variables for HashMap<String, String> {
  fn lookup(&self, name: &str) -> Option<&str> {
    self.get(name).map(String::as_str)
  }
}

/// Parse template text into literal and placeholder segments.
///
/// # Errors
///
/// Returns an error if a placeholder is never closed or its name is not a
/// valid identifier (`[A-Za-z_][A-Za-z0-9_]*`).
pub fn parse(input: &str) -> Result<Vec<Segment>, TemplateError> {
  let mut segments = Vec::new();
  let mut literal = String::new();
  let mut chars = input.char_indices().peekable();

  while let Some((pos, ch)) = chars.next() {
    if ch != '$' {
      literal.push(ch);
      continue;
    }

    if !matches!(chars.peek(), Some((_, '$'))) {
      literal.push('$');
      continue;
    }
    chars.next();

    match chars.peek() {
      Some((_, '$')) => {
        chars.next();
        if matches!(chars.peek(), Some((_, '{'))) {
          // $$${ -> literal $${
          chars.next();
          literal.push_str("$${");
        } else {
          literal.push_str("$$$");
        }
      }
      Some((_, '{')) => {
        chars.next();

        if !literal.is_empty() {
          segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }

        let mut name = String::new();
        let mut found_close = false;
        for (_, c) in chars.by_ref() {
          if c == '}' {
            found_close = true;
            break;
          }
          name.push(c);
        }

        if !found_close {
          return Err(TemplateError::Unclosed(pos));
        }
        if !is_identifier(&name) {
          return Err(TemplateError::InvalidName { name, pos });
        }

        segments.push(Segment::Variable(name));
      }
      _ => literal.push_str("$$"),
    }
  }

  if !literal.is_empty() {
    segments.push(Segment::Literal(literal));
  }

  Ok(segments)
}

/// Expand every placeholder in `input` with values from `vars`.
///
/// # Errors
///
/// Fails on malformed placeholders and on any placeholder whose variable is
/// not defined in `vars`. Nothing is substituted partially.
pub fn expand(input: &str, vars: &impl Variables) -> Result<String, TemplateError> {
  let segments = parse(input)?;
  expand_segments(&segments, vars)
}

/// Expand pre-parsed segments.
pub fn expand_segments(segments: &[Segment], vars: &impl Variables) -> Result<String, TemplateError> {
  let mut result = String::new();

  for segment in segments {
    match segment {
      Segment::Literal(s) => result.push_str(s),
      Segment::Variable(name) => {
        let value = vars.lookup(name).ok_or_else(|| TemplateError::Undefined(name.clone()))?;
        result.push_str(value);
      }
    }
  }

  Ok(result)
}

pub(crate) fn is_identifier(name: &str) -> bool {
  let mut chars = name.chars();
  match chars.next() {
    Some(c) if c.is_ascii_alphabetic() || c == '_' => chars.all(|c| c.is_ascii_alphanumeric() || c == '_'),
    _ => false,
  }
}
