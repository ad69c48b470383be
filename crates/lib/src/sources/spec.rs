//! Extraction of `SourceN`/`PatchN` entries from a spec file.
//!
//! Only the macros a spec defines for itself are understood: the `Name`,
//! `Version`, `Release` and `Epoch` tags plus `%define`/`%global`. Supported
//! forms are `%name`, `%{name}`, `%{?name}`, `%{?name:text}`,
//! `%{!?name:text}` and `%%`. Anything else that names an unknown macro is an
//! error when it appears in a source entry.

use std::collections::HashMap;

use super::DownloadError;

const MAX_DEPTH: usize = 32;

/// Sections whose bodies are not preamble tags.
const BODY_SECTIONS: &[&str] = &[
  "description",
  "prep",
  "build",
  "install",
  "check",
  "clean",
  "files",
  "changelog",
  "pre",
  "post",
  "preun",
  "postun",
  "pretrans",
  "posttrans",
  "verifyscript",
  "triggerin",
  "triggerun",
  "triggerpostun",
];

const MACRO_TAGS: &[&str] = &["name", "version", "release", "epoch"];

/// A `SourceN:` or `PatchN:` line with macros expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
  pub tag: String,
  pub value: String,
}

impl SourceEntry {
  pub fn is_remote(&self) -> bool {
    self.value.contains("://")
  }
}

/// Collect all source and patch entries of `spec`.
pub fn source_entries(spec: &str) -> Result<Vec<SourceEntry>, DownloadError> {
  let mut macros: HashMap<String, String> = HashMap::new();
  let mut raw_entries = Vec::new();
  let mut in_preamble = true;

  for line in spec.lines() {
    let line = line.trim();

    if let Some(rest) = line.strip_prefix("%define").or_else(|| line.strip_prefix("%global")) {
      if let Some((name, body)) = split_definition(rest) {
        macros.insert(name.to_string(), body.to_string());
      }
      continue;
    }

    if let Some(section) = line.strip_prefix('%') {
      let word = section.split_whitespace().next().unwrap_or_default();
      if word == "package" {
        in_preamble = true;
      } else if BODY_SECTIONS.contains(&word) {
        in_preamble = false;
      }
      continue;
    }

    if !in_preamble {
      continue;
    }

    let Some((tag, value)) = split_tag(line) else {
      continue;
    };
    let lower = tag.to_ascii_lowercase();

    if MACRO_TAGS.contains(&lower.as_str()) {
      macros.entry(lower).or_insert_with(|| value.to_string());
    } else if is_source_tag(&lower) {
      raw_entries.push((tag.to_string(), value.to_string()));
    }
  }

  raw_entries
    .into_iter()
    .map(|(tag, raw)| {
      let entry = || format!("{}: {}", tag, raw);
      let value = expand(&raw, &macros, 0).map_err(|e| match e {
        ExpandError::Undefined(name) => DownloadError::UnresolvedMacro { name, entry: entry() },
        ExpandError::Unclosed => DownloadError::UnclosedMacro { entry: entry() },
        ExpandError::TooDeep => DownloadError::MacroRecursion {
          entry: entry(),
          limit: MAX_DEPTH,
        },
      })?;
      Ok(SourceEntry { tag, value })
    })
    .collect()
}

fn split_definition(rest: &str) -> Option<(&str, &str)> {
  // require whitespace after the keyword
  if !rest.starts_with(char::is_whitespace) {
    return None;
  }
  let rest = rest.trim_start();
  let end = rest.find(char::is_whitespace)?;
  let name = &rest[..end];
  let body = rest[end..].trim();
  Some((name, body))
}

fn split_tag(line: &str) -> Option<(&str, &str)> {
  let (tag, value) = line.split_once(':')?;
  let tag = tag.trim_end();
  let tag_name = tag.split('(').next().unwrap_or(tag);
  if tag_name.is_empty() || !tag_name.chars().all(|c| c.is_ascii_alphanumeric()) {
    return None;
  }
  Some((tag_name, value.trim()))
}

fn is_source_tag(lower: &str) -> bool {
  ["source", "patch"].iter().any(|prefix| {
    lower
      .strip_prefix(prefix)
      .is_some_and(|n| n.chars().all(|c| c.is_ascii_digit()))
  })
}

#[derive(Debug)]
enum ExpandError {
  Undefined(String),
  Unclosed,
  TooDeep,
}

/// Expand macros in `input`.
fn expand(input: &str, macros: &HashMap<String, String>, depth: usize) -> Result<String, ExpandError> {
  if depth > MAX_DEPTH {
    return Err(ExpandError::TooDeep);
  }

  let mut out = String::new();
  let mut rest = input;

  while let Some(idx) = rest.find('%') {
    out.push_str(&rest[..idx]);
    let after = &rest[idx + 1..];

    if let Some(tail) = after.strip_prefix('%') {
      out.push('%');
      rest = tail;
    } else if let Some(braced) = after.strip_prefix('{') {
      let close = matching_brace(braced).ok_or(ExpandError::Unclosed)?;
      out.push_str(&expand_braced(&braced[..close], macros, depth)?);
      rest = &braced[close + 1..];
    } else {
      let len = after
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
        .map(|(i, _)| i)
        .unwrap_or(after.len());
      if len == 0 {
        out.push('%');
      } else {
        let name = &after[..len];
        let body = macros.get(name).ok_or_else(|| ExpandError::Undefined(name.to_string()))?;
        out.push_str(&expand(body, macros, depth + 1)?);
      }
      rest = &after[len..];
    }
  }

  out.push_str(rest);
  Ok(out)
}

fn expand_braced(inner: &str, macros: &HashMap<String, String>, depth: usize) -> Result<String, ExpandError> {
  let (negate, conditional, body) = if let Some(b) = inner.strip_prefix("!?") {
    (true, true, b)
  } else if let Some(b) = inner.strip_prefix('?') {
    (false, true, b)
  } else {
    (false, false, inner)
  };

  let (name, alt) = match body.split_once(':') {
    Some((name, alt)) => (name, Some(alt)),
    None => (body, None),
  };
  let defined = macros.get(name);

  if !conditional {
    let body = defined.ok_or_else(|| ExpandError::Undefined(name.to_string()))?;
    return expand(body, macros, depth + 1);
  }

  match (defined.is_some() != negate, alt) {
    (true, Some(alt)) => expand(alt, macros, depth + 1),
    (true, None) => match defined {
      Some(body) => expand(body, macros, depth + 1),
      None => Ok(String::new()),
    },
    (false, _) => Ok(String::new()),
  }
}

/// Index of the `}` closing an already-opened brace.
fn matching_brace(s: &str) -> Option<usize> {
  let mut depth = 0usize;
  for (i, c) in s.char_indices() {
    match c {
      '{' => depth += 1,
      '}' if depth == 0 => return Some(i),
      '}' => depth -= 1,
      _ => {}
    }
  }
  None
}
