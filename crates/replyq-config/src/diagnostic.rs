// SPDX-FileCopyrightText: 2026 Replyq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration diagnostics.
//!
//! Figment failures are turned into [`ConfigError`]s that point at the
//! offending line of `replyq.toml` (or name the environment variable layer
//! they came from) and suggest the closest valid key of the same section.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Jaro-Winkler score a key must beat to be offered as a correction.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// Source name for configuration given as a string rather than a file.
pub const INLINE_SOURCE: &str = "<inline>";

/// A problem with the loaded configuration.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown key `{key}` in {section} ({origin})")]
    #[diagnostic(
        code(replyq::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        /// `[worker]`, `[sms]`, ... or `the top level`.
        section: String,
        key: String,
        suggestion: Option<String>,
        /// Comma-separated keys the section accepts.
        valid_keys: String,
        /// File path or provider name the key came from.
        origin: String,
        #[label("not a replyq setting")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("`{key}` has the wrong type: found {found} ({origin})")]
    #[diagnostic(code(replyq::config::invalid_type), help("`{key}` expects {expected}"))]
    InvalidType {
        /// Dotted path, e.g. `webhook.port`.
        key: String,
        found: String,
        expected: String,
        origin: String,
        #[label("expected {expected}")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(replyq::config::missing_key),
        help("add `{key} = <value>` to replyq.toml")
    )]
    MissingKey { key: String },

    /// A value that parsed but is not usable, reported after loading.
    #[error("validation error: {message}")]
    #[diagnostic(code(replyq::config::validation))]
    Validation { message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(replyq::config::other))]
    Other(String),
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? Valid keys: {valid_keys}"),
        None => format!("valid keys: {valid_keys}"),
    }
}

fn section_label(section: &[String]) -> String {
    if section.is_empty() {
        "the top level".to_string()
    } else {
        format!("[{}]", section.join("."))
    }
}

/// Where an offending key lives: its provider name and, when it was read
/// from one of the layered TOML sources, a span into that source.
struct Located {
    origin: String,
    span: Option<SourceSpan>,
    src: Option<NamedSource<String>>,
}

/// Find `key` under `section`, preferring the file figment blames.
///
/// String providers carry no path, so every layered source is searched
/// when the blamed file is unknown.
fn locate(
    error: &figment::Error,
    toml_sources: &[(String, String)],
    section: &[String],
    key: &str,
) -> Located {
    let blamed = error
        .metadata
        .as_ref()
        .and_then(|metadata| metadata.source.as_ref())
        .and_then(|source| match source {
            figment::Source::File(path) => Some(path.display().to_string()),
            _ => None,
        });

    let hit = toml_sources
        .iter()
        .filter(|(name, _)| blamed.as_deref().is_none_or(|path| path == name.as_str()))
        .find_map(|(name, content)| {
            find_key_offset(content, section, key).map(|offset| (name, content, offset))
        });

    match hit {
        Some((name, content, offset)) => Located {
            origin: name.clone(),
            span: Some(SourceSpan::new(offset.into(), key.len())),
            src: Some(NamedSource::new(name, content.clone())),
        },
        None => Located {
            origin: blamed
                .or_else(|| error.metadata.as_ref().map(|m| m.name.to_string()))
                .unwrap_or_else(|| "defaults".to_string()),
            span: None,
            src: None,
        },
    }
}

/// Convert every error carried by a `figment::Error` into a [`ConfigError`].
///
/// `toml_sources` holds `(path, content)` pairs of the files that were
/// layered, used to attach source spans.
pub fn figment_to_config_errors(
    err: figment::Error,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    use figment::error::Kind;

    err.into_iter()
        .map(|error| match &error.kind {
            Kind::UnknownField(key, expected) => {
                let section = error.path.clone();
                let at = locate(&error, toml_sources, &section, key);
                ConfigError::UnknownKey {
                    section: section_label(&section),
                    key: key.clone(),
                    suggestion: suggest_key(key, expected),
                    valid_keys: expected.join(", "),
                    origin: at.origin,
                    span: at.span,
                    src: at.src,
                }
            }
            Kind::MissingField(key) => ConfigError::MissingKey {
                key: key.to_string(),
            },
            Kind::InvalidType(found, expected) => {
                let (section, key) = match error.path.split_last() {
                    Some((key, section)) => (section.to_vec(), key.clone()),
                    None => (Vec::new(), String::new()),
                };
                let at = locate(&error, toml_sources, &section, &key);
                ConfigError::InvalidType {
                    key: error.path.join("."),
                    found: found.to_string(),
                    expected: expected.to_string(),
                    origin: at.origin,
                    span: at.span,
                    src: at.src,
                }
            }
            _ => ConfigError::Other(error.to_string()),
        })
        .collect()
}

/// Byte offset of `key = ...` inside the `[section]` table of `content`.
///
/// Only assignments directly under the matching header count; an empty
/// `section` means the top-level table before any header.
pub fn find_key_offset(content: &str, section: &[String], key: &str) -> Option<usize> {
    let wanted = section.join(".");
    let mut current = String::new();
    let mut offset = 0;

    for line in content.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if let Some(header) = trimmed.strip_prefix('[') {
            current = header.split(']').next().unwrap_or_default().trim().to_string();
        } else if current == wanted
            && trimmed
                .strip_prefix(key)
                .is_some_and(|rest| rest.trim_start().starts_with('='))
        {
            return Some(offset + line.len() - trimmed.len());
        }
        offset += line.len();
    }
    None
}

/// Closest valid key to `unknown`, if any is similar enough.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|key| (strsim::jaro_winkler(unknown, key), *key))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Print every error to stderr with miette's graphical report.
pub fn render_errors(errors: &[ConfigError]) {
    use miette::GraphicalReportHandler;

    eprintln!(
        "replyq: {} configuration error{}",
        errors.len(),
        if errors.len() == 1 { "" } else { "s" }
    );
    let handler = GraphicalReportHandler::new();
    for error in errors {
        let mut buf = String::new();
        if handler.render_report(&mut buf, error as &dyn Diagnostic).is_ok() {
            eprint!("{buf}");
        } else {
            eprintln!("Error: {error}");
        }
    }
}
