//! Selector resolution
//!
//! Turns the optional [`LabelSelector`] on a DomainOwner into a [`Matcher`]
//! that stores can evaluate against cluster labels.
//!
//! - No selector at all matches every cluster.
//! - `matchLabels` entries become single-value `In` requirements.
//! - Every requirement must hold (conjunction).
//!
//! A selector that cannot be compiled is rejected with
//! [`Error::MalformedSelector`]; it never degrades to match-all or
//! match-nothing.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};
use crate::model::{LabelSelector, LabelSelectorOperator, LabelSelectorRequirement};

const MAX_NAME_LEN: usize = 63;
const MAX_PREFIX_LEN: usize = 253;

/// A compiled label predicate
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Matcher {
    requirements: Vec<Requirement>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Requirement {
    key: String,
    operator: LabelSelectorOperator,
    values: Vec<String>,
}

impl Matcher {
    /// Matcher that accepts every label set
    pub fn everything() -> Self {
        Self::default()
    }

    /// Whether this matcher accepts every label set
    pub fn is_everything(&self) -> bool {
        self.requirements.is_empty()
    }

    /// Evaluate against a label set
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|req| {
            req.operator
                .matches(labels.get(&req.key).map(String::as_str), &req.values)
        })
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.requirements.is_empty() {
            return f.write_str("<everything>");
        }
        for (i, req) in self.requirements.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            match req.operator {
                LabelSelectorOperator::In if req.values.len() == 1 => {
                    write!(f, "{}={}", req.key, req.values[0])?
                }
                LabelSelectorOperator::In => write!(f, "{} in ({})", req.key, req.values.join(","))?,
                LabelSelectorOperator::NotIn => {
                    write!(f, "{} notin ({})", req.key, req.values.join(","))?
                }
                LabelSelectorOperator::Exists => f.write_str(&req.key)?,
                LabelSelectorOperator::DoesNotExist => write!(f, "!{}", req.key)?,
            }
        }
        Ok(())
    }
}

/// Compile an optional selector into a matcher
///
/// # Errors
///
/// [`Error::MalformedSelector`] when a key or value is not a valid label
/// key/value, when `In`/`NotIn` has no values, or when
/// `Exists`/`DoesNotExist` has values.
pub fn resolve(selector: Option<&LabelSelector>) -> Result<Matcher> {
    let Some(selector) = selector else {
        return Ok(Matcher::everything());
    };

    let mut requirements = Vec::new();

    if let Some(match_labels) = &selector.match_labels {
        for (key, value) in match_labels {
            validate_key(key)?;
            validate_value(key, value)?;
            requirements.push(Requirement {
                key: key.clone(),
                operator: LabelSelectorOperator::In,
                values: vec![value.clone()],
            });
        }
    }

    for expression in &selector.match_expressions {
        requirements.push(compile_expression(expression)?);
    }

    // Sorted so two equivalent selectors compile to equal matchers
    requirements.sort();
    requirements.dedup();

    Ok(Matcher { requirements })
}

fn compile_expression(expression: &LabelSelectorRequirement) -> Result<Requirement> {
    validate_key(&expression.key)?;

    let operator = expression.operator;
    if operator.takes_values() && expression.values.is_empty() {
        return Err(Error::malformed_selector(format!(
            "{:?} requirement on '{}' needs at least one value",
            operator, expression.key
        )));
    }
    if !operator.takes_values() && !expression.values.is_empty() {
        return Err(Error::malformed_selector(format!(
            "{:?} requirement on '{}' must not have values",
            operator, expression.key
        )));
    }

    let mut values = expression.values.clone();
    for value in &values {
        validate_value(&expression.key, value)?;
    }
    values.sort();
    values.dedup();

    Ok(Requirement {
        key: expression.key.clone(),
        operator,
        values,
    })
}

/// Label keys are `[prefix/]name`
fn validate_key(key: &str) -> Result<()> {
    let (prefix, name) = match key.split_once('/') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, key),
    };

    if let Some(prefix) = prefix {
        let valid_prefix = !prefix.is_empty()
            && prefix.len() <= MAX_PREFIX_LEN
            && prefix.split('.').all(|part| {
                !part.is_empty()
                    && part
                        .chars()
                        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
                    && !part.starts_with('-')
                    && !part.ends_with('-')
            });
        if !valid_prefix {
            return Err(Error::malformed_selector(format!(
                "invalid label key '{}': prefix must be a DNS subdomain",
                key
            )));
        }
    }

    if name.is_empty() || !is_label_name(name) {
        return Err(Error::malformed_selector(format!(
            "invalid label key '{}': name must be 1-{} alphanumeric characters, '-', '_' or '.', \
             starting and ending with an alphanumeric character",
            key, MAX_NAME_LEN
        )));
    }

    Ok(())
}

/// Label values may be empty, otherwise same rules as a key name
fn validate_value(key: &str, value: &str) -> Result<()> {
    if value.is_empty() || is_label_name(value) {
        return Ok(());
    }
    Err(Error::malformed_selector(format!(
        "invalid value '{}' for label key '{}'",
        value, key
    )))
}

fn is_label_name(s: &str) -> bool {
    let bytes = s.as_bytes();
    !bytes.is_empty()
        && bytes.len() <= MAX_NAME_LEN
        && bytes[0].is_ascii_alphanumeric()
        && bytes[bytes.len() - 1].is_ascii_alphanumeric()
        && bytes
            .iter()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}
