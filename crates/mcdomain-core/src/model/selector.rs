//! Label selector as written on a DomainOwner
//!
//! This is the declarative shape only. Compiling it into something that can
//! be evaluated (and rejecting malformed selectors) lives in
//! [`crate::selector`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Operator for label selector requirements
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum LabelSelectorOperator {
    /// Label value must be in the specified set
    In,
    /// Label value must not be in the specified set
    NotIn,
    /// Label must exist (value ignored)
    Exists,
    /// Label must not exist (value ignored)
    DoesNotExist,
}

impl LabelSelectorOperator {
    /// Check if a label value matches this operator
    ///
    /// - `label_value`: The actual label value (None if label doesn't exist)
    /// - `values`: The values specified in the requirement
    pub fn matches(&self, label_value: Option<&str>, values: &[String]) -> bool {
        match self {
            Self::In => label_value.is_some_and(|v| values.iter().any(|req| req == v)),
            Self::NotIn => {
                label_value.is_none() || !values.iter().any(|req| Some(req.as_str()) == label_value)
            }
            Self::Exists => label_value.is_some(),
            Self::DoesNotExist => label_value.is_none(),
        }
    }

    /// Whether this operator takes a value list
    pub fn takes_values(&self) -> bool {
        matches!(self, Self::In | Self::NotIn)
    }
}

/// A single `matchExpressions` entry
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelectorRequirement {
    /// The label key that the selector applies to
    pub key: String,

    /// Operator representing the relationship between label and values
    pub operator: LabelSelectorOperator,

    /// Array of string values
    ///
    /// - For `In` and `NotIn` operators: must be non-empty
    /// - For `Exists` and `DoesNotExist`: must be empty
    #[serde(default)]
    pub values: Vec<String>,
}

impl LabelSelectorRequirement {
    /// Create a requirement
    pub fn new(
        key: impl Into<String>,
        operator: LabelSelectorOperator,
        values: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            key: key.into(),
            operator,
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

/// Label predicate selecting the clusters that own a domain
///
/// An empty selector `{}` matches everything.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    /// Map of label key-value pairs for exact matching
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_labels: Option<BTreeMap<String, String>>,

    /// List of label selector requirements
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub match_expressions: Vec<LabelSelectorRequirement>,
}

impl LabelSelector {
    /// Selector with a single `matchLabels` entry
    pub fn with_label(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::default().and_label(key, value)
    }

    /// Add a `matchLabels` entry
    pub fn and_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.match_labels
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Add a `matchExpressions` entry
    pub fn and_expression(mut self, requirement: LabelSelectorRequirement) -> Self {
        self.match_expressions.push(requirement);
        self
    }

    /// Check if this selector is empty (matches everything)
    pub fn is_empty(&self) -> bool {
        self.match_labels.as_ref().is_none_or(|m| m.is_empty())
            && self.match_expressions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_selector_operator_in() {
        let op = LabelSelectorOperator::In;

        assert!(op.matches(Some("prod"), &["dev".into(), "prod".into()]));
        assert!(!op.matches(Some("staging"), &["dev".into(), "prod".into()]));
        assert!(!op.matches(None, &["dev".into(), "prod".into()]));
    }

    #[test]
    fn test_label_selector_operator_not_in() {
        let op = LabelSelectorOperator::NotIn;

        assert!(op.matches(Some("staging"), &["dev".into(), "prod".into()]));
        assert!(op.matches(None, &["dev".into(), "prod".into()]));
        assert!(!op.matches(Some("prod"), &["dev".into(), "prod".into()]));
    }

    #[test]
    fn test_label_selector_operator_exists() {
        assert!(LabelSelectorOperator::Exists.matches(Some("any-value"), &[]));
        assert!(!LabelSelectorOperator::Exists.matches(None, &[]));
        assert!(LabelSelectorOperator::DoesNotExist.matches(None, &[]));
        assert!(!LabelSelectorOperator::DoesNotExist.matches(Some("any-value"), &[]));
    }

    #[test]
    fn test_selector_deserializes_kubernetes_shape() {
        let selector: LabelSelector = serde_json::from_value(serde_json::json!({
            "matchLabels": { "env": "prod" },
            "matchExpressions": [
                { "key": "region", "operator": "In", "values": ["eu", "us"] },
                { "key": "canary", "operator": "DoesNotExist" }
            ]
        }))
        .unwrap();

        assert_eq!(
            selector.match_labels.as_ref().and_then(|m| m.get("env")),
            Some(&"prod".to_string())
        );
        assert_eq!(selector.match_expressions.len(), 2);
        assert_eq!(
            selector.match_expressions[1].operator,
            LabelSelectorOperator::DoesNotExist
        );
        assert!(selector.match_expressions[1].values.is_empty());
    }

    #[test]
    fn test_empty_selector() {
        assert!(LabelSelector::default().is_empty());
        assert!(!LabelSelector::with_label("env", "prod").is_empty());
    }
}
