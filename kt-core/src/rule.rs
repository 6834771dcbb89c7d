//! Rules attached to a query.
//!
//! On the wire a rule is a flat record `{type, options?, length?}`. Inside
//! the crate it is the [`Rule`] sum type, so a rule can never carry both
//! options and a length. Conversion happens during deserialization; an
//! invalid record fails with [`KtError::BadInput`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::KtError;

/// A constraint or post-processing step attached to a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RuleRecord", into = "RuleRecord")]
pub enum Rule {
    /// The answer must be one of these values; anything else becomes null.
    MustReturn(Vec<String>),
    /// Example answers shown to the model. Output is not filtered.
    MayReturn(Vec<String>),
    /// List answers are truncated to at most this many items.
    MaxLength(usize),
    /// Whole-word substitutions applied to string answers, `original → resolved`.
    ///
    /// Keys must not occur in any value, otherwise applying the rule twice
    /// differs from applying it once.
    ResolveEntity(BTreeMap<String, String>),
}

impl Rule {
    /// The wire name of this rule's kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MustReturn(_) => "must_return",
            Self::MayReturn(_) => "may_return",
            Self::MaxLength(_) => "max_length",
            Self::ResolveEntity(_) => "resolve_entity",
        }
    }
}

/// The flat wire representation of a [`Rule`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRecord {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<i64>,
    /// Explicit `resolve_entity` mapping, an alternative to `"a:b"` options.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<BTreeMap<String, String>>,
}

impl TryFrom<RuleRecord> for Rule {
    type Error = KtError;

    fn try_from(record: RuleRecord) -> Result<Self, Self::Error> {
        let options = |record: RuleRecord| -> Result<Vec<String>, KtError> {
            match record.options {
                Some(options) if !options.is_empty() => Ok(options),
                _ => Err(KtError::BadInput(format!("{} rule requires options", record.kind))),
            }
        };

        let kind = record.kind.clone();
        match kind.as_str() {
            "must_return" => Ok(Self::MustReturn(options(record)?)),
            "may_return" => Ok(Self::MayReturn(options(record)?)),
            "max_length" => match record.length {
                Some(length) if length > 0 => Ok(Self::MaxLength(length as usize)),
                Some(length) => {
                    Err(KtError::BadInput(format!("max_length must be positive, got {length}")))
                }
                None => Err(KtError::BadInput("max_length rule requires length".to_string())),
            },
            "resolve_entity" => {
                let mut map = record.map.unwrap_or_default();
                for option in record.options.unwrap_or_default() {
                    let (original, resolved) = option.split_once(':').ok_or_else(|| {
                        KtError::BadInput(format!(
                            "resolve_entity option {option:?} must look like \"original:resolved\""
                        ))
                    })?;
                    map.insert(original.trim().to_string(), resolved.trim().to_string());
                }
                if map.is_empty() {
                    return Err(KtError::BadInput("resolve_entity rule requires options".to_string()));
                }
                if map.keys().any(|k| k.is_empty()) {
                    return Err(KtError::BadInput(
                        "resolve_entity keys must not be empty".to_string(),
                    ));
                }
                Ok(Self::ResolveEntity(map))
            }
            other => Err(KtError::BadInput(format!("unknown rule type {other:?}"))),
        }
    }
}

impl From<Rule> for RuleRecord {
    fn from(rule: Rule) -> Self {
        let kind = rule.kind().to_string();
        match rule {
            Rule::MustReturn(options) | Rule::MayReturn(options) => {
                Self { kind, options: Some(options), ..Default::default() }
            }
            Rule::MaxLength(length) => Self { kind, length: Some(length as i64), ..Default::default() },
            Rule::ResolveEntity(map) => Self {
                kind,
                options: Some(map.into_iter().map(|(k, v)| format!("{k}:{v}")).collect()),
                ..Default::default()
            },
        }
    }
}

/// Options of the first `must_return` rule.
pub fn must_return(rules: &[Rule]) -> Option<&[String]> {
    rules.iter().find_map(|rule| match rule {
        Rule::MustReturn(options) => Some(options.as_slice()),
        _ => None,
    })
}

/// Every `must_return` and `may_return` rule, in request order.
pub fn option_rules(rules: &[Rule]) -> impl Iterator<Item = &Rule> {
    rules.iter().filter(|rule| matches!(rule, Rule::MustReturn(_) | Rule::MayReturn(_)))
}

/// Length of the first `max_length` rule.
pub fn max_length(rules: &[Rule]) -> Option<usize> {
    rules.iter().find_map(|rule| match rule {
        Rule::MaxLength(length) => Some(*length),
        _ => None,
    })
}

/// Every `must_return` and `may_return` option, in rule order, without duplicates.
pub fn keyword_options(rules: &[Rule]) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for rule in rules {
        if let Rule::MustReturn(options) | Rule::MayReturn(options) = rule {
            for option in options {
                if !option.trim().is_empty() && !keywords.contains(option) {
                    keywords.push(option.clone());
                }
            }
        }
    }
    keywords
}

/// All `resolve_entity` mappings merged. Later rules win on key collisions.
pub fn resolution_map(rules: &[Rule]) -> BTreeMap<String, String> {
    rules
        .iter()
        .filter_map(|rule| match rule {
            Rule::ResolveEntity(map) => Some(map.clone()),
            _ => None,
        })
        .flatten()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> Result<Rule, serde_json::Error> {
        serde_json::from_value(value)
    }

    #[test]
    fn parses_each_kind() {
        assert_eq!(
            parse(json!({"type": "must_return", "options": ["Paris", "Rome"]})).unwrap(),
            Rule::MustReturn(vec!["Paris".into(), "Rome".into()])
        );
        assert_eq!(
            parse(json!({"type": "may_return", "options": ["x"]})).unwrap(),
            Rule::MayReturn(vec!["x".into()])
        );
        assert_eq!(parse(json!({"type": "max_length", "length": 2})).unwrap(), Rule::MaxLength(2));
        assert_eq!(
            parse(json!({"type": "resolve_entity", "options": ["NTZ:natalizumab"]})).unwrap(),
            Rule::ResolveEntity(BTreeMap::from([("NTZ".into(), "natalizumab".into())]))
        );
        assert_eq!(
            parse(json!({"type": "resolve_entity", "map": {"blue": "ultramarine"}})).unwrap(),
            Rule::ResolveEntity(BTreeMap::from([("blue".into(), "ultramarine".into())]))
        );
    }

    #[test]
    fn rejects_invalid_records() {
        assert!(parse(json!({"type": "must_return"})).is_err());
        assert!(parse(json!({"type": "must_return", "options": []})).is_err());
        assert!(parse(json!({"type": "max_length", "length": 0})).is_err());
        assert!(parse(json!({"type": "max_length"})).is_err());
        assert!(parse(json!({"type": "resolve_entity", "options": ["no-colon"]})).is_err());
        assert!(parse(json!({"type": "sometimes_return", "options": ["a"]})).is_err());
    }

    #[test]
    fn conversion_error_is_bad_input() {
        let err = Rule::try_from(RuleRecord { kind: "max_length".into(), ..Default::default() })
            .unwrap_err();
        assert!(matches!(err, KtError::BadInput(_)));
    }

    #[test]
    fn serializes_back_to_wire_records() {
        let rule = Rule::ResolveEntity(BTreeMap::from([("blue".into(), "ultramarine".into())]));
        assert_eq!(
            serde_json::to_value(&rule).unwrap(),
            json!({"type": "resolve_entity", "options": ["blue:ultramarine"]})
        );
        assert_eq!(
            serde_json::to_value(Rule::MaxLength(3)).unwrap(),
            json!({"type": "max_length", "length": 3})
        );
    }

    #[test]
    fn helpers_pick_the_right_rules() {
        let rules = vec![
            Rule::MayReturn(vec!["a".into(), "b".into()]),
            Rule::MustReturn(vec!["b".into(), "c".into()]),
            Rule::MaxLength(4),
        ];
        assert_eq!(must_return(&rules), Some(&["b".to_string(), "c".to_string()][..]));
        assert_eq!(option_rules(&rules).collect::<Vec<_>>(), vec![&rules[0], &rules[1]]);
        assert_eq!(max_length(&rules), Some(4));
        assert_eq!(keyword_options(&rules), vec!["a", "b", "c"]);
        assert!(resolution_map(&rules).is_empty());
    }
}
