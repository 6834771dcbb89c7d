//! Entity resolution: whole-word substitutions applied after validation.

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{KtError, Result};
use crate::rule::{self, Rule};
use crate::shape::AnswerValue;

/// Where a resolution was requested from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySource {
    #[serde(rename = "type")]
    pub kind: SourceKind,
    pub id: String,
}

impl EntitySource {
    pub fn query(prompt_id: impl Into<String>) -> Self {
        Self { kind: SourceKind::Query, id: prompt_id.into() }
    }

    pub fn column(column_id: impl Into<String>) -> Self {
        Self { kind: SourceKind::Column, id: column_id.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Query,
    Column,
}

/// A string answer or a list answer, as recorded in a [`ResolvedEntity`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityText {
    One(String),
    Many(Vec<String>),
}

/// Record of a substitution that changed an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedEntity {
    pub original: EntityText,
    pub resolved: EntityText,
    pub source: EntitySource,
    pub entity_type: String,
}

/// Compiled `resolve_entity` substitutions.
///
/// All keys are joined into one `\b(?:k1|k2|...)\b` alternation, longest
/// key first, so overlapping keys prefer the longer match.
#[derive(Debug, Clone)]
pub struct EntityResolver {
    pattern: Regex,
    map: BTreeMap<String, String>,
}

impl EntityResolver {
    /// Compile a resolver. Returns `None` for an empty map.
    pub fn new(map: BTreeMap<String, String>) -> Result<Option<Self>> {
        if map.is_empty() {
            return Ok(None);
        }
        let mut keys: Vec<&str> = map.keys().map(String::as_str).collect();
        keys.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
        let alternation = keys.iter().map(|k| regex::escape(k)).collect::<Vec<_>>().join("|");
        let pattern = Regex::new(&format!(r"\b(?:{alternation})\b"))
            .map_err(|e| KtError::BadInput(format!("invalid resolve_entity keys: {e}")))?;
        Ok(Some(Self { pattern, map }))
    }

    /// Compile the merged `resolve_entity` rules of a query.
    pub fn from_rules(rules: &[Rule]) -> Result<Option<Self>> {
        Self::new(rule::resolution_map(rules))
    }

    /// Rewrite every whole-word key occurrence in `text`.
    pub fn apply_str(&self, text: &str) -> String {
        self.pattern
            .replace_all(text, |caps: &regex::Captures<'_>| {
                self.map.get(&caps[0]).cloned().unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }

    /// Rewrite a string or string-list answer. Other shapes pass through.
    pub fn apply(&self, value: &AnswerValue) -> AnswerValue {
        match value {
            AnswerValue::String(s) => AnswerValue::String(self.apply_str(s)),
            AnswerValue::StringList(items) => {
                AnswerValue::StringList(items.iter().map(|s| self.apply_str(s)).collect())
            }
            other => other.clone(),
        }
    }
}

/// Apply the `resolve_entity` rules to `value`.
///
/// Returns the rewritten value and, only when it differs from the input, a
/// single [`ResolvedEntity`] describing the change.
pub fn resolve_answer(
    value: AnswerValue,
    rules: &[Rule],
    source: &EntitySource,
    entity_type: &str,
) -> Result<(AnswerValue, Option<Vec<ResolvedEntity>>)> {
    let Some(resolver) = EntityResolver::from_rules(rules)? else {
        return Ok((value, None));
    };
    let resolved = resolver.apply(&value);
    if resolved == value {
        return Ok((value, None));
    }

    let record = match (&value, &resolved) {
        (AnswerValue::String(original), AnswerValue::String(new)) => Some(ResolvedEntity {
            original: EntityText::One(original.clone()),
            resolved: EntityText::One(new.clone()),
            source: source.clone(),
            entity_type: entity_type.to_string(),
        }),
        (AnswerValue::StringList(original), AnswerValue::StringList(new)) => Some(ResolvedEntity {
            original: EntityText::Many(original.clone()),
            resolved: EntityText::Many(new.clone()),
            source: source.clone(),
            entity_type: entity_type.to_string(),
        }),
        _ => None,
    };
    Ok((resolved, record.map(|r| vec![r])))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn resolver(pairs: &[(&str, &str)]) -> EntityResolver {
        let map = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        EntityResolver::new(map).unwrap().unwrap()
    }

    #[test]
    fn replaces_whole_words_only() {
        let r = resolver(&[("NTZ", "natalizumab")]);
        assert_eq!(r.apply_str("NTZ"), "natalizumab");
        assert_eq!(r.apply_str("NTZ and NTZ."), "natalizumab and natalizumab.");
        assert_eq!(r.apply_str("NTZX"), "NTZX");
    }

    #[test]
    fn longer_keys_win() {
        let r = resolver(&[("New", "Old"), ("New York", "NYC")]);
        assert_eq!(r.apply_str("New York is New"), "NYC is Old");
    }

    #[test]
    fn keys_are_literal() {
        let r = resolver(&[("a.b", "x")]);
        assert_eq!(r.apply_str("a.b acb"), "x acb");
    }

    #[test]
    fn records_only_actual_changes() {
        let rules = [Rule::ResolveEntity(BTreeMap::from([("NTZ".into(), "natalizumab".into())]))];
        let source = EntitySource::query("p1");

        let (value, records) =
            resolve_answer(AnswerValue::String("NTZ".into()), &rules, &source, "Treatment").unwrap();
        assert_eq!(value, AnswerValue::String("natalizumab".into()));
        let records = records.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].original, EntityText::One("NTZ".into()));
        assert_eq!(records[0].resolved, EntityText::One("natalizumab".into()));
        assert_eq!(records[0].source, source);

        let (_, none) =
            resolve_answer(AnswerValue::String("aspirin".into()), &rules, &source, "Treatment").unwrap();
        assert!(none.is_none());
        let (_, no_rules) =
            resolve_answer(AnswerValue::String("NTZ".into()), &[], &source, "Treatment").unwrap();
        assert!(no_rules.is_none());
    }

    #[test]
    fn lists_are_rewritten_element_wise() {
        let rules = [Rule::ResolveEntity(BTreeMap::from([("blue".into(), "ultramarine".into())]))];
        let (value, records) = resolve_answer(
            AnswerValue::StringList(vec!["blue".into(), "red".into()]),
            &rules,
            &EntitySource::column("c1"),
            "Color",
        )
        .unwrap();
        assert_eq!(value, AnswerValue::StringList(vec!["ultramarine".into(), "red".into()]));
        assert_eq!(records.unwrap()[0].original, EntityText::Many(vec!["blue".into(), "red".into()]));
    }

    #[test]
    fn source_serializes_with_type_tag() {
        let json = serde_json::to_value(EntitySource::column("c1")).unwrap();
        assert_eq!(json, serde_json::json!({"type": "column", "id": "c1"}));
    }

    proptest! {
        #[test]
        fn resolving_twice_equals_resolving_once(text in "[a-e ]{0,20}") {
            // keys drawn from a-c, values from x-z: disjoint as required
            let r = resolver(&[("a", "x"), ("bc", "yy"), ("c", "z")]);
            let once = r.apply_str(&text);
            prop_assert_eq!(r.apply_str(&once), once);
        }
    }
}
