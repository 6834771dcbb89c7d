//! Relationship schema induction over a table's column entity types.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::llm::{CompletionShape, LanguageModel};
use crate::prompt::{self, ColumnSummary};
use crate::table::Table;
use crate::validate::is_null_like;

/// A typed edge between two column entity types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaRelationship {
    pub head: String,
    pub relation: String,
    pub tail: String,
}

/// Asks the model which relationships hold between a table's entity types.
pub struct SchemaInducer {
    llm: Arc<dyn LanguageModel>,
}

impl SchemaInducer {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    /// Propose relationships for `table`.
    ///
    /// Never fails: model errors and malformed output are logged and yield
    /// an empty schema.
    pub async fn induce(&self, table: &Table) -> Vec<SchemaRelationship> {
        let entity_types = table.entity_types();
        if entity_types.is_empty() {
            debug!("table has no columns; empty schema");
            return Vec::new();
        }

        let documents = table.document_names();
        let columns: Vec<ColumnSummary<'_>> = table
            .columns
            .iter()
            .map(|column| ColumnSummary {
                id: &column.id,
                entity_type: &column.entity_type,
                shape: column.answer_shape,
                question: &column.query,
            })
            .collect();
        let text = prompt::schema(&documents, &columns, &entity_types);

        let raw = match self.llm.complete(&text, CompletionShape::Schema).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                info!("model proposed no relationships");
                return Vec::new();
            }
            Err(e) => {
                warn!(error = %e, "schema induction failed; exporting nothing");
                return Vec::new();
            }
        };

        let relationships = sanitize(parse_relationships(raw), &entity_types);
        info!(relationship_count = relationships.len(), "induced schema");
        relationships
    }
}

/// Read relationships from a model reply, skipping malformed entries.
///
/// Accepts a bare array, an object with a `relationships` array, or a
/// null-like sentinel.
pub fn parse_relationships(raw: Value) -> Vec<SchemaRelationship> {
    if is_null_like(&raw) {
        return Vec::new();
    }
    let items = match raw {
        Value::Array(items) => items,
        Value::Object(mut object) => match object.remove("relationships") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        Value::String(s) => match serde_json::from_str::<Value>(&s) {
            Ok(decoded @ (Value::Array(_) | Value::Object(_))) => return parse_relationships(decoded),
            _ => {
                warn!(reply = %s, "unparseable schema reply");
                Vec::new()
            }
        },
        _ => Vec::new(),
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<SchemaRelationship>(item) {
            Ok(relationship) => Some(relationship),
            Err(e) => {
                debug!(error = %e, "skipping malformed relationship");
                None
            }
        })
        .collect()
}

/// Keep relationships whose endpoints are known entity types and whose
/// relation is non-empty, dropping duplicates.
pub fn sanitize(relationships: Vec<SchemaRelationship>, entity_types: &[&str]) -> Vec<SchemaRelationship> {
    let mut seen = HashSet::new();
    relationships
        .into_iter()
        .filter_map(|mut relationship| {
            relationship.relation = relationship.relation.trim().to_string();
            let known = entity_types.contains(&relationship.head.as_str())
                && entity_types.contains(&relationship.tail.as_str());
            if !known || relationship.relation.is_empty() {
                warn!(
                    head = %relationship.head,
                    tail = %relationship.tail,
                    relation = %relationship.relation,
                    "dropping relationship outside the table"
                );
                return None;
            }
            seen.insert(relationship.clone()).then_some(relationship)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockLanguageModel;
    use serde_json::json;

    fn rel(head: &str, relation: &str, tail: &str) -> SchemaRelationship {
        SchemaRelationship { head: head.into(), relation: relation.into(), tail: tail.into() }
    }

    fn table() -> Table {
        serde_json::from_value(json!({
            "columns": [
                {"id": "c1", "entity_type": "Disease", "answer_shape": "string", "query": "Which disease?"},
                {"id": "c2", "entity_type": "Treatment", "answer_shape": "string", "query": "Which treatment?"}
            ],
            "rows": [{"id": "r1", "document": {"id": "d1", "name": "paper.pdf"}}],
            "cells": []
        }))
        .unwrap()
    }

    #[test]
    fn parses_supported_reply_forms() {
        let expected = vec![rel("A", "r", "B")];
        let entry = json!({"head": "A", "relation": "r", "tail": "B"});
        assert_eq!(parse_relationships(json!([entry.clone()])), expected);
        assert_eq!(parse_relationships(json!({"relationships": [entry.clone()]})), expected);
        assert_eq!(parse_relationships(json!(format!("[{entry}]"))), expected);
        assert!(parse_relationships(json!("None")).is_empty());
        assert_eq!(parse_relationships(json!([{"head": "A"}, entry])), expected);
    }

    #[test]
    fn sanitize_drops_unknown_empty_and_duplicate() {
        let kept = sanitize(
            vec![
                rel("Disease", "treated_by", "Treatment"),
                rel("Disease", "treated_by", "Treatment"),
                rel("Disease", "  ", "Treatment"),
                rel("Disease", "causes", "Symptom"),
                rel("Treatment", " made_by ", "Treatment"),
            ],
            &["Disease", "Treatment"],
        );
        assert_eq!(kept, vec![rel("Disease", "treated_by", "Treatment"), rel("Treatment", "made_by", "Treatment")]);
    }

    #[tokio::test]
    async fn induce_filters_model_output() {
        let llm = Arc::new(MockLanguageModel::new().with_schema(json!([
            {"head": "Disease", "relation": "treated_by", "tail": "Treatment"},
            {"head": "Disease", "relation": "located_in", "tail": "Country"}
        ])));
        let inducer = SchemaInducer::new(llm.clone());

        let schema = inducer.induce(&table()).await;
        assert_eq!(schema, vec![rel("Disease", "treated_by", "Treatment")]);

        let prompts = llm.prompts_for(CompletionShape::Schema);
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Disease, Treatment"));
        assert!(prompts[0].contains("paper.pdf"));
    }

    #[tokio::test]
    async fn induce_swallows_model_failure() {
        let inducer = SchemaInducer::new(Arc::new(MockLanguageModel::new().failing("down")));
        assert!(inducer.induce(&table()).await.is_empty());
    }
}
