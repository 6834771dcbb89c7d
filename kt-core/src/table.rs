//! The answer table consumed by graph export.
//!
//! Columns deserialize from either the flat form
//! `{id, entity_type, answer_shape, query, rules}` or the nested form the
//! table UI sends, `{id, prompt: {entityType, type, query, rules}}`.
//! Cells use `rowId`/`columnId` and `answer: {answer, chunks}` as aliases.

use std::collections::HashMap;

use kt_rag::Chunk;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{KtError, Result};
use crate::rule::Rule;
use crate::shape::{AnswerShape, AnswerValue};
use crate::validate::validate;

/// A populated answer table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub rows: Vec<Row>,
    #[serde(default)]
    pub cells: Vec<Cell>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ColumnRecord")]
pub struct Column {
    pub id: String,
    pub entity_type: String,
    pub answer_shape: AnswerShape,
    pub query: String,
    pub rules: Vec<Rule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub id: String,
    pub document: RowDocument,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowDocument {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    #[serde(alias = "rowId")]
    pub row_id: String,
    #[serde(alias = "columnId")]
    pub column_id: String,
    #[serde(default)]
    pub answer: CellAnswer,
}

/// A cell's answer as produced by an earlier query. `value` is kept raw and
/// re-validated against the column shape when read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CellAnswer {
    #[serde(default, alias = "answer")]
    pub value: Value,
    #[serde(default)]
    pub chunks: Vec<Chunk>,
}

impl Cell {
    /// The cell value coerced to `shape`.
    ///
    /// # Errors
    ///
    /// Returns [`KtError::SchemaViolation`] if the stored value does not fit.
    pub fn typed_value(&self, shape: AnswerShape) -> Result<Option<AnswerValue>> {
        validate(shape, &[], &self.answer.value)
    }
}

#[derive(Deserialize)]
struct ColumnRecord {
    id: String,
    #[serde(default, alias = "entityType")]
    entity_type: Option<String>,
    #[serde(default, alias = "type")]
    answer_shape: Option<AnswerShape>,
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    rules: Option<Vec<Rule>>,
    #[serde(default)]
    prompt: Option<ColumnPromptRecord>,
}

#[derive(Deserialize)]
struct ColumnPromptRecord {
    #[serde(alias = "entityType")]
    entity_type: String,
    #[serde(rename = "type", alias = "answer_shape")]
    shape: AnswerShape,
    #[serde(default)]
    query: String,
    #[serde(default)]
    rules: Vec<Rule>,
}

impl TryFrom<ColumnRecord> for Column {
    type Error = KtError;

    fn try_from(record: ColumnRecord) -> Result<Self> {
        if let Some(prompt) = record.prompt {
            return Ok(Column {
                id: record.id,
                entity_type: prompt.entity_type,
                answer_shape: prompt.shape,
                query: prompt.query,
                rules: prompt.rules,
            });
        }
        let entity_type = record
            .entity_type
            .ok_or_else(|| KtError::BadInput(format!("column '{}' has no entity_type", record.id)))?;
        let answer_shape = record
            .answer_shape
            .ok_or_else(|| KtError::BadInput(format!("column '{}' has no answer_shape", record.id)))?;
        Ok(Column {
            id: record.id,
            entity_type,
            answer_shape,
            query: record.query.unwrap_or_default(),
            rules: record.rules.unwrap_or_default(),
        })
    }
}

impl Table {
    /// Distinct column entity types in column order.
    pub fn entity_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = Vec::new();
        for column in &self.columns {
            if !types.contains(&column.entity_type.as_str()) {
                types.push(&column.entity_type);
            }
        }
        types
    }

    /// Distinct document names in row order.
    pub fn document_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for row in &self.rows {
            if !names.contains(&row.document.name.as_str()) {
                names.push(&row.document.name);
            }
        }
        names
    }

    pub fn index(&self) -> TableIndex<'_> {
        TableIndex::new(self)
    }
}

/// Lookups over a [`Table`]. On duplicates the first column of an entity
/// type and the first cell of a `(row, column)` pair win.
#[derive(Debug)]
pub struct TableIndex<'a> {
    columns: HashMap<&'a str, &'a Column>,
    cells: HashMap<(&'a str, &'a str), &'a Cell>,
}

impl<'a> TableIndex<'a> {
    fn new(table: &'a Table) -> Self {
        let mut columns = HashMap::new();
        for column in &table.columns {
            columns.entry(column.entity_type.as_str()).or_insert(column);
        }
        let mut cells = HashMap::new();
        for cell in &table.cells {
            cells.entry((cell.row_id.as_str(), cell.column_id.as_str())).or_insert(cell);
        }
        Self { columns, cells }
    }

    pub fn column_for(&self, entity_type: &str) -> Option<&'a Column> {
        self.columns.get(entity_type).copied()
    }

    pub fn cell(&self, row_id: &str, column_id: &str) -> Option<&'a Cell> {
        self.cells.get(&(row_id, column_id)).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_and_flat_columns_parse_alike() {
        let nested: Column = serde_json::from_value(json!({
            "id": "c1",
            "width": 200,
            "hidden": false,
            "prompt": {
                "id": "p1",
                "entityType": "Disease",
                "type": "str",
                "query": "Which disease?",
                "rules": []
            }
        }))
        .unwrap();
        let flat: Column = serde_json::from_value(json!({
            "id": "c1",
            "entity_type": "Disease",
            "answer_shape": "string",
            "query": "Which disease?"
        }))
        .unwrap();
        assert_eq!(nested, flat);
    }

    #[test]
    fn flat_column_needs_entity_type() {
        let err = serde_json::from_value::<Column>(json!({"id": "c1", "answer_shape": "bool"})).unwrap_err();
        assert!(err.to_string().contains("entity_type"));
    }

    #[test]
    fn cells_accept_camel_case_and_answer_alias() {
        let cell: Cell = serde_json::from_value(json!({
            "rowId": "r1",
            "columnId": "c1",
            "dirty": false,
            "answer": {"answer": "MS", "chunks": [{"content": "MS is...", "page": 2}]}
        }))
        .unwrap();
        assert_eq!(cell.row_id, "r1");
        assert_eq!(cell.answer.chunks.len(), 1);
        assert_eq!(
            cell.typed_value(AnswerShape::String).unwrap(),
            Some(AnswerValue::String("MS".into()))
        );
    }

    #[test]
    fn index_keeps_first_duplicate() {
        let table: Table = serde_json::from_value(json!({
            "columns": [
                {"id": "c1", "entity_type": "A", "answer_shape": "string"},
                {"id": "c2", "entity_type": "A", "answer_shape": "string"}
            ],
            "rows": [{"id": "r1", "document": {"id": "d1", "name": "one.txt"}}],
            "cells": [
                {"row_id": "r1", "column_id": "c1", "answer": {"value": "first"}},
                {"row_id": "r1", "column_id": "c1", "answer": {"value": "second"}}
            ]
        }))
        .unwrap();
        let index = table.index();
        assert_eq!(index.column_for("A").unwrap().id, "c1");
        assert_eq!(index.cell("r1", "c1").unwrap().answer.value, json!("first"));
        assert!(index.cell("r1", "c2").is_none());
        assert_eq!(table.entity_types(), vec!["A"]);
        assert_eq!(table.document_names(), vec!["one.txt"]);
    }
}
