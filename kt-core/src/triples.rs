//! Triple synthesis: schema × rows → graph triples with chunk provenance.
//!
//! Triples and chunks reference each other by string id only. A triple's
//! `chunk_ids` name entries of the chunk list, and every chunk carries the
//! `triple_id` it belongs to.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::schema::SchemaRelationship;
use crate::table::{Cell, Column, Row, Table, TableIndex};

/// A graph node built from one cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub label: String,
    pub name: String,
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Triple {
    #[serde(rename = "triple_id")]
    pub id: String,
    pub head: Node,
    pub tail: Node,
    pub relation: String,
    pub chunk_ids: Vec<String>,
}

/// A cell passage attached to one triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphChunk {
    /// `{triple_id}_{column_id}_c{n}`, `n` counting from 1 per endpoint.
    pub chunk_id: String,
    pub content: String,
    pub page: u32,
    pub triple_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphExport {
    pub triples: Vec<Triple>,
    pub chunks: Vec<GraphChunk>,
}

type IdGenerator = Box<dyn Fn() -> String + Send + Sync>;

/// Materializes triples from a table and a relationship schema.
pub struct TripleSynthesizer {
    next_id: IdGenerator,
}

impl Default for TripleSynthesizer {
    fn default() -> Self {
        Self { next_id: Box::new(|| format!("t{}", Uuid::new_v4())) }
    }
}

impl fmt::Debug for TripleSynthesizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TripleSynthesizer").finish_non_exhaustive()
    }
}

struct Endpoint<'a> {
    name: String,
    column: &'a Column,
    cell: &'a Cell,
}

impl TripleSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `next_id` for triple ids instead of random UUIDs.
    pub fn with_id_generator(next_id: impl Fn() -> String + Send + Sync + 'static) -> Self {
        Self { next_id: Box::new(next_id) }
    }

    /// Emit one triple per `(relationship, row)` whose endpoints both have a
    /// non-empty cell value, relationship-major and row-minor.
    ///
    /// Rows that fail are logged and skipped.
    pub fn synthesize(&self, table: &Table, relationships: &[SchemaRelationship]) -> GraphExport {
        let index = table.index();
        let mut export = GraphExport::default();

        for relationship in relationships {
            for row in &table.rows {
                match self.triple_for_row(&index, row, relationship) {
                    Ok(Some((triple, chunks))) => {
                        export.triples.push(triple);
                        export.chunks.extend(chunks);
                    }
                    Ok(None) => {
                        debug!(row.id = %row.id, head = %relationship.head, tail = %relationship.tail, "row has no value for relationship");
                    }
                    Err(e) => {
                        warn!(row.id = %row.id, relation = %relationship.relation, error = %e, "skipping row");
                    }
                }
            }
        }

        info!(
            triple_count = export.triples.len(),
            chunk_count = export.chunks.len(),
            "synthesized triples"
        );
        export
    }

    fn triple_for_row(
        &self,
        index: &TableIndex<'_>,
        row: &Row,
        relationship: &SchemaRelationship,
    ) -> Result<Option<(Triple, Vec<GraphChunk>)>> {
        let Some(head) = endpoint(index, row, &relationship.head)? else {
            return Ok(None);
        };
        let Some(tail) = endpoint(index, row, &relationship.tail)? else {
            return Ok(None);
        };

        let triple_id = (self.next_id)();
        let mut chunks = Vec::new();
        attach_chunks(&triple_id, &head, &mut chunks);
        if tail.column.id != head.column.id {
            attach_chunks(&triple_id, &tail, &mut chunks);
        }

        let triple = Triple {
            chunk_ids: chunks.iter().map(|chunk| chunk.chunk_id.clone()).collect(),
            head: node(&relationship.head, head.name, row),
            tail: node(&relationship.tail, tail.name, row),
            relation: relationship.relation.clone(),
            id: triple_id,
        };
        Ok(Some((triple, chunks)))
    }
}

fn endpoint<'a>(index: &TableIndex<'a>, row: &Row, entity_type: &str) -> Result<Option<Endpoint<'a>>> {
    let Some(column) = index.column_for(entity_type) else {
        return Ok(None);
    };
    let Some(cell) = index.cell(&row.id, &column.id) else {
        return Ok(None);
    };
    let name = cell.typed_value(column.answer_shape)?.and_then(|value| value.node_name());
    Ok(name.map(|name| Endpoint { name, column, cell }))
}

fn node(entity_type: &str, name: String, row: &Row) -> Node {
    Node {
        label: entity_type.to_string(),
        name,
        properties: BTreeMap::from([("document".to_string(), row.document.name.clone())]),
    }
}

fn attach_chunks(triple_id: &str, endpoint: &Endpoint<'_>, out: &mut Vec<GraphChunk>) {
    for (i, chunk) in endpoint.cell.answer.chunks.iter().enumerate() {
        out.push(GraphChunk {
            chunk_id: format!("{triple_id}_{}_c{}", endpoint.column.id, i + 1),
            content: chunk.content.clone(),
            page: chunk.page,
            triple_id: triple_id.to_string(),
        });
    }
}
