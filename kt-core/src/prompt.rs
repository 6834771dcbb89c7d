//! Prompt templates.
//!
//! Every prompt is a single user message. Answer prompts combine a base
//! template (grounded or inferred) with format instructions derived from
//! the answer shape and the query's rules. `resolve_entity` never appears
//! in a prompt; it is applied after validation.

use kt_rag::Chunk;
use serde::Serialize;

use crate::rule::{self, Rule};
use crate::shape::AnswerShape;

/// Prompt for answering from retrieved context only.
pub fn grounded(query: &str, chunks: &[Chunk], shape: AnswerShape, rules: &[Rule]) -> String {
    let context = chunks.iter().map(|c| c.content.as_str()).collect::<Vec<_>>().join(" ");
    let instructions = format_instructions(shape, rules, query);
    format!(
        r#"
You are an expert assistant whose job is to answer the following question using **only** the information provided in the **Context**. Do not use any prior knowledge or external information.

---

**Question**: {query}

---

**Context**:
{context}

---

{instructions}

**Instructions**:

- Provide your answer based strictly on the given context.
- Be concise and accurate.
- Do not include any introductory or concluding remarks.
- If the answer is not present in the context, respond exactly with "None".

**Answer**:
"#
    )
}

/// Prompt for answering from the model's own knowledge.
pub fn inferred(query: &str, shape: AnswerShape, rules: &[Rule]) -> String {
    let instructions = format_instructions(shape, rules, query);
    format!(
        r#"
Answer the following question following the formatting instructions at the bottom. Do not include quotes, formatting, or any explanation or extra information. Just answer the question.

**Question**: {query}
**Answer**:

{instructions}
"#
    )
}

/// Shape- and rule-specific output instructions.
pub fn format_instructions(shape: AnswerShape, rules: &[Rule], query: &str) -> String {
    let option_line = option_lines(rules, query);
    let length_line = length_line(rules);
    match shape {
        AnswerShape::Bool => r#"
**Special Instructions for Boolean Questions**:

- If the question is asking for a verification or requires a boolean answer, respond with True or False.
- If you cannot answer the question, respond exactly with 'None'.
- Do not provide any explanations or additional information.
"#
        .to_string(),
        AnswerShape::String | AnswerShape::StringList => format!(
            r#"
{option_line}
{length_line}

**Special Instructions for String Responses**:

- If the answer is a single string, provide a single string.
- If multiple strings are required, provide them as a JSON array of strings.
- If you cannot find an answer, respond exactly with 'None'.
- Do not include any additional text or explanation.
"#
        ),
        AnswerShape::Int | AnswerShape::IntList => format!(
            r#"
{length_line}

**Special Instructions for Integer Responses**:

- If the answer is a single integer, provide the integer as a number.
- If multiple integers are required, provide them as a JSON array of integers.
- If you cannot find an answer, respond exactly with 'None'.
- Do not include any additional text or explanation.
"#
        ),
    }
}

fn option_lines(rules: &[Rule], query: &str) -> String {
    rule::option_rules(rules)
        .filter_map(|rule| match rule {
            Rule::MustReturn(options) => {
                let options = options.iter().map(|o| format!("\"{o}\"")).collect::<Vec<_>>().join(", ");
                Some(format!(
                    "You should only consider these possible values when answering the question: {options}. If these values do not exist in the raw text chunks, or if they do not correctly answer the question, respond with None."
                ))
            }
            Rule::MayReturn(options) => {
                let options = options.join(", ");
                Some(format!(
                    "For example: Query: {query} Response: {options}, etc... If you cannot find a related, correct answer in the raw text chunks, respond with None."
                ))
            }
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn length_line(rules: &[Rule]) -> String {
    match rule::max_length(rules) {
        Some(length) => format!(
            "Your answer should only return up to {length} items. If you have to choose between multiple, return those that answer the question the best. If you cannot find any suitable answer, respond with None."
        ),
        None => String::new(),
    }
}

/// Prompt asking for the query's keywords as a JSON array.
pub fn keywords(query: &str) -> String {
    format!(
        r#"
You are tasked with extracting the most relevant keywords from the following query. Focus on the main nouns and verbs that capture the essence of the query.

---

**Query**: {query}

---

**Instructions**:

- Provide the keywords as a JSON array of strings.
- Ensure all words are in their base (lemmatized) form.
- If you cannot extract any relevant keywords, respond exactly with 'None'.
- Do not include any additional text or explanation.

**Keywords**:
"#
    )
}

/// Prompt asking for up to `max` simpler sub-questions.
pub fn sub_queries(query: &str, max: usize) -> String {
    format!(
        r#"
You are tasked with decomposing the following question into simpler, relevant sub-questions that capture different aspects of the original question.

---

**Original Question**: {query}

---

**Instructions**:

- Provide up to {max} sub-questions as a JSON array of strings.
- If the question is already simple or cannot be decomposed, respond exactly with 'None'.
- Do not include any additional text or explanation.

**Sub-Questions**:
"#
    )
}

/// One column as described to the schema prompt.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnSummary<'a> {
    pub id: &'a str,
    pub entity_type: &'a str,
    #[serde(rename = "type")]
    pub shape: AnswerShape,
    pub question: &'a str,
}

/// Prompt asking for `{head, relation, tail}` relationships between
/// column entity types.
pub fn schema(documents: &[&str], columns: &[ColumnSummary<'_>], entity_types: &[&str]) -> String {
    let documents = documents.join(", ");
    let columns = serde_json::to_string(columns).unwrap_or_else(|_| "[]".to_string());
    let entity_types = entity_types.join(", ");
    format!(
        r#"
Given the information about columns in a knowledge table, generate a schema that includes relationships between the columns if relevant.

---

**Documents**: {documents}

**Columns**: {columns}

**Available Column Names**: {entity_types}

---

**Instructions**:

- Use **only** the exact column names provided in the available column names.
- For each relationship, create an object with `"head"`, `"relation"`, and `"tail"` fields.
- The `"head"` and `"tail"` must be one of the provided column names.
- Create meaningful `"relation"` names based on the column information and questions.
- Do not use any names not in the provided column list.
- If you cannot generate any meaningful relationships, respond exactly with `"None"`.
- Do not include any additional text or explanation.

**Schema Relationships**:
"#
    )
}
