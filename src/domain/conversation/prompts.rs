//! Prompt templates for the form assistant.
//!
//! The prompts carry the whole output contract: the model is told to answer
//! with one JSON object and nothing else. `ResponseExtractor` only cleans up
//! around that contract.

use crate::domain::form::Schema;

/// System prompt installed when a session is created.
pub const SYSTEM_PROMPT: &str = "\
You are a form-filling assistant that answers in JSON only.

Rules:
1. Reply with exactly one valid JSON object and no other text.
2. Use double quotes for every key and string; never use single quotes.
3. Do not add explanations, comments or markdown around the JSON.
4. Work only with the fields in the schema given in the current request; ignore earlier schemas.
5. When asking questions, group related fields into one friendly question.
6. When extracting answers, respect each field's type (text, number, boolean, choice, date, file).";

fn plural(count: usize, word: &str) -> String {
    if count == 1 {
        format!("{count} {word}")
    } else {
        format!("{count} {word}s")
    }
}

/// Asks the model to phrase one question covering every field in `schema`.
pub fn question_prompt(schema: &Schema) -> String {
    let count = schema.len();
    format!(
        "Write one natural, friendly question that collects the fields described below.

Schema ({fields}):
{schema}

Requirements:
- Ask only about fields listed in the schema.
- \"requestedFields\" must contain exactly {items}: the \"id\" value of each schema entry, not the property name.
- Use descriptions and placeholders to make the question sound natural, for example \"What is your name and email address?\".

Answer with this JSON shape:
{{
  \"message\": \"<the question>\",
  \"requestedFields\": [\"<id>\", \"<id>\"]
}}",
        fields = plural(count, "field"),
        schema = schema.to_pretty_json(),
        items = plural(count, "item"),
    )
}

/// Asks the model to pull per-field values out of a user's reply.
pub fn extraction_prompt(schema: &Schema, user_input: &str, with_image: bool) -> String {
    let image_section = if with_image {
        "
An image is attached. Read any text, dates, names, numbers, ticked boxes or \
selected options in it. Prefer the written reply when both sources disagree \
unless the image is more specific, and say in the reasoning when a value came \
from the image.
"
    } else {
        ""
    };

    format!(
        "Extract values for the schema fields from the user's reply.

User reply:
---
{user_input}
---

Schema:
---
{schema}
---
{image_section}
Return one JSON object. Each key is a property name from the schema and each \
value is an object with:
- \"value\": the extracted value (numbers as numbers, booleans as true/false, \
choices as the closest enum entry, dates as YYYY-MM-DD)
- \"confidence\": 0.0 (guess) to 1.0 (certain)
- \"id\": the field's \"id\" from the schema
- \"reasoning\": a short explanation without quotes or apostrophes

If the user refuses or asks to skip a field, use value null, confidence 1.0 \
and reasoning \"User explicitly refused to provide this information\".
If a field is not mentioned, use value null, confidence 0.0 and reasoning \
\"Information not found\".

Example:
{{
  \"firstName\": {{\"value\": \"John\", \"confidence\": 0.95, \"id\": \"f1\", \"reasoning\": \"User gave the name John\"}},
  \"agreement\": {{\"value\": null, \"confidence\": 1.0, \"id\": \"f2\", \"reasoning\": \"User explicitly refused to provide this information\"}}
}}

Never return an array and never add text outside the object.",
        schema = schema.to_pretty_json(),
    )
}
