use serde_json::Value;

use crate::domain::chunk::Chunk;
use crate::domain::error::{FieldFault, SchemaError};

/// Validates raw JSON chunk records against the required schema.
///
/// A record fails with one `SchemaError` listing every missing or malformed
/// field, not just the first, so the uploader fixes the whole record in one
/// round trip. Numeric strings are rejected for integer fields: the caller
/// must supply correctly typed JSON values.
#[derive(Debug, Clone, Default)]
pub struct ChunkValidator;

impl ChunkValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validates a single raw record into a typed `Chunk`.
    pub fn validate(&self, record: &Value) -> Result<Chunk, SchemaError> {
        self.validate_at(record, "")
    }

    /// Validates a whole batch, collecting faults across all records.
    /// Field paths carry the record index, e.g. `chunks[3].publish_year`.
    pub fn validate_batch(&self, records: &[Value]) -> Result<Vec<Chunk>, SchemaError> {
        let mut chunks = Vec::with_capacity(records.len());
        let mut faults = Vec::new();
        for (i, record) in records.iter().enumerate() {
            match self.validate_at(record, &format!("chunks[{}].", i)) {
                Ok(chunk) => chunks.push(chunk),
                Err(e) => faults.extend(e.faults),
            }
        }
        if faults.is_empty() {
            Ok(chunks)
        } else {
            Err(SchemaError::new(faults))
        }
    }

    fn validate_at(&self, record: &Value, prefix: &str) -> Result<Chunk, SchemaError> {
        let mut faults = Vec::new();

        let obj = match record.as_object() {
            Some(obj) => obj,
            None => {
                let field = if prefix.is_empty() {
                    "record"
                } else {
                    prefix.trim_end_matches('.')
                };
                return Err(SchemaError::new(vec![fault(field, "expected a JSON object")]));
            }
        };

        let id = require_string(obj, prefix, "id", &mut faults);
        let source_doc_id = require_string(obj, prefix, "source_doc_id", &mut faults);
        let chunk_index = require_integer(obj, prefix, "chunk_index", &mut faults);
        let section_heading = require_string(obj, prefix, "section_heading", &mut faults);
        let journal = require_string(obj, prefix, "journal", &mut faults);
        let publish_year = require_integer(obj, prefix, "publish_year", &mut faults);
        let usage_count = require_integer(obj, prefix, "usage_count", &mut faults);
        let attributes = require_string_array(obj, prefix, "attributes", &mut faults);
        let link = require_string(obj, prefix, "link", &mut faults);
        let text = require_string(obj, prefix, "text", &mut faults);

        // Optional, but must be a string when present.
        let doi = match obj.get("doi") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => {
                faults.push(fault(
                    &format!("{}doi", prefix),
                    &format!("expected string, got {}", type_name(other)),
                ));
                None
            }
        };

        // Every None above recorded a fault, so the build succeeds exactly
        // when the fault list is empty.
        let built = (|| {
            Some(Chunk {
                id: id?,
                source_doc_id: source_doc_id?,
                chunk_index: chunk_index?,
                section_heading: section_heading?,
                journal: journal?,
                publish_year: publish_year?,
                usage_count: usage_count?,
                attributes: attributes?,
                link: link?,
                text: text?,
                doi,
            })
        })();
        match built {
            Some(chunk) if faults.is_empty() => Ok(chunk),
            _ => Err(SchemaError::new(faults)),
        }
    }
}

fn fault(field: &str, problem: &str) -> FieldFault {
    FieldFault {
        field: field.to_string(),
        problem: problem.to_string(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn require_string(
    obj: &serde_json::Map<String, Value>,
    prefix: &str,
    name: &str,
    faults: &mut Vec<FieldFault>,
) -> Option<String> {
    match obj.get(name) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => {
            faults.push(fault(
                &format!("{}{}", prefix, name),
                &format!("expected string, got {}", type_name(other)),
            ));
            None
        }
        None => {
            faults.push(fault(&format!("{}{}", prefix, name), "missing"));
            None
        }
    }
}

fn require_integer(
    obj: &serde_json::Map<String, Value>,
    prefix: &str,
    name: &str,
    faults: &mut Vec<FieldFault>,
) -> Option<i64> {
    match obj.get(name) {
        Some(Value::Number(n)) => match n.as_i64() {
            Some(i) => Some(i),
            None => {
                faults.push(fault(
                    &format!("{}{}", prefix, name),
                    "expected integer, got non-integral number",
                ));
                None
            }
        },
        Some(other) => {
            faults.push(fault(
                &format!("{}{}", prefix, name),
                &format!("expected integer, got {}", type_name(other)),
            ));
            None
        }
        None => {
            faults.push(fault(&format!("{}{}", prefix, name), "missing"));
            None
        }
    }
}

fn require_string_array(
    obj: &serde_json::Map<String, Value>,
    prefix: &str,
    name: &str,
    faults: &mut Vec<FieldFault>,
) -> Option<Vec<String>> {
    match obj.get(name) {
        Some(Value::Array(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                match item {
                    Value::String(s) => out.push(s.clone()),
                    other => {
                        faults.push(fault(
                            &format!("{}{}[{}]", prefix, name, i),
                            &format!("expected string, got {}", type_name(other)),
                        ));
                    }
                }
            }
            if out.len() == items.len() {
                Some(out)
            } else {
                None
            }
        }
        Some(other) => {
            faults.push(fault(
                &format!("{}{}", prefix, name),
                &format!("expected array of strings, got {}", type_name(other)),
            ));
            None
        }
        None => {
            faults.push(fault(&format!("{}{}", prefix, name), "missing"));
            None
        }
    }
}
