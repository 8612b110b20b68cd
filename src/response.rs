//! Parsing and validation of model replies.
//!
//! Every reply must be exactly one JSON object with a `reason` and the
//! kind-specific answer key. Selections are checked for exact membership in
//! the option set that was offered; nothing is coerced.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::field::{FieldKind, FieldOption};

/// The resolved value for one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Selected(String),
    SelectedMany(Vec<String>),
    Checkbox(bool),
    Text(String),
}

impl Outcome {
    /// Human-readable form for status updates.
    pub fn display_value(&self, options: &[FieldOption]) -> String {
        let text_for = |id: &str| {
            options
                .iter()
                .find(|o| o.id == id)
                .map(|o| o.option_text.clone())
                .unwrap_or_else(|| id.to_string())
        };
        match self {
            Outcome::Selected(id) => text_for(id),
            Outcome::SelectedMany(ids) => ids.iter().map(|id| text_for(id)).collect::<Vec<_>>().join(", "),
            Outcome::Checkbox(checked) => if *checked { "checked" } else { "unchecked" }.to_string(),
            Outcome::Text(value) => value.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AiResponse {
    pub reason: String,
    pub outcome: Outcome,
}

#[derive(Deserialize)]
struct SelectionReply {
    reason: String,
    id: String,
}

#[derive(Deserialize)]
struct MultiSelectionReply {
    reason: String,
    ids: Vec<String>,
}

#[derive(Deserialize)]
struct CheckboxReply {
    reason: String,
    checked: bool,
}

#[derive(Deserialize)]
struct TextReply {
    reason: String,
    value: String,
}

/// Strip an optional markdown code fence around a reply.
fn strip_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Parse a reply that must consist of a single JSON object.
pub fn parse_object<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let body = strip_fence(raw);
    if !(body.starts_with('{') && body.ends_with('}')) {
        return Err(Error::invalid_json("reply is not a single JSON object", raw));
    }
    serde_json::from_str(body).map_err(|e| Error::AiInvalidJson {
        message: e.to_string(),
        raw: raw.to_string(),
        source: Some(e),
    })
}

fn require_reason(reason: String, raw: &str) -> Result<String> {
    if reason.trim().is_empty() {
        return Err(Error::invalid_json("'reason' is empty", raw));
    }
    Ok(reason)
}

/// Strict set-membership check of a selected id.
pub fn validate_selection(id: &str, options: &[FieldOption]) -> Result<()> {
    if options.iter().any(|o| o.id == id) {
        Ok(())
    } else {
        Err(Error::AiInvalidSelection {
            id: id.to_string(),
            allowed: options.iter().map(|o| o.id.clone()).collect(),
        })
    }
}

/// Parse and validate a reply for a field of `kind` offered `options`.
pub fn parse_reply(kind: FieldKind, raw: &str, options: &[FieldOption]) -> Result<AiResponse> {
    let (reason, outcome) = match kind {
        FieldKind::Select | FieldKind::RadioGroup => {
            let reply: SelectionReply = parse_object(raw)?;
            validate_selection(&reply.id, options)?;
            (reply.reason, Outcome::Selected(reply.id))
        }
        FieldKind::MultiSelect => {
            let reply: MultiSelectionReply = parse_object(raw)?;
            if reply.ids.is_empty() {
                return Err(Error::AiInvalidSelection {
                    id: String::new(),
                    allowed: options.iter().map(|o| o.id.clone()).collect(),
                });
            }
            for id in &reply.ids {
                validate_selection(id, options)?;
            }
            (reply.reason, Outcome::SelectedMany(reply.ids))
        }
        FieldKind::Checkbox => {
            let reply: CheckboxReply = parse_object(raw)?;
            (reply.reason, Outcome::Checkbox(reply.checked))
        }
        FieldKind::Text => {
            let reply: TextReply = parse_object(raw)?;
            (reply.reason, Outcome::Text(reply.value))
        }
    };
    Ok(AiResponse {
        reason: require_reason(reason, raw)?,
        outcome,
    })
}
