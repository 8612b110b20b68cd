//! Prompt composition for each field kind and for navigation.

use crate::field::{ButtonInfo, FieldKind, FieldOption, FormField};

const PREAMBLE: &str = "You are filling out a job application on behalf of the applicant \
described in the profile below. Answer only from the profile; when the profile is silent, \
choose the most reasonable answer for a typical applicant.";

const REPLY_RULES: &str = "Reply with exactly one JSON object and nothing else: \
no markdown, no commentary before or after it.";

fn schema_for(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Text => r#"{"reason": "<why>", "value": "<text to type>"}"#,
        FieldKind::Checkbox => r#"{"reason": "<why>", "checked": true | false}"#,
        FieldKind::Select | FieldKind::RadioGroup => {
            r#"{"reason": "<why>", "id": "<id of the chosen option>"}"#
        }
        FieldKind::MultiSelect => {
            r#"{"reason": "<why>", "ids": ["<id of a chosen option>", "..."]}"#
        }
    }
}

fn options_json(options: &[FieldOption]) -> String {
    serde_json::to_string(options).unwrap_or_else(|_| "[]".into())
}

/// Whether a snapshot of previously filled content is shown for `kind`.
fn uses_context(kind: FieldKind) -> bool {
    matches!(kind, FieldKind::Text | FieldKind::RadioGroup)
}

/// Build the instruction for resolving `field`, whose candidate options are
/// `options` (empty for free text).
pub fn field_prompt(profile: &str, step: &str, field: &FormField, options: &[FieldOption]) -> String {
    let mut prompt = format!("{PREAMBLE}\n\nApplicant profile:\n{profile}\n\n");
    prompt.push_str(&format!("Current application step: {step}\n"));

    if uses_context(field.kind) && !field.context.trim().is_empty() {
        prompt.push_str(&format!(
            "Fields already filled above this one:\n{}\n",
            field.context.trim()
        ));
    }

    let task = match field.kind {
        FieldKind::Text => format!("Provide the text to enter into the field \"{}\".", field.label),
        FieldKind::Checkbox => format!(
            "Decide whether the checkbox \"{}\" should be checked. It is currently {}.",
            field.label,
            if field.checked.unwrap_or(false) { "checked" } else { "unchecked" }
        ),
        FieldKind::Select => format!("Choose one option for the dropdown \"{}\".", field.label),
        FieldKind::RadioGroup => format!("Choose one answer for the question \"{}\".", field.label),
        FieldKind::MultiSelect => format!(
            "Choose one or more options for the multi-select field \"{}\".",
            field.label
        ),
    };
    prompt.push_str(&format!("\n{task}\n"));

    if field.kind.has_options() {
        prompt.push_str(&format!(
            "Options (use the \"id\" value exactly as written):\n{}\n",
            options_json(options)
        ));
    }

    prompt.push_str(&format!(
        "\n{REPLY_RULES}\nSchema: {}\n",
        schema_for(field.kind)
    ));
    prompt
}

/// Build the instruction for picking the control that saves the page and
/// moves to the next step.
pub fn next_button_prompt(step: &str, buttons: &[ButtonInfo]) -> String {
    let listing = serde_json::to_string(buttons).unwrap_or_else(|_| "[]".into());
    format!(
        "You are navigating a multi-step job application. Current step: {step}\n\
         These buttons are visible on the page:\n{listing}\n\n\
         Which button saves this step and continues to the next one? \
         Never pick a button that submits the whole application, cancels, or goes back.\n\n\
         {REPLY_RULES}\nSchema: {{\"reason\": \"<why>\", \"id\": \"<id of the button>\"}}\n"
    )
}
