//! Field classification: which handler a scanned control belongs to, and
//! whether it should be touched on the current pass.

use crate::config::SelectorConfig;
use crate::field::{FieldHandle, FieldKind, FormField, ScannedField};

/// Which pass over the page is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// First pass on a page: fill everything that is still empty.
    Initial,
    /// After a failed navigation: only refill what the page flags invalid.
    Retry,
}

/// Text-like `<input>` types.
const TEXT_INPUT_TYPES: &[&str] = &["", "text", "email", "tel", "number", "url", "search", "date"];

/// Determine a field's kind from its attributes. `None` means the control is
/// not something the filler handles and it is left alone.
pub fn classify(field: &ScannedField, selectors: &SelectorConfig) -> Option<FieldKind> {
    let tag = field.tag.to_ascii_lowercase();
    let input_type = field.input_type.to_ascii_lowercase();

    if field.aria_haspopup.eq_ignore_ascii_case("listbox") {
        return Some(FieldKind::Select);
    }
    if !field.widget_type.is_empty()
        && field
            .widget_type
            .eq_ignore_ascii_case(&selectors.multi_select_widget)
    {
        return Some(FieldKind::MultiSelect);
    }
    if tag == "fieldset" || input_type == "radio" || field.role.eq_ignore_ascii_case("radiogroup") {
        return Some(FieldKind::RadioGroup);
    }
    if tag == "input" && input_type == "checkbox" {
        return Some(FieldKind::Checkbox);
    }
    if tag == "select" {
        return Some(FieldKind::Select);
    }
    if tag == "textarea" || (tag == "input" && TEXT_INPUT_TYPES.contains(&input_type.as_str())) {
        return Some(FieldKind::Text);
    }
    None
}

/// Classify a scanned control and decide whether it is processed on `pass`.
pub fn prepare(field: ScannedField, pass: Pass, selectors: &SelectorConfig) -> Option<FormField> {
    if field.label.trim().is_empty() {
        tracing::debug!(handle = %field.handle, "skipping field without a label");
        return None;
    }
    let Some(kind) = classify(&field, selectors) else {
        tracing::debug!(label = %field.label, tag = %field.tag, "unrecognized field kind");
        return None;
    };

    let form_field = FormField {
        label: field.label.trim().to_string(),
        handle: FieldHandle(field.handle),
        kind,
        options: field.options,
        value: field.value,
        checked: field.checked,
        invalid: field.invalid,
        context: field.context,
    };

    let wanted = match pass {
        Pass::Initial => !form_field.is_filled(),
        Pass::Retry => form_field.invalid,
    };
    wanted.then_some(form_field)
}
