//! Per-field value resolution: gather options, ask the model, validate the
//! reply, write it into the page and report what happened.

use crate::error::{Error, FieldError, Result};
use crate::field::{FieldKind, FieldOption, FormField};
use crate::llm::TextGenerator;
use crate::prompt;
use crate::response::{self, AiResponse, Outcome};
use crate::status::{StatusChannel, StatusUpdate};
use crate::surface::FormSurface;

pub struct Resolver<'a, G: ?Sized> {
    llm: &'a G,
    status: &'a StatusChannel,
    profile: &'a str,
}

impl<'a, G: TextGenerator + ?Sized> Resolver<'a, G> {
    pub fn new(llm: &'a G, status: &'a StatusChannel, profile: &'a str) -> Self {
        Self { llm, status, profile }
    }

    /// Resolve one field with the handler for its kind.
    pub async fn resolve<S: FormSurface + ?Sized>(
        &self,
        surface: &S,
        field: &FormField,
        step: &str,
    ) -> std::result::Result<AiResponse, FieldError> {
        let result = if field.label.trim().is_empty() {
            Err(Error::InvalidInput(format!("field {} has no label", field.handle)))
        } else {
            match field.kind {
                FieldKind::Text => self.fill_text(surface, field, step).await,
                FieldKind::Checkbox => self.fill_checkbox(surface, field, step).await,
                FieldKind::Select | FieldKind::MultiSelect | FieldKind::RadioGroup => {
                    self.fill_choice(surface, field, step).await
                }
            }
        };
        result.map_err(|e| FieldError::new(field.kind, field.label.clone(), e))
    }

    async fn ask(&self, field: &FormField, options: &[FieldOption], step: &str) -> Result<AiResponse> {
        let prompt = prompt::field_prompt(self.profile, step, field, options);
        let raw = self.llm.generate(&prompt).await?;
        response::parse_reply(field.kind, &raw, options)
    }

    async fn collect_options<S: FormSurface + ?Sized>(
        &self,
        surface: &S,
        field: &FormField,
    ) -> Result<Vec<FieldOption>> {
        let options = surface.options(field).await?;
        if options.is_empty() {
            return Err(Error::NoOptionsFound(field.label.clone()));
        }
        Ok(options)
    }

    fn report(&self, field: &FormField, reply: &AiResponse, options: &[FieldOption]) {
        self.status.send(StatusUpdate::new(
            format!("Filled \"{}\"", field.label),
            reply.reason.clone(),
            reply.outcome.display_value(options),
        ));
    }

    async fn fill_text<S: FormSurface + ?Sized>(
        &self,
        surface: &S,
        field: &FormField,
        step: &str,
    ) -> Result<AiResponse> {
        let reply = self.ask(field, &[], step).await?;
        if let Outcome::Text(ref value) = reply.outcome {
            if value.is_empty() {
                tracing::debug!(label = %field.label, "model left text field empty");
            } else {
                surface.apply(field, &reply.outcome).await?;
            }
        }
        self.report(field, &reply, &[]);
        Ok(reply)
    }

    async fn fill_checkbox<S: FormSurface + ?Sized>(
        &self,
        surface: &S,
        field: &FormField,
        step: &str,
    ) -> Result<AiResponse> {
        let reply = self.ask(field, &[], step).await?;
        let current = field.checked.unwrap_or(false);
        if reply.outcome != Outcome::Checkbox(current) {
            surface.apply(field, &reply.outcome).await?;
        } else {
            tracing::debug!(label = %field.label, checked = current, "checkbox already in desired state");
        }
        self.report(field, &reply, &[]);
        Ok(reply)
    }

    /// Option-based kinds: dropdowns, multi-selects and radio groups. A popup
    /// opened to read the options is closed again if the field fails, so it
    /// cannot cover the controls that come after it.
    async fn fill_choice<S: FormSurface + ?Sized>(
        &self,
        surface: &S,
        field: &FormField,
        step: &str,
    ) -> Result<AiResponse> {
        let result = self.choose(surface, field, step).await;
        if result.is_err() {
            if let Err(e) = surface.dismiss(field).await {
                tracing::warn!(label = %field.label, error = %e, "could not close options popup");
            }
        }
        result
    }

    async fn choose<S: FormSurface + ?Sized>(
        &self,
        surface: &S,
        field: &FormField,
        step: &str,
    ) -> Result<AiResponse> {
        let options = self.collect_options(surface, field).await?;
        let reply = self.ask(field, &options, step).await?;
        surface.apply(field, &reply.outcome).await?;
        self.report(field, &reply, &options);
        Ok(reply)
    }
}
