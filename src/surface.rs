use async_trait::async_trait;

use crate::error::Result;
use crate::field::{ButtonInfo, FieldOption, FormField, ScannedField};
use crate::response::Outcome;

/// The DOM capabilities the fill loop needs. `Page` implements this against a
/// live browser tab; tests implement it in memory.
#[async_trait]
pub trait FormSurface: Send + Sync {
    /// All labeled controls (and legend-labeled radio groups) on the page, in
    /// document order.
    async fn scan(&self) -> Result<Vec<ScannedField>>;

    /// Candidate options for an option-based field. May open a popup.
    async fn options(&self, field: &FormField) -> Result<Vec<FieldOption>>;

    /// Close whatever `options` opened for `field`. A no-op when nothing is
    /// open.
    async fn dismiss(&self, field: &FormField) -> Result<()>;

    /// Write a validated outcome into the field.
    async fn apply(&self, field: &FormField, outcome: &Outcome) -> Result<()>;

    /// Text of the progress indicator, empty when there is none.
    async fn progress_text(&self) -> Result<String>;

    /// Visible buttons with their identifiers.
    async fn buttons(&self) -> Result<Vec<ButtonInfo>>;

    /// Click the control with the given identifier.
    async fn click(&self, id: &str) -> Result<()>;
}
