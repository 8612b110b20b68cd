//! Message interface for whatever UI triggers a fill.

use serde::{Deserialize, Serialize};

use crate::filler::{FormFiller, PageOutcome, PageReport, SessionState};
use crate::llm::TextGenerator;
use crate::status::StatusUpdate;
use crate::surface::FormSurface;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Command {
    /// Fill every remaining page of the application.
    StartFilling,
    /// Fill the current page only.
    FillPage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub status: ReplyStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl Reply {
    fn success(message: impl Into<String>) -> Self {
        Self {
            status: ReplyStatus::Success,
            message: message.into(),
            code: None,
        }
    }
}

fn summarize(reports: &[PageReport]) -> String {
    let filled: usize = reports.iter().map(|r| r.filled).sum();
    let failed: usize = reports.iter().map(|r| r.errors.len()).sum();
    let last = reports.last().map(|r| match &r.outcome {
        PageOutcome::Advanced { to, .. } => format!("now on '{to}'"),
        PageOutcome::FinalStep { step } => format!("reached final step '{step}'"),
    });
    format!(
        "{} page(s), {filled} field(s) filled, {failed} left unfilled{}",
        reports.len(),
        last.map(|l| format!(", {l}")).unwrap_or_default()
    )
}

/// Run `command` and turn the result into a reply. Failures also go out on
/// the status channel as a generic notice.
pub async fn handle<G, S>(
    filler: &FormFiller<G>,
    surface: &S,
    session: &mut SessionState,
    command: &Command,
) -> Reply
where
    G: TextGenerator,
    S: FormSurface + ?Sized,
{
    tracing::info!(?command, "command received");
    let result = match command {
        Command::StartFilling => filler.run(surface, session).await,
        Command::FillPage => filler.fill_page(surface, session).await.map(|r| vec![r]),
    };

    match result {
        Ok(reports) => Reply::success(summarize(&reports)),
        Err(e) => {
            filler.status().send(StatusUpdate::failure());
            Reply {
                status: ReplyStatus::Error,
                message: e.to_string(),
                code: Some(e.code().to_string()),
            }
        }
    }
}
