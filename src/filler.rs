//! The page navigation loop.
//!
//! One call to [`FormFiller::fill_page`] walks a single logical page through
//! `Filling -> Navigating -> (Retrying -> Filling -> Navigating)* -> Done | Failed`.
//! Fields are resolved strictly one after another because filling one field
//! can reveal or hide others.

use std::collections::HashSet;

use serde::Deserialize;

use crate::classify::{self, Pass};
use crate::config::{Config, FillConfig, SelectorConfig};
use crate::error::{Error, FieldError, Result};
use crate::field::ButtonInfo;
use crate::llm::TextGenerator;
use crate::progress::StepProgress;
use crate::prompt;
use crate::resolver::Resolver;
use crate::response;
use crate::status::StatusChannel;
use crate::surface::FormSurface;

/// State of the page currently being processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageState {
    pub current_step: String,
    pub retry_budget: u32,
}

impl PageState {
    fn new(max_retries: u32) -> Self {
        Self {
            current_step: String::new(),
            retry_budget: max_retries,
        }
    }

    /// Spend one retry. Returns `false` once the budget is exhausted.
    pub fn consume_retry(&mut self) -> bool {
        self.retry_budget = self.retry_budget.saturating_sub(1);
        self.retry_budget > 0
    }

    fn reset(&mut self, step: String, max_retries: u32) {
        self.current_step = step;
        self.retry_budget = max_retries;
    }
}

/// Everything that survives across pages of one fill session.
#[derive(Debug, Clone)]
pub struct SessionState {
    /// Identifier of the "next/save" control once the model has picked it.
    pub next_button: Option<String>,
    pub page: PageState,
    max_retries: u32,
}

impl SessionState {
    pub fn new(max_retries: u32) -> Self {
        Self {
            next_button: None,
            page: PageState::new(max_retries),
            max_retries,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    /// The progress indicator changed after clicking next.
    Advanced { from: String, to: String },
    /// The last step was filled; the final submit is left to the applicant.
    FinalStep { step: String },
}

/// What happened on one page.
#[derive(Debug)]
pub struct PageReport {
    pub step: String,
    pub filled: usize,
    pub skipped: usize,
    pub passes: u32,
    pub errors: Vec<FieldError>,
    pub outcome: PageOutcome,
}

#[derive(Debug)]
enum LoopState {
    Filling(Pass),
    Navigating,
    Retrying,
    Done(PageOutcome),
    Failed(Error),
}

#[derive(Debug, Default)]
struct Tally {
    filled: usize,
    skipped: usize,
    passes: u32,
    errors: Vec<FieldError>,
}

#[derive(Deserialize)]
struct ButtonReply {
    reason: String,
    id: String,
}

pub struct FormFiller<G> {
    llm: G,
    status: StatusChannel,
    fill: FillConfig,
    selectors: SelectorConfig,
}

impl<G: TextGenerator> FormFiller<G> {
    pub fn new(llm: G, config: &Config) -> Self {
        Self::with_status(llm, config, StatusChannel::default())
    }

    pub fn with_status(llm: G, config: &Config, status: StatusChannel) -> Self {
        Self {
            llm,
            status,
            fill: config.fill.clone(),
            selectors: config.selectors.clone(),
        }
    }

    pub fn status(&self) -> &StatusChannel {
        &self.status
    }

    pub fn new_session(&self) -> SessionState {
        SessionState::new(self.fill.max_retries)
    }

    /// Fill pages until the final step has been filled or the page limit is
    /// reached.
    pub async fn run<S: FormSurface + ?Sized>(
        &self,
        surface: &S,
        session: &mut SessionState,
    ) -> Result<Vec<PageReport>> {
        let mut reports = Vec::new();
        for _ in 0..self.fill.max_pages {
            let report = self.fill_page(surface, session).await?;
            let finished = matches!(report.outcome, PageOutcome::FinalStep { .. });
            reports.push(report);
            if finished {
                return Ok(reports);
            }
        }
        tracing::warn!(max_pages = self.fill.max_pages, "page limit reached, stopping");
        Ok(reports)
    }

    /// Fill the current page and move past it.
    pub async fn fill_page<S: FormSurface + ?Sized>(
        &self,
        surface: &S,
        session: &mut SessionState,
    ) -> Result<PageReport> {
        let step = surface.progress_text().await?;
        if step != session.page.current_step {
            session.page.reset(step, session.max_retries);
        }
        tracing::info!(step = %session.page.current_step, "filling page");

        let mut tally = Tally::default();
        let mut state = LoopState::Filling(Pass::Initial);

        loop {
            state = match state {
                LoopState::Filling(pass) => {
                    let step = session.page.current_step.clone();
                    match self.fill_fields(surface, pass, &step, &mut tally).await {
                        Err(e) => LoopState::Failed(e),
                        Ok(()) if StepProgress::parse(&step).is_some_and(|p| p.is_final()) => {
                            LoopState::Done(PageOutcome::FinalStep { step })
                        }
                        Ok(()) => LoopState::Navigating,
                    }
                }
                LoopState::Navigating => match self.navigate(surface, session).await {
                    Ok(Some(outcome)) => LoopState::Done(outcome),
                    Ok(None) => LoopState::Retrying,
                    Err(e) => LoopState::Failed(e),
                },
                LoopState::Retrying => {
                    if session.page.consume_retry() {
                        tracing::warn!(
                            step = %session.page.current_step,
                            retries_left = session.page.retry_budget,
                            "page did not advance, refilling invalid fields"
                        );
                        LoopState::Filling(Pass::Retry)
                    } else {
                        LoopState::Failed(Error::MaxRetriesExceeded {
                            step: session.page.current_step.clone(),
                            attempts: session.max_retries,
                        })
                    }
                }
                LoopState::Done(outcome) => {
                    if let PageOutcome::Advanced { ref to, .. } = outcome {
                        session.page.reset(to.clone(), session.max_retries);
                    }
                    tracing::info!(?outcome, filled = tally.filled, failed = tally.errors.len(), "page done");
                    return Ok(PageReport {
                        step: match &outcome {
                            PageOutcome::Advanced { from, .. } => from.clone(),
                            PageOutcome::FinalStep { step } => step.clone(),
                        },
                        filled: tally.filled,
                        skipped: tally.skipped,
                        passes: tally.passes,
                        errors: tally.errors,
                        outcome,
                    });
                }
                LoopState::Failed(e) => {
                    let step = session.page.current_step.clone();
                    session.page.reset(step, session.max_retries);
                    tracing::error!(code = e.code(), error = %e, "page failed");
                    return Err(e);
                }
            };
        }
    }

    /// Resolve pending fields one at a time. The page is scanned again after
    /// every field because an answer can reveal, hide or relabel other
    /// controls. Each handle is attempted at most once per pass.
    async fn fill_fields<S: FormSurface + ?Sized>(
        &self,
        surface: &S,
        pass: Pass,
        step: &str,
        tally: &mut Tally,
    ) -> Result<()> {
        tally.passes += 1;
        let resolver = Resolver::new(&self.llm, &self.status, &self.fill.profile);
        let mut attempted: HashSet<String> = HashSet::new();

        loop {
            let scanned = surface.scan().await?;
            let seen = scanned.len();
            let done = scanned.iter().filter(|f| attempted.contains(&f.handle)).count();
            tracing::debug!(?pass, fields = seen, attempted = attempted.len(), "scanned page");

            let next = scanned
                .into_iter()
                .filter(|raw| !attempted.contains(&raw.handle))
                .find_map(|raw| classify::prepare(raw, pass, &self.selectors));
            let Some(field) = next else {
                tally.skipped += seen - done;
                return Ok(());
            };

            attempted.insert(field.handle.0.clone());
            match resolver.resolve(surface, &field, step).await {
                Ok(_) => tally.filled += 1,
                Err(e) => {
                    tracing::warn!(code = %e.code(), label = %e.label, error = %e.source, "field left unfilled");
                    tally.errors.push(e);
                }
            }
        }
    }

    /// Click next and compare the progress indicator. `Ok(None)` means the
    /// page did not change.
    async fn navigate<S: FormSurface + ?Sized>(
        &self,
        surface: &S,
        session: &mut SessionState,
    ) -> Result<Option<PageOutcome>> {
        let before = surface.progress_text().await?;
        self.click_next(surface, session, &before).await?;
        tokio::time::sleep(self.fill.settle_delay()).await;
        let after = surface.progress_text().await?;

        if after == before {
            Ok(None)
        } else {
            Ok(Some(PageOutcome::Advanced { from: before, to: after }))
        }
    }

    async fn click_next<S: FormSurface + ?Sized>(
        &self,
        surface: &S,
        session: &mut SessionState,
        step: &str,
    ) -> Result<()> {
        if let Some(id) = session.next_button.clone() {
            match surface.click(&id).await {
                Err(Error::ElementNotFound(_)) => {
                    tracing::info!(%id, "cached next button is gone, resolving again");
                    session.next_button = None;
                }
                other => return other,
            }
        }

        let id = self.resolve_next_button(surface, step).await?;
        surface.click(&id).await.map_err(|e| match e {
            Error::ElementNotFound(id) => Error::NavigationNotFound(id),
            other => other,
        })?;
        session.next_button = Some(id);
        Ok(())
    }

    /// Ask the model which visible button moves to the next step, up to
    /// `button_attempts` times.
    async fn resolve_next_button<S: FormSurface + ?Sized>(&self, surface: &S, step: &str) -> Result<String> {
        let buttons = surface.buttons().await?;
        if buttons.is_empty() {
            return Err(Error::NavigationNotFound("no visible buttons on the page".into()));
        }
        let prompt = prompt::next_button_prompt(step, &buttons);

        for attempt in 1..=self.fill.button_attempts {
            match self.pick_button(&prompt, &buttons).await {
                Ok(id) => {
                    tracing::info!(%id, attempt, "resolved next button");
                    return Ok(id);
                }
                Err(e) => tracing::warn!(attempt, code = e.code(), error = %e, "next button not resolved"),
            }
        }
        Err(Error::NavigationNotFound(format!(
            "no valid button chosen after {} attempts",
            self.fill.button_attempts
        )))
    }

    async fn pick_button(&self, prompt: &str, buttons: &[ButtonInfo]) -> Result<String> {
        let raw = self.llm.generate(prompt).await?;
        let reply: ButtonReply = response::parse_object(&raw)?;
        if reply.reason.trim().is_empty() {
            return Err(Error::invalid_json("'reason' is empty", &raw));
        }
        if !buttons.iter().any(|b| b.id == reply.id) {
            return Err(Error::AiInvalidSelection {
                id: reply.id,
                allowed: buttons.iter().map(|b| b.id.clone()).collect(),
            });
        }
        Ok(reply.id)
    }
}
