use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use jobfill::command::{self, Command, ReplyStatus};
use jobfill::{
    ButtonInfo, Config, Error, FieldOption, FormField, FormFiller, FormSurface, Outcome,
    PageOutcome, ScannedField, StatusChannel, TextGenerator,
};

// ── Test doubles ────────────────────────────────────────────────────

/// Answers prompts with a closure and records every prompt it saw.
struct ScriptedLlm {
    answer: Box<dyn Fn(&str) -> String + Send + Sync>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    fn new(answer: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Self {
            answer: Box::new(answer),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn button_prompts(&self) -> usize {
        self.prompts().iter().filter(|p| is_button_prompt(p)).count()
    }
}

#[async_trait]
impl TextGenerator for ScriptedLlm {
    async fn generate(&self, prompt: &str) -> jobfill::Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok((self.answer)(prompt))
    }
}

fn is_button_prompt(prompt: &str) -> bool {
    prompt.contains("These buttons are visible")
}

#[derive(Default)]
struct MockState {
    steps: Vec<String>,
    fields: Vec<Vec<ScannedField>>,
    current: usize,
    /// Clicks on next that leave the page where it is before it advances.
    stuck_clicks: usize,
    buttons: Vec<ButtonInfo>,
    popup_options: HashMap<String, Vec<FieldOption>>,
    /// Fields that appear right after the labelled field once it is answered.
    reveals: HashMap<String, ScannedField>,
    /// Handle of the field whose popup is currently open.
    open_popup: Option<String>,
    /// Scans after this many succeed no more.
    scan_limit: Option<usize>,
    scans: usize,
    next_clicks: usize,
    activated: Vec<String>,
    applied: Vec<(String, Outcome)>,
}

/// An in-memory application form with a list of steps.
struct MockSurface {
    state: Mutex<MockState>,
}

impl MockSurface {
    fn new(steps: &[&str], fields: Vec<Vec<ScannedField>>) -> Self {
        Self {
            state: Mutex::new(MockState {
                steps: steps.iter().map(|s| s.to_string()).collect(),
                fields,
                buttons: vec![
                    ButtonInfo { text: "Back".into(), id: "back".into() },
                    ButtonInfo { text: "Save and Continue".into(), id: "next".into() },
                ],
                ..Default::default()
            }),
        }
    }

    fn stuck_for(self, clicks: usize) -> Self {
        self.state.lock().unwrap().stuck_clicks = clicks;
        self
    }

    fn with_popup(self, handle: &str, options: Vec<FieldOption>) -> Self {
        self.state
            .lock()
            .unwrap()
            .popup_options
            .insert(handle.to_string(), options);
        self
    }

    fn with_reveal(self, after_label: &str, field: ScannedField) -> Self {
        self.state
            .lock()
            .unwrap()
            .reveals
            .insert(after_label.to_string(), field);
        self
    }

    fn failing_scans_after(self, scans: usize) -> Self {
        self.state.lock().unwrap().scan_limit = Some(scans);
        self
    }

    fn with_buttons(self, buttons: Vec<ButtonInfo>) -> Self {
        self.state.lock().unwrap().buttons = buttons;
        self
    }

    fn applied(&self) -> Vec<(String, Outcome)> {
        self.state.lock().unwrap().applied.clone()
    }

    fn activated(&self) -> Vec<String> {
        self.state.lock().unwrap().activated.clone()
    }

    fn next_clicks(&self) -> usize {
        self.state.lock().unwrap().next_clicks
    }

    fn scans(&self) -> usize {
        self.state.lock().unwrap().scans
    }

    fn current(&self) -> usize {
        self.state.lock().unwrap().current
    }

    fn open_popup(&self) -> Option<String> {
        self.state.lock().unwrap().open_popup.clone()
    }
}

#[async_trait]
impl FormSurface for MockSurface {
    async fn scan(&self) -> jobfill::Result<Vec<ScannedField>> {
        let mut state = self.state.lock().unwrap();
        state.scans += 1;
        if state.scan_limit.is_some_and(|limit| state.scans > limit) {
            return Err(Error::JsError("page script failed".into()));
        }
        Ok(state.fields.get(state.current).cloned().unwrap_or_default())
    }

    async fn options(&self, field: &FormField) -> jobfill::Result<Vec<FieldOption>> {
        if !field.options.is_empty() {
            return Ok(field.options.clone());
        }
        let mut state = self.state.lock().unwrap();
        let options = state
            .popup_options
            .get(&field.handle.0)
            .cloned()
            .ok_or_else(|| Error::MissingDomStructure(field.label.clone()))?;
        state.open_popup = Some(field.handle.0.clone());
        Ok(options)
    }

    async fn dismiss(&self, field: &FormField) -> jobfill::Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.open_popup.as_deref() == Some(field.handle.0.as_str()) {
            state.open_popup = None;
        }
        Ok(())
    }

    async fn apply(&self, field: &FormField, outcome: &Outcome) -> jobfill::Result<()> {
        let mut state = self.state.lock().unwrap();
        match outcome {
            Outcome::Selected(id) => state.activated.push(id.clone()),
            Outcome::SelectedMany(ids) => state.activated.extend(ids.iter().cloned()),
            _ => {}
        }
        // Picking an option closes its popup.
        if matches!(outcome, Outcome::Selected(_) | Outcome::SelectedMany(_)) {
            state.open_popup = None;
        }
        state.applied.push((field.label.clone(), outcome.clone()));

        let revealed = state.reveals.remove(&field.label);
        let current = state.current;
        if let Some(fields) = state.fields.get_mut(current) {
            let Some(pos) = fields.iter().position(|f| f.handle == field.handle.0) else {
                return Err(Error::ElementNotFound(field.label.clone()));
            };
            match outcome {
                Outcome::Text(value) => fields[pos].value = value.clone(),
                Outcome::Selected(id) => fields[pos].value = id.clone(),
                Outcome::SelectedMany(ids) => fields[pos].value = ids.join(", "),
                Outcome::Checkbox(checked) => fields[pos].checked = Some(*checked),
            }
            if let Some(revealed) = revealed {
                fields.insert(pos + 1, revealed);
            }
        }
        Ok(())
    }

    async fn progress_text(&self) -> jobfill::Result<String> {
        let state = self.state.lock().unwrap();
        Ok(state.steps.get(state.current).cloned().unwrap_or_default())
    }

    async fn buttons(&self) -> jobfill::Result<Vec<ButtonInfo>> {
        Ok(self.state.lock().unwrap().buttons.clone())
    }

    async fn click(&self, id: &str) -> jobfill::Result<()> {
        let mut state = self.state.lock().unwrap();
        if !state.buttons.iter().any(|b| b.id == id) {
            return Err(Error::ElementNotFound(id.to_string()));
        }
        if id != "next" {
            return Ok(());
        }
        state.next_clicks += 1;
        if state.stuck_clicks > 0 {
            state.stuck_clicks -= 1;
            // After a rejected save the page flags what it did not accept.
            let current = state.current;
            if let Some(fields) = state.fields.get_mut(current) {
                for field in fields.iter_mut().filter(|f| f.label.contains("Email")) {
                    field.invalid = true;
                }
            }
        } else if state.current + 1 < state.steps.len() {
            state.current += 1;
        }
        Ok(())
    }
}

// ── Fixtures ────────────────────────────────────────────────────────

fn config() -> Config {
    let mut config = Config::default();
    config.fill.profile = "Ada Lovelace, ada@example.com, authorized to work in the UK".into();
    config.fill.settle_delay_ms = 0;
    config.fill.typing_delay_ms = 0;
    config.fill.popup_delay_ms = 0;
    config
}

fn text_field(handle: &str, label: &str) -> ScannedField {
    ScannedField {
        handle: handle.into(),
        label: label.into(),
        tag: "input".into(),
        input_type: "text".into(),
        ..Default::default()
    }
}

fn popup_select(handle: &str, label: &str) -> ScannedField {
    ScannedField {
        handle: handle.into(),
        label: label.into(),
        tag: "button".into(),
        aria_haspopup: "listbox".into(),
        ..Default::default()
    }
}

fn checkbox(handle: &str, label: &str, checked: bool) -> ScannedField {
    ScannedField {
        handle: handle.into(),
        label: label.into(),
        tag: "input".into(),
        input_type: "checkbox".into(),
        checked: Some(checked),
        ..Default::default()
    }
}

fn radio_group(handle: &str, label: &str, options: Vec<FieldOption>) -> ScannedField {
    ScannedField {
        handle: handle.into(),
        label: label.into(),
        tag: "fieldset".into(),
        input_type: "radio".into(),
        options,
        ..Default::default()
    }
}

fn yes_no() -> Vec<FieldOption> {
    vec![FieldOption::new("Yes", "opt1"), FieldOption::new("No", "opt2")]
}

/// Answers every field sensibly and picks the "next" button.
fn cooperative(prompt: &str) -> String {
    if is_button_prompt(prompt) {
        return r#"{"reason":"continues the application","id":"next"}"#.into();
    }
    if prompt.contains(r#""checked": true | false"#) {
        return r#"{"reason":"applicant agrees","checked":true}"#.into();
    }
    if prompt.contains(r#""ids": ["#) {
        return r#"{"reason":"profile","ids":["opt1"]}"#.into();
    }
    if prompt.contains(r#""id": "<id of the chosen option>""#) {
        return r#"{"reason":"profile","id":"opt1"}"#.into();
    }
    r#"{"reason":"from profile","value":"Ada"}"#.into()
}

// ── Resolver behaviour ──────────────────────────────────────────────

#[tokio::test]
async fn selected_option_is_clicked_by_id() {
    let surface = MockSurface::new(
        &["Step 1 of 2", "Step 2 of 2"],
        vec![vec![popup_select("1", "Authorized to work?")]],
    )
    .with_popup("1", yes_no());
    let filler = FormFiller::new(ScriptedLlm::new(cooperative), &config());
    let mut session = filler.new_session();

    let report = filler.fill_page(&surface, &mut session).await.unwrap();

    assert_eq!(report.filled, 1);
    assert!(report.errors.is_empty());
    assert_eq!(surface.activated(), vec!["opt1".to_string()]);
    assert_eq!(
        surface.applied(),
        vec![("Authorized to work?".to_string(), Outcome::Selected("opt1".into()))]
    );
}

#[tokio::test]
async fn prompt_carries_label_options_and_step() {
    let llm = std::sync::Arc::new(ScriptedLlm::new(cooperative));
    let surface = MockSurface::new(
        &["Step 1 of 2", "Step 2 of 2"],
        vec![vec![popup_select("1", "Authorized to work?")]],
    )
    .with_popup("1", yes_no());
    let filler = FormFiller::new(llm.clone(), &config());
    let mut session = filler.new_session();

    filler.fill_page(&surface, &mut session).await.unwrap();

    let prompt = &llm.prompts()[0];
    assert!(prompt.contains("Authorized to work?"));
    assert!(prompt.contains(r#"[{"optionText":"Yes","id":"opt1"},{"optionText":"No","id":"opt2"}]"#));
    assert!(prompt.contains("Step 1 of 2"));
    assert!(prompt.contains("Ada Lovelace"));
}

#[tokio::test]
async fn selection_outside_option_set_is_rejected() {
    let surface = MockSurface::new(
        &["Step 1 of 2", "Step 2 of 2"],
        vec![vec![radio_group("1", "Do you require sponsorship?", yes_no())]],
    );
    let llm = ScriptedLlm::new(|prompt| {
        if is_button_prompt(prompt) {
            r#"{"reason":"next","id":"next"}"#.into()
        } else {
            r#"{"reason":"closest match","id":"Yes"}"#.into()
        }
    });
    let filler = FormFiller::new(llm, &config());
    let mut session = filler.new_session();

    let report = filler.fill_page(&surface, &mut session).await.unwrap();

    assert_eq!(report.filled, 0);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].code(), "RADIO_GROUP_AI_INVALID_SELECTION");
    assert!(surface.applied().is_empty());
}

#[tokio::test]
async fn malformed_reply_leaves_field_and_continues() {
    let surface = MockSurface::new(
        &["Step 1 of 2", "Step 2 of 2"],
        vec![vec![text_field("1", "First Name"), text_field("2", "Last Name")]],
    );
    let llm = std::sync::Arc::new(ScriptedLlm::new(|prompt| {
        if is_button_prompt(prompt) {
            r#"{"reason":"next","id":"next"}"#.into()
        } else if prompt.contains("\"First Name\"") {
            "My answer is Ada".into()
        } else {
            r#"{"reason":"profile","value":"Lovelace"}"#.into()
        }
    }));
    let filler = FormFiller::new(llm.clone(), &config());
    let mut session = filler.new_session();

    let report = filler.fill_page(&surface, &mut session).await.unwrap();

    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].code(), "TEXT_AI_INVALID_JSON");
    assert_eq!(report.errors[0].label, "First Name");
    assert_eq!(
        surface.applied(),
        vec![("Last Name".to_string(), Outcome::Text("Lovelace".into()))]
    );
    assert!(matches!(report.outcome, PageOutcome::Advanced { .. }));
    // The failed field stays empty but is not asked about again in the pass.
    assert_eq!(llm.prompts().iter().filter(|p| p.contains("\"First Name\"")).count(), 1);
}

#[tokio::test]
async fn missing_popup_options_is_field_level() {
    let surface = MockSurface::new(
        &["Step 1 of 2", "Step 2 of 2"],
        vec![vec![popup_select("1", "Country"), text_field("2", "City")]],
    )
    .with_popup("1", Vec::new());
    let filler = FormFiller::new(ScriptedLlm::new(cooperative), &config());
    let mut session = filler.new_session();

    let report = filler.fill_page(&surface, &mut session).await.unwrap();

    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].code(), "SELECT_NO_OPTIONS_FOUND");
    assert_eq!(report.filled, 1);
    assert_eq!(surface.open_popup(), None);
}

#[tokio::test]
async fn popup_is_closed_when_the_choice_is_rejected() {
    let surface = MockSurface::new(
        &["Step 1 of 2", "Step 2 of 2"],
        vec![vec![popup_select("1", "Country"), text_field("2", "City")]],
    )
    .with_popup("1", yes_no());
    let llm = ScriptedLlm::new(|prompt| {
        if prompt.contains("\"Country\"") {
            r#"{"reason":"closest","id":"United Kingdom"}"#.into()
        } else {
            cooperative(prompt)
        }
    });
    let filler = FormFiller::new(llm, &config());
    let mut session = filler.new_session();

    let report = filler.fill_page(&surface, &mut session).await.unwrap();

    assert_eq!(report.errors[0].code(), "SELECT_AI_INVALID_SELECTION");
    assert_eq!(surface.open_popup(), None);
    assert_eq!(
        surface.applied(),
        vec![("City".to_string(), Outcome::Text("Ada".into()))]
    );
}

#[tokio::test]
async fn field_revealed_by_an_answer_is_filled_in_the_same_pass() {
    let llm = std::sync::Arc::new(ScriptedLlm::new(cooperative));
    let surface = MockSurface::new(
        &["Step 1 of 2", "Step 2 of 2"],
        vec![vec![
            radio_group("1", "Require sponsorship?", yes_no()),
            text_field("3", "Email"),
        ]],
    )
    .with_reveal("Require sponsorship?", text_field("2", "Visa type"));
    let filler = FormFiller::new(llm.clone(), &config());
    let mut session = filler.new_session();

    let report = filler.fill_page(&surface, &mut session).await.unwrap();

    let labels: Vec<_> = surface.applied().into_iter().map(|(label, _)| label).collect();
    assert_eq!(labels, vec!["Require sponsorship?", "Visa type", "Email"]);
    assert_eq!(report.filled, 3);
    assert_eq!(report.passes, 1);
    assert_eq!(surface.next_clicks(), 1);
    assert!(llm.prompts().iter().any(|p| p.contains("\"Visa type\"")));
}

#[tokio::test]
async fn checkbox_untouched_when_already_in_desired_state() {
    let surface = MockSurface::new(
        &["Step 1 of 2", "Step 2 of 2"],
        vec![vec![
            checkbox("1", "I agree to the terms", true),
            checkbox("2", "Subscribe to job alerts", false),
        ]],
    );
    // `cooperative` always wants the box checked.
    let filler = FormFiller::new(ScriptedLlm::new(cooperative), &config());
    let mut session = filler.new_session();

    let report = filler.fill_page(&surface, &mut session).await.unwrap();

    assert_eq!(report.filled, 2);
    assert_eq!(
        surface.applied(),
        vec![("Subscribe to job alerts".to_string(), Outcome::Checkbox(true))]
    );
}

#[tokio::test]
async fn filled_and_unlabeled_fields_are_not_sent_to_the_model() {
    let mut filled = text_field("1", "Email");
    filled.value = "ada@example.com".into();
    let unlabeled = text_field("2", "");
    let mut upload = text_field("3", "Resume");
    upload.input_type = "file".into();

    let llm = std::sync::Arc::new(ScriptedLlm::new(cooperative));
    let surface = MockSurface::new(
        &["Step 1 of 2", "Step 2 of 2"],
        vec![vec![filled, unlabeled, upload, text_field("4", "Phone")]],
    );
    let filler = FormFiller::new(llm.clone(), &config());
    let mut session = filler.new_session();

    let report = filler.fill_page(&surface, &mut session).await.unwrap();

    assert_eq!(report.filled, 1);
    assert_eq!(report.skipped, 3);
    let field_prompts: Vec<_> = llm.prompts().into_iter().filter(|p| !is_button_prompt(p)).collect();
    assert_eq!(field_prompts.len(), 1);
    assert!(field_prompts[0].contains("\"Phone\""));
}

#[tokio::test]
async fn repeated_labels_are_resolved_independently() {
    let llm = std::sync::Arc::new(ScriptedLlm::new(cooperative));
    let surface = MockSurface::new(
        &["Step 1 of 2", "Step 2 of 2"],
        vec![vec![text_field("1", "Start Date"), text_field("2", "Start Date")]],
    );
    let filler = FormFiller::new(llm.clone(), &config());
    let mut session = filler.new_session();

    let report = filler.fill_page(&surface, &mut session).await.unwrap();

    assert_eq!(report.filled, 2);
    assert_eq!(llm.prompts().iter().filter(|p| p.contains("\"Start Date\"")).count(), 2);
}

#[tokio::test]
async fn status_updates_report_label_reason_and_value() {
    let status = StatusChannel::default();
    let mut rx = status.subscribe();
    let surface = MockSurface::new(
        &["Step 1 of 2", "Step 2 of 2"],
        vec![vec![popup_select("1", "Authorized to work?")]],
    )
    .with_popup("1", yes_no());
    let filler = FormFiller::with_status(ScriptedLlm::new(cooperative), &config(), status);
    let mut session = filler.new_session();

    filler.fill_page(&surface, &mut session).await.unwrap();

    let update = rx.recv().await.unwrap();
    assert!(update.action.contains("Authorized to work?"));
    assert_eq!(update.reason, "profile");
    assert_eq!(update.value, "Yes");
}

// ── Navigation and retries ──────────────────────────────────────────

#[tokio::test]
async fn advancing_resets_retry_budget() {
    let surface = MockSurface::new(
        &["Step 1 of 3", "Step 2 of 3", "Step 3 of 3"],
        vec![vec![text_field("1", "Email")], vec![text_field("2", "Phone")]],
    )
    .stuck_for(1);
    let filler = FormFiller::new(ScriptedLlm::new(cooperative), &config());
    let mut session = filler.new_session();

    let report = filler.fill_page(&surface, &mut session).await.unwrap();

    assert_eq!(
        report.outcome,
        PageOutcome::Advanced {
            from: "Step 1 of 3".into(),
            to: "Step 2 of 3".into()
        }
    );
    assert_eq!(report.passes, 2);
    assert_eq!(surface.next_clicks(), 2);
    assert_eq!(surface.current(), 1);
    assert_eq!(session.page.retry_budget, 3);
    assert_eq!(session.page.current_step, "Step 2 of 3");
}

#[tokio::test]
async fn retry_pass_only_refills_invalid_fields() {
    let llm = std::sync::Arc::new(ScriptedLlm::new(cooperative));
    let surface = MockSurface::new(
        &["Step 1 of 2", "Step 2 of 2"],
        vec![vec![text_field("1", "Email"), text_field("2", "Phone")]],
    )
    .stuck_for(1);
    let filler = FormFiller::new(llm.clone(), &config());
    let mut session = filler.new_session();

    let report = filler.fill_page(&surface, &mut session).await.unwrap();

    // Initial pass fills both, the retry pass only the flagged Email field.
    assert_eq!(report.filled, 3);
    let labels: Vec<_> = surface.applied().into_iter().map(|(label, _)| label).collect();
    assert_eq!(labels, vec!["Email", "Phone", "Email"]);
}

#[tokio::test]
async fn stuck_page_exhausts_retries() {
    let surface = MockSurface::new(
        &["Step 1 of 2", "Step 2 of 2"],
        vec![vec![text_field("1", "Email")]],
    )
    .stuck_for(usize::MAX);
    let filler = FormFiller::new(ScriptedLlm::new(cooperative), &config());
    let mut session = filler.new_session();

    let err = filler.fill_page(&surface, &mut session).await.unwrap_err();

    match err {
        Error::MaxRetriesExceeded { ref step, attempts } => {
            assert_eq!(step, "Step 1 of 2");
            assert_eq!(attempts, 3);
        }
        ref other => panic!("expected MaxRetriesExceeded, got {other:?}"),
    }
    assert!(err.is_page_level());
    assert_eq!(surface.next_clicks(), 3);
    // Each of the three passes scans once to pick Email and once to find
    // nothing left.
    assert_eq!(surface.scans(), 6);
    assert_eq!(surface.applied().len(), 3);
    assert_eq!(surface.current(), 0);
    assert_eq!(session.page.retry_budget, 3);
}

#[tokio::test]
async fn scan_failure_fails_the_page_and_resets_budget() {
    let surface = MockSurface::new(
        &["Step 1 of 2", "Step 2 of 2"],
        vec![vec![text_field("1", "Email")]],
    )
    .stuck_for(1)
    .failing_scans_after(2);
    let filler = FormFiller::new(ScriptedLlm::new(cooperative), &config());
    let mut session = filler.new_session();

    let err = filler.fill_page(&surface, &mut session).await.unwrap_err();

    assert_eq!(err.code(), "JS_ERROR");
    assert_eq!(surface.next_clicks(), 1);
    assert_eq!(session.page.retry_budget, 3);
    assert_eq!(session.page.current_step, "Step 1 of 2");
}

#[tokio::test]
async fn smaller_budget_fails_sooner() {
    let mut cfg = config();
    cfg.fill.max_retries = 2;
    let surface = MockSurface::new(
        &["Step 1 of 2", "Step 2 of 2"],
        vec![vec![text_field("1", "Email")]],
    )
    .stuck_for(2);
    let filler = FormFiller::new(ScriptedLlm::new(cooperative), &cfg);
    let mut session = filler.new_session();

    let err = filler.fill_page(&surface, &mut session).await.unwrap_err();
    assert_eq!(err.code(), "MAX_RETRIES_EXCEEDED");
    assert_eq!(surface.next_clicks(), 2);
}

#[tokio::test]
async fn next_button_is_resolved_once_and_cached() {
    let llm = std::sync::Arc::new(ScriptedLlm::new(cooperative));
    let surface = MockSurface::new(
        &["Step 1 of 3", "Step 2 of 3", "Step 3 of 3"],
        vec![vec![text_field("1", "Email")], vec![text_field("2", "Phone")]],
    );
    let filler = FormFiller::new(llm.clone(), &config());
    let mut session = filler.new_session();

    let reports = filler.run(&surface, &mut session).await.unwrap();

    assert_eq!(reports.len(), 3);
    assert_eq!(llm.button_prompts(), 1);
    assert_eq!(session.next_button.as_deref(), Some("next"));
    assert_eq!(surface.next_clicks(), 2);
    assert_eq!(
        reports.last().unwrap().outcome,
        PageOutcome::FinalStep { step: "Step 3 of 3".into() }
    );
}

#[tokio::test]
async fn invalid_button_choices_are_retried_then_fail() {
    let llm = std::sync::Arc::new(ScriptedLlm::new(|prompt| {
        if is_button_prompt(prompt) {
            r#"{"reason":"looks right","id":"submit-everything"}"#.into()
        } else {
            cooperative(prompt)
        }
    }));
    let surface = MockSurface::new(&["Step 1 of 2", "Step 2 of 2"], vec![vec![]]);
    let filler = FormFiller::new(llm.clone(), &config());
    let mut session = filler.new_session();

    let err = filler.fill_page(&surface, &mut session).await.unwrap_err();

    assert!(matches!(err, Error::NavigationNotFound(_)));
    assert_eq!(llm.button_prompts(), 3);
    assert_eq!(surface.next_clicks(), 0);
}

#[tokio::test]
async fn button_resolution_recovers_from_one_bad_answer() {
    let calls = std::sync::Arc::new(Mutex::new(0usize));
    let seen = calls.clone();
    let llm = ScriptedLlm::new(move |prompt| {
        if is_button_prompt(prompt) {
            let mut n = seen.lock().unwrap();
            *n += 1;
            if *n == 1 {
                "the Save and Continue button".into()
            } else {
                r#"{"reason":"saves the step","id":"next"}"#.into()
            }
        } else {
            cooperative(prompt)
        }
    });
    let surface = MockSurface::new(&["Step 1 of 2", "Step 2 of 2"], vec![vec![]]);
    let filler = FormFiller::new(llm, &config());
    let mut session = filler.new_session();

    let report = filler.fill_page(&surface, &mut session).await.unwrap();

    assert!(matches!(report.outcome, PageOutcome::Advanced { .. }));
    assert_eq!(*calls.lock().unwrap(), 2);
}

#[tokio::test]
async fn stale_cached_button_is_resolved_again() {
    let llm = std::sync::Arc::new(ScriptedLlm::new(cooperative));
    let surface = MockSurface::new(&["Step 1 of 2", "Step 2 of 2"], vec![vec![]]);
    let filler = FormFiller::new(llm.clone(), &config());
    let mut session = filler.new_session();
    session.next_button = Some("old-next".into());

    filler.fill_page(&surface, &mut session).await.unwrap();

    assert_eq!(session.next_button.as_deref(), Some("next"));
    assert_eq!(llm.button_prompts(), 1);
}

#[tokio::test]
async fn page_without_buttons_cannot_navigate() {
    let surface = MockSurface::new(&["Step 1 of 2", "Step 2 of 2"], vec![vec![]]).with_buttons(Vec::new());
    let filler = FormFiller::new(ScriptedLlm::new(cooperative), &config());
    let mut session = filler.new_session();

    let err = filler.fill_page(&surface, &mut session).await.unwrap_err();
    assert_eq!(err.code(), "NAVIGATION_NOT_FOUND");
}

#[tokio::test]
async fn final_step_is_filled_but_not_submitted() {
    let surface = MockSurface::new(&["Step 2 of 2"], vec![vec![checkbox("1", "I certify", false)]]);
    let filler = FormFiller::new(ScriptedLlm::new(cooperative), &config());
    let mut session = filler.new_session();

    let report = filler.fill_page(&surface, &mut session).await.unwrap();

    assert_eq!(report.outcome, PageOutcome::FinalStep { step: "Step 2 of 2".into() });
    assert_eq!(report.filled, 1);
    assert_eq!(surface.next_clicks(), 0);
}

// ── Command interface ───────────────────────────────────────────────

#[tokio::test]
async fn start_filling_reports_success() {
    let surface = MockSurface::new(
        &["Step 1 of 2", "Step 2 of 2"],
        vec![vec![text_field("1", "Email")], vec![text_field("2", "Phone")]],
    );
    let filler = FormFiller::new(ScriptedLlm::new(cooperative), &config());
    let mut session = filler.new_session();

    let reply = command::handle(&filler, &surface, &mut session, &Command::StartFilling).await;

    assert_eq!(reply.status, ReplyStatus::Success);
    assert!(reply.message.contains("2 field(s) filled"), "{}", reply.message);
    assert!(reply.code.is_none());
}

#[tokio::test]
async fn failure_reply_carries_code_and_notifies() {
    let status = StatusChannel::default();
    let mut rx = status.subscribe();
    let surface = MockSurface::new(&["Step 1 of 2", "Step 2 of 2"], vec![vec![]]).stuck_for(usize::MAX);
    let filler = FormFiller::with_status(ScriptedLlm::new(cooperative), &config(), status);
    let mut session = filler.new_session();

    let reply = command::handle(&filler, &surface, &mut session, &Command::FillPage).await;

    assert_eq!(reply.status, ReplyStatus::Error);
    assert_eq!(reply.code.as_deref(), Some("MAX_RETRIES_EXCEEDED"));
    let update = rx.recv().await.unwrap();
    assert_eq!(update.action, "Autofill stopped");
}
