use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::Page as CrPage;
use chromiumoxide::page::ScreenshotParams;
use serde::de::DeserializeOwned;

use crate::config::{Config, FillConfig, SelectorConfig};
use crate::element::Element;
use crate::error::{Error, Result};
use crate::field::{ButtonInfo, FieldOption, FormField, ScannedField};
use crate::response::Outcome;
use crate::surface::FormSurface;

/// Attribute the scanner stamps on every field so it can be found again.
const HANDLE_ATTRIBUTE: &str = "data-jobfill-handle";

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Wrapper around a chromiumoxide Page that exposes the application form as a
/// [`FormSurface`].
pub struct Page {
    inner: CrPage,
    default_timeout: Duration,
    selectors: SelectorConfig,
    typing_delay: Duration,
    popup_delay: Duration,
}

impl Page {
    pub(crate) fn new(inner: CrPage, default_timeout: Duration) -> Self {
        let fill = FillConfig::default();
        Self {
            inner,
            default_timeout,
            selectors: SelectorConfig::default(),
            typing_delay: fill.typing_delay(),
            popup_delay: fill.popup_delay(),
        }
    }

    /// Use the selectors and delays from `config`.
    pub fn with_config(mut self, config: &Config) -> Self {
        self.selectors = config.selectors.clone();
        self.typing_delay = config.fill.typing_delay();
        self.popup_delay = config.fill.popup_delay();
        self
    }

    pub async fn title(&self) -> Result<String> {
        let title = self.inner.get_title().await?;
        Ok(title.unwrap_or_default())
    }

    /// Save a full-page PNG of the form, e.g. to review answers before the
    /// applicant submits.
    pub async fn screenshot_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(true)
            .build();
        self.inner
            .save_screenshot(params, path)
            .await
            .map_err(|e| Error::JsError(format!("screenshot to {} failed: {e}", path.display())))?;
        tracing::debug!(path = %path.display(), "saved screenshot");
        Ok(())
    }

    pub async fn find_element(&self, selector: &str) -> Result<Element> {
        self.inner
            .find_element(selector)
            .await
            .map(Element::new)
            .map_err(|e| Error::ElementNotFound(format!("{selector}: {e}")))
    }

    /// Wait until `selector` matches, polling until the page timeout runs
    /// out. Application portals render their forms well after `load`.
    pub async fn wait_for_selector(&self, selector: &str) -> Result<Element> {
        let deadline = tokio::time::Instant::now() + self.default_timeout;
        loop {
            match self.find_element(selector).await {
                Ok(el) => return Ok(el),
                Err(_) if tokio::time::Instant::now() < deadline => {
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
                Err(_) => return Err(Error::Timeout(selector.to_string())),
            }
        }
    }

    async fn field_element(&self, field: &FormField) -> Result<Element> {
        let selector = format!(r#"[{HANDLE_ATTRIBUTE}="{}"]"#, field.handle);
        self.find_element(&selector)
            .await
            .map_err(|_| Error::ElementNotFound(format!("field '{}'", field.label)))
    }

    // ── Script helpers ──────────────────────────────────────────────

    /// Evaluate a script that returns `JSON.stringify(...)` and decode it.
    async fn eval_json<T: DeserializeOwned>(&self, js: String) -> Result<T> {
        let result = self
            .inner
            .evaluate(js)
            .await
            .map_err(|e| Error::JsError(e.to_string()))?;
        let json_str: String = result
            .into_value()
            .map_err(|e| Error::JsError(e.to_string()))?;
        serde_json::from_str(&json_str).map_err(|e| Error::JsError(e.to_string()))
    }

    async fn eval_void(&self, js: String) -> Result<()> {
        self.inner
            .evaluate(js)
            .await
            .map_err(|e| Error::JsError(e.to_string()))?;
        Ok(())
    }

    /// Activate the element with DOM id `id`. `<option>`s are selected on
    /// their parent `<select>`; everything else is clicked.
    async fn activate_by_id(&self, id: &str) -> Result<()> {
        let id_js = js_string(id)?;
        let js = format!(
            r#"
            JSON.stringify((() => {{
                const el = document.getElementById({id_js});
                if (!el) return false;
                if (el.tagName === 'OPTION') {{
                    const select = el.closest('select');
                    select.value = el.value;
                    select.dispatchEvent(new Event('input', {{ bubbles: true }}));
                    select.dispatchEvent(new Event('change', {{ bubbles: true }}));
                    return true;
                }}
                el.scrollIntoView({{ block: 'center' }});
                el.click();
                return true;
            }})())
            "#
        );
        if self.eval_json::<bool>(js).await? {
            Ok(())
        } else {
            Err(Error::ElementNotFound(id.to_string()))
        }
    }

    /// Open a popup field and read the options of its listbox.
    async fn popup_options(&self, field: &FormField) -> Result<Vec<FieldOption>> {
        let el = self.field_element(field).await?;
        el.click().await?;
        tokio::time::sleep(self.popup_delay).await;

        let option_js = js_string(&self.selectors.listbox_option)?;
        let js = format!(
            r#"
            JSON.stringify((() => {{
                const items = Array.from(document.querySelectorAll({option_js}))
                    .filter(o => o.offsetWidth || o.offsetHeight || o.getClientRects().length);
                if (items.length === 0 && !document.querySelector('[role="listbox"]')) return null;
                window.__jobfillSeq = window.__jobfillSeq || 0;
                return items.map(o => {{
                    if (!o.id) o.id = 'jobfill-option-' + (++window.__jobfillSeq);
                    return {{ optionText: (o.innerText || o.textContent || '').trim(), id: o.id }};
                }});
            }})())
            "#
        );
        let options: Option<Vec<FieldOption>> = self.eval_json(js).await?;
        options.ok_or_else(|| {
            Error::MissingDomStructure(format!("no listbox opened for '{}'", field.label))
        })
    }

    async fn listbox_open(&self) -> Result<bool> {
        self.eval_json(
            r#"
            JSON.stringify(Array.from(document.querySelectorAll('[role="listbox"]'))
                .some(l => !!(l.offsetWidth || l.offsetHeight || l.getClientRects().length)))
            "#
            .to_string(),
        )
        .await
    }

    /// Type `value` one character at a time, firing `change` after each one.
    async fn type_slowly(&self, field: &FormField, value: &str) -> Result<()> {
        let el = self.field_element(field).await?;
        el.focus_for_input().await?;

        let selector = js_string(&format!(r#"[{HANDLE_ATTRIBUTE}="{}"]"#, field.handle))?;
        self.eval_void(format!(
            r#"
            (() => {{
                const el = document.querySelector({selector});
                const setter = Object.getOwnPropertyDescriptor(Object.getPrototypeOf(el), 'value').set;
                setter.call(el, '');
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
            }})()
            "#
        ))
        .await?;

        let fire_change = format!(
            "document.querySelector({selector}).dispatchEvent(new Event('change', {{ bubbles: true }}))"
        );
        for ch in value.chars() {
            el.send_keys(&ch.to_string()).await?;
            self.eval_void(fire_change.clone()).await?;
            tokio::time::sleep(self.typing_delay).await;
        }
        self.eval_void(format!("document.querySelector({selector}).blur()"))
            .await
    }
}

fn js_string(value: &str) -> Result<String> {
    serde_json::to_string(value).map_err(|e| Error::JsError(e.to_string()))
}

#[async_trait]
impl FormSurface for Page {
    async fn scan(&self) -> Result<Vec<ScannedField>> {
        let widget_attr = js_string(&self.selectors.widget_type_attribute)?;
        let selected_item = js_string(&self.selectors.selected_item)?;
        let js = format!(
            r#"
            JSON.stringify((() => {{
                const widgetAttr = {widget_attr};
                const selectedItem = {selected_item};
                const text = el => ((el && (el.innerText || el.textContent)) || '').trim();
                const visible = el => !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length);
                window.__jobfillSeq = window.__jobfillSeq || 0;
                const mark = el => {{
                    if (!el.dataset.jobfillHandle) el.dataset.jobfillHandle = String(++window.__jobfillSeq);
                    return el.dataset.jobfillHandle;
                }};

                const squash = s => (s || '').replace(/\s+/g, ' ').trim();
                // Label text without the text of controls nested inside it.
                const ownText = label => {{
                    const copy = label.cloneNode(true);
                    copy.querySelectorAll('input, select, textarea, button').forEach(n => n.remove());
                    return squash(copy.textContent);
                }};
                const byIds = ids => squash(ids).split(' ').filter(Boolean)
                    .map(id => text(document.getElementById(id))).filter(Boolean).join(' ');
                const labelOf = el => {{
                    const labelled = byIds(el.getAttribute('aria-labelledby'));
                    if (labelled) return labelled;
                    const labels = el.labels ? Array.from(el.labels) : [];
                    if (labels.length === 0 && el.id) {{
                        const pointing = document.querySelector('label[for="' + CSS.escape(el.id) + '"]');
                        if (pointing) labels.push(pointing);
                    }}
                    for (const label of labels) {{
                        const own = ownText(label);
                        if (own) return own;
                    }}
                    return squash(el.getAttribute('aria-label'));
                }};
                const skipTypes = ['radio', 'hidden', 'submit', 'button', 'reset', 'image'];

                const entries = [];
                for (const el of document.querySelectorAll('input, select, textarea, [aria-haspopup="listbox"]')) {{
                    if (!visible(el) || el.closest('[role="listbox"]')) continue;
                    const type = (el.getAttribute('type') || '').toLowerCase();
                    if (el.tagName === 'INPUT' && skipTypes.includes(type)) continue;
                    const label = labelOf(el);
                    if (label) entries.push({{ el, label }});
                }}
                const groupSelector = 'fieldset, [role="radiogroup"]';
                for (const group of document.querySelectorAll(groupSelector)) {{
                    const radios = Array.from(group.querySelectorAll('input[type="radio"]'));
                    if (radios.length === 0 || !visible(group)) continue;
                    // Only the innermost group owns its radios.
                    if (Array.from(group.querySelectorAll(groupSelector)).some(g => g.querySelector('input[type="radio"]'))) continue;
                    const legend = group.tagName === 'FIELDSET' ? group.querySelector('legend') : null;
                    const label = (legend && text(legend)) || labelOf(group);
                    if (label) entries.push({{ el: group, label, radios }});
                }}
                entries.sort((a, b) =>
                    a.el.compareDocumentPosition(b.el) & Node.DOCUMENT_POSITION_FOLLOWING ? -1 : 1);

                const filled = [];
                return entries.map(({{ el, label, radios }}) => {{
                    const tag = el.tagName.toLowerCase();
                    const type = (el.getAttribute('type') || '').toLowerCase();
                    const host = el.closest('[' + widgetAttr + ']');
                    const widgetType = host ? host.getAttribute(widgetAttr) : '';
                    let value = '';
                    let shown = '';
                    let checked = null;
                    let options = [];
                    let invalid = el.getAttribute('aria-invalid') === 'true';

                    if (radios) {{
                        options = radios.map(r => {{
                            if (!r.id) r.id = 'jobfill-radio-' + mark(r);
                            const lab = document.querySelector('label[for="' + CSS.escape(r.id) + '"]') || r.closest('label');
                            return {{ optionText: text(lab) || r.value, id: r.id }};
                        }});
                        const picked = options.find(o => document.getElementById(o.id).checked);
                        value = picked ? picked.id : '';
                        shown = picked ? picked.optionText : '';
                        invalid = invalid || radios.some(r => r.getAttribute('aria-invalid') === 'true');
                    }} else if (type === 'checkbox') {{
                        checked = el.checked;
                        shown = el.checked ? 'checked' : '';
                    }} else if (tag === 'select') {{
                        options = Array.from(el.options).filter(o => o.value !== '').map(o => {{
                            if (!o.id) o.id = 'jobfill-option-' + mark(o);
                            return {{ optionText: text(o), id: o.id }};
                        }});
                        value = el.value || '';
                        shown = el.selectedIndex >= 0 && value ? text(el.options[el.selectedIndex]) : '';
                    }} else if (tag === 'button') {{
                        value = el.getAttribute('value') || '';
                        shown = value ? text(el) : '';
                    }} else {{
                        value = el.value || '';
                        shown = value;
                    }}
                    if (host && !value) {{
                        value = Array.from(host.querySelectorAll(selectedItem)).map(text).join(', ');
                        shown = value;
                    }}

                    const entry = {{
                        handle: mark(el),
                        label,
                        tag,
                        inputType: radios ? 'radio' : type,
                        role: el.getAttribute('role') || '',
                        ariaHaspopup: el.getAttribute('aria-haspopup') || '',
                        widgetType,
                        value,
                        checked,
                        invalid,
                        options,
                        context: filled.slice(-6).join('\n'),
                    }};
                    if (shown) filled.push(label + ': ' + shown);
                    return entry;
                }});
            }})())
            "#
        );
        let fields: Vec<ScannedField> = self.eval_json(js).await?;
        tracing::debug!(count = fields.len(), "scanned form fields");
        Ok(fields)
    }

    async fn options(&self, field: &FormField) -> Result<Vec<FieldOption>> {
        if !field.options.is_empty() {
            return Ok(field.options.clone());
        }
        self.popup_options(field).await
    }

    async fn dismiss(&self, field: &FormField) -> Result<()> {
        // Static options never open anything.
        if !field.options.is_empty() || !self.listbox_open().await? {
            return Ok(());
        }
        let el = self.field_element(field).await?;
        el.press_key("Escape").await?;
        tokio::time::sleep(self.popup_delay).await;
        if self.listbox_open().await? {
            // Some widgets ignore Escape but toggle closed on a second click.
            el.click().await?;
            tokio::time::sleep(self.popup_delay).await;
        }
        tracing::debug!(label = %field.label, "closed options popup");
        Ok(())
    }

    async fn apply(&self, field: &FormField, outcome: &Outcome) -> Result<()> {
        match outcome {
            Outcome::Text(value) => self.type_slowly(field, value).await,
            Outcome::Checkbox(_) => self.field_element(field).await?.click().await,
            Outcome::Selected(id) => self.activate_by_id(id).await,
            Outcome::SelectedMany(ids) => {
                for id in ids {
                    match self.activate_by_id(id).await {
                        Ok(()) => {}
                        // The popup closes after each pick on some widgets.
                        Err(Error::ElementNotFound(_)) => {
                            self.field_element(field).await?.click().await?;
                            tokio::time::sleep(self.popup_delay).await;
                            self.activate_by_id(id).await?;
                        }
                        Err(e) => return Err(e),
                    }
                    tokio::time::sleep(self.popup_delay).await;
                }
                Ok(())
            }
        }
    }

    async fn progress_text(&self) -> Result<String> {
        let selector = js_string(&self.selectors.progress)?;
        self.eval_json(format!(
            r#"
            JSON.stringify((() => {{
                const el = document.querySelector({selector});
                return el ? (el.innerText || el.textContent || '').replace(/\s+/g, ' ').trim() : '';
            }})())
            "#
        ))
        .await
    }

    async fn buttons(&self) -> Result<Vec<ButtonInfo>> {
        let selector = js_string(&self.selectors.buttons)?;
        self.eval_json(format!(
            r#"
            JSON.stringify((() => {{
                window.__jobfillSeq = window.__jobfillSeq || 0;
                return Array.from(document.querySelectorAll({selector}))
                    .filter(b => (b.offsetWidth || b.offsetHeight || b.getClientRects().length) && !b.disabled)
                    .map(b => {{
                        if (!b.id) b.id = 'jobfill-button-' + (++window.__jobfillSeq);
                        const label = (b.innerText || b.value || b.getAttribute('aria-label') || '').trim();
                        return {{ text: label, id: b.id }};
                    }})
                    .filter(b => b.text);
            }})())
            "#
        ))
        .await
    }

    async fn click(&self, id: &str) -> Result<()> {
        self.activate_by_id(id).await
    }
}
