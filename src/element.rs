use chromiumoxide::element::Element as CrElement;

use crate::error::{Error, Result};

/// A located form control. Only the interactions the filler performs are
/// exposed.
pub struct Element {
    inner: CrElement,
}

impl Element {
    pub(crate) fn new(inner: CrElement) -> Self {
        Self { inner }
    }

    /// Click the control, e.g. to toggle a checkbox or open a popup listbox.
    pub async fn click(&self) -> Result<()> {
        self.inner.click().await.map_err(Error::CdpError)?;
        Ok(())
    }

    /// Bring the control on screen and give it keyboard focus.
    pub async fn focus_for_input(&self) -> Result<()> {
        self.inner.scroll_into_view().await.map_err(Error::CdpError)?;
        self.inner.focus().await.map_err(Error::CdpError)?;
        Ok(())
    }

    /// Press a single named key such as `Escape`.
    pub async fn press_key(&self, key: &str) -> Result<()> {
        self.inner.press_key(key).await.map_err(Error::CdpError)?;
        Ok(())
    }

    /// Send `keys` as real key events, so `keydown` and `input` listeners
    /// fire the way they do for a person typing.
    pub async fn send_keys(&self, keys: &str) -> Result<()> {
        self.inner.type_str(keys).await.map_err(Error::CdpError)?;
        Ok(())
    }
}
