//! System clipboard access for the email draft copy action.

use anyhow::{Context, Result};

pub struct ClipboardManager {
    clipboard: arboard::Clipboard,
}

impl ClipboardManager {
    pub fn new() -> Result<Self> {
        let clipboard = arboard::Clipboard::new().context("Failed to access system clipboard")?;
        Ok(Self { clipboard })
    }

    pub fn copy(&mut self, text: &str) -> Result<()> {
        self.clipboard
            .set_text(text.to_string())
            .context("Failed to copy text to clipboard")?;
        Ok(())
    }
}
