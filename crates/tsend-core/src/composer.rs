//! Message composer: text entry, attachment paste and the send button.

use std::path::{Path, PathBuf};

use crate::clipboard::{FileDropPayload, encode_image_dib, place_bitmap, place_file_drop, with_clipboard};
use crate::config::{TimingConfig, UiLabels};
use crate::desktop::{ClipboardBackend, ControlQuery, ControlRole, Desktop, KeyInput, UiElement};
use crate::{CoreError, Result};

/// Extensions pasted inline as pictures rather than attached as files.
pub const IMAGE_EXTENSIONS: [&str; 8] = ["png", "jpg", "jpeg", "bmp", "gif", "tif", "tiff", "webp"];

/// Whether `path` has an image extension, ignoring case.
#[must_use]
pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

/// Resolve every path to an absolute path and check it names an existing
/// regular file. Fails on the first offender.
///
/// # Errors
///
/// Returns [`CoreError::InvalidPath`] naming the first missing path or
/// non-file.
pub fn validate_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    paths.iter().map(|path| validate_file(path)).collect()
}

/// Single-path form of [`validate_files`].
///
/// # Errors
///
/// Returns [`CoreError::InvalidPath`] if `path` is missing or not a file.
pub fn validate_file(path: &Path) -> Result<PathBuf> {
    let resolved = std::path::absolute(path)
        .map_err(|err| CoreError::Path(format!("resolving {}: {err}", path.display())))?;
    let metadata = std::fs::metadata(&resolved).map_err(|_| CoreError::InvalidPath {
        path: resolved.clone(),
        reason: "file not found",
    })?;
    if !metadata.is_file() {
        return Err(CoreError::InvalidPath {
            path: resolved,
            reason: "not a regular file",
        });
    }
    Ok(resolved)
}

/// Drives the message box of the open conversation.
#[derive(Debug)]
pub struct Composer<'a, D: Desktop, C: ?Sized> {
    desktop: &'a D,
    clipboard: &'a C,
    window: &'a D::Element,
    labels: &'a UiLabels,
    timing: TimingConfig,
    depth: u32,
}

impl<'a, D: Desktop, C: ClipboardBackend + ?Sized> Composer<'a, D, C> {
    /// Create a composer for `window`.
    #[must_use]
    pub const fn new(
        desktop: &'a D,
        clipboard: &'a C,
        window: &'a D::Element,
        labels: &'a UiLabels,
        timing: TimingConfig,
        depth: u32,
    ) -> Self {
        Self {
            desktop,
            clipboard,
            window,
            labels,
            timing,
            depth,
        }
    }

    /// Focus the first message field label that exists and return the field.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ComposerNotFound`] when no label matches.
    pub fn focus_message_field(&self) -> Result<D::Element> {
        for label in &self.labels.message_fields {
            let query = ControlQuery::named(label, self.depth).with_role(ControlRole::Edit);
            if let Some(field) = self.window.find(&query)? {
                field.set_focus()?;
                log::debug!("focused message field '{label}'");
                return Ok(field);
            }
        }
        Err(CoreError::ComposerNotFound {
            tried: self.labels.message_fields.clone(),
        })
    }

    /// Replace the contents of `field` with `text`.
    ///
    /// # Errors
    ///
    /// Returns an error if keystrokes cannot be delivered.
    pub fn set_text(&self, field: &D::Element, text: &str) -> Result<()> {
        clear(field)?;
        if !text.is_empty() {
            field.send_keys(KeyInput::Text(text))?;
        }
        Ok(())
    }

    /// Paste an image file into the message box as an inline picture.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidPath`] for a missing file,
    /// [`CoreError::Image`] if it cannot be decoded, and clipboard or
    /// composer errors from the paste itself.
    pub fn attach_image(&self, path: &Path) -> Result<()> {
        let resolved = validate_file(path)?;
        let dib = encode_image_dib(&resolved)?;
        self.with_clipboard(|clipboard| place_bitmap(clipboard, &dib))?;
        log::info!("pasting image {}", resolved.display());
        self.paste()
    }

    /// Paste `paths` into the message box as file attachments.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidPath`] naming the first bad path, and
    /// clipboard or composer errors from the paste itself.
    pub fn attach_files(&self, paths: &[PathBuf]) -> Result<()> {
        let resolved = validate_files(paths)?;
        let payload = FileDropPayload::new(&resolved)?;
        self.with_clipboard(|clipboard| place_file_drop(clipboard, &payload))?;
        log::info!("pasting {} file(s)", resolved.len());
        self.paste()
    }

    /// Click the first send button label that exists.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SendButtonNotFound`] when no label matches.
    pub fn trigger_send(&self) -> Result<()> {
        for label in &self.labels.send_buttons {
            let query = ControlQuery::named(label, self.depth).with_role(ControlRole::Button);
            if let Some(button) = self.window.find(&query)? {
                log::debug!("clicking send button '{label}'");
                return button.click();
            }
        }
        Err(CoreError::SendButtonNotFound {
            tried: self.labels.send_buttons.clone(),
        })
    }

    fn with_clipboard<F>(&self, action: F) -> Result<()>
    where
        F: FnOnce(&C) -> Result<()>,
    {
        with_clipboard(
            self.clipboard,
            self.timing.clipboard_policy(),
            |delay| self.desktop.sleep(delay),
            action,
        )
    }

    fn paste(&self) -> Result<()> {
        let field = self.focus_message_field()?;
        field.send_keys(KeyInput::PASTE)?;
        self.desktop.sleep(self.timing.paste_settle());
        Ok(())
    }
}

/// Select everything in `field` and delete it.
pub(crate) fn clear<E: UiElement>(field: &E) -> Result<()> {
    field.send_keys(KeyInput::SELECT_ALL)?;
    field.send_keys(KeyInput::DELETE)
}
