//! Teams window discovery, chat activation and the public send operations.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::composer::{Composer, clear, is_image, validate_file, validate_files};
use crate::config::AppConfig;
use crate::desktop::{ClipboardBackend, ControlQuery, ControlRole, Desktop, KeyInput, UiElement};
use crate::index::collect_sections;
use crate::normalize::NameNormalizer;
use crate::resolver::ChatResolver;
use crate::{CoreError, Result};

/// A connected Teams window.
///
/// Sessions are plain values: nothing is cached behind the caller's back.
/// Pass a session through [`TeamsDriver::refresh`] before reuse when the
/// window may have been closed in between.
#[derive(Debug, Clone)]
pub struct Session<E> {
    window: E,
    title: String,
}

impl<E: UiElement> Session<E> {
    /// The Teams top-level window.
    #[must_use]
    pub const fn window(&self) -> &E {
        &self.window
    }

    /// Window title at connect time.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Whether the window still exists.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.window.exists()
    }
}

/// Per-send options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOptions {
    /// Search only this section first; it must be shown in the chat list.
    pub section: Option<String>,
    /// Close the filter box after opening the chat.
    pub close_filter: bool,
    /// Wait after clicking send. `None` uses the configured default.
    pub wait_after_send: Option<Duration>,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            section: None,
            close_filter: true,
            wait_after_send: None,
        }
    }
}

/// Options for [`TeamsDriver::send_files`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOptions {
    /// Text typed into the message box before the attachments.
    pub caption: Option<String>,
    /// Paste image files inline instead of attaching them.
    pub embed_images: bool,
}

impl Default for FileOptions {
    fn default() -> Self {
        Self {
            caption: None,
            embed_images: true,
        }
    }
}

/// Sends messages and files to Teams chats through a [`Desktop`] and a
/// [`ClipboardBackend`].
#[derive(Debug)]
pub struct TeamsDriver<D, C> {
    desktop: D,
    clipboard: C,
    config: AppConfig,
    normalizer: NameNormalizer,
}

impl<D: Desktop, C: ClipboardBackend> TeamsDriver<D, C> {
    /// Create a driver. Aliases are taken from `config`.
    #[must_use]
    pub fn new(desktop: D, clipboard: C, config: AppConfig) -> Self {
        let normalizer = NameNormalizer::new(config.alias_table());
        Self {
            desktop,
            clipboard,
            config,
            normalizer,
        }
    }

    /// The desktop adapter.
    #[must_use]
    pub const fn desktop(&self) -> &D {
        &self.desktop
    }

    /// The clipboard adapter.
    #[must_use]
    pub const fn clipboard(&self) -> &C {
        &self.clipboard
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The normalizer built from the configured aliases.
    #[must_use]
    pub const fn normalizer(&self) -> &NameNormalizer {
        &self.normalizer
    }

    /// Find the Teams window, bring it to the foreground and wait for it to settle.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::WindowNotFound`] when no top-level window matches
    /// the configured keywords and class.
    pub fn connect(&self) -> Result<Session<D::Element>> {
        let automation = &self.config.automation;
        for candidate in self.desktop.top_level_windows()? {
            let title = candidate.name();
            if !automation
                .window_keywords
                .iter()
                .any(|keyword| title.contains(keyword.as_str()))
            {
                continue;
            }
            if !automation.window_class.is_empty()
                && !candidate.class_name().contains(&automation.window_class)
            {
                log::debug!("skipping '{title}': class '{}'", candidate.class_name());
                continue;
            }
            candidate.activate()?;
            if !candidate.exists() {
                continue;
            }
            log::info!("connected to '{title}'");
            self.desktop.sleep(automation.activation_delay());
            return Ok(Session {
                window: candidate,
                title,
            });
        }
        Err(CoreError::WindowNotFound(format!(
            "no window titled like {:?} with class '{}'",
            automation.window_keywords, automation.window_class
        )))
    }

    /// Return `session` if its window still exists, otherwise reconnect.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::WindowNotFound`] if reconnecting fails.
    pub fn refresh(&self, session: Session<D::Element>) -> Result<Session<D::Element>> {
        if session.is_valid() {
            return Ok(session);
        }
        log::info!("window '{}' is gone; reconnecting", session.title);
        self.connect()
    }

    /// Open the chat list, filter it by `chat`, and click the matching entry.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Resolution`] for a missing hub, filter trigger or
    /// filter field, and resolver errors when the chat cannot be located.
    pub fn activate_chat(
        &self,
        session: &Session<D::Element>,
        chat: &str,
        section: Option<&str>,
        close_filter: bool,
    ) -> Result<()> {
        let window = session.window();
        let labels = &self.config.labels;
        let depth = self.config.automation.search_depth;

        require(window, ControlQuery::named(&labels.chat_hub, depth), "chat hub button")?
            .click()?;
        window.activate()?;

        let filter_button = ControlQuery::named(&labels.filter_button, depth).with_role(ControlRole::Button);
        require(window, filter_button, "filter text box trigger")?
            .click()?;

        let filter_field = ControlQuery::named(&labels.filter_field, depth).with_role(ControlRole::Edit);
        let field = require(window, filter_field, "filter search field")?;
        field.set_focus()?;
        clear(&field)?;
        field.send_keys(KeyInput::Text(chat))?;
        self.desktop.sleep(self.config.automation.search_timeout());

        let index = collect_sections(window, &labels.filter_results, depth)?;
        let resolver = ChatResolver::new(&self.normalizer, &self.config.automation.section_preference);
        let entry = resolver.resolve(&index, chat, section)?;
        entry.open()?;
        self.desktop.sleep(self.config.timing.open_chat());

        if close_filter {
            let close = ControlQuery::named(&labels.close_filter, depth).with_role(ControlRole::Button);
            if let Some(button) = window.find(&close)? {
                button.click()?;
                self.desktop.sleep(self.config.timing.close_filter());
            }
        }
        Ok(())
    }

    /// Send a plain text message to `chat`.
    ///
    /// # Errors
    ///
    /// See [`TeamsDriver::send_message`].
    pub fn send_text(
        &self,
        session: &Session<D::Element>,
        message: &str,
        chat: &str,
        options: &SendOptions,
    ) -> Result<()> {
        self.send_message(session, message, chat, None, options)
    }

    /// Send a message, optionally with one inline image, to `chat`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidPath`] for a bad image before touching the
    /// UI, and any resolution, composer or clipboard error along the way.
    pub fn send_message(
        &self,
        session: &Session<D::Element>,
        message: &str,
        chat: &str,
        image: Option<&Path>,
        options: &SendOptions,
    ) -> Result<()> {
        let image = image.map(validate_file).transpose()?;

        self.activate_chat(session, chat, options.section.as_deref(), options.close_filter)?;
        let composer = self.composer(session);
        let field = composer.focus_message_field()?;
        composer.set_text(&field, message)?;
        if let Some(path) = image {
            composer.attach_image(&path)?;
        }
        composer.trigger_send()?;
        log::info!("sent message to '{chat}'");
        self.finish(options)
    }

    /// Send files to `chat`. Images are pasted inline one by one when
    /// `files.embed_images` is set; everything else goes as one attachment paste.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidPath`] naming the first bad path before
    /// touching the UI, and any resolution, composer or clipboard error along
    /// the way.
    pub fn send_files(
        &self,
        session: &Session<D::Element>,
        paths: &[PathBuf],
        chat: &str,
        files: &FileOptions,
        options: &SendOptions,
    ) -> Result<()> {
        let resolved = validate_files(paths)?;
        let (images, others): (Vec<PathBuf>, Vec<PathBuf>) = resolved
            .into_iter()
            .partition(|path| files.embed_images && is_image(path));

        self.activate_chat(session, chat, options.section.as_deref(), options.close_filter)?;
        let composer = self.composer(session);
        let field = composer.focus_message_field()?;
        composer.set_text(&field, files.caption.as_deref().unwrap_or_default())?;
        for image in &images {
            composer.attach_image(image)?;
        }
        if !others.is_empty() {
            composer.attach_files(&others)?;
        }
        composer.trigger_send()?;
        log::info!(
            "sent {} image(s) and {} file(s) to '{chat}'",
            images.len(),
            others.len()
        );
        self.finish(options)
    }

    fn composer<'s>(&'s self, session: &'s Session<D::Element>) -> Composer<'s, D, C> {
        Composer::new(
            &self.desktop,
            &self.clipboard,
            session.window(),
            &self.config.labels,
            self.config.timing,
            self.config.automation.search_depth,
        )
    }

    fn finish(&self, options: &SendOptions) -> Result<()> {
        let wait = options
            .wait_after_send
            .unwrap_or_else(|| self.config.timing.wait_after_send());
        if !wait.is_zero() {
            self.desktop.sleep(wait);
        }
        if self.config.automation.minimize_after_send {
            self.desktop.send_keys(KeyInput::SHOW_DESKTOP)?;
        }
        Ok(())
    }
}

fn require<E: UiElement>(window: &E, query: ControlQuery<'_>, what: &str) -> Result<E> {
    window.find(&query)?.ok_or_else(|| {
        CoreError::Resolution(format!("{what} '{}' not found", query.name.unwrap_or_default()))
    })
}
