//! Capability interface over the platform accessibility tree.
//!
//! Everything above this module (index, resolver, composer, driver) talks to
//! the desktop only through [`UiElement`], [`Desktop`] and
//! [`ClipboardBackend`]. The Windows adapter implements them with UI
//! Automation and the Win32 clipboard; the `fake` module (feature `fake`)
//! implements them in memory.

#[cfg(any(test, feature = "fake"))]
pub mod fake;
#[cfg(windows)]
pub mod windows;

use std::fmt;
use std::time::Duration;

use crate::Result;

/// Control role used to narrow a descendant search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlRole {
    /// Top-level or child window.
    Window,
    /// Push button.
    Button,
    /// Text input field.
    Edit,
    /// Generic grouping container.
    Group,
    /// Row of a list.
    ListItem,
    /// Any other control type.
    Other,
}

/// Non-character keys used in key chords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// Control modifier.
    Ctrl,
    /// Shift modifier.
    Shift,
    /// Windows logo key.
    Win,
    /// Delete key.
    Delete,
    /// Enter key.
    Enter,
    /// A character key, pressed by its virtual key (letters and digits).
    Char(char),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ctrl => write!(f, "Ctrl"),
            Self::Shift => write!(f, "Shift"),
            Self::Win => write!(f, "Win"),
            Self::Delete => write!(f, "Del"),
            Self::Enter => write!(f, "Enter"),
            Self::Char(c) => write!(f, "{}", c.to_ascii_uppercase()),
        }
    }
}

/// Keyboard input delivered to a control or to the desktop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInput<'a> {
    /// Literal text, typed character by character (newlines included).
    Text(&'a str),
    /// Keys pressed together in order and released in reverse.
    Chord(&'a [Key]),
}

impl KeyInput<'static> {
    /// Ctrl+A.
    pub const SELECT_ALL: Self = Self::Chord(&[Key::Ctrl, Key::Char('a')]);
    /// Delete.
    pub const DELETE: Self = Self::Chord(&[Key::Delete]);
    /// Ctrl+V.
    pub const PASTE: Self = Self::Chord(&[Key::Ctrl, Key::Char('v')]);
    /// Win+D, minimizes every window.
    pub const SHOW_DESKTOP: Self = Self::Chord(&[Key::Win, Key::Char('d')]);
}

impl fmt::Display for KeyInput<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => write!(f, "{text}"),
            Self::Chord(keys) => {
                write!(f, "{{")?;
                for (i, key) in keys.iter().enumerate() {
                    if i > 0 {
                        write!(f, "+")?;
                    }
                    write!(f, "{key}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Depth-bounded descendant search filtered by name and/or role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlQuery<'a> {
    /// Exact display name to match.
    pub name: Option<&'a str>,
    /// Control role to match.
    pub role: Option<ControlRole>,
    /// Maximum depth below the search root (children are depth 1).
    pub depth: u32,
}

impl<'a> ControlQuery<'a> {
    /// Any control with the given name.
    #[must_use]
    pub const fn named(name: &'a str, depth: u32) -> Self {
        Self {
            name: Some(name),
            role: None,
            depth,
        }
    }

    /// Restrict the query to a role.
    #[must_use]
    pub const fn with_role(mut self, role: ControlRole) -> Self {
        self.role = Some(role);
        self
    }

    /// Whether an element with this name and role satisfies the query.
    #[must_use]
    pub fn matches(&self, name: &str, role: ControlRole) -> bool {
        self.name.is_none_or(|wanted| wanted == name) && self.role.is_none_or(|wanted| wanted == role)
    }
}

/// One control in the accessibility tree.
///
/// Handles are cheap to clone and only meaningful while the control is on
/// screen; [`UiElement::exists`] is the zero-wait liveness poll.
pub trait UiElement: Clone + fmt::Debug {
    /// Display name, empty when the control has none or is gone.
    fn name(&self) -> String;

    /// Window class name, empty when unavailable.
    fn class_name(&self) -> String;

    /// Control role.
    fn role(&self) -> ControlRole;

    /// Whether the control is still present.
    fn exists(&self) -> bool;

    /// Direct children in on-screen order.
    ///
    /// # Errors
    ///
    /// Returns an error if the tree cannot be walked.
    fn children(&self) -> Result<Vec<Self>>;

    /// Click the control.
    ///
    /// # Errors
    ///
    /// Returns an error if the click cannot be delivered.
    fn click(&self) -> Result<()>;

    /// Move keyboard focus to the control.
    ///
    /// # Errors
    ///
    /// Returns an error if focus cannot be set.
    fn set_focus(&self) -> Result<()>;

    /// Bring the control's window to the foreground.
    ///
    /// # Errors
    ///
    /// Returns an error if the window cannot be activated.
    fn activate(&self) -> Result<()>;

    /// Focus the control and type into it.
    ///
    /// # Errors
    ///
    /// Returns an error if the input cannot be delivered.
    fn send_keys(&self, input: KeyInput<'_>) -> Result<()>;

    /// First descendant matching `query`, searching breadth-first by level
    /// down to `query.depth`. Absence is `Ok(None)`, never a wait.
    ///
    /// # Errors
    ///
    /// Returns an error if the tree cannot be walked.
    fn find(&self, query: &ControlQuery<'_>) -> Result<Option<Self>> {
        let mut level = vec![self.clone()];
        for _ in 0..query.depth {
            let mut next = Vec::new();
            for node in &level {
                for child in node.children()? {
                    if query.matches(&child.name(), child.role()) {
                        return Ok(Some(child));
                    }
                    next.push(child);
                }
            }
            if next.is_empty() {
                break;
            }
            level = next;
        }
        Ok(None)
    }
}

/// The desktop session hosting the target application.
pub trait Desktop {
    /// Element type produced by this desktop.
    type Element: UiElement;

    /// Top-level windows in z-order.
    ///
    /// # Errors
    ///
    /// Returns an error if the desktop root cannot be enumerated.
    fn top_level_windows(&self) -> Result<Vec<Self::Element>>;

    /// Send input to whatever has focus.
    ///
    /// # Errors
    ///
    /// Returns an error if the input cannot be delivered.
    fn send_keys(&self, input: KeyInput<'_>) -> Result<()>;

    /// Block for a fixed duration. The target application offers no
    /// completion signals, so fixed waits are the only ordering mechanism.
    fn sleep(&self, duration: Duration);
}

/// Clipboard data format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClipboardFormat {
    /// Device-independent bitmap (`CF_DIB`).
    Dib,
    /// File drop list (`CF_HDROP`).
    HDrop,
    /// Format registered by name, e.g. `Preferred DropEffect`.
    Registered(&'static str),
}

/// Thin primitive over the process-wide system clipboard.
///
/// Callers go through [`crate::clipboard::with_clipboard`], which pairs every
/// successful `open` with a `close`.
pub trait ClipboardBackend {
    /// Try once to take exclusive access.
    ///
    /// # Errors
    ///
    /// Returns an error if another process holds the clipboard.
    fn open(&self) -> Result<()>;

    /// Release exclusive access.
    fn close(&self);

    /// Remove current clipboard contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the clipboard cannot be emptied.
    fn empty(&self) -> Result<()>;

    /// Copy `payload` into shared memory and hand it to the clipboard under
    /// `format`. The clipboard owns the memory only once this returns `Ok`.
    ///
    /// # Errors
    ///
    /// Returns an error if allocation or the hand-off fails.
    fn set_data(&self, format: ClipboardFormat, payload: &[u8]) -> Result<()>;
}
