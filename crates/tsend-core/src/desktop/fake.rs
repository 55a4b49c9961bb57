//! In-memory desktop, element tree and clipboard.
//!
//! Compiled for tests and behind the `fake` feature. Used to exercise
//! chat resolution and the send flows without a live Teams window. Every
//! interaction is appended to a shared [`EventLog`] so tests can assert on
//! the exact sequence of clicks, keystrokes, waits and clipboard writes.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use crate::desktop::{ClipboardBackend, ClipboardFormat, ControlRole, Desktop, KeyInput, UiElement};
use crate::{CoreError, Result};

/// One recorded interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeEvent {
    /// A control was clicked.
    Click(String),
    /// A control received focus.
    Focus(String),
    /// A window was brought to the foreground.
    Activate(String),
    /// Input was typed into a control.
    Keys {
        /// Name of the receiving control.
        target: String,
        /// Rendered input, chords as `{Ctrl+A}`.
        input: String,
    },
    /// Input was sent to the desktop at large.
    GlobalKeys(String),
    /// A fixed wait.
    Sleep(Duration),
    /// The clipboard was opened.
    ClipboardOpen,
    /// The clipboard was emptied.
    ClipboardEmpty,
    /// Data was placed on the clipboard.
    ClipboardSet(ClipboardFormat),
    /// The clipboard was closed.
    ClipboardClose,
}

/// Shared, append-only interaction log.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Rc<RefCell<Vec<FakeEvent>>>);

impl EventLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: FakeEvent) {
        self.0.borrow_mut().push(event);
    }

    /// Snapshot of every event so far.
    #[must_use]
    pub fn events(&self) -> Vec<FakeEvent> {
        self.0.borrow().clone()
    }

    /// Names of clicked controls, in order.
    #[must_use]
    pub fn clicks(&self) -> Vec<String> {
        self.0
            .borrow()
            .iter()
            .filter_map(|e| match e {
                FakeEvent::Click(name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    /// Total time spent in fixed waits.
    #[must_use]
    pub fn slept(&self) -> Duration {
        self.0
            .borrow()
            .iter()
            .filter_map(|e| match e {
                FakeEvent::Sleep(d) => Some(*d),
                _ => None,
            })
            .sum()
    }
}

struct Node {
    name: String,
    class_name: String,
    role: ControlRole,
    children: RefCell<Vec<FakeElement>>,
    alive: Cell<bool>,
    log: RefCell<EventLog>,
}

/// A control in the fake accessibility tree.
#[derive(Clone)]
pub struct FakeElement(Rc<Node>);

impl fmt::Debug for FakeElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FakeElement")
            .field("name", &self.0.name)
            .field("role", &self.0.role)
            .finish_non_exhaustive()
    }
}

impl FakeElement {
    /// Create a control with no children.
    #[must_use]
    pub fn new(name: &str, role: ControlRole) -> Self {
        Self(Rc::new(Node {
            name: name.to_string(),
            class_name: String::new(),
            role,
            children: RefCell::new(Vec::new()),
            alive: Cell::new(true),
            log: RefCell::new(EventLog::new()),
        }))
    }

    /// Create a top-level window with a class name.
    #[must_use]
    pub fn window(name: &str, class_name: &str) -> Self {
        Self(Rc::new(Node {
            name: name.to_string(),
            class_name: class_name.to_string(),
            role: ControlRole::Window,
            children: RefCell::new(Vec::new()),
            alive: Cell::new(true),
            log: RefCell::new(EventLog::new()),
        }))
    }

    /// Append a child and return `self` for chaining.
    #[must_use]
    pub fn with_child(self, child: Self) -> Self {
        self.push_child(child);
        self
    }

    /// Append a child in place.
    pub fn push_child(&self, child: Self) {
        child.attach(&self.0.log.borrow());
        self.0.children.borrow_mut().push(child);
    }

    /// Mark the control as gone; `exists` turns false.
    pub fn remove(&self) {
        self.0.alive.set(false);
    }

    /// Route this subtree's events into `log`.
    pub fn attach(&self, log: &EventLog) {
        *self.0.log.borrow_mut() = log.clone();
        for child in self.0.children.borrow().iter() {
            child.attach(log);
        }
    }

    fn record(&self, event: FakeEvent) -> Result<()> {
        if !self.0.alive.get() {
            return Err(CoreError::Platform(format!(
                "element '{}' is no longer available",
                self.0.name
            )));
        }
        self.0.log.borrow().push(event);
        Ok(())
    }
}

impl UiElement for FakeElement {
    fn name(&self) -> String {
        self.0.name.clone()
    }

    fn class_name(&self) -> String {
        self.0.class_name.clone()
    }

    fn role(&self) -> ControlRole {
        self.0.role
    }

    fn exists(&self) -> bool {
        self.0.alive.get()
    }

    fn children(&self) -> Result<Vec<Self>> {
        Ok(self.0.children.borrow().clone())
    }

    fn click(&self) -> Result<()> {
        self.record(FakeEvent::Click(self.name()))
    }

    fn set_focus(&self) -> Result<()> {
        self.record(FakeEvent::Focus(self.name()))
    }

    fn activate(&self) -> Result<()> {
        self.record(FakeEvent::Activate(self.name()))
    }

    fn send_keys(&self, input: KeyInput<'_>) -> Result<()> {
        self.record(FakeEvent::Keys {
            target: self.name(),
            input: input.to_string(),
        })
    }
}

/// Desktop made of fake top-level windows. Sleeps are recorded, not taken.
#[derive(Debug)]
pub struct FakeDesktop {
    windows: Vec<FakeElement>,
    log: EventLog,
}

impl FakeDesktop {
    /// Create a desktop whose windows record into a fresh log.
    #[must_use]
    pub fn new(windows: Vec<FakeElement>) -> Self {
        let log = EventLog::new();
        for window in &windows {
            window.attach(&log);
        }
        Self { windows, log }
    }

    /// The shared interaction log.
    #[must_use]
    pub fn log(&self) -> EventLog {
        self.log.clone()
    }
}

impl Desktop for FakeDesktop {
    type Element = FakeElement;

    fn top_level_windows(&self) -> Result<Vec<FakeElement>> {
        Ok(self
            .windows
            .iter()
            .filter(|w| w.exists())
            .cloned()
            .collect())
    }

    fn send_keys(&self, input: KeyInput<'_>) -> Result<()> {
        self.log.push(FakeEvent::GlobalKeys(input.to_string()));
        Ok(())
    }

    fn sleep(&self, duration: Duration) {
        self.log.push(FakeEvent::Sleep(duration));
    }
}

/// Clipboard that can be held "busy" for a number of open attempts.
#[derive(Debug)]
pub struct FakeClipboard {
    log: EventLog,
    busy_for: Cell<u32>,
    fail_writes: Cell<bool>,
    is_open: Cell<bool>,
    opens: Cell<u32>,
    contents: RefCell<Vec<(ClipboardFormat, Vec<u8>)>>,
}

impl FakeClipboard {
    /// Create a free clipboard recording into `log`.
    #[must_use]
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            busy_for: Cell::new(0),
            fail_writes: Cell::new(false),
            is_open: Cell::new(false),
            opens: Cell::new(0),
            contents: RefCell::new(Vec::new()),
        }
    }

    /// Reject the next `attempts` open calls as if another process held the lock.
    pub fn hold_busy(&self, attempts: u32) {
        self.busy_for.set(attempts);
    }

    /// Make every `set_data` call fail.
    pub fn fail_writes(&self) {
        self.fail_writes.set(true);
    }

    /// Whether access is currently held.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.is_open.get()
    }

    /// Number of open attempts seen, failed ones included.
    #[must_use]
    pub fn open_attempts(&self) -> u32 {
        self.opens.get()
    }

    /// Current clipboard contents by format.
    #[must_use]
    pub fn contents(&self) -> Vec<(ClipboardFormat, Vec<u8>)> {
        self.contents.borrow().clone()
    }
}

impl ClipboardBackend for FakeClipboard {
    fn open(&self) -> Result<()> {
        self.opens.set(self.opens.get() + 1);
        let busy = self.busy_for.get();
        if busy > 0 {
            self.busy_for.set(busy - 1);
            return Err(CoreError::Platform("clipboard held by another process".to_string()));
        }
        self.is_open.set(true);
        self.log.push(FakeEvent::ClipboardOpen);
        Ok(())
    }

    fn close(&self) {
        self.is_open.set(false);
        self.log.push(FakeEvent::ClipboardClose);
    }

    fn empty(&self) -> Result<()> {
        self.contents.borrow_mut().clear();
        self.log.push(FakeEvent::ClipboardEmpty);
        Ok(())
    }

    fn set_data(&self, format: ClipboardFormat, payload: &[u8]) -> Result<()> {
        if !self.is_open.get() {
            return Err(CoreError::Platform("clipboard is not open".to_string()));
        }
        if self.fail_writes.get() {
            return Err(CoreError::Platform("SetClipboardData failed".to_string()));
        }
        self.contents.borrow_mut().push((format, payload.to_vec()));
        self.log.push(FakeEvent::ClipboardSet(format));
        Ok(())
    }
}
