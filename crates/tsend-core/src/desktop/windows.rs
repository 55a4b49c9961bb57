//! UI Automation, `SendInput` and Win32 clipboard adapter.
#![expect(unsafe_code, reason = "COM, SendInput and clipboard memory are raw Win32 calls")]

use std::mem;
use std::time::Duration;

use windows::Win32::Foundation::{GlobalFree, HANDLE, HGLOBAL, HWND, RECT};
use windows::Win32::System::Com::{
    CLSCTX_INPROC_SERVER, COINIT_APARTMENTTHREADED, CoCreateInstance, CoInitializeEx,
    CoUninitialize,
};
use windows::Win32::System::DataExchange::{
    CloseClipboard, EmptyClipboard, OpenClipboard, RegisterClipboardFormatW, SetClipboardData,
};
use windows::Win32::System::Memory::{GHND, GlobalAlloc, GlobalLock, GlobalUnlock};
use windows::Win32::UI::Accessibility::{
    CUIAutomation8, IUIAutomation, IUIAutomationElement, IUIAutomationTreeWalker,
    UIA_ButtonControlTypeId, UIA_CONTROLTYPE_ID, UIA_EditControlTypeId, UIA_GroupControlTypeId,
    UIA_ListItemControlTypeId, UIA_WindowControlTypeId,
};
use windows::Win32::UI::Input::KeyboardAndMouse::{
    INPUT, INPUT_0, INPUT_KEYBOARD, INPUT_MOUSE, KEYBD_EVENT_FLAGS, KEYBDINPUT,
    KEYEVENTF_EXTENDEDKEY, KEYEVENTF_KEYUP, KEYEVENTF_UNICODE, MOUSE_EVENT_FLAGS, MOUSEEVENTF_ABSOLUTE,
    MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP, MOUSEEVENTF_MOVE, MOUSEEVENTF_VIRTUALDESK,
    MOUSEINPUT, SendInput, VIRTUAL_KEY, VK_CONTROL, VK_DELETE, VK_LWIN, VK_RETURN, VK_SHIFT,
};
use windows::Win32::UI::WindowsAndMessaging::{
    GetSystemMetrics, IsIconic, SM_CXVIRTUALSCREEN, SM_CYVIRTUALSCREEN, SM_XVIRTUALSCREEN,
    SM_YVIRTUALSCREEN, SW_RESTORE, SetForegroundWindow, ShowWindow,
};
use windows::core::HSTRING;

use crate::desktop::{
    ClipboardBackend, ClipboardFormat, ControlRole, Desktop, Key, KeyInput, UiElement,
};
use crate::{CoreError, Result};

const CF_DIB: u32 = 8;
const CF_HDROP: u32 = 15;

// SetForegroundWindow needs a moment before input lands in the new window.
const FOREGROUND_SETTLE: Duration = Duration::from_millis(30);

fn platform(context: &'static str) -> impl FnOnce(windows::core::Error) -> CoreError {
    move |err| CoreError::Platform(format!("{context}: {err}"))
}

/// Keeps COM initialized on the current thread.
#[derive(Debug)]
struct ComApartment {
    owned: bool,
}

impl ComApartment {
    fn enter() -> Self {
        let hr = unsafe { CoInitializeEx(None, COINIT_APARTMENTTHREADED) };
        if hr.is_err() {
            log::debug!("COM already initialized in another mode: {hr:?}");
        }
        Self { owned: hr.is_ok() }
    }
}

impl Drop for ComApartment {
    fn drop(&mut self) {
        if self.owned {
            unsafe { CoUninitialize() };
        }
    }
}

/// A control reached through the UI Automation control view.
#[derive(Debug, Clone)]
pub struct UiaElement {
    element: IUIAutomationElement,
    walker: IUIAutomationTreeWalker,
}

impl UiaElement {
    fn native_window(&self) -> Option<HWND> {
        unsafe { self.element.CurrentNativeWindowHandle() }
            .ok()
            .filter(|hwnd| !hwnd.is_invalid())
    }

    fn bounds(&self) -> Result<RECT> {
        unsafe { self.element.CurrentBoundingRectangle() }.map_err(platform("reading element bounds"))
    }
}

fn role_of(control_type: UIA_CONTROLTYPE_ID) -> ControlRole {
    match control_type {
        UIA_WindowControlTypeId => ControlRole::Window,
        UIA_ButtonControlTypeId => ControlRole::Button,
        UIA_EditControlTypeId => ControlRole::Edit,
        UIA_GroupControlTypeId => ControlRole::Group,
        UIA_ListItemControlTypeId => ControlRole::ListItem,
        _ => ControlRole::Other,
    }
}

impl UiElement for UiaElement {
    fn name(&self) -> String {
        unsafe { self.element.CurrentName() }
            .map(|name| name.to_string())
            .unwrap_or_default()
    }

    fn class_name(&self) -> String {
        unsafe { self.element.CurrentClassName() }
            .map(|name| name.to_string())
            .unwrap_or_default()
    }

    fn role(&self) -> ControlRole {
        unsafe { self.element.CurrentControlType() }.map_or(ControlRole::Other, role_of)
    }

    fn exists(&self) -> bool {
        unsafe { self.element.CurrentProcessId() }.is_ok()
    }

    fn children(&self) -> Result<Vec<Self>> {
        let mut children = Vec::new();
        // The walker reports "no more siblings" as an error.
        let Ok(mut current) = (unsafe { self.walker.GetFirstChildElement(&self.element) }) else {
            return Ok(children);
        };
        loop {
            let next = unsafe { self.walker.GetNextSiblingElement(&current) };
            children.push(Self {
                element: current,
                walker: self.walker.clone(),
            });
            match next {
                Ok(sibling) => current = sibling,
                Err(_) => break,
            }
        }
        Ok(children)
    }

    fn click(&self) -> Result<()> {
        let rect = self.bounds()?;
        let cx = rect.left + (rect.right - rect.left) / 2;
        let cy = rect.top + (rect.bottom - rect.top) / 2;
        log::debug!("clicking '{}' at {cx},{cy}", self.name());
        click_at(cx, cy)
    }

    fn set_focus(&self) -> Result<()> {
        unsafe { self.element.SetFocus() }.map_err(platform("focusing element"))
    }

    fn activate(&self) -> Result<()> {
        let Some(hwnd) = self.native_window() else {
            return self.set_focus();
        };
        unsafe {
            if IsIconic(hwnd).as_bool() {
                let _ = ShowWindow(hwnd, SW_RESTORE);
            }
            let _ = SetForegroundWindow(hwnd);
        }
        std::thread::sleep(FOREGROUND_SETTLE);
        Ok(())
    }

    fn send_keys(&self, input: KeyInput<'_>) -> Result<()> {
        self.set_focus()?;
        send_input(input)
    }
}

/// The interactive desktop as seen through UI Automation.
#[derive(Debug)]
pub struct UiaDesktop {
    automation: IUIAutomation,
    walker: IUIAutomationTreeWalker,
    _apartment: ComApartment,
}

impl UiaDesktop {
    /// Initialize COM on this thread and create the automation client.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Platform`] if UI Automation is unavailable.
    pub fn new() -> Result<Self> {
        let apartment = ComApartment::enter();
        let automation: IUIAutomation =
            unsafe { CoCreateInstance(&CUIAutomation8, None, CLSCTX_INPROC_SERVER) }
                .map_err(platform("creating UI Automation client"))?;
        let walker = unsafe { automation.ControlViewWalker() }
            .map_err(platform("creating control view walker"))?;
        Ok(Self {
            automation,
            walker,
            _apartment: apartment,
        })
    }
}

impl Desktop for UiaDesktop {
    type Element = UiaElement;

    fn top_level_windows(&self) -> Result<Vec<UiaElement>> {
        let root = unsafe { self.automation.GetRootElement() }
            .map_err(platform("reading desktop root"))?;
        UiaElement {
            element: root,
            walker: self.walker.clone(),
        }
        .children()
    }

    fn send_keys(&self, input: KeyInput<'_>) -> Result<()> {
        send_input(input)
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

fn virtual_key(key: Key) -> Result<VIRTUAL_KEY> {
    Ok(match key {
        Key::Ctrl => VK_CONTROL,
        Key::Shift => VK_SHIFT,
        Key::Win => VK_LWIN,
        Key::Delete => VK_DELETE,
        Key::Enter => VK_RETURN,
        Key::Char(c) if c.is_ascii_alphanumeric() => VIRTUAL_KEY(c.to_ascii_uppercase() as u16),
        Key::Char(c) => {
            return Err(CoreError::Platform(format!("no virtual key for '{c}'")));
        }
    })
}

const fn key_event(vk: VIRTUAL_KEY, scan: u16, flags: KEYBD_EVENT_FLAGS) -> INPUT {
    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: vk,
                wScan: scan,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn chord_events(keys: &[Key]) -> Result<Vec<INPUT>> {
    let mut events = Vec::with_capacity(keys.len() * 2);
    let mut pressed = Vec::with_capacity(keys.len());
    for key in keys {
        let vk = virtual_key(*key)?;
        let flags = if vk == VK_DELETE {
            KEYEVENTF_EXTENDEDKEY
        } else {
            KEYBD_EVENT_FLAGS(0)
        };
        events.push(key_event(vk, 0, flags));
        pressed.push((vk, flags));
    }
    for (vk, flags) in pressed.into_iter().rev() {
        events.push(key_event(vk, 0, flags | KEYEVENTF_KEYUP));
    }
    Ok(events)
}

fn text_events(text: &str) -> Result<Vec<INPUT>> {
    let mut events = Vec::new();
    for c in text.chars() {
        match c {
            '\r' => {}
            // A bare Enter sends the message; Shift+Enter breaks the line.
            '\n' => events.extend(chord_events(&[Key::Shift, Key::Enter])?),
            _ => {
                let mut units = [0_u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    events.push(key_event(VIRTUAL_KEY(0), *unit, KEYEVENTF_UNICODE));
                    events.push(key_event(
                        VIRTUAL_KEY(0),
                        *unit,
                        KEYEVENTF_UNICODE | KEYEVENTF_KEYUP,
                    ));
                }
            }
        }
    }
    Ok(events)
}

fn dispatch(events: &[INPUT]) -> Result<()> {
    if events.is_empty() {
        return Ok(());
    }
    let sent = unsafe { SendInput(events, mem::size_of::<INPUT>() as i32) };
    if sent as usize == events.len() {
        Ok(())
    } else {
        Err(CoreError::Platform(format!(
            "SendInput delivered {sent} of {} events",
            events.len()
        )))
    }
}

fn send_input(input: KeyInput<'_>) -> Result<()> {
    let events = match input {
        KeyInput::Text(text) => text_events(text)?,
        KeyInput::Chord(keys) => chord_events(keys)?,
    };
    dispatch(&events)
}

fn click_at(x: i32, y: i32) -> Result<()> {
    let (origin_x, origin_y, width, height) = unsafe {
        (
            GetSystemMetrics(SM_XVIRTUALSCREEN),
            GetSystemMetrics(SM_YVIRTUALSCREEN),
            GetSystemMetrics(SM_CXVIRTUALSCREEN),
            GetSystemMetrics(SM_CYVIRTUALSCREEN),
        )
    };
    if width <= 0 || height <= 0 {
        return Err(CoreError::Platform("virtual screen has no size".to_string()));
    }
    let dx = (x - origin_x) * 65_535 / width;
    let dy = (y - origin_y) * 65_535 / height;
    let base = MOUSEEVENTF_ABSOLUTE | MOUSEEVENTF_VIRTUALDESK | MOUSEEVENTF_MOVE;
    let mouse = |flags: MOUSE_EVENT_FLAGS| INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx,
                dy,
                mouseData: 0,
                dwFlags: base | flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    };
    dispatch(&[mouse(MOUSEEVENTF_LEFTDOWN), mouse(MOUSEEVENTF_LEFTUP)])
}

/// The Win32 system clipboard.
#[derive(Debug, Clone, Copy, Default)]
pub struct WinClipboard;

impl WinClipboard {
    fn format_id(format: ClipboardFormat) -> Result<u32> {
        match format {
            ClipboardFormat::Dib => Ok(CF_DIB),
            ClipboardFormat::HDrop => Ok(CF_HDROP),
            ClipboardFormat::Registered(name) => {
                let id = unsafe { RegisterClipboardFormatW(&HSTRING::from(name)) };
                if id == 0 {
                    Err(CoreError::Platform(format!(
                        "registering clipboard format '{name}' failed"
                    )))
                } else {
                    Ok(id)
                }
            }
        }
    }
}

impl ClipboardBackend for WinClipboard {
    fn open(&self) -> Result<()> {
        unsafe { OpenClipboard(HWND::default()) }.map_err(platform("opening clipboard"))
    }

    fn close(&self) {
        if let Err(err) = unsafe { CloseClipboard() } {
            log::warn!("closing clipboard failed: {err}");
        }
    }

    fn empty(&self) -> Result<()> {
        unsafe { EmptyClipboard() }.map_err(platform("emptying clipboard"))
    }

    fn set_data(&self, format: ClipboardFormat, payload: &[u8]) -> Result<()> {
        let id = Self::format_id(format)?;
        GlobalBlock::copy_from(payload)?.hand_to_clipboard(id)
    }
}

/// Movable global memory, freed on drop unless the clipboard took it.
struct GlobalBlock(Option<HGLOBAL>);

impl GlobalBlock {
    fn copy_from(bytes: &[u8]) -> Result<Self> {
        let handle = unsafe { GlobalAlloc(GHND, bytes.len().max(1)) }
            .map_err(platform("allocating clipboard memory"))?;
        let block = Self(Some(handle));
        let target = unsafe { GlobalLock(handle) };
        if target.is_null() {
            return Err(CoreError::Platform("locking clipboard memory failed".to_string()));
        }
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), target.cast::<u8>(), bytes.len());
            // Reports an error once the lock count reaches zero, which is the expected outcome.
            let _ = GlobalUnlock(handle);
        }
        Ok(block)
    }

    fn hand_to_clipboard(mut self, format: u32) -> Result<()> {
        let Some(handle) = self.0 else {
            return Err(CoreError::Platform("clipboard memory already released".to_string()));
        };
        unsafe { SetClipboardData(format, HANDLE(handle.0)) }
            .map_err(platform("setting clipboard data"))?;
        self.0 = None;
        Ok(())
    }
}

impl Drop for GlobalBlock {
    fn drop(&mut self) {
        if let Some(handle) = self.0.take() {
            let _ = unsafe { GlobalFree(handle) };
        }
    }
}
