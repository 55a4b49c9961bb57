//! End-to-end send flows against the in-memory desktop.

use std::path::PathBuf;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tsend_core::desktop::fake::{EventLog, FakeClipboard, FakeDesktop, FakeElement, FakeEvent};
use tsend_core::desktop::{ClipboardFormat, ControlRole};
use tsend_core::{AppConfig, CoreError, FileOptions, SendOptions, TeamsDriver};

type Driver = TeamsDriver<FakeDesktop, FakeClipboard>;

fn section(name: &str, rows: &[&str]) -> FakeElement {
    let group = FakeElement::new("", ControlRole::Group);
    for row in rows {
        group.push_child(FakeElement::new(row, ControlRole::ListItem));
    }
    FakeElement::new(name, ControlRole::Group).with_child(group)
}

fn teams_window(sections: Vec<FakeElement>) -> FakeElement {
    let mut results = FakeElement::new("Filter active", ControlRole::Group);
    for s in sections {
        results = results.with_child(s);
    }
    FakeElement::window("Chat | Microsoft Teams", "TeamsWebView")
        .with_child(FakeElement::new("Chat (Ctrl+2)", ControlRole::Other))
        .with_child(
            FakeElement::new("toolbar", ControlRole::Group)
                .with_child(FakeElement::new(
                    "Show filter text box (Ctrl+Shift+F)",
                    ControlRole::Button,
                ))
                .with_child(FakeElement::new("Filter by name or group name", ControlRole::Edit))
                .with_child(FakeElement::new("Close filter text box", ControlRole::Button)),
        )
        .with_child(results)
        .with_child(
            FakeElement::new("compose", ControlRole::Group)
                .with_child(FakeElement::new("Type a message", ControlRole::Edit))
                .with_child(FakeElement::new("Send (Ctrl+Enter)", ControlRole::Button)),
        )
}

fn driver_with(windows: Vec<FakeElement>, config: AppConfig) -> (Driver, EventLog) {
    let desktop = FakeDesktop::new(windows);
    let log = desktop.log();
    let clipboard = FakeClipboard::new(log.clone());
    (TeamsDriver::new(desktop, clipboard, config), log)
}

fn driver(windows: Vec<FakeElement>) -> (Driver, EventLog) {
    driver_with(windows, AppConfig::default())
}

fn typed(log: &EventLog) -> Vec<(String, String)> {
    log.events()
        .into_iter()
        .filter_map(|e| match e {
            FakeEvent::Keys { target, input } => Some((target, input)),
            _ => None,
        })
        .collect()
}

#[test]
fn sectionless_send_clicks_entry_in_first_section_that_has_it() {
    let window = teams_window(vec![section("Favorites", &[]), section("Chats", &["Bob 10:02 AM"])]);
    let (driver, log) = driver(vec![window]);

    let session = driver.connect().expect("connect");
    driver
        .send_text(&session, "hi", "Bob", &SendOptions::default())
        .expect("send");

    assert_eq!(
        log.clicks(),
        vec![
            "Chat (Ctrl+2)",
            "Show filter text box (Ctrl+Shift+F)",
            "Bob 10:02 AM",
            "Close filter text box",
            "Send (Ctrl+Enter)",
        ]
    );
    let pairs = |items: &[(&str, &str)]| -> Vec<(String, String)> {
        items
            .iter()
            .map(|(t, i)| ((*t).to_string(), (*i).to_string()))
            .collect()
    };
    assert_eq!(
        typed(&log),
        pairs(&[
            ("Filter by name or group name", "{Ctrl+A}"),
            ("Filter by name or group name", "{Del}"),
            ("Filter by name or group name", "Bob"),
            ("Type a message", "{Ctrl+A}"),
            ("Type a message", "{Del}"),
            ("Type a message", "hi"),
        ])
    );
    // activation 3s, filter 5s, open 1s, close 0.5s, after send 3s
    assert_eq!(log.slept(), Duration::from_millis(12_500));
}

#[test]
fn favorites_win_over_chats_for_duplicate_names() {
    let window = teams_window(vec![
        section("Chats", &["Chat: Bob"]),
        section("Favorites", &["Bob Available"]),
    ]);
    let (driver, log) = driver(vec![window]);

    let session = driver.connect().expect("connect");
    driver
        .send_text(&session, "hi", "bob", &SendOptions::default())
        .expect("send");

    assert!(log.clicks().contains(&"Bob Available".to_string()));
    assert!(!log.clicks().contains(&"Chat: Bob".to_string()));
}

#[test]
fn connect_skips_windows_with_other_classes() {
    let browser = FakeElement::window("Microsoft Teams - Edge", "Chrome_WidgetWin_1");
    let (driver, log) = driver(vec![browser, teams_window(vec![])]);

    let session = driver.connect().expect("connect");
    assert_eq!(session.title(), "Chat | Microsoft Teams");
    assert_eq!(
        log.events().first(),
        Some(&FakeEvent::Activate("Chat | Microsoft Teams".to_string()))
    );
}

#[test]
fn connect_without_teams_window_fails() {
    let (driver, _) = driver(vec![FakeElement::window("Notepad", "Notepad")]);
    let err = driver.connect().expect_err("no window");
    assert!(matches!(err, CoreError::WindowNotFound(_)));
}

#[test]
fn refresh_reconnects_when_window_is_gone() {
    let first = teams_window(vec![]);
    let second = FakeElement::window("Microsoft Teams (work or school)", "TeamsWebView");
    let (driver, _) = driver(vec![first.clone(), second]);

    let session = driver.connect().expect("connect");
    assert!(session.is_valid());
    let session = driver.refresh(session).expect("still valid");
    assert_eq!(session.title(), "Chat | Microsoft Teams");

    first.remove();
    assert!(!session.is_valid());
    let session = driver.refresh(session).expect("reconnect");
    assert_eq!(session.title(), "Microsoft Teams (work or school)");
}

#[test]
fn unknown_section_hint_fails_before_clicking_any_entry() {
    let window = teams_window(vec![section("Favorites", &["Alice"]), section("Chats", &["Bob"])]);
    let (driver, log) = driver(vec![window]);
    let session = driver.connect().expect("connect");

    let options = SendOptions {
        section: Some("Teams and channels".to_string()),
        ..SendOptions::default()
    };
    let err = driver
        .send_text(&session, "hi", "Bob", &options)
        .expect_err("bad section");

    assert_eq!(
        err.to_string(),
        "section 'Teams and channels' not available. Found: Chats, Favorites"
    );
    assert_eq!(
        log.clicks(),
        vec!["Chat (Ctrl+2)", "Show filter text box (Ctrl+Shift+F)"]
    );
}

#[test]
fn missing_chat_lists_inspected_entries() {
    let window = teams_window(vec![section("Chats", &["Carol 9:00 AM", "Dave Away"])]);
    let (driver, _) = driver(vec![window]);
    let session = driver.connect().expect("connect");

    let err = driver
        .send_text(&session, "hi", "Bob", &SendOptions::default())
        .expect_err("missing chat");
    assert_eq!(
        err.to_string(),
        "chat 'Bob' not located. Inspected entries: Chats:Carol, Chats:Dave"
    );
}

#[test]
fn missing_filter_field_is_a_resolution_error() {
    let window = FakeElement::window("Microsoft Teams", "TeamsWebView")
        .with_child(FakeElement::new("Chat (Ctrl+2)", ControlRole::Button))
        .with_child(FakeElement::new(
            "Show filter text box (Ctrl+Shift+F)",
            ControlRole::Button,
        ));
    let (driver, _) = driver(vec![window]);
    let session = driver.connect().expect("connect");

    let err = driver
        .send_text(&session, "hi", "Bob", &SendOptions::default())
        .expect_err("no filter field");
    assert!(matches!(err, CoreError::Resolution(msg) if msg.contains("Filter by name or group name")));
}

#[test]
fn keeps_filter_open_and_minimizes_when_asked() {
    let window = teams_window(vec![section("Chats", &["Bob"])]);
    let mut config = AppConfig::default();
    config.automation.minimize_after_send = true;
    let (driver, log) = driver_with(vec![window], config);
    let session = driver.connect().expect("connect");

    let options = SendOptions {
        close_filter: false,
        wait_after_send: Some(Duration::ZERO),
        ..SendOptions::default()
    };
    driver.send_text(&session, "hi", "Bob", &options).expect("send");

    assert!(!log.clicks().contains(&"Close filter text box".to_string()));
    assert_eq!(
        log.events().last(),
        Some(&FakeEvent::GlobalKeys("{Win+D}".to_string()))
    );
    assert_eq!(log.slept(), Duration::from_secs(9));
}

#[test]
fn send_files_embeds_images_and_attaches_the_rest() {
    let dir = tempfile::tempdir().expect("tempdir");
    let shot = dir.path().join("shot.png");
    image::RgbImage::from_pixel(3, 2, image::Rgb([200, 10, 10]))
        .save(&shot)
        .expect("png");
    let report = dir.path().join("report.pdf");
    std::fs::write(&report, b"%PDF-1.4").expect("pdf");

    let window = teams_window(vec![section("Chats", &["Bob"])]);
    let (driver, log) = driver(vec![window]);
    let session = driver.connect().expect("connect");

    let files = FileOptions {
        caption: Some("weekly numbers".to_string()),
        embed_images: true,
    };
    driver
        .send_files(
            &session,
            &[shot, report],
            "Bob",
            &files,
            &SendOptions::default(),
        )
        .expect("send files");

    let written: Vec<ClipboardFormat> = log
        .events()
        .into_iter()
        .filter_map(|e| match e {
            FakeEvent::ClipboardSet(format) => Some(format),
            _ => None,
        })
        .collect();
    assert_eq!(
        written,
        vec![
            ClipboardFormat::Dib,
            ClipboardFormat::HDrop,
            ClipboardFormat::Registered("Preferred DropEffect"),
        ]
    );
    let inputs: Vec<String> = typed(&log).into_iter().map(|(_, input)| input).collect();
    assert!(inputs.contains(&"weekly numbers".to_string()));
    assert_eq!(inputs.iter().filter(|i| *i == "{Ctrl+V}").count(), 2);
    assert_eq!(log.clicks().last().map(String::as_str), Some("Send (Ctrl+Enter)"));
}

#[test]
fn send_files_without_embedding_attaches_images_as_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let shot = dir.path().join("shot.jpg");
    image::RgbImage::from_pixel(1, 1, image::Rgb([0, 0, 0]))
        .save(&shot)
        .expect("jpg");

    let window = teams_window(vec![section("Chats", &["Bob"])]);
    let desktop = FakeDesktop::new(vec![window]);
    let log = desktop.log();
    let driver = TeamsDriver::new(desktop, FakeClipboard::new(log.clone()), AppConfig::default());
    let session = driver.connect().expect("connect");

    let files = FileOptions {
        caption: None,
        embed_images: false,
    };
    driver
        .send_files(&session, &[shot.clone()], "Bob", &files, &SendOptions::default())
        .expect("send files");

    let contents = driver.clipboard().contents();
    assert_eq!(contents[0].0, ClipboardFormat::HDrop);
    let listed = tsend_core::clipboard::decode_file_list(&contents[0].1[20..]);
    assert_eq!(listed, vec![shot.display().to_string()]);
}

#[test]
fn bad_attachment_is_rejected_before_any_ui_interaction() {
    let dir = tempfile::tempdir().expect("tempdir");
    let window = teams_window(vec![section("Chats", &["Bob"])]);
    let (driver, log) = driver(vec![window]);
    let session = driver.connect().expect("connect");
    let before = log.events().len();

    let missing: PathBuf = dir.path().join("nope.txt");
    let err = driver
        .send_files(
            &session,
            &[missing],
            "Bob",
            &FileOptions::default(),
            &SendOptions::default(),
        )
        .expect_err("missing file");
    assert!(matches!(err, CoreError::InvalidPath { .. }));

    let err = driver
        .send_message(
            &session,
            "look",
            "Bob",
            Some(dir.path()),
            &SendOptions::default(),
        )
        .expect_err("directory as image");
    assert!(matches!(err, CoreError::InvalidPath { reason: "not a regular file", .. }));
    assert_eq!(log.events().len(), before);
}

#[test]
fn busy_clipboard_gives_up_after_configured_attempts() {
    let dir = tempfile::tempdir().expect("tempdir");
    let report = dir.path().join("report.txt");
    std::fs::write(&report, b"numbers").expect("write");

    let window = teams_window(vec![section("Chats", &["Bob"])]);
    let (driver, log) = driver(vec![window]);
    driver.clipboard().hold_busy(10);
    let session = driver.connect().expect("connect");

    let err = driver
        .send_files(
            &session,
            &[report],
            "Bob",
            &FileOptions::default(),
            &SendOptions::default(),
        )
        .expect_err("clipboard busy");
    assert!(matches!(err, CoreError::ClipboardUnavailable { attempts: 5 }));
    assert_eq!(driver.clipboard().open_attempts(), 5);
    assert!(!log.clicks().contains(&"Send (Ctrl+Enter)".to_string()));
}
