//! Error types for the core library.

use std::path::PathBuf;

use thiserror::Error;

/// Core library error type.
///
/// Every automation variant is terminal for the send operation that raised it.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No top-level window matched the configured name and class keywords.
    #[error("window not found: {0}")]
    WindowNotFound(String),

    /// A required UI container or control is absent.
    #[error("UI element not found: {0}")]
    Resolution(String),

    /// The caller asked for a section the chat list does not show.
    #[error("section '{section}' not available. Found: {}", .available.join(", "))]
    InvalidSection {
        /// Requested section name.
        section: String,
        /// Sections present in the index, sorted.
        available: Vec<String>,
    },

    /// No chat entry matched after searching every section.
    #[error("chat '{chat}' not located. Inspected entries: {}", inspected_list(.inspected))]
    ChatNotFound {
        /// The chat name as supplied by the caller.
        chat: String,
        /// `section:normalized-label` pairs in inspection order.
        inspected: Vec<String>,
    },

    /// None of the message field labels exist in the window.
    #[error("message input field not found (tried: {})", .tried.join(", "))]
    ComposerNotFound {
        /// Labels that were looked up, in order.
        tried: Vec<String>,
    },

    /// None of the send button labels exist in the window.
    #[error("send button not found (tried: {})", .tried.join(", "))]
    SendButtonNotFound {
        /// Labels that were looked up, in order.
        tried: Vec<String>,
    },

    /// An attachment path is missing or not a regular file.
    #[error("invalid attachment path {}: {reason}", .path.display())]
    InvalidPath {
        /// The offending path.
        path: PathBuf,
        /// Why the path was rejected.
        reason: &'static str,
    },

    /// The clipboard stayed locked by another process for every attempt.
    #[error("unable to access clipboard after {attempts} attempts; it may be locked by another process")]
    ClipboardUnavailable {
        /// Number of open attempts made.
        attempts: u32,
    },

    /// An image could not be decoded or re-encoded for the clipboard.
    #[error("image error: {0}")]
    Image(String),

    /// A platform call (UI Automation, input, clipboard memory) failed.
    #[error("platform error: {0}")]
    Platform(String),

    /// A configuration-related error.
    #[error("configuration error: {0}")]
    Config(String),

    /// A path resolution or validation error.
    #[error("path error: {0}")]
    Path(String),

    /// An I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

fn inspected_list(inspected: &[String]) -> String {
    if inspected.is_empty() {
        "<none>".to_string()
    } else {
        inspected.join(", ")
    }
}

impl From<image::ImageError> for CoreError {
    fn from(e: image::ImageError) -> Self {
        Self::Image(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_not_found_lists_inspected_pairs_in_order() {
        let err = CoreError::ChatNotFound {
            chat: "Bob".to_string(),
            inspected: vec!["Favorites:Alice".to_string(), "Chats:Carol".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "chat 'Bob' not located. Inspected entries: Favorites:Alice, Chats:Carol"
        );
    }

    #[test]
    fn chat_not_found_without_entries_says_none() {
        let err = CoreError::ChatNotFound {
            chat: "Bob".to_string(),
            inspected: Vec::new(),
        };
        assert!(err.to_string().ends_with("Inspected entries: <none>"));
    }

    #[test]
    fn invalid_section_lists_available_sections() {
        let err = CoreError::InvalidSection {
            section: "Teams".to_string(),
            available: vec!["Chats".to_string(), "Favorites".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "section 'Teams' not available. Found: Chats, Favorites"
        );
    }
}
