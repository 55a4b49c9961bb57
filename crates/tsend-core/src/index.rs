//! Snapshot of the filtered chat list, grouped by section.

use indexmap::IndexMap;

use crate::desktop::{ControlQuery, UiElement};
use crate::{CoreError, Result};

/// One conversation row in the chat list.
#[derive(Debug, Clone)]
pub struct ChatEntry<E> {
    label: String,
    section: String,
    handle: E,
}

impl<E: UiElement> ChatEntry<E> {
    /// Raw label as shown in the list, decorations included.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Section the row belongs to.
    #[must_use]
    pub fn section(&self) -> &str {
        &self.section
    }

    /// Underlying UI control.
    #[must_use]
    pub const fn handle(&self) -> &E {
        &self.handle
    }

    /// Click the row to open the conversation.
    ///
    /// # Errors
    ///
    /// Returns an error if the row can no longer be clicked.
    pub fn open(&self) -> Result<()> {
        self.handle.click()
    }
}

/// Section name to rows, both in on-screen order.
///
/// Built fresh for every lookup; entries borrowed from it must not outlive
/// the snapshot, which the borrow checker enforces.
#[derive(Debug, Clone)]
pub struct SectionIndex<E> {
    sections: IndexMap<String, Vec<ChatEntry<E>>>,
}

impl<E: UiElement> SectionIndex<E> {
    /// Build an index from `(section, labels)` pairs already read from the UI.
    #[must_use]
    pub fn from_sections(sections: impl IntoIterator<Item = (String, Vec<(String, E)>)>) -> Self {
        let mut index = IndexMap::new();
        for (section, rows) in sections {
            let entries = rows
                .into_iter()
                .filter(|(label, _)| !label.is_empty())
                .map(|(label, handle)| ChatEntry {
                    label,
                    section: section.clone(),
                    handle,
                })
                .collect();
            index.insert(section, entries);
        }
        Self { sections: index }
    }

    /// Section names in on-screen order.
    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    /// Rows of a section, if it exists.
    #[must_use]
    pub fn entries(&self, section: &str) -> Option<&[ChatEntry<E>]> {
        self.sections.get(section).map(Vec::as_slice)
    }

    /// Whether the section is present.
    #[must_use]
    pub fn contains(&self, section: &str) -> bool {
        self.sections.contains_key(section)
    }

    /// Number of sections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    /// Whether the list shows no sections at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

/// Read the filter results container under `window` into a [`SectionIndex`].
///
/// Each named child of the container is a section; the named grandchildren
/// of a section (group, then row) are its entries.
///
/// # Errors
///
/// Returns [`CoreError::Resolution`] when the container is not rendered.
pub fn collect_sections<E: UiElement>(
    window: &E,
    container_label: &str,
    depth: u32,
) -> Result<SectionIndex<E>> {
    let container = window
        .find(&ControlQuery::named(container_label, depth))?
        .ok_or_else(|| {
            CoreError::Resolution(format!("active filter list '{container_label}' not found"))
        })?;

    let mut sections = Vec::new();
    for section in container.children()? {
        let section_name = section.name();
        if section_name.is_empty() {
            continue;
        }
        let mut rows = Vec::new();
        for group in section.children()? {
            for entry in group.children()? {
                let label = entry.name();
                if !label.is_empty() {
                    rows.push((label, entry));
                }
            }
        }
        log::debug!("section '{section_name}': {} entries", rows.len());
        sections.push((section_name, rows));
    }
    Ok(SectionIndex::from_sections(sections))
}
