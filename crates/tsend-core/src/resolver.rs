//! Locate a chat row by name across the sections of a [`SectionIndex`].

use crate::desktop::UiElement;
use crate::index::{ChatEntry, SectionIndex};
use crate::normalize::{NameNormalizer, names_match};
use crate::{CoreError, Result};

/// Finds the first chat row whose normalized label matches a target name.
///
/// Matching is first-match-wins in search order, not best-match: when two
/// rows normalize to the same name the one searched first is returned.
#[derive(Debug, Clone)]
pub struct ChatResolver<'a> {
    normalizer: &'a NameNormalizer,
    section_preference: &'a [String],
}

impl<'a> ChatResolver<'a> {
    /// Create a resolver searching preferred sections first when no hint is given.
    #[must_use]
    pub const fn new(normalizer: &'a NameNormalizer, section_preference: &'a [String]) -> Self {
        Self {
            normalizer,
            section_preference,
        }
    }

    /// Section search order for `index`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidSection`] when `hint` names a section the
    /// index does not contain.
    pub fn search_order<'i, E: UiElement>(
        &self,
        index: &'i SectionIndex<E>,
        hint: Option<&'i str>,
    ) -> Result<Vec<&'i str>> {
        let mut order: Vec<&'i str> = Vec::with_capacity(index.len());
        if let Some(hint) = hint {
            if !index.contains(hint) {
                let mut available: Vec<String> =
                    index.section_names().map(str::to_string).collect();
                available.sort();
                return Err(CoreError::InvalidSection {
                    section: hint.to_string(),
                    available,
                });
            }
            order.push(hint);
        } else {
            for preferred in self.section_preference {
                if let Some(name) = index.section_names().find(|name| *name == preferred.as_str()) {
                    if !order.contains(&name) {
                        order.push(name);
                    }
                }
            }
        }
        for name in index.section_names() {
            if !order.contains(&name) {
                order.push(name);
            }
        }
        Ok(order)
    }

    /// Resolve `target` to a row of `index`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidSection`] for an unknown hint and
    /// [`CoreError::ChatNotFound`] listing every inspected
    /// `section:normalized-label` pair when nothing matches.
    pub fn resolve<'i, E: UiElement>(
        &self,
        index: &'i SectionIndex<E>,
        target: &str,
        hint: Option<&'i str>,
    ) -> Result<&'i ChatEntry<E>> {
        let wanted = self.normalizer.normalize(target);
        let order = self.search_order(index, hint)?;
        log::debug!("resolving '{wanted}' in sections {order:?}");

        let mut inspected = Vec::new();
        for section in order {
            for entry in index.entries(section).unwrap_or_default() {
                let friendly = self.normalizer.normalize(entry.label());
                if friendly.is_empty() {
                    continue;
                }
                if names_match(&friendly, &wanted) {
                    log::info!("matched '{target}' to '{friendly}' in section '{section}'");
                    return Ok(entry);
                }
                inspected.push(format!("{section}:{friendly}"));
            }
        }

        Err(CoreError::ChatNotFound {
            chat: target.to_string(),
            inspected,
        })
    }
}
