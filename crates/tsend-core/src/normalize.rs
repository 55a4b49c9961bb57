//! Chat label normalization and alias substitution.
//!
//! Teams decorates chat-list rows with previews, timestamps, presence and
//! structural prefixes. [`NameNormalizer::normalize`] strips them in a fixed
//! order, each pattern running on the previous result, then maps the cleaned
//! name through the configured aliases.

use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;

static LAST_MESSAGE: LazyLock<Regex> = LazyLock::new(|| compile(r"(?i)Last message.*"));
static LEADING_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)^(?:Group|Chat)\b[:\-\x{2013}\x{2014}]?\s*"));
static TIMESTAMP: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)\b\d{1,2}:\d{2}\s*(?:AM|PM)?\b.*$"));
static PRESENCE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)\b(?:Available|Busy|Away|Offline)\b"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| compile(r"[\s\x{00A0}]+"));

#[expect(
    clippy::expect_used,
    reason = "patterns are compile-time constants covered by tests"
)]
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("normalization pattern must compile")
}

/// Case-insensitive alias keys mapped to canonical chat names, in
/// configuration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasTable {
    entries: Vec<(String, String)>,
}

impl AliasTable {
    /// Build from configured aliases. Keys are lowercased; empty keys are dropped.
    #[must_use]
    pub fn new(aliases: &IndexMap<String, String>) -> Self {
        let entries = aliases
            .iter()
            .map(|(key, value)| (key.trim().to_lowercase(), value.clone()))
            .filter(|(key, _)| !key.is_empty())
            .collect();
        Self { entries }
    }

    /// Canonical name for a lowercase label: exact key match or key contained
    /// in the label, first configured key wins.
    #[must_use]
    pub fn lookup(&self, lower_name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| lower_name == key.as_str() || lower_name.contains(key.as_str()))
            .map(|(_, value)| value.as_str())
    }

    /// Number of aliases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no aliases are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Turns raw chat-list labels into comparable display names.
#[derive(Debug, Clone, Default)]
pub struct NameNormalizer {
    aliases: AliasTable,
}

impl NameNormalizer {
    /// Create a normalizer using `aliases`.
    #[must_use]
    pub const fn new(aliases: AliasTable) -> Self {
        Self { aliases }
    }

    /// Normalize a raw label. An empty result means "skip this entry".
    #[must_use]
    pub fn normalize(&self, raw: &str) -> String {
        let name = strip_decorations(raw);
        let lower = name.to_lowercase();
        match self.aliases.lookup(&lower) {
            Some(canonical) => canonical.to_string(),
            None => name,
        }
    }
}

/// Apply the strip passes until the label stops changing, so stacked
/// decorations ("Chat: Chat: Bob") come off as well.
fn strip_decorations(raw: &str) -> String {
    let mut current = raw.to_string();
    loop {
        let next = strip_once(&current);
        if next == current {
            return next;
        }
        current = next;
    }
}

fn strip_once(name: &str) -> String {
    let name = LAST_MESSAGE.replace(name, "");
    let name = LEADING_PREFIX.replace(&name, "");
    let name = TIMESTAMP.replace(&name, "");
    let name = PRESENCE.replace_all(&name, "");
    WHITESPACE.replace_all(&name, " ").trim().to_string()
}

/// Whether two normalized names refer to the same chat: equal ignoring
/// case, or one contains the other (chat-list labels get truncated).
#[must_use]
pub fn names_match(candidate: &str, target: &str) -> bool {
    if candidate.is_empty() || target.is_empty() {
        return false;
    }
    let candidate = candidate.to_lowercase();
    let target = target.to_lowercase();
    candidate == target || candidate.contains(&target) || target.contains(&candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn chatbot_aliases() -> NameNormalizer {
        let mut aliases = IndexMap::new();
        aliases.insert(
            "Teams Chatbot Bot".to_string(),
            "Columbus Teams Chatbot".to_string(),
        );
        NameNormalizer::new(AliasTable::new(&aliases))
    }

    #[test]
    fn strips_every_known_decoration() {
        let n = NameNormalizer::default();
        assert_eq!(
            n.normalize("Chat: Alice  Available  10:30 AM Last message: hi"),
            "Alice"
        );
    }

    #[test]
    fn strips_prefix_variants() {
        let n = NameNormalizer::default();
        assert_eq!(n.normalize("Group: Project X"), "Project X");
        assert_eq!(n.normalize("group\u{2014}Project X"), "Project X");
        assert_eq!(n.normalize("Chat Bob"), "Bob");
    }

    #[test]
    fn prefix_requires_word_boundary() {
        let n = NameNormalizer::default();
        assert_eq!(n.normalize("Chats with Bob"), "Chats with Bob");
        assert_eq!(n.normalize("Groupies"), "Groupies");
        assert_eq!(n.normalize("Groupon Sales"), "Groupon Sales");
        assert_eq!(n.normalize("ChatGPT Helpers"), "ChatGPT Helpers");
        assert_eq!(n.normalize("Chat-ChatGPT Helpers"), "ChatGPT Helpers");
    }

    #[test]
    fn strips_timestamp_and_tail() {
        let n = NameNormalizer::default();
        assert_eq!(n.normalize("Bob 9:05 pm see you"), "Bob");
        assert_eq!(n.normalize("Bob 14:20"), "Bob");
    }

    #[test]
    fn strips_presence_anywhere_and_collapses_nbsp() {
        let n = NameNormalizer::default();
        assert_eq!(n.normalize("Busy\u{00A0}Carol\u{00A0}\u{00A0}away"), "Carol");
        assert_eq!(n.normalize("Awayne"), "Awayne");
    }

    #[test]
    fn decoration_only_label_normalizes_to_empty() {
        let n = NameNormalizer::default();
        assert_eq!(n.normalize("Chat: Offline 10:00"), "");
        assert_eq!(n.normalize(""), "");
    }

    #[test]
    fn alias_substitution_exact_and_substring() {
        let n = chatbot_aliases();
        assert_eq!(n.normalize("teams chatbot bot"), "Columbus Teams Chatbot");
        assert_eq!(
            n.normalize("Chat: Teams Chatbot Bot Available 8:15 AM Last message: ok"),
            "Columbus Teams Chatbot"
        );
        assert_eq!(
            n.normalize("My Teams ChatBot Bot (external)"),
            "Columbus Teams Chatbot"
        );
        assert_eq!(n.normalize("Teams Chatbot"), "Teams Chatbot");
    }

    #[test]
    fn first_configured_alias_wins() {
        let mut aliases = IndexMap::new();
        aliases.insert("bob".to_string(), "Bob Builder".to_string());
        aliases.insert("bob smith".to_string(), "Robert Smith".to_string());
        let n = NameNormalizer::new(AliasTable::new(&aliases));
        assert_eq!(n.normalize("Bob Smith"), "Bob Builder");
    }

    #[test]
    fn empty_alias_keys_are_ignored() {
        let mut aliases = IndexMap::new();
        aliases.insert("  ".to_string(), "Everyone".to_string());
        let table = AliasTable::new(&aliases);
        assert!(table.is_empty());
        assert_eq!(NameNormalizer::new(table).normalize(""), "");
    }

    #[test]
    fn normalize_is_idempotent() {
        let n = chatbot_aliases();
        let samples = [
            "Chat: Alice  Available  10:30 AM Last message: hi",
            "Chat: Chat: Bob",
            "  Group: Chat - Dana Busy",
            "Available Chat: Erin",
            "Last\u{00A0}message preview",
            "Chats with Bob",
            "Teams Chatbot Bot 3:14 PM",
            "Columbus Teams Chatbot",
            "Frank 12:00",
            "",
            "   ",
        ];
        for raw in samples {
            let once = n.normalize(raw);
            assert_eq!(n.normalize(&once), once, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn names_match_rules() {
        assert!(names_match("Bob", "bob"));
        assert!(names_match("Chats with Bob", "Chats"));
        assert!(names_match("Chats", "Chats with Bob"));
        assert!(!names_match("Alice", "Bob"));
        assert!(!names_match("", "Bob"));
        assert!(!names_match("Bob", ""));
    }
}
