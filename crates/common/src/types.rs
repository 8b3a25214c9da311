//! Message types that flow through the classify → route → traverse pipeline.

use std::fmt;

use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
};

use crate::{Error, Result};

// ── ConversationKey ─────────────────────────────────────────────────────────

/// Stable identifier for one sender (e.g. a WhatsApp number).
///
/// All per-conversation state is keyed by this value and processing is
/// serialized per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationKey(String);

impl ConversationKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ConversationKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for ConversationKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ── Language ────────────────────────────────────────────────────────────────

/// Languages the guest-facing templates and keyword lists are written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Ms,
    Zh,
}

const MALAY_MARKERS: &[&str] = &[
    "saya", "nak", "boleh", "terima", "kasih", "tak", "tidak", "ada", "bila", "berapa", "bilik",
    "mahu", "tolong", "apa", "kami", "anda", "encik", "cik", "sila", "masuk", "keluar", "daftar",
    "harga", "malam", "esok", "hari", "ini", "itu", "dengan", "untuk", "sudah", "belum", "mana",
];

const ENGLISH_MARKERS: &[&str] = &[
    "the", "i", "want", "to", "is", "can", "my", "please", "what", "how", "where", "when", "room",
    "thanks", "thank", "you", "a", "check", "do", "have", "need", "would", "like", "there", "are",
];

impl Language {
    pub const ALL: &'static [Language] = &[Self::En, Self::Ms, Self::Zh];

    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Ms => "ms",
            Self::Zh => "zh",
        }
    }

    /// Parse a language code or common name (`"bm"`, `"malay"`, `"cn"` …).
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "en" | "eng" | "english" => Some(Self::En),
            "ms" | "my" | "bm" | "malay" | "bahasa" => Some(Self::Ms),
            "zh" | "cn" | "chinese" | "mandarin" => Some(Self::Zh),
            _ => None,
        }
    }

    /// Guess the language of a message.
    ///
    /// Returns `None` when the text is too short to tell (e.g. "ok", "tq"),
    /// so the caller can keep the conversation's previous language.
    #[must_use]
    pub fn detect(text: &str) -> Option<Self> {
        let mut cjk = 0usize;
        let mut letters = 0usize;
        for ch in text.chars() {
            if is_cjk(ch) {
                cjk += 1;
            } else if ch.is_alphabetic() {
                letters += 1;
            }
        }
        if cjk > 0 && cjk * 3 >= letters {
            return Some(Self::Zh);
        }

        let words: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric() && c != '\'')
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
            .collect();
        if words.len() < 2 {
            return None;
        }

        let malay = words
            .iter()
            .filter(|w| MALAY_MARKERS.contains(&w.as_str()))
            .count();
        let english = words
            .iter()
            .filter(|w| ENGLISH_MARKERS.contains(&w.as_str()))
            .count();

        if malay > english {
            Some(Self::Ms)
        } else if english > 0 || words.len() >= 3 {
            Some(Self::En)
        } else {
            None
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

fn is_cjk(ch: char) -> bool {
    matches!(ch as u32, 0x4E00..=0x9FFF | 0x3400..=0x4DBF | 0xF900..=0xFAFF)
}

// ── InboundMessage ──────────────────────────────────────────────────────────

/// One message received from a guest. Immutable once received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Transport-level id used to drop duplicate deliveries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    pub conversation_key: ConversationKey,
    pub text: String,
    pub received_at: DateTime<Utc>,
    /// Language declared by the channel, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
}

impl InboundMessage {
    pub fn new(conversation_key: impl Into<ConversationKey>, text: impl Into<String>) -> Self {
        Self {
            message_id: None,
            conversation_key: conversation_key.into(),
            text: text.into(),
            received_at: Utc::now(),
            language: None,
        }
    }

    #[must_use]
    pub fn with_message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_language(mut self, language: Language) -> Self {
        self.language = Some(language);
        self
    }

    #[must_use]
    pub fn received_at(mut self, at: DateTime<Utc>) -> Self {
        self.received_at = at;
        self
    }

    /// Text with surrounding whitespace removed; errors when nothing is left.
    pub fn trimmed_text(&self) -> Result<&str> {
        let text = self.text.trim();
        if text.is_empty() {
            return Err(Error::invalid_input(format!(
                "empty message from {}",
                self.conversation_key
            )));
        }
        Ok(text)
    }
}

// ── OutboundAction ──────────────────────────────────────────────────────────

/// Side effect produced while handling one inbound message, in emission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutboundAction {
    /// Reply to the guest on their own conversation.
    SendMessage {
        conversation_key: ConversationKey,
        text: String,
    },
    /// Message a staff recipient rather than the guest.
    NotifyStaff { recipient: String, text: String },
}

impl OutboundAction {
    pub fn send(conversation_key: &ConversationKey, text: impl Into<String>) -> Self {
        Self::SendMessage {
            conversation_key: conversation_key.clone(),
            text: text.into(),
        }
    }

    pub fn notify(recipient: impl Into<String>, text: impl Into<String>) -> Self {
        Self::NotifyStaff {
            recipient: recipient.into(),
            text: text.into(),
        }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::SendMessage { text, .. } | Self::NotifyStaff { text, .. } => text,
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case("I want to check in tomorrow", Some(Language::En))]
    #[case("saya nak daftar masuk esok", Some(Language::Ms))]
    #[case("我想办理入住", Some(Language::Zh))]
    #[case("ok", None)]
    #[case("tq", None)]
    fn detects_language(#[case] text: &str, #[case] expected: Option<Language>) {
        assert_eq!(Language::detect(text), expected);
    }

    #[test]
    fn language_codes_round_trip() {
        for lang in Language::ALL {
            assert_eq!(Language::from_code(lang.code()), Some(*lang));
        }
        assert_eq!(Language::from_code("BM"), Some(Language::Ms));
        assert_eq!(Language::from_code("klingon"), None);
    }

    #[test]
    fn blank_message_is_rejected() {
        let msg = InboundMessage::new("+60123", "   ");
        assert!(matches!(msg.trimmed_text(), Err(Error::InvalidInput(_))));

        let msg = InboundMessage::new("+60123", "  hi ");
        assert_eq!(msg.trimmed_text().unwrap(), "hi");
    }

    #[test]
    fn outbound_action_serializes_with_kind_tag() {
        let key = ConversationKey::new("+60123");
        let action = OutboundAction::send(&key, "hello");
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["kind"], "send_message");
        assert_eq!(json["conversation_key"], "+60123");
        assert_eq!(action.text(), "hello");
    }
}
