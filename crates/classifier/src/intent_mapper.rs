//! Maps generic labels from the generative tier onto the configured intent
//! vocabulary, using message-content heuristics where the label alone is
//! ambiguous.

use std::collections::{BTreeMap, BTreeSet};

use pelangi_common::text::normalize;

use crate::result::UNKNOWN_INTENT;

pub const POST_CHECKOUT_COMPLAINT: &str = "post_checkout_complaint";
pub const NOISE_COMPLAINT_INFANT: &str = "noise_complaint_infant";

const PAST_CHECKOUT_MARKERS: &[&str] = &[
    "checked out",
    "after checkout",
    "after check out",
    "after checking out",
    "already left",
    "when i stayed",
    "during my stay",
    "my last stay",
    "last night stay",
    "sudah checkout",
    "sudah check out",
    "dah checkout",
    "selepas checkout",
    "退房后",
    "已经退房",
];

const INFANT_MARKERS: &[&str] = &[
    "baby", "babies", "infant", "infants", "toddler", "newborn", "bayi", "budak kecil", "婴儿",
    "宝宝", "小孩",
];

const NOISE_MARKERS: &[&str] = &[
    "noise", "noisy", "loud", "crying", "cry", "screaming", "bising", "menangis", "吵", "哭",
];

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| {
        if n.is_ascii() {
            haystack
                .split(' ')
                .collect::<Vec<_>>()
                .windows(n.split(' ').count())
                .any(|w| w.join(" ") == *n)
        } else {
            haystack.contains(n)
        }
    })
}

pub struct IntentMapper {
    vocabulary: BTreeSet<String>,
    aliases: BTreeMap<String, String>,
}

impl IntentMapper {
    pub fn new(
        vocabulary: impl IntoIterator<Item = String>,
        aliases: &BTreeMap<String, String>,
    ) -> Self {
        Self {
            vocabulary: vocabulary.into_iter().collect(),
            aliases: aliases
                .iter()
                .map(|(k, v)| (canonical_label(k), v.clone()))
                .collect(),
        }
    }

    #[must_use]
    pub fn vocabulary(&self) -> impl Iterator<Item = &str> {
        self.vocabulary.iter().map(String::as_str)
    }

    /// Resolve `label` for `message`; `None` when it maps to nothing known.
    #[must_use]
    pub fn map(&self, label: &str, message: &str) -> Option<String> {
        let label = canonical_label(label);
        let label = self.aliases.get(&label).cloned().unwrap_or(label);
        let text = normalize(message);

        let is_complaint = label == "complaint" || label.ends_with("_complaint");
        let mentions_infant = contains_any(&text, INFANT_MARKERS);

        let resolved = if is_complaint && mentions_infant && contains_any(&text, NOISE_MARKERS) {
            NOISE_COMPLAINT_INFANT.to_string()
        } else if label == "noise_complaint" && mentions_infant {
            NOISE_COMPLAINT_INFANT.to_string()
        } else if is_complaint
            && label != NOISE_COMPLAINT_INFANT
            && label != "noise_complaint"
            && contains_any(&text, PAST_CHECKOUT_MARKERS)
        {
            POST_CHECKOUT_COMPLAINT.to_string()
        } else {
            label
        };

        if resolved == UNKNOWN_INTENT || self.vocabulary.contains(&resolved) {
            Some(resolved)
        } else {
            None
        }
    }
}

/// `"Late Checkout-Request"` → `"late_checkout_request"`.
fn canonical_label(label: &str) -> String {
    label
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c == '.')
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn mapper() -> IntentMapper {
        let vocabulary = [
            "complaint",
            "post_checkout_complaint",
            "noise_complaint",
            "noise_complaint_infant",
            "greeting_hello",
            "late_checkout_request",
        ]
        .map(String::from);
        let mut aliases = BTreeMap::new();
        aliases.insert("greeting".to_string(), "greeting_hello".to_string());
        IntentMapper::new(vocabulary, &aliases)
    }

    #[rstest]
    #[case("complaint", "the aircon is broken", Some("complaint"))]
    #[case("complaint", "I checked out yesterday and was overcharged", Some("post_checkout_complaint"))]
    #[case("complaint", "sudah checkout tapi deposit belum dapat", Some("post_checkout_complaint"))]
    #[case("noise_complaint", "the people upstairs are loud", Some("noise_complaint"))]
    #[case("noise_complaint", "a baby next door keeps crying", Some("noise_complaint_infant"))]
    #[case("complaint", "there is a crying baby in my dorm", Some("noise_complaint_infant"))]
    #[case("Greeting", "hello!", Some("greeting_hello"))]
    #[case("Late Checkout-Request", "can I stay till 2pm", Some("late_checkout_request"))]
    #[case("unknown", "asdf", Some("unknown"))]
    #[case("weather", "is it raining", None)]
    fn maps_labels(#[case] label: &str, #[case] text: &str, #[case] expected: Option<&str>) {
        assert_eq!(mapper().map(label, text).as_deref(), expected);
    }
}
