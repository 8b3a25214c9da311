//! Fuzzy-keyword tier.
//!
//! Every keyword is scored against the normalized message and the best
//! (intent, score) wins. Scoring rules:
//!
//! - keywords containing CJK characters match as raw substrings (1.0 or 0.0);
//! - keywords found as a contiguous token run score 1.0;
//! - single-word keywords under six characters ("tq", "hello", "price") match
//!   nothing else, so "hell" or "prize" score 0.0;
//! - otherwise the score is the best of a sliding-window edit similarity and
//!   a token-set ratio, which tolerates typos and word order. Keyword words of
//!   three characters or fewer ("in" of "check in") must appear as a whole
//!   token in either, and an inflected form ("checking") never stands in for
//!   the keyword ("checkin").
//!
//! Ties go to the longer keyword, then to a keyword in the conversation's
//! language.

use pelangi_common::{
    Language,
    text::{normalize, similarity},
};
use pelangi_config::FuzzyTierConfig;

const SHORT_TOKEN_CHARS: usize = 3;
const MIN_TYPO_KEYWORD_CHARS: usize = 6;
const INFLECTION_SUFFIXES: [&str; 3] = ["ing", "ed", "er"];

#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyMatch {
    pub intent: String,
    pub score: f32,
    pub keyword: String,
}

struct Keyword {
    intent: String,
    language: Option<Language>,
    original: String,
    normalized: String,
    tokens: Vec<String>,
    cjk: bool,
}

pub struct FuzzyTier {
    keywords: Vec<Keyword>,
}

fn has_cjk(text: &str) -> bool {
    text.chars()
        .any(|ch| matches!(ch as u32, 0x4E00..=0x9FFF | 0x3400..=0x4DBF | 0xF900..=0xFAFF))
}

impl FuzzyTier {
    pub fn new(config: &FuzzyTierConfig) -> Self {
        let mut keywords = Vec::new();
        for (intent, by_language) in &config.keywords {
            for (language, list) in by_language {
                let language = Language::from_code(language);
                for original in list {
                    let normalized = normalize(original);
                    if normalized.is_empty() {
                        continue;
                    }
                    keywords.push(Keyword {
                        intent: intent.clone(),
                        language,
                        original: original.clone(),
                        tokens: normalized.split(' ').map(str::to_string).collect(),
                        cjk: has_cjk(&normalized),
                        normalized,
                    });
                }
            }
        }
        Self { keywords }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    /// Best-scoring keyword across every intent, if any scored above zero.
    #[must_use]
    pub fn best_match(&self, text: &str, language: Option<Language>) -> Option<FuzzyMatch> {
        let normalized = normalize(text);
        if normalized.is_empty() {
            return None;
        }
        let tokens: Vec<&str> = normalized.split(' ').collect();

        let mut best: Option<(&Keyword, f32)> = None;
        for keyword in &self.keywords {
            let score = score_keyword(keyword, &normalized, &tokens);
            if score <= 0.0 {
                continue;
            }
            let better = match best {
                None => true,
                Some((current, current_score)) => {
                    if (score - current_score).abs() > f32::EPSILON {
                        score > current_score
                    } else if keyword.normalized.len() != current.normalized.len() {
                        keyword.normalized.len() > current.normalized.len()
                    } else {
                        language.is_some()
                            && keyword.language == language
                            && current.language != language
                    }
                },
            };
            if better {
                best = Some((keyword, score));
            }
        }

        best.map(|(keyword, score)| FuzzyMatch {
            intent: keyword.intent.clone(),
            score,
            keyword: keyword.original.clone(),
        })
    }
}

fn score_keyword(keyword: &Keyword, text: &str, tokens: &[&str]) -> f32 {
    if keyword.cjk {
        let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        let needle: String = keyword
            .normalized
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        return if compact.contains(&needle) { 1.0 } else { 0.0 };
    }

    let ktokens: Vec<&str> = keyword.tokens.iter().map(String::as_str).collect();
    if tokens.windows(ktokens.len()).any(|w| w == ktokens.as_slice()) {
        return 1.0;
    }
    if ktokens.len() == 1 && keyword.normalized.chars().count() < MIN_TYPO_KEYWORD_CHARS {
        return 0.0;
    }

    window_similarity(&keyword.normalized, &ktokens, tokens).max(token_set_ratio(&ktokens, tokens))
}

fn is_short(token: &str) -> bool {
    token.chars().count() <= SHORT_TOKEN_CHARS
}

/// True when `word` is the keyword's stem plus an inflection the keyword
/// lacks: "checking" or "checked" for "checkin".
fn is_inflection(keyword: &str, word: &str) -> bool {
    INFLECTION_SUFFIXES.iter().any(|suffix| {
        !keyword.ends_with(suffix)
            && word
                .strip_suffix(suffix)
                .is_some_and(|stem| stem.chars().count() >= 3 && keyword.starts_with(stem))
    })
}

/// Best edit similarity between the keyword and any run of `n - 1 ..= n + 1`
/// consecutive message tokens that holds every short keyword token.
fn window_similarity(keyword: &str, ktokens: &[&str], tokens: &[&str]) -> f32 {
    let n = ktokens.len();
    let short: Vec<&str> = ktokens.iter().copied().filter(|k| is_short(k)).collect();
    let mut best = 0.0f32;
    let low = n.saturating_sub(1).max(1);
    for size in low..=n + 1 {
        if size > tokens.len() {
            break;
        }
        for window in tokens.windows(size) {
            if !short.iter().all(|k| window.contains(k)) {
                continue;
            }
            let joined = window.join(" ");
            if is_inflection(keyword, &joined) {
                continue;
            }
            best = best.max(similarity(keyword, &joined));
        }
    }
    best
}

/// Mean of each keyword token's best similarity to any message token.
/// Short keyword tokens only count on exact equality.
fn token_set_ratio(ktokens: &[&str], tokens: &[&str]) -> f32 {
    if ktokens.len() < 2 {
        return 0.0;
    }
    let total: f32 = ktokens
        .iter()
        .map(|k| {
            if is_short(k) {
                if tokens.contains(k) { 1.0 } else { 0.0 }
            } else {
                tokens
                    .iter()
                    .filter(|t| !is_inflection(k, t))
                    .map(|t| similarity(k, t))
                    .fold(0.0f32, f32::max)
            }
        })
        .sum();
    total / ktokens.len() as f32
}
