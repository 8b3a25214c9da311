//! Emergency-pattern tier: ordered regexes mapped to safety-critical intents.

use {regex::Regex, tracing::error};

use pelangi_config::EmergencyTierConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmergencyMatch {
    pub intent: String,
    /// The matched span of the message.
    pub evidence: String,
}

pub struct EmergencyTier {
    rules: Vec<(String, Regex)>,
}

impl EmergencyTier {
    /// Compile every pattern. A pattern that fails to compile is logged and
    /// left out; the rest of the tier keeps working.
    pub fn new(config: &EmergencyTierConfig) -> Self {
        let rules = config
            .patterns
            .iter()
            .filter_map(|p| match Regex::new(&p.pattern) {
                Ok(re) => Some((p.intent.clone(), re)),
                Err(e) => {
                    error!(intent = %p.intent, error = %e, "invalid emergency pattern, skipping");
                    None
                },
            })
            .collect();
        Self { rules }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Intents this tier can produce.
    pub fn intents(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|(intent, _)| intent.as_str())
    }

    /// First matching rule wins.
    #[must_use]
    pub fn check(&self, text: &str) -> Option<EmergencyMatch> {
        self.rules.iter().find_map(|(intent, re)| {
            re.find(text).map(|m| EmergencyMatch {
                intent: intent.clone(),
                evidence: m.as_str().to_string(),
            })
        })
    }
}
