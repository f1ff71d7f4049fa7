use serde::{Deserialize, Serialize};

/// An instrument watched for breaking news, identified in headlines by its
/// ticker token (e.g. "RELIANCE").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertTarget {
    pub name: String,
    pub token: String,
}

impl AlertTarget {
    pub fn new(name: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            token: token.into(),
        }
    }
}

/// Attributes headlines to the first target, in priority order, whose token
/// appears in the upper-cased headline.
#[derive(Debug, Clone)]
pub struct InstrumentMatcher {
    targets: Vec<AlertTarget>,
}

impl InstrumentMatcher {
    pub fn new(targets: Vec<AlertTarget>) -> Self {
        let targets = targets
            .into_iter()
            .filter_map(|t| {
                let token = t.token.trim().to_uppercase();
                if token.is_empty() {
                    tracing::warn!("Ignoring alert target {} with an empty token", t.name);
                    return None;
                }
                Some(AlertTarget { name: t.name, token })
            })
            .collect();
        Self { targets }
    }

    pub fn targets(&self) -> &[AlertTarget] {
        &self.targets
    }

    pub fn match_headline(&self, headline: &str) -> Option<&AlertTarget> {
        let upper = headline.to_uppercase();
        self.targets.iter().find(|t| upper.contains(&t.token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> InstrumentMatcher {
        InstrumentMatcher::new(vec![
            AlertTarget::new("Tata Motors", "TATAMOTORS"),
            AlertTarget::new("Tata Steel", "tata"),
            AlertTarget::new("Infosys", "INFY"),
        ])
    }

    #[test]
    fn test_match_is_case_insensitive_substring() {
        let m = matcher();
        assert_eq!(m.match_headline("infy beats estimates").unwrap().name, "Infosys");
        assert!(m.match_headline("Markets close flat").is_none());
    }

    #[test]
    fn test_priority_order_breaks_ties() {
        let m = matcher();
        // Both TATAMOTORS and TATA occur; the earlier target wins
        assert_eq!(
            m.match_headline("TataMotors and Tata group shares rise").unwrap().name,
            "Tata Motors"
        );
        assert_eq!(m.match_headline("Tata Steel output up").unwrap().name, "Tata Steel");
    }

    #[test]
    fn test_empty_tokens_are_dropped() {
        let m = InstrumentMatcher::new(vec![AlertTarget::new("Blank", "  ")]);
        assert!(m.targets().is_empty());
        assert!(m.match_headline("anything").is_none());
    }
}
