pub const W2_INDICATORS: [&str; 8] = [
    "wage and tax statement",
    "form w-2",
    "w-2",
    "employer identification number",
    "wages, tips, other compensation",
    "federal income tax withheld",
    "social security wages",
    "medicare wages",
];

pub const DEFAULT_MIN_MATCHES: usize = 3;

#[derive(Debug, Clone)]
pub struct Classifier {
    indicators: Vec<String>,
    min_matches: usize,
}

impl Classifier {
    pub fn new<I, S>(indicators: I, min_matches: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut unique: Vec<String> = Vec::new();
        for indicator in indicators {
            let normalized = indicator.as_ref().trim().to_lowercase();
            if !normalized.is_empty() && !unique.contains(&normalized) {
                unique.push(normalized);
            }
        }

        Self {
            indicators: unique,
            min_matches,
        }
    }

    pub fn w2() -> Self {
        Self::new(W2_INDICATORS, DEFAULT_MIN_MATCHES)
    }

    pub fn indicators(&self) -> &[String] {
        &self.indicators
    }

    pub fn min_matches(&self) -> usize {
        self.min_matches
    }

    pub fn matched_indicators(&self, text: &str) -> Vec<&str> {
        let lowered = text.to_lowercase();
        self.indicators
            .iter()
            .filter(|indicator| lowered.contains(indicator.as_str()))
            .map(String::as_str)
            .collect()
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.matched_indicators(text).len() >= self.min_matches
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::w2()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_indicators_classify_as_w2() {
        let text = "FORM W-2 ... Social Security Wages ... Medicare wages and tips";
        let classifier = Classifier::w2();

        // "form w-2" also contains "w-2", so this text hits four indicators.
        assert_eq!(
            classifier.matched_indicators(text),
            vec!["form w-2", "w-2", "social security wages", "medicare wages"]
        );
        assert!(classifier.is_match(text));
    }

    #[test]
    fn exactly_two_indicators_is_not_enough() {
        let classifier = Classifier::w2();
        let text = "Federal income tax withheld 120.00\nMedicare wages 400.00";

        assert_eq!(classifier.matched_indicators(text).len(), 2);
        assert!(!classifier.is_match(text));
    }

    #[test]
    fn exactly_three_distinct_indicators_is_enough() {
        let classifier = Classifier::w2();
        let text = "employer identification number 12-3456789\n\
                    federal income tax withheld 1.00\n\
                    medicare wages 2.00";

        assert_eq!(classifier.matched_indicators(text).len(), 3);
        assert!(classifier.is_match(text));
    }

    #[test]
    fn repeated_indicator_counts_once() {
        let classifier = Classifier::w2();
        let text = "medicare wages medicare wages medicare wages social security wages";

        assert_eq!(classifier.matched_indicators(text).len(), 2);
        assert!(!classifier.is_match(text));
    }

    #[test]
    fn empty_text_is_not_a_match() {
        assert!(!Classifier::w2().is_match(""));
    }

    #[test]
    fn injected_indicator_set_drives_threshold() {
        let classifier = Classifier::new(["Alpha", "beta", "ALPHA", " "], 2);

        assert_eq!(classifier.indicators(), ["alpha", "beta"]);
        assert!(!classifier.is_match("alpha alpha alpha"));
        assert!(classifier.is_match("Beta and ALPHA"));
    }
}
