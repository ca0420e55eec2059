use super::{ProductCategory, ProductClassifier};
use crate::config::ClassifierConfig;

const WEED_KEYWORDS: &[&str] = &[
    "weed", "kush", "haze", "og", "purple", "sour", "diesel", "skunk", "cannabis", "marijuana",
    "green",
];
const METH_KEYWORDS: &[&str] = &["meth", "crystal", "ice", "glass", "crank", "blue"];
const COCAINE_KEYWORDS: &[&str] = &["cocaine", "coke", "snow", "powder", "white", "blow"];

/// Case-insensitive substring matching against a fixed keyword set per category.
///
/// Matching is plain substring, not whole-word: host ids run words together
/// (`ogkush`, `greencrack`). Short keywords such as `og` therefore also hit
/// inside unrelated words ("Meth Dog" is weed). Configure the keyword lists
/// when a catalog uses such names.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    // (category, lowercased keywords), in match priority order
    rules: Vec<(ProductCategory, Vec<String>)>,
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::from_config(&ClassifierConfig::default())
    }
}

impl KeywordClassifier {
    pub fn from_config(config: &ClassifierConfig) -> Self {
        let pick = |custom: &Option<Vec<String>>, builtin: &[&str]| -> Vec<String> {
            match custom {
                Some(words) => words.iter().map(|w| w.to_lowercase()).collect(),
                None => builtin.iter().map(|w| w.to_string()).collect(),
            }
        };

        Self {
            rules: vec![
                (ProductCategory::Weed, pick(&config.weed, WEED_KEYWORDS)),
                (ProductCategory::Meth, pick(&config.meth, METH_KEYWORDS)),
                (ProductCategory::Cocaine, pick(&config.cocaine, COCAINE_KEYWORDS)),
            ],
        }
    }

    pub fn keywords(&self, category: ProductCategory) -> &[String] {
        self.rules
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, words)| words.as_slice())
            .unwrap_or(&[])
    }

    /// True if the lowercased `text` contains any keyword of `category`.
    pub(crate) fn matches(&self, category: ProductCategory, text: &str) -> bool {
        let lowered = text.to_lowercase();
        self.keywords(category)
            .iter()
            .any(|word| !word.is_empty() && lowered.contains(word.as_str()))
    }
}

impl ProductClassifier for KeywordClassifier {
    fn classify(&self, identifier: &str) -> ProductCategory {
        self.rules
            .iter()
            .map(|(category, _)| *category)
            .find(|category| self.matches(*category, identifier))
            .unwrap_or(ProductCategory::Unknown)
    }
}
