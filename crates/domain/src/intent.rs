//! Keyword-driven intent classification.
//!
//! A [`RuleTable`] is an ordered list of `(label, keywords)` rules. The
//! [`Classifier`] returns the label of the first rule with any keyword that
//! occurs, case-insensitively, as a substring of the input. Rule order is part
//! of the contract: overlapping keyword sets resolve to the earliest rule.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::HandlerLabel;

/// Reasons a rule table cannot be constructed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleTableError {
    /// A rule had a blank label.
    #[error("rule {index} has an empty label")]
    EmptyLabel {
        /// Position of the offending rule.
        index: usize,
    },

    /// A rule had no keywords, or a keyword was blank.
    #[error("rule '{label}' has an empty keyword")]
    EmptyKeyword {
        /// Label of the offending rule.
        label: String,
    },

    /// The JSON document could not be parsed.
    #[error("rule table is not valid JSON: {message}")]
    Parse {
        /// Parser error description.
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// One classification rule. Keywords are stored lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntentRule {
    label: HandlerLabel,
    keywords: Vec<String>,
}

impl IntentRule {
    /// Creates a rule, lower-casing every keyword.
    ///
    /// # Errors
    ///
    /// [`RuleTableError::EmptyLabel`] for a blank label (reported at index 0;
    /// [`RuleTable::new`] re-reports with the real position) and
    /// [`RuleTableError::EmptyKeyword`] for an empty set or a blank keyword.
    pub fn new<I, S>(label: &str, keywords: I) -> Result<Self, RuleTableError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let label = HandlerLabel::new(label.trim()).ok_or(RuleTableError::EmptyLabel { index: 0 })?;
        let keywords: Vec<String> = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .collect();
        if keywords.is_empty() || keywords.iter().any(String::is_empty) {
            return Err(RuleTableError::EmptyKeyword {
                label: label.to_string(),
            });
        }
        Ok(Self { label, keywords })
    }

    /// Label this rule selects.
    pub fn label(&self) -> &HandlerLabel {
        &self.label
    }

    /// Lower-cased keywords.
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    fn matches(&self, lowered: &str) -> bool {
        self.keywords.iter().any(|k| lowered.contains(k.as_str()))
    }
}

#[derive(Deserialize)]
struct RawRule {
    label: String,
    keywords: Vec<String>,
}

/// Ordered list of classification rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<RawRule>")]
pub struct RuleTable {
    rules: Vec<IntentRule>,
}

impl RuleTable {
    /// Builds a table from already-validated rules, preserving their order.
    pub fn new(rules: Vec<IntentRule>) -> Self {
        Self { rules }
    }

    /// Parses a table from `[{"label": "...", "keywords": ["..."]}, ...]`.
    ///
    /// # Errors
    ///
    /// [`RuleTableError::Parse`] for malformed JSON; otherwise the first
    /// rule-level validation failure.
    pub fn from_json(json: &str) -> Result<Self, RuleTableError> {
        let raw: Vec<RawRule> = serde_json::from_str(json).map_err(|e| RuleTableError::Parse {
            message: e.to_string(),
        })?;
        Self::try_from(raw)
    }

    /// Built-in rules covering the six specialist handlers.
    pub fn default_rules() -> Self {
        const DEFAULTS: &[(&str, &[&str])] = &[
            ("speech_writer", &["发言稿", "speech"]),
            ("news_writer", &["新闻稿", "press release", "news article"]),
            ("official_document", &["公文", "official document", "memo"]),
            ("research_report", &["研报", "research report"]),
            ("code_assistant", &["代码", "code", "program"]),
            ("data_analysis", &["数据分析", "data analysis"]),
        ];
        let rules = DEFAULTS
            .iter()
            .filter_map(|(label, keywords)| IntentRule::new(label, keywords.iter()).ok())
            .collect();
        Self { rules }
    }

    /// Rules in declaration order.
    pub fn rules(&self) -> &[IntentRule] {
        &self.rules
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns `true` if the table has no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl TryFrom<Vec<RawRule>> for RuleTable {
    type Error = RuleTableError;

    fn try_from(raw: Vec<RawRule>) -> Result<Self, Self::Error> {
        let rules = raw
            .into_iter()
            .enumerate()
            .map(|(index, r)| {
                IntentRule::new(&r.label, r.keywords).map_err(|e| match e {
                    RuleTableError::EmptyLabel { .. } => RuleTableError::EmptyLabel { index },
                    other => other,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

/// Outcome of classifying one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentResult {
    /// Handler label to dispatch to. The default label when nothing matched.
    pub label: HandlerLabel,
    /// Index of the matching rule, `None` when unclassified.
    pub matched_rule: Option<usize>,
}

impl IntentResult {
    /// Label to report to callers: the matched label, or `"unclassified"`.
    pub fn reported_label(&self) -> &str {
        match self.matched_rule {
            Some(_) => self.label.as_str(),
            None => "unclassified",
        }
    }
}

/// Deterministic first-match classifier over a [`RuleTable`].
#[derive(Debug, Clone)]
pub struct Classifier {
    table: RuleTable,
    default_label: HandlerLabel,
}

impl Classifier {
    /// Creates a classifier that falls back to the generalist label.
    pub fn new(table: RuleTable) -> Self {
        Self {
            table,
            default_label: HandlerLabel::generalist(),
        }
    }

    /// Rule table in use.
    pub fn table(&self) -> &RuleTable {
        &self.table
    }

    /// Returns the first rule whose keywords occur in `text`.
    pub fn classify(&self, text: &str) -> IntentResult {
        let lowered = text.to_lowercase();
        self.table
            .rules
            .iter()
            .enumerate()
            .find(|(_, rule)| rule.matches(&lowered))
            .map(|(index, rule)| IntentResult {
                label: rule.label.clone(),
                matched_rule: Some(index),
            })
            .unwrap_or_else(|| IntentResult {
                label: self.default_label.clone(),
                matched_rule: None,
            })
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(RuleTable::default_rules())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unmatched_text_returns_default_label() {
        let result = Classifier::default().classify("Hello there");
        assert!(result.label.is_generalist());
        assert_eq!(result.matched_rule, None);
        assert_eq!(result.reported_label(), "unclassified");
    }

    #[test]
    fn test_earliest_rule_wins_on_shared_keyword() {
        let table = RuleTable::new(vec![
            IntentRule::new("first", ["report"]).unwrap(),
            IntentRule::new("second", ["report", "summary"]).unwrap(),
        ]);
        let classifier = Classifier::new(table);
        let result = classifier.classify("Write a quarterly report");
        assert_eq!(result.label.as_str(), "first");
        assert_eq!(result.matched_rule, Some(0));
        assert_eq!(classifier.classify("summary please").label.as_str(), "second");
    }

    #[test]
    fn test_matching_is_case_insensitive_substring() {
        let classifier = Classifier::default();
        let result = classifier.classify("Please write PYTHON CODE for me");
        assert_eq!(result.label.as_str(), "code_assistant");
        assert_eq!(result.reported_label(), "code_assistant");
    }

    #[test]
    fn test_default_table_order_resolves_overlap() {
        // "speech" and "code" both present; speech_writer is declared first.
        let result = Classifier::default().classify("code a speech generator");
        assert_eq!(result.label.as_str(), "speech_writer");
    }

    #[test]
    fn test_default_table_matches_chinese_keywords() {
        let result = Classifier::default().classify("帮我写一篇新闻稿");
        assert_eq!(result.label.as_str(), "news_writer");
    }

    #[test]
    fn test_from_json_preserves_order_and_lowercases() {
        let table =
            RuleTable::from_json(r#"[{"label": "a", "keywords": ["FOO"]}, {"label": "b", "keywords": ["bar"]}]"#)
                .unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.rules()[0].keywords(), ["foo".to_string()]);
        assert_eq!(Classifier::new(table).classify("Foo!").label.as_str(), "a");
    }

    #[test]
    fn test_from_json_rejects_blank_entries() {
        assert_eq!(
            RuleTable::from_json(r#"[{"label": "a", "keywords": ["x"]}, {"label": " ", "keywords": ["y"]}]"#),
            Err(RuleTableError::EmptyLabel { index: 1 })
        );
        assert!(matches!(
            RuleTable::from_json(r#"[{"label": "a", "keywords": []}]"#),
            Err(RuleTableError::EmptyKeyword { .. })
        ));
        assert!(matches!(
            RuleTable::from_json("not json"),
            Err(RuleTableError::Parse { .. })
        ));
    }
}
