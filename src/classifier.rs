// WHY: Sentence boundary decisions are made on processed text, behind a trait so a statistical
// model can replace the punctuation rules without touching the window or the mapping
//
// The rule-based classifier compiles the boundary rules into one regex-automata pattern:
// terminal punctuation, optional closing quotes, whitespace, optional openers, capital letter.

use regex_automata::meta::Regex;
use serde::Deserialize;
use tracing::{debug, trace};

use crate::annotated_text::AnnotatedText;
use crate::annotation::Annotation;
use crate::error::{AnnotationError, Result};

/// Decides where sentences end in a processed text
///
/// Returns SentenceBreak annotations in `processed` offsets, only for boundaries inside
/// `processed.analysis_range()`. Breaks falling inside a NoSentenceBreak span are discarded by
/// the caller, so a classifier need not look at the projected annotations.
pub trait SentenceBoundaryClassifier: Send + Sync {
    fn name(&self) -> &str;

    fn classify(&self, processed: &AnnotatedText) -> Result<Vec<Annotation>>;
}

/// Configuration for sentence boundary detection rules
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BoundaryRules {
    /// End punctuation characters that can terminate a sentence
    pub end_punctuation: Vec<char>,
    /// Quotes that may close a sentence after its punctuation
    pub closing_quotes: Vec<char>,
    /// Characters considered opening quotes
    pub opening_quotes: Vec<char>,
    /// Characters considered opening parentheticals
    pub opening_parentheticals: Vec<char>,
}

impl Default for BoundaryRules {
    fn default() -> Self {
        Self {
            end_punctuation: vec!['.', '?', '!'],
            closing_quotes: vec!['"', '\'', '\u{201D}', '\u{2019}'],
            opening_quotes: vec!['"', '\'', '\u{201C}', '\u{2018}'],
            opening_parentheticals: vec!['(', '[', '{'],
        }
    }
}

fn char_class<'a>(chars: impl IntoIterator<Item = &'a char>) -> Option<String> {
    let members: String = chars
        .into_iter()
        .map(|c| regex_syntax::escape(c.encode_utf8(&mut [0; 4])))
        .collect();
    (!members.is_empty()).then(|| format!("[{members}]"))
}

impl BoundaryRules {
    /// The boundary pattern; capture group 1 ends where the sentence ends
    pub fn pattern(&self) -> Result<String> {
        let end = char_class(&self.end_punctuation).ok_or_else(|| AnnotationError::InvalidPattern {
            pattern: String::new(),
            reason: "no end punctuation configured".to_string(),
        })?;
        let closers = char_class(&self.closing_quotes)
            .map(|class| format!("{class}*"))
            .unwrap_or_default();
        let openers = char_class(self.opening_quotes.iter().chain(&self.opening_parentheticals))
            .map(|class| format!("{class}*"))
            .unwrap_or_default();
        Ok(format!(r"({end}+{closers})\s+{openers}\p{{Lu}}"))
    }
}

/// Breaks after terminal punctuation followed by a capitalised word
#[derive(Debug)]
pub struct PunctuationClassifier {
    regex: Regex,
}

impl PunctuationClassifier {
    pub fn new(rules: &BoundaryRules) -> Result<Self> {
        let pattern = rules.pattern()?;
        let regex = Regex::new(&pattern).map_err(|e| AnnotationError::InvalidPattern {
            pattern: pattern.clone(),
            reason: e.to_string(),
        })?;
        debug!(%pattern, "compiled boundary classifier");
        Ok(Self { regex })
    }

    pub fn with_default_rules() -> Result<Self> {
        Self::new(&BoundaryRules::default())
    }
}

impl SentenceBoundaryClassifier for PunctuationClassifier {
    fn name(&self) -> &str {
        "punctuation"
    }

    fn classify(&self, processed: &AnnotatedText) -> Result<Vec<Annotation>> {
        let analysis = processed.analysis_range();
        let mut breaks = Vec::new();
        for caps in self.regex.captures_iter(processed.text()) {
            let Some(end) = caps.get_group(1).map(|span| span.end) else {
                continue;
            };
            if analysis.contains(&end) {
                breaks.push(Annotation::sentence_break(end..end).with_labels([self.name()]));
            }
        }
        trace!(count = breaks.len(), "classified boundaries");
        Ok(breaks)
    }
}
