// WHY: Abbreviation periods are the main source of false sentence splits; marking them with
// NoSentenceBreak lets any classifier stay naive about them
//
// Abbreviation handling with a curated list, extended from configuration

use regex_automata::meta::Regex;
use tracing::debug;

use super::Annotator;
use crate::annotated_text::AnnotatedText;
use crate::annotation::Annotation;
use crate::error::{AnnotationError, Result};

/// Titles that precede proper nouns, like "Dr. Smith", "Mr. Johnson"
pub const TITLE_ABBREVIATIONS: &[&str] = &["Dr.", "Mr.", "Mrs.", "Ms.", "Prof.", "Sr.", "Jr."];

/// Other abbreviations whose period does not end a sentence
pub const ABBREVIATIONS: &[&str] = &[
    "U.S.A.", "U.K.", "N.Y.C.", "L.A.", "D.C.", "ft.", "lbs.", "oz.", "mi.", "km.", "a.m.", "p.m.",
    "etc.", "vs.", "ea.", "deg.", "et al.", "e.g.", "i.e.",
];

/// Emits a NoSentenceBreak over every known abbreviation
#[derive(Debug)]
pub struct AbbreviationAnnotator {
    regex: Regex,
    count: usize,
}

impl AbbreviationAnnotator {
    /// Built-in lists plus `extra`
    pub fn new<S: AsRef<str>>(extra: &[S]) -> Result<Self> {
        let mut words: Vec<&str> = TITLE_ABBREVIATIONS
            .iter()
            .chain(ABBREVIATIONS)
            .copied()
            .chain(extra.iter().map(AsRef::as_ref))
            .filter(|word| !word.is_empty())
            .collect();
        // longest first, so "U.S.A." wins over a configured "U.S."
        words.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
        words.dedup();

        let alternatives: Vec<String> = words.iter().copied().map(regex_syntax::escape).collect();
        let pattern = format!(r"\b(?:{})", alternatives.join("|"));
        let regex = Regex::new(&pattern).map_err(|e| AnnotationError::InvalidPattern {
            pattern: pattern.clone(),
            reason: e.to_string(),
        })?;
        debug!(abbreviations = words.len(), "compiled abbreviation matcher");
        Ok(Self {
            regex,
            count: words.len(),
        })
    }

    pub fn with_default_list() -> Result<Self> {
        Self::new::<&str>(&[])
    }

    /// Number of distinct abbreviations recognised
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

impl Annotator for AbbreviationAnnotator {
    fn name(&self) -> &str {
        "abbreviations"
    }

    fn annotate(&self, text: &AnnotatedText) -> Result<Vec<Annotation>> {
        let analysis = text.analysis_range();
        Ok(self
            .regex
            .find_iter(text.text())
            .filter(|m| analysis.contains(&m.start()))
            .map(|m| Annotation::no_sentence_break(m.range()).with_labels([self.name()]))
            .collect())
    }
}
