// WHY: Configurable regex -> marker rules cover most raw-text clean-up (markup skipping, entity
// replacement, forced breaks) without writing a dedicated annotator per case

use regex_automata::meta::Regex;
use serde::Deserialize;
use tracing::trace;

use super::Annotator;
use crate::annotated_text::AnnotatedText;
use crate::annotation::Annotation;
use crate::error::{AnnotationError, Result};

/// Marker produced for every match of a rule
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MarkerAction {
    Skip,
    /// `$N` / `${name}` in `replacement` are replaced by the matching groups
    Replace { replacement: String },
    SentenceBreak,
    NoSentenceBreak,
    /// `value` supports the same group interpolation as `replacement`
    Attribute { key: String, value: String },
}

/// Marks every match (or one capture group of it) with the configured markers
#[derive(Debug)]
pub struct RegexMarkerAnnotator {
    name: String,
    pattern: String,
    regex: Regex,
    group: usize,
    actions: Vec<MarkerAction>,
    max_match_len: usize,
}

impl RegexMarkerAnnotator {
    /// `max_match_len` is normally the stream block size: a longer match could never be seen
    /// whole by a rolling window
    pub fn new(
        name: impl Into<String>,
        pattern: &str,
        group: usize,
        actions: Vec<MarkerAction>,
        max_match_len: usize,
    ) -> Result<Self> {
        let invalid = |reason: String| AnnotationError::InvalidPattern {
            pattern: pattern.to_string(),
            reason,
        };
        let regex = Regex::new(pattern).map_err(|e| invalid(e.to_string()))?;
        if group >= regex.captures_len() {
            return Err(invalid(format!("pattern has no capture group {group}")));
        }
        if actions.is_empty() {
            return Err(invalid("no marker actions configured".to_string()));
        }
        Ok(Self {
            name: name.into(),
            pattern: pattern.to_string(),
            regex,
            group,
            actions,
            max_match_len,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

impl Annotator for RegexMarkerAnnotator {
    fn name(&self) -> &str {
        &self.name
    }

    fn annotate(&self, text: &AnnotatedText) -> Result<Vec<Annotation>> {
        let haystack = text.text();
        let analysis = text.analysis_range();
        let mut annotations = Vec::new();

        for caps in self.regex.captures_iter(haystack) {
            let Some(span) = caps.get_group(self.group) else {
                continue;
            };
            if span.len() > self.max_match_len {
                return Err(AnnotationError::MatchExceedsBlock {
                    len: span.len(),
                    block_size: self.max_match_len,
                    pattern: self.pattern.clone(),
                });
            }
            if !analysis.contains(&span.start) {
                trace!(pattern = %self.pattern, start = span.start, "match outside analysis range");
                continue;
            }

            for action in &self.actions {
                let annotation = match action {
                    MarkerAction::Skip => Annotation::skip(span.range()),
                    MarkerAction::Replace { replacement } => {
                        Annotation::replace(span.range(), caps.interpolate_string(haystack, replacement))
                    }
                    MarkerAction::SentenceBreak => Annotation::sentence_break(span.range()),
                    MarkerAction::NoSentenceBreak => Annotation::no_sentence_break(span.range()),
                    MarkerAction::Attribute { key, value } => Annotation::attribute(
                        span.range(),
                        key.clone(),
                        caps.interpolate_string(haystack, value),
                    ),
                };
                annotations.push(annotation.with_labels([self.name.as_str()]));
            }
        }
        Ok(annotations)
    }
}
