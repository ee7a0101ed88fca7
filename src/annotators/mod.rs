// WHY: Annotators are the pluggable producers of raw-text markers; they only ever see an
// AnnotatedText and its analysis range, so the same annotator runs over a whole text or a
// rolling window block

use crate::annotated_text::AnnotatedText;
use crate::annotation::Annotation;
use crate::error::Result;

pub mod abbreviations;
pub mod newlines;
pub mod regex_marker;

pub use abbreviations::AbbreviationAnnotator;
pub use newlines::NewlineAnnotator;
pub use regex_marker::{MarkerAction, RegexMarkerAnnotator};

/// Produces raw-text annotations
///
/// Only annotations starting inside `text.analysis_range()` should be returned; the rest of the
/// text is context. Returned offsets are relative to `text`.
pub trait Annotator: Send + Sync {
    /// Provenance label attached to every annotation produced
    fn name(&self) -> &str;

    fn annotate(&self, text: &AnnotatedText) -> Result<Vec<Annotation>>;
}
