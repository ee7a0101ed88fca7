// WHY: Marker payloads form a closed set, so behaviour driven by marker type is matched
// exhaustively instead of dispatched through a trait object

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::ops::Range;

/// Type tag used to index annotations inside an [`AnnotatedText`](crate::AnnotatedText)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerKind {
    Skip,
    Replace,
    SentenceBreak,
    NoSentenceBreak,
    Attribute,
}

impl MarkerKind {
    /// Kinds that rewrite the text when the processed view is built
    pub fn alters_text(self) -> bool {
        matches!(self, MarkerKind::Skip | MarkerKind::Replace)
    }
}

impl fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MarkerKind::Skip => "skip",
            MarkerKind::Replace => "replace",
            MarkerKind::SentenceBreak => "sentence_break",
            MarkerKind::NoSentenceBreak => "no_sentence_break",
            MarkerKind::Attribute => "attribute",
        };
        f.write_str(name)
    }
}

/// Payload carried by an annotation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Marker {
    /// Span excluded from the processed view
    Skip,
    /// Span substituted by the insertion text in the processed view
    Replace { text: String },
    /// Forces a sentence boundary at both edges of the span
    SentenceBreak,
    /// Forbids a sentence boundary inside the span and right after it
    NoSentenceBreak,
    /// Free-form key/value tag, carried through to the processed view
    Attribute { key: String, value: String },
}

impl Marker {
    pub fn kind(&self) -> MarkerKind {
        match self {
            Marker::Skip => MarkerKind::Skip,
            Marker::Replace { .. } => MarkerKind::Replace,
            Marker::SentenceBreak => MarkerKind::SentenceBreak,
            Marker::NoSentenceBreak => MarkerKind::NoSentenceBreak,
            Marker::Attribute { .. } => MarkerKind::Attribute,
        }
    }

    /// Insertion text of a replacement, `None` for every other marker
    pub fn insertion(&self) -> Option<&str> {
        match self {
            Marker::Replace { text } => Some(text),
            _ => None,
        }
    }
}

/// A half-open span `[start, end)` over some text, a marker and a set of provenance labels
///
/// Annotations are immutable values: moving one to other coordinates produces a new annotation
/// with the same marker and labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Annotation {
    start: usize,
    end: usize,
    marker: Marker,
    labels: BTreeSet<String>,
}

impl Annotation {
    /// Create an annotation; span validity is checked when it is added to a text
    pub fn new(span: Range<usize>, marker: Marker) -> Self {
        Self {
            start: span.start,
            end: span.end,
            marker,
            labels: BTreeSet::new(),
        }
    }

    pub fn skip(span: Range<usize>) -> Self {
        Self::new(span, Marker::Skip)
    }

    pub fn replace(span: Range<usize>, text: impl Into<String>) -> Self {
        Self::new(span, Marker::Replace { text: text.into() })
    }

    pub fn sentence_break(span: Range<usize>) -> Self {
        Self::new(span, Marker::SentenceBreak)
    }

    pub fn no_sentence_break(span: Range<usize>) -> Self {
        Self::new(span, Marker::NoSentenceBreak)
    }

    pub fn attribute(span: Range<usize>, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(
            span,
            Marker::Attribute {
                key: key.into(),
                value: value.into(),
            },
        )
    }

    /// Attach provenance labels (e.g. the name of the annotator that produced it)
    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels.extend(labels.into_iter().map(Into::into));
        self
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn span(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Zero-length annotations are point markers
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn marker(&self) -> &Marker {
        &self.marker
    }

    pub fn kind(&self) -> MarkerKind {
        self.marker.kind()
    }

    pub fn labels(&self) -> &BTreeSet<String> {
        &self.labels
    }

    /// Ordering key; ties keep insertion order
    pub fn sort_key(&self) -> (usize, usize) {
        (self.start, self.end)
    }

    /// True when the two spans share at least one character, or when a point lies strictly inside
    /// the other span
    pub fn overlaps(&self, other: &Annotation) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Same marker and labels over a different span
    pub fn with_span(&self, span: Range<usize>) -> Self {
        Self {
            start: span.start,
            end: span.end,
            marker: self.marker.clone(),
            labels: self.labels.clone(),
        }
    }

    /// Same span and labels with a different marker
    pub(crate) fn with_marker(&self, marker: Marker) -> Self {
        Self {
            start: self.start,
            end: self.end,
            marker,
            labels: self.labels.clone(),
        }
    }
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}..{})", self.kind(), self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_set_kind() {
        assert_eq!(Annotation::skip(0..3).kind(), MarkerKind::Skip);
        assert_eq!(Annotation::replace(0..3, "x").kind(), MarkerKind::Replace);
        assert_eq!(Annotation::sentence_break(2..2).kind(), MarkerKind::SentenceBreak);
        assert_eq!(Annotation::no_sentence_break(0..3).kind(), MarkerKind::NoSentenceBreak);
        assert_eq!(Annotation::attribute(0..1, "k", "v").kind(), MarkerKind::Attribute);
        assert_eq!(Annotation::replace(0..3, "five").marker().insertion(), Some("five"));
        assert_eq!(Annotation::skip(0..3).marker().insertion(), None);
    }

    #[test]
    fn test_overlap_rules() {
        let a = Annotation::skip(2..5);
        assert!(a.overlaps(&Annotation::skip(4..8)));
        assert!(!a.overlaps(&Annotation::skip(5..8)));
        assert!(a.overlaps(&Annotation::replace(3..3, "x")));
        assert!(!a.overlaps(&Annotation::replace(5..5, "x")));
    }

    #[test]
    fn test_with_span_keeps_labels() {
        let a = Annotation::attribute(4..7, "chunk", "2").with_labels(["2", "roll"]);
        let moved = a.with_span(0..3);
        assert_eq!(moved.span(), 0..3);
        assert_eq!(moved.labels(), a.labels());
        assert_eq!(moved.marker(), a.marker());
        assert_eq!(format!("{moved}"), "attribute[0..3)");
    }
}
