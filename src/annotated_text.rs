// WHY: Immutable text plus append-only, type-indexed annotation storage; the version counter
// lets derived views detect mutation without relying on object identity

use std::collections::BTreeMap;
use std::ops::Range;
use tracing::trace;

use crate::annotation::{Annotation, Marker, MarkerKind};
use crate::error::{AnnotationError, Result};

/// Text with offset-ordered annotations indexed by marker kind
#[derive(Debug, Clone, Default)]
pub struct AnnotatedText {
    text: String,
    analysis: Range<usize>,
    annotations: BTreeMap<MarkerKind, Vec<Annotation>>,
    version: u64,
}

impl AnnotatedText {
    /// Annotated text whose analysis range covers the whole text
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let len = text.len();
        Self {
            text,
            analysis: 0..len,
            annotations: BTreeMap::new(),
            version: 0,
        }
    }

    /// Annotated text where only `analysis` is the caller's responsibility; the rest is context
    pub fn with_analysis_range(text: impl Into<String>, analysis: Range<usize>) -> Result<Self> {
        let mut annotated = Self::new(text);
        annotated.check_span(analysis.start, analysis.end)?;
        annotated.analysis = analysis;
        Ok(annotated)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn analysis_range(&self) -> Range<usize> {
        self.analysis.clone()
    }

    /// Incremented on every mutation
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Merge a batch into the per-kind sorted sequences
    ///
    /// The whole batch is validated before anything is stored. Equal annotations are all kept;
    /// ties in `(start, end)` keep insertion order.
    pub fn add_annotations(&mut self, batch: impl IntoIterator<Item = Annotation>) -> Result<()> {
        let batch: Vec<Annotation> = batch.into_iter().collect();
        for annotation in &batch {
            self.check_span(annotation.start(), annotation.end())?;
        }
        if batch.is_empty() {
            return Ok(());
        }

        trace!(count = batch.len(), "adding annotations");
        for annotation in batch {
            let sequence = self.annotations.entry(annotation.kind()).or_default();
            let key = annotation.sort_key();
            let pos = sequence.partition_point(|existing| existing.sort_key() <= key);
            sequence.insert(pos, annotation);
        }
        self.version += 1;
        Ok(())
    }

    /// Ordered annotations of one kind
    pub fn annotations(&self, kind: MarkerKind) -> &[Annotation] {
        self.annotations
            .get(&kind)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every annotation, grouped by kind and ordered by offset within each kind
    pub fn all_annotations(&self) -> impl Iterator<Item = &Annotation> {
        self.annotations.values().flatten()
    }

    pub fn annotation_count(&self) -> usize {
        self.annotations.values().map(Vec::len).sum()
    }

    /// Annotations of one kind intersecting `range`, points on its edges included
    pub fn annotations_touching(
        &self,
        kind: MarkerKind,
        range: Range<usize>,
    ) -> impl Iterator<Item = &Annotation> {
        self.annotations(kind)
            .iter()
            .take_while(move |a| a.start() <= range.end)
            .filter(move |a| a.end() >= range.start)
    }

    /// Replace the text by `text`, which must equal the current text with `flushed` leading bytes
    /// removed and arbitrary text appended, and re-anchor every surviving annotation
    pub(crate) fn rebase(&mut self, flushed: usize, text: String, analysis: Range<usize>) {
        // a rebased annotation may change kind, so everything is re-bucketed
        let survivors: Vec<Annotation> = std::mem::take(&mut self.annotations)
            .into_values()
            .flatten()
            .filter_map(|annotation| rebase_annotation(&annotation, flushed))
            .collect();
        for annotation in survivors {
            self.annotations
                .entry(annotation.kind())
                .or_default()
                .push(annotation);
        }
        for sequence in self.annotations.values_mut() {
            sequence.sort_by_key(Annotation::sort_key);
        }
        self.text = text;
        self.analysis = analysis;
        self.version += 1;
    }

    /// Validate that `start..end` is a well-formed span on character boundaries
    pub(crate) fn check_span(&self, start: usize, end: usize) -> Result<()> {
        if start > end || end > self.text.len() {
            return Err(AnnotationError::InvalidSpan {
                start,
                end,
                len: self.text.len(),
            });
        }
        for offset in [start, end] {
            if !self.text.is_char_boundary(offset) {
                return Err(AnnotationError::NotCharBoundary { offset });
            }
        }
        Ok(())
    }
}

/// Move an annotation left by `flushed` bytes, or drop it when nothing of it survives
fn rebase_annotation(annotation: &Annotation, flushed: usize) -> Option<Annotation> {
    let (start, end) = annotation.sort_key();
    // an insertion at the flush point was already emitted with the flushed text
    let flushed_insertion = annotation.kind() == MarkerKind::Replace;
    let survives =
        end > flushed || (annotation.is_empty() && start == flushed && !flushed_insertion);
    if !survives {
        return None;
    }
    if start >= flushed {
        return Some(annotation.with_span(start - flushed..end - flushed));
    }

    // start edge was flushed away
    let end = end - flushed;
    let moved = match annotation.kind() {
        MarkerKind::SentenceBreak => annotation.with_span(end..end),
        MarkerKind::Replace => annotation
            .with_marker(Marker::Skip)
            .with_span(0..end),
        _ => annotation.with_span(0..end),
    };
    Some(moved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_annotations_sorted_per_kind() {
        let mut text = AnnotatedText::new("one two three four");
        text.add_annotations([
            Annotation::skip(8..13),
            Annotation::sentence_break(3..3),
            Annotation::skip(0..3),
        ])
        .unwrap();
        text.add_annotations([Annotation::skip(4..7)]).unwrap();

        let skips: Vec<_> = text.annotations(MarkerKind::Skip).iter().map(Annotation::span).collect();
        assert_eq!(skips, vec![0..3, 4..7, 8..13]);
        assert_eq!(text.annotations(MarkerKind::SentenceBreak).len(), 1);
        assert!(text.annotations(MarkerKind::Replace).is_empty());
        assert_eq!(text.annotation_count(), 4);
    }

    #[test]
    fn test_duplicates_kept_in_insertion_order() {
        let mut text = AnnotatedText::new("Mr. Jones");
        text.add_annotations([Annotation::no_sentence_break(0..3).with_labels(["first"])])
            .unwrap();
        text.add_annotations([Annotation::no_sentence_break(0..3).with_labels(["second"])])
            .unwrap();

        let found = text.annotations(MarkerKind::NoSentenceBreak);
        assert_eq!(found.len(), 2);
        assert!(found[0].labels().contains("first"));
        assert!(found[1].labels().contains("second"));
    }

    #[test]
    fn test_invalid_spans_rejected_atomically() {
        let mut text = AnnotatedText::new("short");
        let err = text
            .add_annotations([Annotation::skip(0..2), Annotation::skip(3..9)])
            .unwrap_err();
        assert_eq!(err, AnnotationError::InvalidSpan { start: 3, end: 9, len: 5 });
        assert_eq!(text.annotation_count(), 0);
        assert_eq!(text.version(), 0);

        let err = text.add_annotations([Annotation::skip(4..2)]).unwrap_err();
        assert!(matches!(err, AnnotationError::InvalidSpan { .. }));
    }

    #[test]
    fn test_char_boundary_enforced() {
        let mut text = AnnotatedText::new("héllo");
        let err = text.add_annotations([Annotation::skip(0..2)]).unwrap_err();
        assert_eq!(err, AnnotationError::NotCharBoundary { offset: 2 });
        text.add_annotations([Annotation::skip(0..3)]).unwrap();
    }

    #[test]
    fn test_version_tracks_mutation() {
        let mut text = AnnotatedText::new("abc");
        assert_eq!(text.version(), 0);
        text.add_annotations(Vec::new()).unwrap();
        assert_eq!(text.version(), 0);
        text.add_annotations([Annotation::skip(0..1)]).unwrap();
        assert_eq!(text.version(), 1);
    }

    #[test]
    fn test_rebase_reanchors_and_clamps() {
        let mut text = AnnotatedText::new("One Two Three");
        text.add_annotations([
            Annotation::attribute(0..3, "chunk", "1"),
            Annotation::attribute(4..7, "chunk", "2"),
            Annotation::attribute(4..4, "start", "2"),
            Annotation::skip(2..6),
            Annotation::sentence_break(1..9),
            Annotation::replace(3..5, " "),
            Annotation::replace(4..4, "!"),
        ])
        .unwrap();

        text.rebase(4, "Two Three".to_string(), 0..9);

        let attributes: Vec<_> = text
            .annotations(MarkerKind::Attribute)
            .iter()
            .map(Annotation::span)
            .collect();
        assert_eq!(attributes, vec![0..0, 0..3]);
        assert_eq!(text.annotations(MarkerKind::Skip)[0].span(), 0..1);
        assert_eq!(text.annotations(MarkerKind::Skip)[1].span(), 0..2);
        assert_eq!(text.annotations(MarkerKind::SentenceBreak)[0].span(), 5..5);
        assert!(text.annotations(MarkerKind::Replace).is_empty());
        assert_eq!(text.text(), "Two Three");
    }

    #[test]
    fn test_annotations_touching_range() {
        let mut text = AnnotatedText::new("Mr. Jones met Dr. Who");
        text.add_annotations([
            Annotation::no_sentence_break(0..3),
            Annotation::no_sentence_break(14..17),
            Annotation::sentence_break(9..9),
        ])
        .unwrap();
        let found: Vec<_> = text
            .annotations_touching(MarkerKind::NoSentenceBreak, 3..14)
            .map(Annotation::span)
            .collect();
        assert_eq!(found, vec![0..3, 14..17]);
        assert_eq!(text.annotations_touching(MarkerKind::NoSentenceBreak, 4..13).count(), 0);
        assert_eq!(text.annotations_touching(MarkerKind::SentenceBreak, 9..9).count(), 1);
    }

    #[test]
    fn test_analysis_range_validated() {
        let text = AnnotatedText::with_analysis_range("abcdef", 2..4).unwrap();
        assert_eq!(text.analysis_range(), 2..4);
        assert!(AnnotatedText::with_analysis_range("abc", 2..5).is_err());
    }
}
