// WHY: A sentence is a read-only slice of the processed text that still knows where every one of
// its characters came from, so downstream annotations land on the original text

use serde::Serialize;
use std::ops::Range;
use tracing::trace;

use crate::annotated_text::AnnotatedText;
use crate::annotation::{Annotation, MarkerKind};
use crate::error::{AnnotationError, Result};
use crate::lines::Position;
use crate::mapper::CoordinateMapper;

/// Position in the input using 1-based lines and character columns, end inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Span {
    pub start_line: usize,
    pub start_col: usize,
    pub end_line: usize,
    pub end_col: usize,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        Self {
            start_line: start.line,
            start_col: start.col,
            end_line: end.line,
            end_col: end.col,
        }
    }
}

/// Receives annotations expressed in stream-global raw offsets
pub trait AnnotationSink {
    fn add_original_annotations(&mut self, batch: Vec<Annotation>) -> Result<()>;
}

/// A detected sentence
#[derive(Debug, Clone)]
pub struct Sentence {
    index: usize,
    text: String,
    /// Local offsets -> stream-global raw offsets
    mapper: CoordinateMapper,
    span: Span,
}

impl Sentence {
    pub(crate) fn new(index: usize, text: String, mapper: CoordinateMapper, span: Span) -> Self {
        Self {
            index,
            text,
            mapper,
            span,
        }
    }

    /// 0-based sequence number in the input
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn mapper(&self) -> &CoordinateMapper {
        &self.mapper
    }

    /// Raw extent of the sentence in the original text
    pub fn raw_range(&self) -> Range<usize> {
        self.mapper.raw_range()
    }

    /// Raw offset of a local offset; `original_index(text().len())` is the raw end of the last
    /// character
    pub fn original_index(&self, local: usize) -> usize {
        if local >= self.text.len() {
            return self.mapper.raw_range().end;
        }
        self.mapper.processed_to_raw(local)
    }

    /// Translate annotations over the sentence text to raw offsets and hand them to `sink`
    pub fn add_annotations<S: AnnotationSink>(
        &self,
        sink: &mut S,
        batch: impl IntoIterator<Item = Annotation>,
    ) -> Result<()> {
        let mut translated = Vec::new();
        for annotation in batch {
            if annotation.start() > annotation.end() || annotation.end() > self.text.len() {
                return Err(AnnotationError::InvalidSpan {
                    start: annotation.start(),
                    end: annotation.end(),
                    len: self.text.len(),
                });
            }
            let raw = self.mapper.span_to_raw(annotation.span());
            trace!(sentence = self.index, %annotation, raw_start = raw.start, raw_end = raw.end, "sentence annotation");
            translated.push(annotation.with_span(raw));
        }
        sink.add_original_annotations(translated)
    }

    /// `index<TAB>text<TAB>(start_line,start_col,end_line,end_col)`
    pub fn to_tsv(&self) -> String {
        format!(
            "{}\t{}\t({},{},{},{})",
            self.index,
            self.text,
            self.span.start_line,
            self.span.start_col,
            self.span.end_line,
            self.span.end_col
        )
    }

    pub fn to_record(&self) -> SentenceRecord<'_> {
        let raw = self.raw_range();
        SentenceRecord {
            index: self.index,
            text: &self.text,
            raw_start: raw.start,
            raw_end: raw.end,
            span: self.span,
        }
    }
}

/// JSON-lines shape of a sentence
#[derive(Debug, Serialize)]
pub struct SentenceRecord<'a> {
    pub index: usize,
    pub text: &'a str,
    pub raw_start: usize,
    pub raw_end: usize,
    pub span: Span,
}

/// Processed-text boundary offsets implied by the SentenceBreak annotations of `raw[..limit]`
///
/// Returns the sorted, deduplicated boundaries and the number of edges masked by a
/// NoSentenceBreak. Masks are compared in processed offsets, so markup skipped right after an
/// abbreviation does not move a break out of it.
pub(crate) fn boundary_offsets(
    raw: &AnnotatedText,
    mapper: &CoordinateMapper,
    limit: usize,
) -> (Vec<usize>, usize) {
    let masks: Vec<Range<usize>> = raw
        .annotations(MarkerKind::NoSentenceBreak)
        .iter()
        .take_while(|m| m.start() <= limit)
        .filter_map(|m| mapper.project(m.start()..m.end().min(limit)))
        .collect();
    let mut suppressed = 0;
    let mut boundaries: Vec<usize> = raw
        .annotations(MarkerKind::SentenceBreak)
        .iter()
        .take_while(|a| a.start() <= limit)
        .flat_map(|a| {
            let end = a.end().min(limit);
            std::iter::once(a.start()).chain((end > a.start()).then_some(end))
        })
        .map(|edge| mapper.raw_to_processed(edge))
        .filter(|&boundary| {
            let masked = masks
                .iter()
                .take_while(|m| m.start < boundary)
                .any(|m| boundary <= m.end);
            if masked {
                suppressed += 1;
            }
            !masked
        })
        .collect();
    boundaries.sort_unstable();
    boundaries.dedup();
    (boundaries, suppressed)
}

/// `range` with leading and trailing whitespace of `text` removed, or `None` if nothing is left
pub(crate) fn trim_range(text: &str, range: Range<usize>) -> Option<Range<usize>> {
    let slice = &text[range.clone()];
    let start = range.start + (slice.len() - slice.trim_start().len());
    let end = range.start + slice.trim_end().len();
    (start < end).then_some(start..end)
}

/// Trimmed, non-empty runs of `text[range]` between consecutive boundaries
pub(crate) fn sentence_ranges(text: &str, range: Range<usize>, boundaries: &[usize]) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut start = range.start;
    let cuts = boundaries
        .iter()
        .copied()
        .filter(|&b| b > range.start && b < range.end)
        .chain(std::iter::once(range.end));
    for cut in cuts {
        if let Some(trimmed) = trim_range(text, start..cut) {
            ranges.push(trimmed);
        }
        start = cut;
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Collect(Vec<Annotation>);

    impl AnnotationSink for Collect {
        fn add_original_annotations(&mut self, batch: Vec<Annotation>) -> Result<()> {
            self.0.extend(batch);
            Ok(())
        }
    }

    fn sentence_over(raw: &str, skips: &[Range<usize>], range: Range<usize>) -> Sentence {
        let mut text = AnnotatedText::new(raw);
        text.add_annotations(skips.iter().cloned().map(Annotation::skip)).unwrap();
        let (mapper, processed) = CoordinateMapper::build(&text, raw.len()).unwrap();
        let local = mapper.slice(range.clone());
        Sentence::new(
            0,
            processed[range].to_string(),
            local,
            Span::new(Position { line: 1, col: 1 }, Position { line: 1, col: 1 }),
        )
    }

    #[test]
    fn test_original_index_skips_markup() {
        let sentence = sentence_over("Hello <b>big</b> world.", &[6..9, 12..16], 0..16);
        assert_eq!(sentence.text(), "Hello big world.");
        assert_eq!(sentence.original_index(0), 0);
        assert_eq!(sentence.original_index(6), 9);
        assert_eq!(sentence.original_index(9), 16);
        assert_eq!(sentence.original_index(sentence.text().len()), 23);
        assert_eq!(sentence.raw_range(), 0..23);
    }

    #[test]
    fn test_add_annotations_lands_on_raw_offsets() {
        let sentence = sentence_over("Hello <b>big</b> world.", &[6..9, 12..16], 0..16);
        let mut sink = Collect::default();
        sentence
            .add_annotations(&mut sink, [Annotation::attribute(6..9, "pos", "ADJ")])
            .unwrap();
        assert_eq!(sink.0.len(), 1);
        // the closing tag stays outside the span
        assert_eq!(sink.0[0].span(), 9..12);

        let err = sentence
            .add_annotations(&mut sink, [Annotation::skip(10..40)])
            .unwrap_err();
        assert!(matches!(err, AnnotationError::InvalidSpan { .. }));
    }

    #[test]
    fn test_sentence_ranges_trim_and_drop_blank_runs() {
        let text = " One.  Two. \n ";
        let ranges = sentence_ranges(text, 0..text.len(), &[5, 6, 11]);
        let found: Vec<_> = ranges.iter().map(|r| &text[r.clone()]).collect();
        assert_eq!(found, vec!["One.", "Two."]);
    }

    #[test]
    fn test_boundaries_masked_after_abbreviation() {
        let mut raw = AnnotatedText::new("I see Mr. Jones.");
        raw.add_annotations([
            Annotation::no_sentence_break(6..9),
            Annotation::sentence_break(9..9),
            Annotation::sentence_break(6..6),
        ])
        .unwrap();
        let (mapper, _) = CoordinateMapper::build(&raw, raw.len()).unwrap();
        let (boundaries, suppressed) = boundary_offsets(&raw, &mapper, raw.len());
        // a break before the abbreviation is allowed, one right after it is not
        assert_eq!(boundaries, vec![6]);
        assert_eq!(suppressed, 1);
    }

    #[test]
    fn test_tsv_format() {
        let sentence = Sentence::new(
            3,
            "Sample sentence.".to_string(),
            CoordinateMapper::default(),
            Span::new(Position { line: 1, col: 1 }, Position { line: 1, col: 16 }),
        );
        assert_eq!(sentence.to_tsv(), "3\tSample sentence.\t(1,1,1,16)");
    }
}
