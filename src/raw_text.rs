// WHY: Whole-text owner of the raw annotations; the processed view and its mapping are derived
// values, rebuilt whenever the annotation version moves

use std::ops::Range;
use tracing::debug;

use crate::annotated_text::AnnotatedText;
use crate::annotation::{Annotation, MarkerKind};
use crate::annotators::Annotator;
use crate::classifier::SentenceBoundaryClassifier;
use crate::error::Result;
use crate::lines::LineIndex;
use crate::mapper::CoordinateMapper;
use crate::sentence::{boundary_offsets, sentence_ranges, AnnotationSink, Sentence, Span};

/// Processed view cached against the raw annotation version it was built from
#[derive(Debug, Clone)]
pub(crate) struct Derived {
    pub(crate) version: u64,
    pub(crate) mapper: CoordinateMapper,
    pub(crate) processed: AnnotatedText,
}

impl Derived {
    /// Build the processed view of `raw[..limit]` with `analysis` (raw) as its analysis range
    pub(crate) fn build(raw: &AnnotatedText, limit: usize, analysis: Range<usize>) -> Result<Self> {
        let (mapper, text) = CoordinateMapper::build(raw, limit)?;
        let analysis = mapper.raw_to_processed(analysis.start)..mapper.raw_to_processed(analysis.end);
        let mut processed = AnnotatedText::with_analysis_range(text, analysis)?;

        let projected: Vec<Annotation> = raw
            .all_annotations()
            .filter(|a| !a.kind().alters_text() && a.start() <= limit)
            .filter_map(|a| {
                mapper
                    .project(a.start()..a.end().min(limit))
                    .map(|span| a.with_span(span))
            })
            .collect();
        processed.add_annotations(projected)?;

        Ok(Self {
            version: raw.version(),
            mapper,
            processed,
        })
    }

    /// Fetch the cached view, rebuilding it if `raw` changed since
    pub(crate) fn refresh<'a>(
        slot: &'a mut Option<Derived>,
        raw: &AnnotatedText,
        limit: usize,
        analysis: Range<usize>,
    ) -> Result<&'a Derived> {
        let derived = match slot.take() {
            Some(derived) if derived.version == raw.version() => derived,
            _ => Self::build(raw, limit, analysis)?,
        };
        Ok(slot.insert(derived))
    }

    /// Map a batch of processed-side annotations to raw offsets
    ///
    /// A SentenceBreak lying inside a NoSentenceBreak of the processed view is dropped; the count
    /// of dropped breaks is returned alongside the mapped batch. The test runs on the processed
    /// side since a break at a collapse point maps past the skipped text in raw coordinates.
    pub(crate) fn push_back(
        &self,
        batch: impl IntoIterator<Item = Annotation>,
    ) -> Result<(Vec<Annotation>, usize)> {
        let batch: Vec<Annotation> = batch.into_iter().collect();
        for annotation in &batch {
            self.processed.check_span(annotation.start(), annotation.end())?;
        }

        let masks = self.processed.annotations(MarkerKind::NoSentenceBreak);
        let mut discarded = 0;
        let mut mapped = Vec::with_capacity(batch.len());
        for annotation in batch {
            let span = self.mapper.span_to_raw(annotation.span());
            let masked = annotation.kind() == MarkerKind::SentenceBreak
                && masks
                    .iter()
                    .any(|m| m.start() <= annotation.start() && annotation.end() <= m.end());
            if masked {
                debug!(%annotation, raw_start = span.start, raw_end = span.end, "sentence break inside no-break span discarded");
                discarded += 1;
                continue;
            }
            mapped.push(annotation.with_span(span));
        }
        Ok((mapped, discarded))
    }
}

/// A complete raw text with its annotations
#[derive(Debug, Clone)]
pub struct RawText {
    text: AnnotatedText,
    lines: LineIndex,
    derived: Option<Derived>,
    discarded_breaks: usize,
}

impl RawText {
    pub fn new(text: impl Into<String>) -> Self {
        let text = AnnotatedText::new(text);
        let lines = LineIndex::for_text(text.text());
        Self {
            text,
            lines,
            derived: None,
            discarded_breaks: 0,
        }
    }

    /// The raw text and its annotations
    pub fn annotated(&self) -> &AnnotatedText {
        &self.text
    }

    pub fn text(&self) -> &str {
        self.text.text()
    }

    pub fn annotations(&self, kind: MarkerKind) -> &[Annotation] {
        self.text.annotations(kind)
    }

    /// Add annotations in raw coordinates
    pub fn add_annotations(&mut self, batch: impl IntoIterator<Item = Annotation>) -> Result<()> {
        self.text.add_annotations(batch)
    }

    fn derived(&mut self) -> Result<&Derived> {
        let len = self.text.len();
        Derived::refresh(&mut self.derived, &self.text, len, 0..len)
    }

    /// Processed view with every non-textual annotation projected onto it
    pub fn processed_text(&mut self) -> Result<&AnnotatedText> {
        Ok(&self.derived()?.processed)
    }

    pub fn mapper(&mut self) -> Result<&CoordinateMapper> {
        Ok(&self.derived()?.mapper)
    }

    /// Add annotations expressed in processed coordinates; they are stored in raw coordinates
    ///
    /// Returns the number of sentence breaks discarded because they fell inside a no-break span.
    pub fn add_processed_annotations(
        &mut self,
        batch: impl IntoIterator<Item = Annotation>,
    ) -> Result<usize> {
        let len = self.text.len();
        let derived = Derived::refresh(&mut self.derived, &self.text, len, 0..len)?;
        let (mapped, discarded) = derived.push_back(batch)?;
        self.text.add_annotations(mapped)?;
        self.discarded_breaks += discarded;
        Ok(discarded)
    }

    /// Sentence breaks discarded so far by [`add_processed_annotations`](Self::add_processed_annotations)
    pub fn discarded_breaks(&self) -> usize {
        self.discarded_breaks
    }

    /// Run a raw-text annotator over the whole text
    pub fn apply_annotator(&mut self, annotator: &dyn Annotator) -> Result<()> {
        let batch = annotator.annotate(&self.text)?;
        debug!(annotator = annotator.name(), count = batch.len(), "raw annotations");
        self.add_annotations(batch)
    }

    /// Run a sentence boundary classifier over the processed view
    pub fn apply_classifier(&mut self, classifier: &dyn SentenceBoundaryClassifier) -> Result<usize> {
        let batch = classifier.classify(self.processed_text()?)?;
        self.add_processed_annotations(batch)
    }

    /// Sentences between the boundaries currently known
    pub fn detected_sentences(&mut self) -> Result<Vec<Sentence>> {
        let len = self.text.len();
        let derived = Derived::refresh(&mut self.derived, &self.text, len, 0..len)?;
        let processed = derived.processed.text();
        let (boundaries, suppressed) = boundary_offsets(&self.text, &derived.mapper, len);
        debug!(boundaries = boundaries.len(), suppressed, "sentence boundaries");

        let mut cursor = self.lines.cursor(self.text.text(), 0, 0);
        let sentences = sentence_ranges(processed, 0..processed.len(), &boundaries)
            .into_iter()
            .enumerate()
            .map(|(index, range)| {
                let mapper = derived.mapper.slice(range.clone());
                let raw = mapper.raw_range();
                let span = Span::new(cursor.position(raw.start), cursor.last_char_position(raw.end));
                Sentence::new(index, processed[range].to_string(), mapper, span)
            })
            .collect();
        Ok(sentences)
    }
}

impl AnnotationSink for RawText {
    fn add_original_annotations(&mut self, batch: Vec<Annotation>) -> Result<()> {
        self.add_annotations(batch)
    }
}
