// WHY: Streaming counterpart of RawText: a fixed ring of sub-blocks with offset re-anchoring on
// every flush, producing the same sentences a whole-text pass would
//
// Slots: 1 = oldest (about to be flushed), 2 = analysis block, 3 = lookahead block, 4 = incoming
// chunk. Raw annotators see slots 3+4, classifiers the processed text of slots 1..3.

use std::ops::Range;
use tracing::{debug, trace};

use crate::annotated_text::AnnotatedText;
use crate::annotation::{Annotation, MarkerKind};
use crate::annotators::Annotator;
use crate::classifier::SentenceBoundaryClassifier;
use crate::error::{AnnotationError, Result};
use crate::lines::{LineIndex, Position};
use crate::mapper::CoordinateMapper;
use crate::raw_text::Derived;
use crate::sentence::{boundary_offsets, trim_range, AnnotationSink, Sentence, Span};

/// Number of sub-block slots held by the window
pub const WINDOW_BLOCKS: usize = 4;

/// Processed text already flushed out of the window but not yet part of an emitted sentence
#[derive(Debug, Clone, Default)]
struct Carry {
    text: String,
    /// Carry offsets -> stream-global raw offsets
    mapper: CoordinateMapper,
    /// Position of the first non-whitespace character
    first: Option<Position>,
    /// Position of the last non-whitespace character
    last: Option<Position>,
}

/// Sliding window over a chunked text stream
#[derive(Debug, Clone)]
pub struct RollingTextBlock {
    block_lens: [usize; WINDOW_BLOCKS],
    /// Concatenation of the retained sub-blocks with their annotations, in window offsets
    text: AnnotatedText,
    /// Stream-global raw offset of the window start
    origin: usize,
    origin_chars: usize,
    lines: LineIndex,
    /// Stream-global raw offset where the next sentence starts
    emitted_upto: usize,
    carry: Carry,
    ready: Vec<Sentence>,
    next_index: usize,
    derived: Option<Derived>,
    discarded_breaks: usize,
}

impl Default for RollingTextBlock {
    fn default() -> Self {
        Self::new()
    }
}

impl RollingTextBlock {
    /// Empty window: all four slots hold empty sub-blocks
    pub fn new() -> Self {
        Self {
            block_lens: [0; WINDOW_BLOCKS],
            text: AnnotatedText::new(String::new()),
            origin: 0,
            origin_chars: 0,
            lines: LineIndex::new(),
            emitted_upto: 0,
            carry: Carry::default(),
            ready: Vec::new(),
            next_index: 0,
            derived: None,
            discarded_breaks: 0,
        }
    }

    /// Push the next chunk, flushing the oldest sub-block
    ///
    /// Sentences that are final in the current state are collected first. An empty chunk signals
    /// end of stream: once it sits in slot 4, everything up to the end of slot 3 is final.
    pub fn roll(mut self, chunk: &str) -> Result<Self> {
        self.finalize()?;

        let flushed = self.block_lens[0];
        if flushed > 0 {
            self.carry_flushed(flushed)?;
        }
        let flushed_chars = self.text.text()[..flushed].chars().count();

        let mut text = String::with_capacity(self.text.len() - flushed + chunk.len());
        text.push_str(&self.text.text()[flushed..]);
        text.push_str(chunk);

        self.block_lens.rotate_left(1);
        self.block_lens[WINDOW_BLOCKS - 1] = chunk.len();
        let analysis = self.block_lens[0]..self.block_lens[0] + self.block_lens[1];
        self.text.rebase(flushed, text, analysis);

        self.origin += flushed;
        self.origin_chars += flushed_chars;
        self.emitted_upto = self.emitted_upto.max(self.origin);
        self.lines.observe(chunk);
        self.lines.prune(self.origin);
        self.derived = None;

        debug!(
            origin = self.origin,
            flushed,
            chunk_len = chunk.len(),
            window_len = self.text.len(),
            carried = self.carry.text.len(),
            "rolled window"
        );
        Ok(self)
    }

    /// Window text: the concatenation of the four sub-blocks
    pub fn text(&self) -> &str {
        self.text.text()
    }

    pub fn annotated(&self) -> &AnnotatedText {
        &self.text
    }

    /// Window annotations of one kind, in window offsets
    pub fn annotations(&self, kind: MarkerKind) -> &[Annotation] {
        self.text.annotations(kind)
    }

    /// Stream-global raw offset of the window start
    pub fn origin(&self) -> usize {
        self.origin
    }

    pub fn block_lens(&self) -> [usize; WINDOW_BLOCKS] {
        self.block_lens
    }

    pub fn discarded_breaks(&self) -> usize {
        self.discarded_breaks
    }

    /// Add annotations in window offsets
    pub fn add_annotations(&mut self, batch: impl IntoIterator<Item = Annotation>) -> Result<()> {
        self.text.add_annotations(batch)
    }

    fn end_of(&self, blocks: usize) -> usize {
        self.block_lens[..blocks].iter().sum()
    }

    fn at_end_of_stream(&self) -> bool {
        self.block_lens[WINDOW_BLOCKS - 1] == 0
    }

    /// Raw analysis range of the processed view: slot 2, extended through slot 3 at end of stream
    fn view_analysis(&self) -> Range<usize> {
        let end = if self.at_end_of_stream() {
            self.end_of(3)
        } else {
            self.end_of(2)
        };
        self.end_of(1)..end
    }

    /// Slots 3+4 for raw annotators, analysis range = slot 3, with the annotations already there
    pub fn raw_text_block(&self) -> Result<AnnotatedText> {
        let start = self.end_of(2);
        let mut block =
            AnnotatedText::with_analysis_range(&self.text.text()[start..], 0..self.block_lens[2])?;
        let existing: Vec<Annotation> = self
            .text
            .all_annotations()
            .filter(|a| a.end() > start || a.start() >= start)
            .map(|a| a.with_span(a.start().max(start) - start..a.end() - start))
            .collect();
        block.add_annotations(existing)?;
        Ok(block)
    }

    /// Add annotations expressed in [`raw_text_block`](Self::raw_text_block) offsets
    pub fn add_raw_block_annotations(&mut self, batch: impl IntoIterator<Item = Annotation>) -> Result<()> {
        let shift = self.end_of(2);
        self.text.add_annotations(
            batch
                .into_iter()
                .map(|a| a.with_span(a.start() + shift..a.end() + shift)),
        )
    }

    /// Run a raw annotator over slots 3+4
    pub fn apply_raw_annotator(&mut self, annotator: &dyn Annotator) -> Result<()> {
        let block = self.raw_text_block()?;
        let batch = annotator.annotate(&block)?;
        trace!(annotator = annotator.name(), count = batch.len(), "raw block annotations");
        self.add_raw_block_annotations(batch)
    }

    fn derived(&mut self) -> Result<&Derived> {
        let limit = self.end_of(3);
        let analysis = self.view_analysis();
        Derived::refresh(&mut self.derived, &self.text, limit, analysis)
    }

    /// Processed text of slots 1..3
    pub fn processed_text(&mut self) -> Result<&AnnotatedText> {
        Ok(&self.derived()?.processed)
    }

    /// Add annotations expressed in processed-view offsets; returns the number of sentence breaks
    /// discarded inside no-break spans
    pub fn add_processed_annotations(
        &mut self,
        batch: impl IntoIterator<Item = Annotation>,
    ) -> Result<usize> {
        let limit = self.end_of(3);
        let analysis = self.view_analysis();
        let derived = Derived::refresh(&mut self.derived, &self.text, limit, analysis)?;
        let (mapped, discarded) = derived.push_back(batch)?;
        self.text.add_annotations(mapped)?;
        self.discarded_breaks += discarded;
        Ok(discarded)
    }

    /// Run a sentence boundary classifier over the processed view
    pub fn apply_classifier(&mut self, classifier: &dyn SentenceBoundaryClassifier) -> Result<usize> {
        let batch = classifier.classify(self.processed_text()?)?;
        self.add_processed_annotations(batch)
    }

    /// Sentences that became final since the last call; each sentence is returned once
    pub fn detected_sentences(&mut self) -> Result<Vec<Sentence>> {
        self.finalize()?;
        Ok(std::mem::take(&mut self.ready))
    }

    /// Move the pending processed text of slot 1 into the carry before it is flushed
    fn carry_flushed(&mut self, flushed: usize) -> Result<()> {
        let limit = self.end_of(3);
        let analysis = self.view_analysis();
        let derived = Derived::refresh(&mut self.derived, &self.text, limit, analysis)?;

        let start = derived.mapper.raw_to_processed(self.emitted_upto - self.origin);
        let cut = derived.mapper.raw_to_processed(flushed);
        if start >= cut {
            return Ok(());
        }

        let piece = &derived.processed.text()[start..cut];
        let mapper = derived.mapper.slice(start..cut).shifted(self.origin);
        let mut cursor = self.lines.cursor(self.text.text(), self.origin, self.origin_chars);
        if self.carry.first.is_none() {
            if let Some(offset) = piece.find(|c: char| !c.is_whitespace()) {
                self.carry.first = Some(cursor.position(mapper.processed_to_raw(offset)));
            }
        }
        if let Some((offset, c)) = piece.char_indices().rev().find(|(_, c)| !c.is_whitespace()) {
            let end = mapper.processed_to_raw_end(offset + c.len_utf8());
            self.carry.last = Some(cursor.last_char_position(end));
        }

        trace!(carried = piece.len(), "carrying pending text past flush");
        self.carry.text.push_str(piece);
        self.carry.mapper.append(mapper);
        Ok(())
    }

    /// Emit every sentence whose closing boundary can no longer change
    fn finalize(&mut self) -> Result<()> {
        let at_end = self.at_end_of_stream();
        let limit = self.end_of(3);
        let final_raw = self.end_of(2);
        let analysis = self.view_analysis();
        let derived = Derived::refresh(&mut self.derived, &self.text, limit, analysis)?;
        let processed = derived.processed.text();

        let start = derived.mapper.raw_to_processed(self.emitted_upto - self.origin);
        let final_end = if at_end {
            processed.len()
        } else {
            derived.mapper.raw_to_processed(final_raw)
        };

        let (boundaries, suppressed) = boundary_offsets(&self.text, &derived.mapper, limit);
        let mut cuts: Vec<usize> = boundaries
            .into_iter()
            .filter(|&b| b > start && b <= final_end)
            .collect();
        let trailing = final_end > start || !self.carry.text.is_empty();
        if at_end && trailing && cuts.last() != Some(&final_end) {
            cuts.push(final_end);
        }
        if cuts.is_empty() {
            return Ok(());
        }

        let emitted_before = self.ready.len();
        let mut cursor = self.lines.cursor(self.text.text(), self.origin, self.origin_chars);
        let mut segment_start = start;
        for cut in cuts {
            let mut pending = std::mem::take(&mut self.carry);
            let carried = pending.text.len();
            pending.text.push_str(&processed[segment_start..cut]);
            pending
                .mapper
                .append(derived.mapper.slice(segment_start..cut).shifted(self.origin));
            segment_start = cut;

            let Some(range) = trim_range(&pending.text, 0..pending.text.len()) else {
                continue;
            };
            let start_position = match pending.first {
                Some(position) if range.start < carried => position,
                _ => cursor.position(pending.mapper.processed_to_raw(range.start)),
            };
            let end_position = match pending.last {
                Some(position) if range.end <= carried => position,
                _ => cursor.last_char_position(pending.mapper.processed_to_raw_end(range.end)),
            };
            let mapper = pending.mapper.slice(range.clone());
            self.ready.push(Sentence::new(
                self.next_index,
                pending.text[range].to_string(),
                mapper,
                Span::new(start_position, end_position),
            ));
            self.next_index += 1;
        }
        self.emitted_upto = self.origin + derived.mapper.processed_to_raw(segment_start);

        debug!(
            sentences = self.ready.len() - emitted_before,
            suppressed,
            emitted_upto = self.emitted_upto,
            end_of_stream = at_end,
            "finalized sentences"
        );
        Ok(())
    }
}

impl AnnotationSink for RollingTextBlock {
    /// Stream-global offsets are re-anchored to the window; offsets already flushed are an error
    fn add_original_annotations(&mut self, batch: Vec<Annotation>) -> Result<()> {
        let origin = self.origin;
        let local = batch
            .into_iter()
            .map(|a| {
                if a.start() < origin {
                    return Err(AnnotationError::OutsideWindow {
                        offset: a.start(),
                        origin,
                    });
                }
                Ok(a.with_span(a.start() - origin..a.end() - origin))
            })
            .collect::<Result<Vec<_>>>()?;
        self.text.add_annotations(local)
    }
}
