// WHY: Raw <-> processed offset translation over an anchor list, so results computed on the
// processed view (sentence boundaries, token spans) land bit-exactly on the original text
//
// Anchors tile the processed text left to right. Each one is either a copied run (same length
// on both sides) or a replacement (raw span swapped for an insertion). Raw text not covered by
// any anchor was skipped.

use std::ops::Range;
use tracing::debug;

use crate::annotated_text::AnnotatedText;
use crate::annotation::MarkerKind;
use crate::error::{AnnotationError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorKind {
    /// Raw characters copied unchanged
    Copy,
    /// Raw span substituted by insertion text
    Replace,
}

/// One run of the mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub raw: Range<usize>,
    pub processed: Range<usize>,
    pub kind: AnchorKind,
}

/// A raw span rewritten in the processed view; `insertion == None` means skipped
#[derive(Debug, Clone, PartialEq, Eq)]
struct Edit {
    raw: Range<usize>,
    insertion: Option<String>,
}

/// Bidirectional raw <-> processed offset translation
///
/// Collapse points resolve to the far side: a processed offset where a skip collapsed maps back
/// to the raw end of the skip, and an offset strictly inside an insertion maps to the raw end of
/// the replaced span (a replacement is one atomic unit).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoordinateMapper {
    anchors: Vec<Anchor>,
    raw_start: usize,
    raw_end: usize,
    processed_len: usize,
}

impl CoordinateMapper {
    /// Build the mapping for `raw[..limit]` from its Skip and Replace annotations and return it
    /// together with the processed text
    ///
    /// Spans crossing `limit` are clipped to it; a clipped replacement keeps its insertion text.
    pub fn build(raw: &AnnotatedText, limit: usize) -> Result<(Self, String)> {
        raw.check_span(0, limit)?;
        let edits = collect_edits(raw, limit)?;
        let text = raw.text();

        let mut mapper = Self {
            anchors: Vec::with_capacity(edits.len() * 2 + 1),
            raw_start: 0,
            raw_end: limit,
            processed_len: 0,
        };
        let mut processed = String::with_capacity(limit);
        let mut pos = 0;

        for edit in edits {
            if edit.raw.start > pos {
                mapper.push_copy(pos..edit.raw.start);
                processed.push_str(&text[pos..edit.raw.start]);
            }
            if let Some(insertion) = edit.insertion {
                mapper.push(Anchor {
                    raw: edit.raw.clone(),
                    processed: mapper.processed_len..mapper.processed_len + insertion.len(),
                    kind: AnchorKind::Replace,
                });
                processed.push_str(&insertion);
            }
            pos = pos.max(edit.raw.end);
        }
        if pos < limit {
            mapper.push_copy(pos..limit);
            processed.push_str(&text[pos..limit]);
        }

        debug!(
            anchors = mapper.anchors.len(),
            raw_len = limit,
            processed_len = mapper.processed_len,
            "built coordinate mapping"
        );
        Ok((mapper, processed))
    }

    fn push_copy(&mut self, raw: Range<usize>) {
        let len = raw.len();
        self.push(Anchor {
            raw,
            processed: self.processed_len..self.processed_len + len,
            kind: AnchorKind::Copy,
        });
    }

    fn push(&mut self, anchor: Anchor) {
        self.processed_len = anchor.processed.end;
        self.anchors.push(anchor);
    }

    pub fn anchors(&self) -> &[Anchor] {
        &self.anchors
    }

    pub fn processed_len(&self) -> usize {
        self.processed_len
    }

    /// Raw extent covered by this mapping
    pub fn raw_range(&self) -> Range<usize> {
        self.raw_start..self.raw_end
    }

    /// Translate a raw offset to the processed view
    ///
    /// Inside a skip the result clamps to the processed offset right before it, so both edges of
    /// a skip map to the same point. A replacement start maps to the start of its insertion and
    /// its end to the end of the insertion. Offsets strictly inside a replaced span have no
    /// processed counterpart; they resolve to the end of the insertion.
    pub fn raw_to_processed(&self, raw: usize) -> usize {
        let idx = self.anchors.partition_point(|a| a.raw.start <= raw);
        let Some(anchor) = idx.checked_sub(1).map(|i| &self.anchors[i]) else {
            return 0;
        };
        match anchor.kind {
            AnchorKind::Copy if raw < anchor.raw.end => {
                anchor.processed.start + (raw - anchor.raw.start)
            }
            AnchorKind::Replace if raw == anchor.raw.start && raw < anchor.raw.end => {
                anchor.processed.start
            }
            _ => anchor.processed.end,
        }
    }

    /// Like [`raw_to_processed`](Self::raw_to_processed), except that an offset strictly inside a
    /// replacement resolves to the start of its insertion; used for span starts
    pub fn raw_to_processed_start(&self, raw: usize) -> usize {
        let idx = self.anchors.partition_point(|a| a.raw.start <= raw);
        match idx.checked_sub(1).map(|i| &self.anchors[i]) {
            Some(anchor) if anchor.kind == AnchorKind::Replace && raw < anchor.raw.end => {
                anchor.processed.start
            }
            _ => self.raw_to_processed(raw),
        }
    }

    /// Translate a processed offset back to the raw text
    pub fn processed_to_raw(&self, processed: usize) -> usize {
        let idx = self.anchors.partition_point(|a| a.processed.end <= processed);
        match self.anchors.get(idx) {
            None => self.raw_end,
            Some(anchor) => match anchor.kind {
                AnchorKind::Copy => anchor.raw.start + (processed - anchor.processed.start),
                AnchorKind::Replace if processed == anchor.processed.start => anchor.raw.start,
                AnchorKind::Replace => anchor.raw.end,
            },
        }
    }

    /// Raw offset right after the processed character ending at `processed`
    ///
    /// Differs from [`processed_to_raw`](Self::processed_to_raw) at collapse points: a span
    /// ending just before skipped material does not swallow it.
    pub fn processed_to_raw_end(&self, processed: usize) -> usize {
        let Some(last) = processed.checked_sub(1) else {
            return self.processed_to_raw(0);
        };
        let idx = self.anchors.partition_point(|a| a.processed.end <= last);
        match self.anchors.get(idx) {
            None => self.raw_end,
            Some(anchor) => match anchor.kind {
                AnchorKind::Copy => anchor.raw.start + (last - anchor.processed.start) + 1,
                AnchorKind::Replace => anchor.raw.end,
            },
        }
    }

    /// Raw span of a processed span: start by `processed_to_raw`, a non-empty span's end by
    /// `processed_to_raw_end`
    pub fn span_to_raw(&self, span: Range<usize>) -> Range<usize> {
        let start = self.processed_to_raw(span.start);
        if span.is_empty() {
            return start..start;
        }
        start..self.processed_to_raw_end(span.end).max(start)
    }

    /// Processed span of a raw span, or `None` when the span only covers skipped text
    pub fn project(&self, span: Range<usize>) -> Option<Range<usize>> {
        if span.is_empty() {
            if self.in_skipped_interior(span.start) {
                return None;
            }
            let point = self.raw_to_processed(span.start);
            return Some(point..point);
        }
        let start = self.raw_to_processed_start(span.start);
        let end = self.raw_to_processed(span.end);
        (start < end).then_some(start..end)
    }

    /// True when `raw` lies strictly inside skipped text, away from both edges
    fn in_skipped_interior(&self, raw: usize) -> bool {
        let idx = self.anchors.partition_point(|a| a.raw.start <= raw);
        let prev_end = idx
            .checked_sub(1)
            .map_or(self.raw_start, |i| self.anchors[i].raw.end);
        let next_start = self
            .anchors
            .get(idx)
            .map_or(self.raw_end, |a| a.raw.start);
        raw > prev_end && raw < next_start
    }

    /// Mapping restricted to a processed sub-range, rebased so the range starts at 0
    pub fn slice(&self, range: Range<usize>) -> Self {
        let raw_start = self.processed_to_raw(range.start);
        let raw_end = if range.is_empty() {
            raw_start
        } else {
            self.processed_to_raw_end(range.end)
        };

        let anchors = self
            .anchors
            .iter()
            .filter(|a| a.processed.start < range.end && a.processed.end > range.start)
            .map(|a| {
                let lo = a.processed.start.max(range.start);
                let hi = a.processed.end.min(range.end);
                let raw = match a.kind {
                    AnchorKind::Copy => {
                        a.raw.start + (lo - a.processed.start)..a.raw.start + (hi - a.processed.start)
                    }
                    // a cut through an insertion keeps it atomic: its tail belongs to the raw end
                    AnchorKind::Replace if lo > a.processed.start => a.raw.end..a.raw.end,
                    AnchorKind::Replace => a.raw.clone(),
                };
                Anchor {
                    raw,
                    processed: lo - range.start..hi - range.start,
                    kind: a.kind,
                }
            })
            .collect();

        Self {
            anchors,
            raw_start,
            raw_end: raw_end.max(raw_start),
            processed_len: range.len(),
        }
    }

    /// Same mapping with every raw offset moved by `delta`
    pub fn shifted(mut self, delta: usize) -> Self {
        for anchor in &mut self.anchors {
            anchor.raw = anchor.raw.start + delta..anchor.raw.end + delta;
        }
        self.raw_start += delta;
        self.raw_end += delta;
        self
    }

    /// Concatenate `other` after this mapping on the processed side
    pub fn append(&mut self, other: CoordinateMapper) {
        if self.anchors.is_empty() && self.processed_len == 0 {
            self.raw_start = other.raw_start;
        }
        let base = self.processed_len;
        self.anchors.extend(other.anchors.into_iter().map(|mut anchor| {
            anchor.processed = anchor.processed.start + base..anchor.processed.end + base;
            anchor
        }));
        self.processed_len = base + other.processed_len;
        self.raw_end = other.raw_end;
    }
}

/// Ordered, disjoint edits for `raw[..limit]`
///
/// Overlapping skips are merged, identical replacements deduplicated; any other overlap
/// involving a replacement is an invariant violation.
fn collect_edits(raw: &AnnotatedText, limit: usize) -> Result<Vec<Edit>> {
    let in_scope = |start: usize| start < limit || (start == limit && limit == raw.len());

    let mut candidates: Vec<Edit> = raw
        .annotations(MarkerKind::Skip)
        .iter()
        .chain(raw.annotations(MarkerKind::Replace))
        .filter(|a| in_scope(a.start()))
        .map(|a| Edit {
            raw: a.start()..a.end().min(limit),
            insertion: a.marker().insertion().map(str::to_string),
        })
        .filter(|edit| edit.insertion.is_some() || !edit.raw.is_empty())
        .collect();
    candidates.sort_by_key(|edit| (edit.raw.start, edit.raw.end));

    let mut edits: Vec<Edit> = Vec::with_capacity(candidates.len());
    for edit in candidates {
        if let Some(last) = edits.last_mut() {
            if *last == edit {
                continue;
            }
            let overlapping = last.raw.start < edit.raw.end && edit.raw.start < last.raw.end;
            if overlapping {
                if last.insertion.is_none() && edit.insertion.is_none() {
                    last.raw.end = last.raw.end.max(edit.raw.end);
                    continue;
                }
                return Err(AnnotationError::OverlappingMarkers {
                    first: last.raw.clone(),
                    second: edit.raw,
                });
            }
        }
        edits.push(edit);
    }
    Ok(edits)
}
