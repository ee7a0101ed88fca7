// WHY: Sentence spans report line/column positions over the whole stream, while the rolling window
// only keeps a few sub-blocks; this index keeps the line starts still reachable from the window

use serde::Serialize;
use std::collections::VecDeque;

/// 1-based line and column (columns count characters, not bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Position {
    pub line: usize,
    pub col: usize,
}

/// Line starts in stream-global coordinates: `(byte offset, char offset)`
#[derive(Debug, Clone)]
pub struct LineIndex {
    starts: VecDeque<(usize, usize)>,
    /// Line number of `starts[0]`
    first_line: usize,
    bytes_seen: usize,
    chars_seen: usize,
}

impl Default for LineIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl LineIndex {
    pub fn new() -> Self {
        Self {
            starts: VecDeque::from([(0, 0)]),
            first_line: 1,
            bytes_seen: 0,
            chars_seen: 0,
        }
    }

    /// Index built over a complete text
    pub fn for_text(text: &str) -> Self {
        let mut index = Self::new();
        index.observe(text);
        index
    }

    /// Record the line starts of the next chunk of the stream
    pub fn observe(&mut self, chunk: &str) {
        let mut chars = self.chars_seen;
        for (offset, c) in chunk.char_indices() {
            chars += 1;
            if c == '\n' {
                self.starts.push_back((self.bytes_seen + offset + 1, chars));
            }
        }
        self.bytes_seen += chunk.len();
        self.chars_seen = chars;
    }

    /// Forget line starts that can no longer be queried once `origin` is the oldest retained offset
    pub fn prune(&mut self, origin: usize) {
        while self.starts.len() > 1 && self.starts[1].0 <= origin {
            self.starts.pop_front();
            self.first_line += 1;
        }
    }

    pub fn bytes_seen(&self) -> usize {
        self.bytes_seen
    }

    pub fn chars_seen(&self) -> usize {
        self.chars_seen
    }

    /// Cursor resolving positions inside `window`, whose first byte sits at global `origin`
    /// (`origin_chars` characters into the stream)
    pub fn cursor<'a>(&'a self, window: &'a str, origin: usize, origin_chars: usize) -> PositionCursor<'a> {
        PositionCursor {
            lines: self,
            window,
            origin,
            origin_chars,
            byte_pos: 0,
            char_pos: origin_chars,
        }
    }

    fn line_of(&self, byte: usize) -> (usize, usize) {
        let idx = self.starts.partition_point(|&(start, _)| start <= byte).max(1) - 1;
        let line_start_chars = self.starts.get(idx).map_or(0, |&(_, chars)| chars);
        (self.first_line + idx, line_start_chars)
    }
}

/// Forward-moving position counter over one window
///
/// Queries in increasing offset order cost O(distance); going backwards restarts from the window
/// start.
pub struct PositionCursor<'a> {
    lines: &'a LineIndex,
    window: &'a str,
    origin: usize,
    origin_chars: usize,
    /// Window-relative byte position already counted
    byte_pos: usize,
    /// Stream-global char count at `byte_pos`
    char_pos: usize,
}

impl PositionCursor<'_> {
    /// Position of the character starting at global byte `offset`
    pub fn position(&mut self, offset: usize) -> Position {
        let target = self.floor_boundary(offset.saturating_sub(self.origin));
        if target < self.byte_pos {
            self.byte_pos = 0;
            self.char_pos = self.origin_chars;
        }
        self.char_pos += self.window[self.byte_pos..target].chars().count();
        self.byte_pos = target;

        let (line, line_start_chars) = self.lines.line_of(self.origin + target);
        Position {
            line,
            col: self.char_pos - line_start_chars + 1,
        }
    }

    /// Position of the last character before global byte `end`
    pub fn last_char_position(&mut self, end: usize) -> Position {
        let target = self.floor_boundary(end.saturating_sub(self.origin));
        let last = self.window[..target]
            .char_indices()
            .next_back()
            .map_or(0, |(offset, _)| offset);
        self.position(self.origin + last)
    }

    fn floor_boundary(&self, mut offset: usize) -> usize {
        offset = offset.min(self.window.len());
        while !self.window.is_char_boundary(offset) {
            offset -= 1;
        }
        offset
    }
}
