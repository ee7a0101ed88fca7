// WHY: Hard line breaks inside a sentence are layout, not content; turning them into spaces on the
// processed side keeps sentence text on one line while raw offsets still point at the break
//
// Works one character at a time so a break split across two stream chunks is marked the same
// way it would be in the whole text: "\r\n" only needs one character of lookahead.

use super::Annotator;
use crate::annotated_text::AnnotatedText;
use crate::annotation::Annotation;
use crate::error::Result;

/// Normalizes line breaks: `\r\n`, `\r` and `\n` all read as a single space
///
/// With `paragraph_breaks`, a line break followed by a blank line also forces a sentence break.
#[derive(Debug, Clone, Copy, Default)]
pub struct NewlineAnnotator {
    paragraph_breaks: bool,
}

impl NewlineAnnotator {
    pub fn new(paragraph_breaks: bool) -> Self {
        Self { paragraph_breaks }
    }

    pub fn paragraph_breaks(&self) -> bool {
        self.paragraph_breaks
    }
}

/// True when the next character after spaces and tabs is another line break
fn starts_blank_line(bytes: &[u8]) -> bool {
    bytes
        .iter()
        .find(|b| !matches!(b, b' ' | b'\t'))
        .is_some_and(|b| matches!(b, b'\r' | b'\n'))
}

impl Annotator for NewlineAnnotator {
    fn name(&self) -> &str {
        "newlines"
    }

    fn annotate(&self, text: &AnnotatedText) -> Result<Vec<Annotation>> {
        // '\r' and '\n' never occur inside a multi-byte UTF-8 sequence
        let bytes = text.text().as_bytes();
        let analysis = text.analysis_range();
        let mut annotations = Vec::new();

        for at in analysis {
            match bytes[at] {
                b'\r' if bytes.get(at + 1) == Some(&b'\n') => {
                    annotations.push(Annotation::skip(at..at + 1).with_labels([self.name()]));
                }
                b'\r' | b'\n' => {
                    annotations.push(Annotation::replace(at..at + 1, " ").with_labels([self.name()]));
                    if self.paragraph_breaks && starts_blank_line(&bytes[at + 1..]) {
                        annotations.push(Annotation::sentence_break(at..at).with_labels(["paragraph"]));
                    }
                }
                _ => {}
            }
        }
        Ok(annotations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{Marker, MarkerKind};
    use crate::raw_text::RawText;

    fn spans(found: &[Annotation], kind: MarkerKind) -> Vec<std::ops::Range<usize>> {
        found.iter().filter(|a| a.kind() == kind).map(Annotation::span).collect()
    }

    #[test]
    fn test_line_breaks_become_spaces() {
        let found = NewlineAnnotator::default()
            .annotate(&AnnotatedText::new("a\nb\r\nc\rd"))
            .unwrap();
        assert_eq!(spans(&found, MarkerKind::Replace), vec![1..2, 4..5, 6..7]);
        assert_eq!(spans(&found, MarkerKind::Skip), vec![3..4]);
        assert!(found
            .iter()
            .filter(|a| a.kind() == MarkerKind::Replace)
            .all(|a| a.marker() == &Marker::Replace { text: " ".to_string() }));
        assert!(spans(&found, MarkerKind::SentenceBreak).is_empty());
    }

    #[test]
    fn test_paragraph_breaks() {
        let annotator = NewlineAnnotator::new(true);
        let found = annotator.annotate(&AnnotatedText::new("One.\n\nTwo")).unwrap();
        assert_eq!(spans(&found, MarkerKind::SentenceBreak), vec![4..4]);
        assert!(found[1].labels().contains("paragraph"));

        // blank line holding whitespace, with a Windows line ending
        let found = annotator.annotate(&AnnotatedText::new("One.\n \r\nTwo")).unwrap();
        assert_eq!(spans(&found, MarkerKind::SentenceBreak), vec![4..4]);
        assert_eq!(spans(&found, MarkerKind::Skip), vec![6..7]);
    }

    #[test]
    fn test_respects_analysis_range() {
        let text = AnnotatedText::with_analysis_range("a\nb\nc", 2..5).unwrap();
        let found = NewlineAnnotator::default().annotate(&text).unwrap();
        assert_eq!(spans(&found, MarkerKind::Replace), vec![3..4]);
    }

    #[test]
    fn test_processed_text_reads_as_one_line() {
        let mut raw = RawText::new("line one\r\nline two\nline three");
        raw.apply_annotator(&NewlineAnnotator::default()).unwrap();
        assert_eq!(
            raw.processed_text().unwrap().text(),
            "line one line two line three"
        );
        let sentences = raw.detected_sentences().unwrap();
        assert_eq!(sentences.len(), 1);
        assert_eq!(sentences[0].to_tsv(), "0\tline one line two line three\t(1,1,3,10)");
    }
}
