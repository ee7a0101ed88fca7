pub mod annotated_text;
pub mod annotation;
pub mod annotators;
pub mod classifier;
pub mod config;
pub mod error;
pub mod lines;
pub mod mapper;
pub mod pipeline;
pub mod raw_text;
pub mod reader;
pub mod rolling;
pub mod sentence;

// Re-export main types for convenient access
pub use annotated_text::AnnotatedText;
pub use annotation::{Annotation, Marker, MarkerKind};
pub use annotators::{
    AbbreviationAnnotator, Annotator, MarkerAction, NewlineAnnotator, RegexMarkerAnnotator,
};
pub use classifier::{BoundaryRules, PunctuationClassifier, SentenceBoundaryClassifier};
pub use config::PipelineConfig;
pub use error::{AnnotationError, Result};
pub use lines::Position;
pub use mapper::CoordinateMapper;
pub use pipeline::{OutputFormat, ReadMode, RunOptions, RunStats, SentencePipeline, SentenceStream};
pub use raw_text::RawText;
pub use rolling::{RollingTextBlock, WINDOW_BLOCKS};
pub use sentence::{AnnotationSink, Sentence, SentenceRecord, Span};
