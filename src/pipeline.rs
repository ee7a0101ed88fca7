// WHY: Wires annotators and the classifier over either a whole RawText or a chunk stream, and
// drives file input, sentence output and run statistics for the CLI
//
// Per roll: raw annotators see the lookahead block, the classifier sees the processed analysis
// block, then final sentences are drained. One empty roll ends the stream.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::{debug, info};

use crate::annotators::{AbbreviationAnnotator, Annotator, NewlineAnnotator, RegexMarkerAnnotator};
use crate::classifier::{PunctuationClassifier, SentenceBoundaryClassifier};
use crate::config::PipelineConfig;
use crate::error;
use crate::raw_text::RawText;
use crate::reader::{map_file, read_text_async, split_chunks, ChunkReader, ReaderConfig};
use crate::rolling::RollingTextBlock;
use crate::sentence::Sentence;

/// Annotators plus a boundary classifier
pub struct SentencePipeline {
    annotators: Vec<Box<dyn Annotator>>,
    classifier: Box<dyn SentenceBoundaryClassifier>,
    block_size: usize,
}

impl SentencePipeline {
    pub fn new(classifier: Box<dyn SentenceBoundaryClassifier>, block_size: usize) -> Self {
        Self {
            annotators: Vec::new(),
            classifier,
            block_size,
        }
    }

    /// Annotators run in the order they are added
    pub fn with_annotator(mut self, annotator: Box<dyn Annotator>) -> Self {
        self.annotators.push(annotator);
        self
    }

    /// Marker rules first, then newline normalization, then abbreviations
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        config.validate()?;
        let classifier = PunctuationClassifier::new(&config.classifier)
            .context("Invalid classifier rules")?;
        let mut pipeline = Self::new(Box::new(classifier), config.block_size);

        for rule in &config.markers {
            let annotator = RegexMarkerAnnotator::new(
                rule.name.clone(),
                &rule.pattern,
                rule.group,
                rule.actions.clone(),
                config.block_size,
            )
            .with_context(|| format!("Invalid marker rule '{}'", rule.name))?;
            pipeline = pipeline.with_annotator(Box::new(annotator));
        }
        if config.newlines.enabled {
            pipeline = pipeline.with_annotator(Box::new(NewlineAnnotator::new(
                config.newlines.paragraph_breaks,
            )));
        }
        if config.abbreviations.enabled {
            let annotator = AbbreviationAnnotator::new(&config.abbreviations.extra)
                .context("Invalid abbreviation list")?;
            pipeline = pipeline.with_annotator(Box::new(annotator));
        }
        debug!(annotators = ?pipeline.annotator_names(), classifier = pipeline.classifier.name(), "pipeline ready");
        Ok(pipeline)
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn annotator_names(&self) -> Vec<&str> {
        self.annotators.iter().map(|a| a.name()).collect()
    }

    /// Annotate and classify a complete text
    pub fn annotate_text(&self, text: &str) -> error::Result<RawText> {
        let mut raw = RawText::new(text);
        for annotator in &self.annotators {
            raw.apply_annotator(annotator.as_ref())?;
        }
        raw.apply_classifier(self.classifier.as_ref())?;
        Ok(raw)
    }

    /// Sentences of a complete text
    pub fn process_text(&self, text: &str) -> error::Result<Vec<Sentence>> {
        self.annotate_text(text)?.detected_sentences()
    }

    /// Start a chunked run
    pub fn stream(&self) -> SentenceStream<'_> {
        SentenceStream {
            pipeline: self,
            block: RollingTextBlock::new(),
            chunks: 0,
        }
    }
}

/// A chunked run over one text stream
pub struct SentenceStream<'a> {
    pipeline: &'a SentencePipeline,
    block: RollingTextBlock,
    chunks: u64,
}

impl SentenceStream<'_> {
    /// Roll in `chunk` and return the sentences that became final
    ///
    /// An empty chunk marks the end of the stream.
    pub fn push(&mut self, chunk: &str) -> error::Result<Vec<Sentence>> {
        let block = std::mem::take(&mut self.block);
        self.block = block.roll(chunk)?;
        for annotator in &self.pipeline.annotators {
            self.block.apply_raw_annotator(annotator.as_ref())?;
        }
        self.block.apply_classifier(self.pipeline.classifier.as_ref())?;
        if !chunk.is_empty() {
            self.chunks += 1;
        }
        self.block.detected_sentences()
    }

    /// End the stream and return the remaining sentences
    pub fn finish(&mut self) -> error::Result<Vec<Sentence>> {
        self.push("")
    }

    pub fn chunks(&self) -> u64 {
        self.chunks
    }

    pub fn discarded_breaks(&self) -> usize {
        self.block.discarded_breaks()
    }
}

/// How the input file is read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ReadMode {
    /// Async buffered reads streamed through the rolling window
    Stream,
    /// Memory-mapped file streamed through the rolling window
    Mmap,
    /// Whole file annotated at once
    WholeText,
}

/// Sentence output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// `index<TAB>text<TAB>(start_line,start_col,end_line,end_col)`
    #[default]
    Tsv,
    /// One JSON object per line
    Json,
}

/// Options for [`run_file`]
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub mode: ReadMode,
    pub format: OutputFormat,
    /// Standard output when `None`
    pub output: Option<PathBuf>,
    pub progress: bool,
}

/// Run statistics written by `--stats-out`
#[derive(Serialize, Debug, Clone)]
pub struct RunStats {
    pub input: String,
    pub mode: ReadMode,
    pub bytes_processed: u64,
    pub chunks: u64,
    pub sentences: u64,
    /// Sentence breaks discarded inside no-break spans
    pub breaks_discarded: u64,
    pub elapsed_ms: u64,
    pub bytes_per_sec: f64,
}

/// Writes sentences in the chosen format
pub struct SentenceWriter<W> {
    writer: BufWriter<W>,
    format: OutputFormat,
    written: u64,
}

impl<W: AsyncWrite + Unpin> SentenceWriter<W> {
    pub fn new(writer: W, format: OutputFormat) -> Self {
        Self {
            writer: BufWriter::new(writer),
            format,
            written: 0,
        }
    }

    pub async fn write_all(&mut self, sentences: &[Sentence]) -> Result<()> {
        for sentence in sentences {
            let line = match self.format {
                OutputFormat::Tsv => sentence.to_tsv(),
                OutputFormat::Json => serde_json::to_string(&sentence.to_record())?,
            };
            self.writer.write_all(line.as_bytes()).await?;
            self.writer.write_all(b"\n").await?;
        }
        self.written += sentences.len() as u64;
        Ok(())
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub async fn finish(mut self) -> Result<W> {
        self.writer.flush().await?;
        Ok(self.writer.into_inner())
    }
}

fn progress_bar(total: u64, enabled: bool) -> Result<ProgressBar> {
    if !enabled {
        return Ok(ProgressBar::hidden());
    }
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}) {msg}")?
            .progress_chars("=> "),
    );
    Ok(bar)
}

async fn open_output(output: Option<&Path>) -> Result<Box<dyn AsyncWrite + Unpin + Send>> {
    Ok(match output {
        Some(path) => Box::new(
            tokio::fs::File::create(path)
                .await
                .with_context(|| format!("Failed to create output file {}", path.display()))?,
        ),
        None => Box::new(tokio::io::stdout()),
    })
}

/// Detect the sentences of `input` and write them out
pub async fn run_file(
    pipeline: &SentencePipeline,
    input: &Path,
    options: &RunOptions,
) -> Result<RunStats> {
    let start_time = Instant::now();
    let total = tokio::fs::metadata(input)
        .await
        .with_context(|| format!("Failed to stat input {}", input.display()))?
        .len();
    let bar = progress_bar(total, options.progress)?;
    let mut writer = SentenceWriter::new(open_output(options.output.as_deref()).await?, options.format);

    let (bytes, chunks, discarded) = match options.mode {
        ReadMode::WholeText => {
            let text = read_text_async(input).await?;
            let mut raw = pipeline.annotate_text(&text)?;
            writer.write_all(&raw.detected_sentences()?).await?;
            bar.inc(text.len() as u64);
            (text.len() as u64, 1, raw.discarded_breaks() as u64)
        }
        ReadMode::Stream => {
            let config = ReaderConfig {
                block_size: pipeline.block_size(),
                ..Default::default()
            };
            let mut reader = ChunkReader::open(input, &config).await?;
            let mut stream = pipeline.stream();
            while let Some(chunk) = reader.next_chunk().await? {
                writer.write_all(&stream.push(&chunk)?).await?;
                bar.inc(chunk.len() as u64);
            }
            writer.write_all(&stream.finish()?).await?;
            (reader.bytes_read(), stream.chunks(), stream.discarded_breaks() as u64)
        }
        ReadMode::Mmap => {
            let mmap = map_file(input)?;
            let text = std::str::from_utf8(&mmap)
                .with_context(|| format!("UTF-8 decoding error in {}", input.display()))?;
            let mut stream = pipeline.stream();
            for chunk in split_chunks(text, pipeline.block_size()) {
                writer.write_all(&stream.push(chunk)?).await?;
                bar.inc(chunk.len() as u64);
            }
            writer.write_all(&stream.finish()?).await?;
            (text.len() as u64, stream.chunks(), stream.discarded_breaks() as u64)
        }
    };
    let sentences = writer.written();
    writer.finish().await?;
    bar.finish_and_clear();

    let elapsed = start_time.elapsed();
    let stats = RunStats {
        input: input.display().to_string(),
        mode: options.mode,
        bytes_processed: bytes,
        chunks,
        sentences,
        breaks_discarded: discarded,
        elapsed_ms: elapsed.as_millis() as u64,
        bytes_per_sec: if elapsed.as_secs_f64() > 0.0 {
            bytes as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        },
    };
    info!(
        input = %stats.input,
        mode = ?stats.mode,
        bytes = stats.bytes_processed,
        chunks = stats.chunks,
        sentences = stats.sentences,
        breaks_discarded = stats.breaks_discarded,
        elapsed_ms = stats.elapsed_ms,
        "Sentence detection complete"
    );
    Ok(stats)
}
