use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rawtext::annotators::MarkerAction;
use rawtext::config::MarkerRule;
use rawtext::reader::split_chunks;
use rawtext::{PipelineConfig, SentencePipeline};

const PARAGRAPH: &str = "Dr. Watson <b>arrived</b> at 9 a.m. and waited.\r\nHolmes was late! \"Where is he?\" asked Mrs. Hudson.\n\n<p>Tom &amp; Jerry ran off. They came back.</p>\n";

fn pipeline(block_size: usize) -> SentencePipeline {
    let config = PipelineConfig {
        block_size,
        markers: vec![
            MarkerRule {
                name: "markup".to_string(),
                pattern: "<[^>]+>".to_string(),
                group: 0,
                actions: vec![MarkerAction::Skip],
            },
            MarkerRule {
                name: "entity".to_string(),
                pattern: "&amp;".to_string(),
                group: 0,
                actions: vec![MarkerAction::Replace {
                    replacement: "&".to_string(),
                }],
            },
        ],
        ..PipelineConfig::default()
    };
    SentencePipeline::from_config(&config).expect("benchmark pipeline should build")
}

fn bench_rolling_window(c: &mut Criterion) {
    // WHY: ~240KB keeps a sample under a second while spanning many flushes
    let text = PARAGRAPH.repeat(2000);

    let mut group = c.benchmark_group("sentence_detection");
    group.sample_size(10); // WHY: just 10 samples for speed
    group.throughput(Throughput::Bytes(text.len() as u64));

    let whole = pipeline(8192);
    group.bench_function("whole_text", |b| {
        b.iter(|| black_box(whole.process_text(black_box(&text)).unwrap().len()))
    });

    for block_size in [1024, 8192, 65536] {
        let streaming = pipeline(block_size);
        group.bench_with_input(BenchmarkId::new("rolling", block_size), &text, |b, text| {
            b.iter(|| {
                let mut stream = streaming.stream();
                let mut count = 0;
                for chunk in split_chunks(text, block_size) {
                    count += stream.push(chunk).unwrap().len();
                }
                count += stream.finish().unwrap().len();
                black_box(count)
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_rolling_window);
criterion_main!(benches);
