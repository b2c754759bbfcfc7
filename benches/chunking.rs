use antt_rag::convert::{Document, DocumentMetadata};
use antt_rag::embeddings::{ChunkingConfig, TextSplitter};
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

fn regulation_text(articles: usize) -> String {
    (1..=articles)
        .map(|n| {
            format!(
                "Art. {n}. A concessionária deverá manter, durante todo o prazo da concessão, \
                 as apólices de seguro previstas no contrato, incluindo seguro de risco de \
                 engenharia e de responsabilidade civil, sob pena das sanções do art. {}.\n\n",
                n + 1
            )
        })
        .collect()
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let document = Document {
        content: regulation_text(400),
        metadata: DocumentMetadata::new("/docs/rcr-3.pdf", "application/pdf").with_page(Some(1)),
    };
    let splitter =
        TextSplitter::from_config(&ChunkingConfig::default()).expect("default config is valid");

    c.bench_function("chunking", |b| {
        b.iter(|| splitter.split_document(black_box(&document)));
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
