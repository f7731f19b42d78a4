use chat_rag::chunking::{ChunkingConfig, split_text};
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

pub fn criterion_benchmark(c: &mut Criterion) {
    let paragraph = "Este é um parágrafo de teste com texto suficiente para exercitar o \
                     divisor de documentos. Ele contém frases de tamanhos variados e acentos \
                     típicos do português, como ação, coração e distribuição.\n\n";
    let text = paragraph.repeat(200);
    let config = ChunkingConfig::default();

    c.bench_function("split_text", |b| {
        b.iter(|| split_text(black_box(&text), black_box(&config)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
