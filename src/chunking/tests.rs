use super::*;

fn small_config() -> ChunkingConfig {
    ChunkingConfig {
        chunk_size: 100,
        overlap: 20,
    }
}

/// Text of distinct numbered words, long enough to force several chunks.
fn numbered_words(count: usize) -> String {
    (0..count)
        .map(|i| format!("word{i:04}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[test]
fn short_text_is_a_single_chunk() {
    let chunks = split_text("um texto curto", &ChunkingConfig::default());

    assert_eq!(chunks, vec!["um texto curto".to_string()]);
}

#[test]
fn empty_text_yields_no_chunks() {
    assert!(split_text("", &ChunkingConfig::default()).is_empty());
    assert!(split_text("   \n\n  ", &ChunkingConfig::default()).is_empty());
}

#[test]
fn chunks_respect_size_bound() {
    let config = small_config();
    let chunks = split_text(&numbered_words(200), &config);

    assert!(chunks.len() > 1);
    for chunk in &chunks {
        // The overlap seed plus the joining space is the only tolerated excess.
        assert!(chunk.chars().count() <= config.chunk_size + config.overlap + 1);
    }
}

#[test]
fn consecutive_chunks_overlap() {
    let config = small_config();
    let chunks = split_text(&numbered_words(200), &config);

    for window in chunks.windows(2) {
        let first_word = window[1]
            .split_whitespace()
            .next()
            .expect("chunks are non-empty");
        // The seed is a raw character tail, so the first word of a chunk may
        // be a suffix of a word from the previous chunk.
        assert!(
            window[0].contains(first_word),
            "chunk {:?} does not carry tail of {:?}",
            window[1],
            window[0]
        );
    }
}

#[test]
fn zero_overlap_produces_disjoint_chunks() {
    let config = ChunkingConfig {
        chunk_size: 100,
        overlap: 0,
    };
    let text = numbered_words(200);
    let chunks = split_text(&text, &config);

    assert!(chunks.len() > 1);

    // Every word appears exactly once across all chunks.
    let total_words: usize = chunks.iter().map(|c| c.split_whitespace().count()).sum();
    assert_eq!(total_words, 200);
}

#[test]
fn paragraph_boundaries_are_preferred() {
    let config = small_config();
    let paragraphs = [
        "primeiro parágrafo com algum texto razoável aqui",
        "segundo parágrafo igualmente modesto em tamanho",
        "terceiro parágrafo que fecha o documento inteiro",
    ];
    let text = paragraphs.join("\n\n");

    let chunks = split_text(&text, &config);

    // Each paragraph fits in a chunk, so no paragraph is split internally.
    for paragraph in &paragraphs {
        assert!(
            chunks.iter().any(|chunk| chunk.contains(paragraph)),
            "paragraph {:?} was split across chunks",
            paragraph
        );
    }
}

#[test]
fn unbroken_run_falls_back_to_character_split() {
    let config = small_config();
    let text = "x".repeat(350);

    let chunks = split_text(&text, &config);

    assert!(chunks.len() >= 3);
    for chunk in &chunks {
        assert!(chunk.chars().count() <= config.chunk_size + config.overlap + 1);
    }
}

#[test]
fn multibyte_text_is_counted_in_characters() {
    let config = ChunkingConfig {
        chunk_size: 50,
        overlap: 10,
    };
    // Portuguese text with plenty of multibyte characters.
    let text = "ação coração não está à tona ".repeat(20);

    let chunks = split_text(&text, &config);

    assert!(chunks.len() > 1);
    for chunk in &chunks {
        assert!(chunk.chars().count() <= config.chunk_size + config.overlap + 1);
    }
}

#[test]
fn default_config_matches_ingestion_contract() {
    let config = ChunkingConfig::default();

    assert_eq!(config.chunk_size, 1000);
    assert_eq!(config.overlap, 200);
}
