use hermes_core::chunker::{count_tokens, Chunker};
use hermes_core::config::ChunkingSettings;
use hermes_core::Error;

fn words(n: usize) -> String {
    (0..n).map(|i| format!("t{i}")).collect::<Vec<_>>().join(" ")
}

fn chunker(max: usize, overlap: usize) -> Chunker {
    Chunker::new(ChunkingSettings { max_chunk_tokens: max, overlap_tokens: overlap }).expect("valid settings")
}

#[test]
fn short_document_is_one_segment() {
    let c = chunker(512, 64);
    let segs: Vec<_> = c.chunks("Short text\n").unwrap().collect();
    assert_eq!(segs.len(), 1);
    assert_eq!(segs[0].text, "Short text");
    assert_eq!(segs[0].token_count, 2);
}

#[test]
fn exact_fit_does_not_produce_trailing_segment() {
    let c = chunker(10, 3);
    let text = words(10);
    assert_eq!(c.chunks(&text).unwrap().count(), 1);
}

#[test]
fn consecutive_segments_share_overlap() {
    let c = chunker(10, 3);
    let text = words(25);
    let segs: Vec<_> = c.chunks(&text).unwrap().collect();
    assert!(segs.len() > 1);
    for pair in segs.windows(2) {
        let prev: Vec<&str> = pair[0].text.split_whitespace().collect();
        let next: Vec<&str> = pair[1].text.split_whitespace().collect();
        assert_eq!(&prev[prev.len() - 3..], &next[..3], "overlap of 3 tokens");
    }
    assert!(segs.iter().all(|s| s.token_count <= 10 && s.token_count > 0));
    assert_eq!(segs.iter().map(|s| s.index).collect::<Vec<_>>(), (0..segs.len()).collect::<Vec<_>>());
}

#[test]
fn segments_reconstruct_the_token_stream() {
    let c = chunker(7, 2);
    let text = "Uma  frase\tcom espaços\n\nirregulares e quebras de linha, várias palavras aqui e ali fim";
    let segs: Vec<_> = c.chunks(text).unwrap().collect();

    let mut rebuilt: Vec<&str> = Vec::new();
    for seg in &segs {
        let toks: Vec<&str> = seg.text.split_whitespace().collect();
        let skip = rebuilt.len() - seg.first_token;
        rebuilt.extend_from_slice(&toks[skip..]);
    }
    let expected: Vec<&str> = text.split_whitespace().collect();
    assert_eq!(rebuilt, expected);
    assert!(segs[0].text.contains("frase\tcom"), "inner whitespace is preserved");
}

#[test]
fn iterator_is_restartable() {
    let c = chunker(4, 1);
    let text = words(11);
    let first = c.chunks(&text).unwrap();
    let again = first.clone();
    let a: Vec<_> = first.collect();
    let b: Vec<_> = again.collect();
    assert_eq!(a, b);
}

#[test]
fn empty_or_blank_text_is_rejected() {
    let c = chunker(8, 2);
    assert!(matches!(c.chunks(""), Err(Error::InvalidInput(_))));
    assert!(matches!(c.chunks(" \n\t "), Err(Error::InvalidInput(_))));
}

#[test]
fn invalid_settings_are_rejected() {
    let zero = Chunker::new(ChunkingSettings { max_chunk_tokens: 0, overlap_tokens: 0 });
    assert!(matches!(zero, Err(Error::InvalidConfig(_))));
    let overlap = Chunker::new(ChunkingSettings { max_chunk_tokens: 4, overlap_tokens: 4 });
    assert!(matches!(overlap, Err(Error::InvalidConfig(_))));
}

#[test]
fn token_counting_ignores_whitespace_runs() {
    assert_eq!(count_tokens("  a   b\n\nc "), 3);
    assert_eq!(count_tokens(""), 0);
}
