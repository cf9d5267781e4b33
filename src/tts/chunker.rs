//! Sentence chunking for hosts with a maximum utterance length.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SENTENCE_END: Regex = Regex::new(r"[.!?]\s+").expect("valid sentence regex");
}

/// Split `text` into sentences, keeping the terminating punctuation.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for m in SENTENCE_END.find_iter(text) {
        // Punctuation is one ASCII byte.
        let end = m.start() + 1;
        let sentence = text[start..end].trim();
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
        start = m.end();
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

/// Pack sentences into chunks of at most `max_len` chars.
///
/// Sentences that are too long on their own are split at whitespace, and
/// single words longer than the limit are split at char boundaries.
pub fn chunk_text(text: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();

    for sentence in split_sentences(text) {
        if char_len(sentence) > max_len {
            flush(&mut chunks, &mut current);
            split_long(sentence, max_len, &mut chunks);
            continue;
        }
        append_piece(&mut chunks, &mut current, sentence, max_len);
    }
    flush(&mut chunks, &mut current);
    chunks
}

fn split_long(sentence: &str, max_len: usize, chunks: &mut Vec<String>) {
    let mut current = String::new();
    for word in sentence.split_whitespace() {
        if char_len(word) > max_len {
            flush(chunks, &mut current);
            let chars: Vec<char> = word.chars().collect();
            for piece in chars.chunks(max_len) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }
        append_piece(chunks, &mut current, word, max_len);
    }
    flush(chunks, &mut current);
}

fn append_piece(chunks: &mut Vec<String>, current: &mut String, piece: &str, max_len: usize) {
    let needed = if current.is_empty() {
        char_len(piece)
    } else {
        char_len(current) + 1 + char_len(piece)
    };
    if needed > max_len {
        flush(chunks, current);
    }
    if !current.is_empty() {
        current.push(' ');
    }
    current.push_str(piece);
}

fn flush(chunks: &mut Vec<String>, current: &mut String) {
    if !current.is_empty() {
        chunks.push(std::mem::take(current));
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip_ws(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    #[test]
    fn test_split_sentences() {
        let s = split_sentences("Hello there. How are you? Fine!  Thanks");
        assert_eq!(s, ["Hello there.", "How are you?", "Fine!", "Thanks"]);
    }

    #[test]
    fn test_decimal_point_is_not_a_boundary() {
        assert_eq!(split_sentences("Pi is 3.14 today."), ["Pi is 3.14 today."]);
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        assert_eq!(chunk_text("One. Two.", 100), ["One. Two."]);
    }

    #[test]
    fn test_chunks_respect_limit_and_cover_text() {
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(12)
            + "Supercalifragilisticexpialidocious is a long word! Done?";
        let max = 30;
        let chunks = chunk_text(&text, max);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= max, "chunk too long: {chunk:?}");
            assert!(!chunk.is_empty());
        }
        assert_eq!(strip_ws(&chunks.concat()), strip_ws(&text));
    }

    #[test]
    fn test_multibyte_words_split_on_char_boundaries() {
        let text = "ééééééééééé";
        let chunks = chunk_text(text, 4);
        assert_eq!(chunks, ["éééé", "éééé", "ééé"]);
    }

    #[test]
    fn test_sentences_packed_greedily() {
        let chunks = chunk_text("Aa. Bb. Cc. Dd.", 8);
        assert_eq!(chunks, ["Aa. Bb.", "Cc. Dd."]);
    }
}
