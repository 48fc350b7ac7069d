//! Sentence segmentation for outbound responses
//!
//! Long responses are split into sentence-sized segments before synthesis
//! so downstream TTS length limits never truncate mid-sentence. Each
//! segment is emitted as an independent outbound unit but originates from
//! one logical turn.

const TERMINATORS: &[char] = &['.', '!', '?'];

/// Split a response into spoken segments at sentence boundaries.
///
/// Trailing quotes and brackets stay attached to their sentence; text
/// without a final terminator is emitted as a last segment.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        current.push(c);
        i += 1;

        if TERMINATORS.contains(&c) {
            // Keep closing quotes/brackets with the sentence
            while i < chars.len() && matches!(chars[i], '"' | '\'' | ')' | ']') {
                current.push(chars[i]);
                i += 1;
            }
            let sentence = current.trim().to_string();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            current.clear();
        }
    }

    let tail = current.trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }
    sentences
}
