use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SENTENCE_BOUNDARY: Regex = Regex::new(r"[.!?]+").unwrap();
}

/// Normalization used for fill-in answer matching: whitespace-trimmed,
/// lowercase.
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Splits text into lowercase words, stripping surrounding punctuation.
pub fn words(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'')
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

/// Flesch reading ease of an English text, or `None` when the text has no
/// words to measure. Higher values mean easier text; the evaluator inverts
/// this into a complexity sub-score.
///
/// Syllables are estimated by counting vowel groups with a silent-e
/// adjustment, which tracks the reference implementation closely enough for
/// scoring bands.
pub fn flesch_reading_ease(text: &str) -> Option<f64> {
    let words = words(text);
    if words.is_empty() {
        return None;
    }

    let sentence_count = SENTENCE_BOUNDARY
        .split(text)
        .filter(|s| s.chars().any(|c| c.is_alphanumeric()))
        .count()
        .max(1) as f64;

    let word_count = words.len() as f64;
    let syllable_count: usize = words.iter().map(|w| estimate_syllables(w)).sum();

    Some(206.835 - 1.015 * (word_count / sentence_count) - 84.6 * (syllable_count as f64 / word_count))
}

fn estimate_syllables(word: &str) -> usize {
    let chars: Vec<char> = word.chars().collect();
    let mut count = 0;
    let mut previous_was_vowel = false;

    for &c in &chars {
        let is_vowel = matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y');
        if is_vowel && !previous_was_vowel {
            count += 1;
        }
        previous_was_vowel = is_vowel;
    }

    // Silent trailing e ("make", "note") unless it is the only vowel ("the")
    if count > 1 && chars.last() == Some(&'e') && chars.get(chars.len().wrapping_sub(2)) != Some(&'l')
    {
        count -= 1;
    }

    count.max(1)
}
