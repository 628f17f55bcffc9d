//! Grade-level readability heuristics.
//!
//! Deliberately approximate: sentence length in words and average
//! syllables per word, with syllables counted by vowel groups. Good enough
//! to flag a third-grade worksheet written at a college reading level.

use crate::schema::GradeLevel;

/// Readability ceiling for a grade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadabilityLimits {
    pub max_words_per_sentence: usize,
    pub max_avg_syllables: f32,
}

/// Below this many words the average-syllable figure is too noisy to use.
pub const MIN_WORDS_FOR_SYLLABLE_CHECK: usize = 5;

/// Limits indexed by grade (K..=6).
const LIMITS: [ReadabilityLimits; 7] = [
    ReadabilityLimits { max_words_per_sentence: 10, max_avg_syllables: 1.4 },
    ReadabilityLimits { max_words_per_sentence: 12, max_avg_syllables: 1.5 },
    ReadabilityLimits { max_words_per_sentence: 14, max_avg_syllables: 1.6 },
    ReadabilityLimits { max_words_per_sentence: 17, max_avg_syllables: 1.7 },
    ReadabilityLimits { max_words_per_sentence: 20, max_avg_syllables: 1.8 },
    ReadabilityLimits { max_words_per_sentence: 22, max_avg_syllables: 1.9 },
    ReadabilityLimits { max_words_per_sentence: 25, max_avg_syllables: 2.0 },
];

pub fn limits_for(grade: GradeLevel) -> ReadabilityLimits {
    LIMITS[usize::from(grade.number().min(GradeLevel::MAX))]
}

/// Approximate syllable count of a single word.
pub fn count_syllables(word: &str) -> usize {
    let letters: Vec<char> = word
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_lowercase())
        .collect();

    if letters.is_empty() {
        // Numbers and symbols read as one unit.
        return 1;
    }
    if letters.len() <= 3 {
        return 1;
    }

    let is_vowel = |c: char| matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y');

    let mut groups = 0usize;
    let mut prev_vowel = false;
    for &c in &letters {
        let v = is_vowel(c);
        if v && !prev_vowel {
            groups += 1;
        }
        prev_vowel = v;
    }

    let n = letters.len();
    if letters[n - 1] == 'e' {
        let consonant_le = letters[n - 2] == 'l' && !is_vowel(letters[n - 3]);
        // "-le" after a consonant is its own syllable (ta-ble); any other
        // trailing 'e' is silent (make, whale).
        if !consonant_le {
            groups = groups.saturating_sub(1);
        }
    }

    groups.max(1)
}

/// Split text into sentences on `.`, `!`, `?` followed by whitespace (or
/// the end), and on line breaks. Decimals like `3.5` stay intact.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0usize;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        let boundary = match ch {
            '\n' => true,
            '.' | '!' | '?' => chars.peek().is_none_or(|(_, next)| next.is_whitespace()),
            _ => false,
        };
        if boundary {
            let end = idx + ch.len_utf8();
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = end;
        }
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

/// Words of a sentence: whitespace-separated tokens containing at least one
/// letter or digit, with surrounding punctuation removed.
pub fn words(text: &str) -> Vec<&str> {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| w.chars().any(|c| c.is_alphanumeric()))
        .collect()
}

/// Measurements for a block of prose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadabilityReport {
    pub word_count: usize,
    pub longest_sentence_words: usize,
    pub avg_syllables: f32,
}

pub fn analyze(text: &str) -> ReadabilityReport {
    let mut word_count = 0usize;
    let mut syllables = 0usize;
    let mut longest = 0usize;

    for sentence in split_sentences(text) {
        let ws = words(sentence);
        longest = longest.max(ws.len());
        word_count += ws.len();
        syllables += ws.iter().map(|w| count_syllables(w)).sum::<usize>();
    }

    let avg_syllables = if word_count == 0 {
        0.0
    } else {
        syllables as f32 / word_count as f32
    };

    ReadabilityReport {
        word_count,
        longest_sentence_words: longest,
        avg_syllables,
    }
}

/// A readability limit the text exceeds.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadabilityFinding {
    SentenceTooLong { words: usize, max: usize },
    WordsTooComplex { avg_syllables: f32, max: f32 },
}

impl ReadabilityFinding {
    pub fn message(&self, grade: GradeLevel) -> String {
        match self {
            Self::SentenceTooLong { words, max } => format!(
                "sentence has {words} words; grade {grade} readers manage about {max}"
            ),
            Self::WordsTooComplex { avg_syllables, max } => format!(
                "average word length is {avg_syllables:.1} syllables; grade {grade} target is {max:.1} or less"
            ),
        }
    }

    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::SentenceTooLong { .. } => "Split the sentence into shorter ones.",
            Self::WordsTooComplex { .. } => "Use simpler, shorter words.",
        }
    }
}

/// Check prose against the limits for `grade`.
pub fn check_text(text: &str, grade: GradeLevel) -> Vec<ReadabilityFinding> {
    let limits = limits_for(grade);
    let report = analyze(text);
    let mut findings = Vec::new();

    if report.longest_sentence_words > limits.max_words_per_sentence {
        findings.push(ReadabilityFinding::SentenceTooLong {
            words: report.longest_sentence_words,
            max: limits.max_words_per_sentence,
        });
    }
    if report.word_count >= MIN_WORDS_FOR_SYLLABLE_CHECK
        && report.avg_syllables > limits.max_avg_syllables
    {
        findings.push(ReadabilityFinding::WordsTooComplex {
            avg_syllables: report.avg_syllables,
            max: limits.max_avg_syllables,
        });
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syllables_simple_words() {
        assert_eq!(count_syllables("cat"), 1);
        assert_eq!(count_syllables("the"), 1);
        assert_eq!(count_syllables("apple"), 2);
        assert_eq!(count_syllables("table"), 2);
        assert_eq!(count_syllables("banana"), 3);
    }

    #[test]
    fn syllables_silent_e() {
        assert_eq!(count_syllables("make"), 1);
        assert_eq!(count_syllables("whale"), 1);
        assert_eq!(count_syllables("stone"), 1);
    }

    #[test]
    fn syllables_long_words() {
        assert_eq!(count_syllables("photosynthesis"), 5);
        assert_eq!(count_syllables("multiplication"), 5);
    }

    #[test]
    fn syllables_ignore_punctuation_and_numbers() {
        assert_eq!(count_syllables("apple,"), 2);
        assert_eq!(count_syllables("42"), 1);
    }

    #[test]
    fn sentence_split_keeps_decimals() {
        let s = split_sentences("Tom has 3.5 apples. He eats one! How many are left?");
        assert_eq!(s, vec!["Tom has 3.5 apples.", "He eats one!", "How many are left?"]);
    }

    #[test]
    fn sentence_split_on_newlines() {
        let s = split_sentences("Look at the picture\nCount the dogs");
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn words_strip_punctuation() {
        assert_eq!(words("\"Hello,\" said Sam — twice."), vec!["Hello", "said", "Sam", "twice"]);
    }

    #[test]
    fn simple_text_passes_kindergarten() {
        let text = "Count the red dots. How many do you see?";
        assert!(check_text(text, GradeLevel::KINDERGARTEN).is_empty());
    }

    #[test]
    fn long_sentence_flagged_for_grade_one() {
        let text = concat!(
            "The little brown dog ran across the big green park ",
            "to find his ball and then he ran all the way back home again",
        );
        let findings = check_text(text, GradeLevel::new(1));
        assert!(matches!(findings[0], ReadabilityFinding::SentenceTooLong { max: 12, .. }));
    }

    #[test]
    fn complex_vocabulary_flagged() {
        let text = "Photosynthesis transforms electromagnetic radiation into biochemical energy.";
        let findings = check_text(text, GradeLevel::new(2));
        assert!(
            findings.iter().any(|f| matches!(f, ReadabilityFinding::WordsTooComplex { .. })),
            "got: {findings:?}"
        );
    }

    #[test]
    fn short_text_skips_syllable_check() {
        assert!(check_text("Photosynthesis occurs.", GradeLevel::new(1)).is_empty());
    }

    #[test]
    fn limits_grow_with_grade() {
        let k = limits_for(GradeLevel::KINDERGARTEN);
        let six = limits_for(GradeLevel::new(6));
        assert!(six.max_words_per_sentence > k.max_words_per_sentence);
        assert!(six.max_avg_syllables > k.max_avg_syllables);
    }
}
