// Sentence splitting and timestamp distribution
//
// Recognizer output arrives as one flat string; segments get their
// timestamps by distributing the window duration proportionally to
// sentence length in characters.

use super::language::Lang;
use super::types::SegmentDraft;

/// Strip recognizer noise markers (`[BLANK_AUDIO]`, `(applause)`, …) and
/// collapse whitespace runs.
pub fn clean_transcript_text(raw: &str) -> String {
    let mut kept = String::with_capacity(raw.len());
    let mut brackets = 0u32;
    let mut parens = 0u32;

    for c in raw.chars() {
        match c {
            '[' => brackets += 1,
            ']' if brackets > 0 => brackets -= 1,
            '(' => parens += 1,
            ')' if parens > 0 => parens -= 1,
            _ if brackets == 0 && parens == 0 => kept.push(c),
            _ => {}
        }
    }

    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split on runs of `.`/`!`/`?` followed by whitespace, keeping the
/// punctuation with the preceding sentence. The remainder after the last
/// match is a sentence; empty sentences are dropped.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            while let Some(&next) = chars.peek() {
                if matches!(next, '.' | '!' | '?') {
                    current.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            if chars.peek().is_some_and(|next| next.is_whitespace()) {
                while chars.peek().is_some_and(|next| next.is_whitespace()) {
                    chars.next();
                }
                let sentence = current.trim().to_string();
                if !sentence.is_empty() {
                    sentences.push(sentence);
                }
                current.clear();
            }
        }
    }

    let tail = current.trim().to_string();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

/// Distribute `duration_ms` across sentences proportionally to character
/// count: `len_i = floor(duration * |s_i| / total)`, each segment starting
/// where the previous ended and clamped to the window.
pub fn distribute_timestamps(sentences: &[String], duration_ms: i64, lang: Lang) -> Vec<SegmentDraft> {
    let total: i64 = sentences.iter().map(|s| s.chars().count() as i64).sum();
    if total == 0 {
        return Vec::new();
    }

    let mut segments = Vec::with_capacity(sentences.len());
    let mut start_ms = 0i64;
    for sentence in sentences {
        let len_ms = duration_ms * sentence.chars().count() as i64 / total;
        let end_ms = (start_ms + len_ms).min(duration_ms);
        segments.push(SegmentDraft {
            start_ms,
            end_ms,
            text: sentence.clone(),
            lang,
        });
        start_ms = end_ms;
    }
    segments
}

/// Clean, split, timestamp, and optionally cap recognizer output.
pub fn build_segments(
    raw_text: &str,
    duration_ms: i64,
    lang: Lang,
    cap: Option<usize>,
) -> Vec<SegmentDraft> {
    let cleaned = clean_transcript_text(raw_text);
    if cleaned.is_empty() {
        return Vec::new();
    }

    let sentences = split_sentences(&cleaned);
    let mut segments = distribute_timestamps(&sentences, duration_ms, lang);
    if let Some(cap) = cap {
        segments.truncate(cap);
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_keeps_punctuation() {
        let sentences = split_sentences("Hello world. This is a test.");
        assert_eq!(sentences, vec!["Hello world.", "This is a test."]);
    }

    #[test]
    fn test_split_punctuation_runs_and_tail() {
        let sentences = split_sentences("What?! Really... yes indeed");
        assert_eq!(sentences, vec!["What?!", "Really...", "yes indeed"]);
    }

    #[test]
    fn test_no_split_is_one_sentence() {
        assert_eq!(split_sentences("no punctuation here"), vec!["no punctuation here"]);
        assert!(split_sentences("   ").is_empty());
    }

    #[test]
    fn test_split_round_trip() {
        let original = vec!["First one.", "Second?", "Third!", "tail without end"];
        let joined = original.join(" ");
        assert_eq!(split_sentences(&joined), original);
    }

    #[test]
    fn test_distribution_chains_and_clamps() {
        let sentences: Vec<String> = vec!["Hello world.".into(), "This is a test.".into()];
        let segments = distribute_timestamps(&sentences, 5_000, Lang::En);

        // 12 and 15 chars over 27 total
        assert_eq!(segments[0].start_ms, 0);
        assert_eq!(segments[0].end_ms, 5_000 * 12 / 27);
        assert_eq!(segments[1].start_ms, segments[0].end_ms);
        assert!(segments[1].end_ms <= 5_000);
    }

    #[test]
    fn test_single_sentence_spans_whole_window() {
        let segments = distribute_timestamps(&["only one".to_string()], 6_000, Lang::Tr);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].start_ms, 0);
        assert_eq!(segments[0].end_ms, 6_000);
        assert_eq!(segments[0].lang, Lang::Tr);
    }

    #[test]
    fn test_clean_strips_noise_markers() {
        assert_eq!(
            clean_transcript_text(" [BLANK_AUDIO] Hello   there (applause) friend "),
            "Hello there friend"
        );
        assert_eq!(clean_transcript_text("[MUSIC]"), "");
    }

    #[test]
    fn test_build_segments_caps_count() {
        let text = "One. Two. Three. Four. Five.";
        let segments = build_segments(text, 6_000, Lang::En, Some(3));
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].text, "One.");
    }

    #[test]
    fn test_build_segments_empty_for_noise_only() {
        assert!(build_segments("[BLANK_AUDIO]", 6_000, Lang::En, None).is_empty());
    }
}
