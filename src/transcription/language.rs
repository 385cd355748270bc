// Language resolution
//
// Two policies: a cheap partial-tick policy that can progressively lock the
// session language, and a stop-time policy with an auto-detection fallback
// that scores dual EN/TR runs when detection is inconclusive.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;

use super::recognizer::{Recognizer, TranscriptionResult};

/// Detection confidence required before forcing a re-run with the detected
/// language.
pub const FORCE_THRESHOLD: f32 = 0.45;
/// Detection confidence required before the session language locks.
pub const LOCK_THRESHOLD: f32 = 0.80;

/// Languages the recognizer models are tuned for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    En,
    Tr,
}

impl Lang {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lang::En => "en",
            Lang::Tr => "tr",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "en" => Some(Lang::En),
            "tr" => Some(Lang::Tr),
            _ => None,
        }
    }
}

/// Language requested by the user when recording starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageMode {
    Auto,
    En,
    Tr,
}

/// Per-session language decision. `auto_en`/`auto_tr` mean "auto mode,
/// resolved to this language"; they normalize to plain `en`/`tr` before any
/// recognizer call or database write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LanguageLock {
    Auto,
    AutoEn,
    AutoTr,
    En,
    Tr,
}

impl LanguageLock {
    pub fn as_str(&self) -> &'static str {
        match self {
            LanguageLock::Auto => "auto",
            LanguageLock::AutoEn => "auto_en",
            LanguageLock::AutoTr => "auto_tr",
            LanguageLock::En => "en",
            LanguageLock::Tr => "tr",
        }
    }

    /// The concrete language this lock pins, if any.
    pub fn pinned_lang(&self) -> Option<Lang> {
        match self {
            LanguageLock::Auto => None,
            LanguageLock::AutoEn | LanguageLock::En => Some(Lang::En),
            LanguageLock::AutoTr | LanguageLock::Tr => Some(Lang::Tr),
        }
    }

    pub fn auto_variant(lang: Lang) -> Self {
        match lang {
            Lang::En => LanguageLock::AutoEn,
            Lang::Tr => LanguageLock::AutoTr,
        }
    }

    pub fn from_mode(mode: LanguageMode) -> Self {
        match mode {
            LanguageMode::Auto => LanguageLock::Auto,
            LanguageMode::En => LanguageLock::En,
            LanguageMode::Tr => LanguageLock::Tr,
        }
    }
}

/// Shared language decision for one session. The partial scheduler reads it
/// on every tick; the session mutates it on `set_language` and when a
/// confident detection locks the language.
pub struct LanguageState {
    mode: Mutex<LanguageMode>,
    lock: Mutex<Option<LanguageLock>>,
}

impl LanguageState {
    pub fn new(mode: LanguageMode) -> Self {
        Self {
            mode: Mutex::new(mode),
            lock: Mutex::new(None),
        }
    }

    pub fn mode(&self) -> LanguageMode {
        *self.mode.lock().unwrap()
    }

    pub fn set_mode(&self, mode: LanguageMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn lock(&self) -> Option<LanguageLock> {
        *self.lock.lock().unwrap()
    }

    pub fn set_lock(&self, lock: LanguageLock) {
        info!("🔒 Language locked: {}", lock.as_str());
        *self.lock.lock().unwrap() = Some(lock);
    }

    /// Language code passed to partial inference: an established lock wins,
    /// then an explicit user mode, then auto detection.
    pub fn effective_partial_language(&self) -> &'static str {
        if let Some(lang) = self.lock().and_then(|l| l.pinned_lang()) {
            return lang.as_str();
        }
        match self.mode() {
            LanguageMode::En => "en",
            LanguageMode::Tr => "tr",
            LanguageMode::Auto => "auto",
        }
    }
}

/// Language detected by a recognizer run, if it is one we support and the
/// confidence clears the force threshold.
pub fn confident_detection(result: &TranscriptionResult) -> Option<(Lang, f32)> {
    let lang = result.detected_language.as_deref().and_then(Lang::from_code)?;
    if result.detected_probability >= FORCE_THRESHOLD {
        Some((lang, result.detected_probability))
    } else {
        None
    }
}

/// Outcome of the stop-time language resolution.
pub struct FinalResolution {
    pub result: TranscriptionResult,
    pub lock: LanguageLock,
}

/// Run the full-file transcription with the requested lock, applying the
/// auto-mode fallback chain: confident detection → forced re-run, otherwise
/// dual EN/TR runs decided by quality score.
pub fn resolve_final(
    recognizer: &dyn Recognizer,
    wav_path: &Path,
    requested: LanguageLock,
) -> FinalResolution {
    if let Some(lang) = requested.pinned_lang() {
        let result = recognizer.transcribe(wav_path, lang.as_str());
        return FinalResolution { result, lock: requested };
    }

    let first = recognizer.transcribe(wav_path, "auto");
    if !first.is_ok() {
        return FinalResolution { result: first, lock: requested };
    }

    let detection = confident_detection(&first);

    if !first.trimmed_text().is_empty() {
        let lock = match detection {
            Some((lang, p)) => {
                debug!("Auto transcription detected {} (p={:.2})", lang.as_str(), p);
                LanguageLock::auto_variant(lang)
            }
            None => requested,
        };
        return FinalResolution { result: first, lock };
    }

    // Auto run came back empty: force the detected language if we trust it
    if let Some((lang, p)) = detection {
        info!(
            "Auto transcription empty, re-running with detected '{}' (p={:.2})",
            lang.as_str(),
            p
        );
        let forced = recognizer.transcribe(wav_path, lang.as_str());
        if forced.is_ok() && !forced.trimmed_text().is_empty() {
            return FinalResolution {
                result: forced,
                lock: LanguageLock::auto_variant(lang),
            };
        }
    }

    // Detection inconclusive: run both languages and score the candidates
    let en = recognizer.transcribe(wav_path, "en");
    let tr = recognizer.transcribe(wav_path, "tr");
    let en_score = score_transcript(&en.text, Lang::En);
    let tr_score = score_transcript(&tr.text, Lang::Tr);
    info!(
        "Dual-run fallback: en score {} vs tr score {}",
        en_score, tr_score
    );

    // Tie prefers English
    let (winner, lang) = if tr_score > en_score {
        (tr, Lang::Tr)
    } else {
        (en, Lang::En)
    };

    if winner.is_ok() && winner.trimmed_text().is_empty() {
        // Both candidates were silence; keep the requested lock
        return FinalResolution { result: winner, lock: requested };
    }

    FinalResolution {
        result: winner,
        lock: LanguageLock::auto_variant(lang),
    }
}

const TR_COMMON: &[&str] = &[
    "ve", "bir", "bu", "ben", "sen", "için", "değil", "şimdi", "var", "yok", "ile", "olan",
    "gibi", "kadar", "daha", "çok", "az", "en", "da", "de", "ki", "mi", "mı", "mu", "mü",
];

const EN_COMMON: &[&str] = &[
    "the", "and", "is", "are", "to", "of", "in", "for", "with", "i", "you", "we", "they",
    "this", "that", "have", "has", "had", "was", "were", "been", "be", "do", "does", "did",
    "will", "would", "can", "could", "should", "may", "might",
];

const TR_CHARS: &[char] = &['ç', 'ğ', 'ı', 'ö', 'ş', 'ü'];

/// Heuristic quality score for a candidate transcript under a language hint.
/// Rewards length and hint-typical vocabulary, penalizes degenerate runs of
/// repeated tokens and piles of short filler words.
pub fn score_transcript(text: &str, hint: Lang) -> i64 {
    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered.split_whitespace().collect();
    if words.is_empty() {
        return 0;
    }

    let word_count = words.len().min(80) as i64;

    let mut max_repeat = 1i64;
    let mut run = 1i64;
    for pair in words.windows(2) {
        if pair[0] == pair[1] {
            run += 1;
            max_repeat = max_repeat.max(run);
        } else {
            run = 1;
        }
    }
    let repeat_penalty = if max_repeat > 2 { 5 * max_repeat } else { 0 };

    let mut nonsense = 0i64;
    let mut seen: Vec<&str> = Vec::new();
    for &word in &words {
        if word.chars().count() <= 2 && !seen.contains(&word) {
            seen.push(word);
            if words.iter().filter(|&&w| w == word).count() > 3 {
                nonsense += 1;
            }
        }
    }
    let nonsense_penalty = 3 * nonsense;

    let hint_bonus = match hint {
        Lang::Tr => {
            let special = lowered.chars().filter(|c| TR_CHARS.contains(c)).count() as i64;
            let common = words.iter().filter(|w| TR_COMMON.contains(w)).count() as i64;
            4 * special + 3 * common
        }
        Lang::En => words.iter().filter(|w| EN_COMMON.contains(w)).count() as i64,
    };

    word_count + hint_bonus - repeat_penalty - nonsense_penalty
}
