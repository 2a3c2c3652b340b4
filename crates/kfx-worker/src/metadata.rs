//! Per-video metadata derived from file names.
//!
//! Recordings follow the convention `<speaker>_<language>_<emotion>_<sentence>`,
//! e.g. `A1_EN_H_S3.mp4`. Codes are expanded through fixed lookup tables;
//! unknown codes are kept as-is.

use tracing::warn;

use kfx_models::VideoMetadata;

/// Resolves metadata for a video from its file name.
pub trait MetadataResolver: Send + Sync {
    fn resolve(&self, file_name: &str) -> VideoMetadata;
}

/// Resolver that knows nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullMetadataResolver;

impl MetadataResolver for NullMetadataResolver {
    fn resolve(&self, _file_name: &str) -> VideoMetadata {
        VideoMetadata::new()
    }
}

/// Resolver for the structured recording file names.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilenameMetadataResolver;

const SPEAKER_NAMES: [&str; 25] = [
    "One", "Two", "Three", "Four", "Five", "Six", "Seven", "Eight", "Nine", "Ten",
    "Eleven", "Twelve", "Thirteen", "Fourteen", "Fifteen", "Sixteen", "Seventeen",
    "Eighteen", "Nineteen", "Twenty", "Twenty One", "Twenty Two", "Twenty Three",
    "Twenty Four", "Twenty Five",
];

const MALE_SPEAKERS: &[&str] = &[
    "A1", "A2", "A5", "A8", "A9", "A11", "A12", "A14", "A15", "A16", "A20", "A22", "A23",
];

const FEMALE_SPEAKERS: &[&str] = &[
    "A3", "A4", "A6", "A7", "A10", "A13", "A17", "A18", "A19", "A21", "A24", "A25",
];

const SENTENCES: [&str; 18] = [
    "Can't you hear my voice?",
    "I tried to resolve this issue from my end.",
    "My electricity bill is not yet updated.",
    "How much time is needed to update my account details?",
    "I no longer want to use your services.",
    "No, I haven't received any updates.",
    "No, that's fine.",
    "Okay, but make it quick.",
    "I am busy. You can call me later.",
    "Yes, who is calling?",
    "I hope it will work fine now",
    "Okay, what do I have to do?",
    "Fine, send your executive at 10:00 a.m. tomorrow.",
    "I got the wrong electricity bill.",
    "Okay, I have all these things ready.",
    "I have been waiting long to connect.",
    "Can you fix it fast?",
    "Well, can you help me?",
];

/// 1-based index after a single-letter prefix, e.g. `A12` -> 12.
fn code_index(code: &str, prefix: char, max: usize) -> Option<usize> {
    let n: usize = code.strip_prefix(prefix)?.parse().ok()?;
    (1..=max).contains(&n).then_some(n)
}

fn speaker_name(code: &str) -> String {
    match code_index(code, 'A', SPEAKER_NAMES.len()) {
        Some(n) if code == format!("A{}", n) => format!("Speaker {}", SPEAKER_NAMES[n - 1]),
        _ => code.to_string(),
    }
}

fn sentence(code: &str) -> String {
    match code_index(code, 'S', SENTENCES.len()) {
        Some(n) if code == format!("S{}", n) => SENTENCES[n - 1].to_string(),
        _ => code.to_string(),
    }
}

fn gender(speaker: &str) -> &'static str {
    if MALE_SPEAKERS.contains(&speaker) {
        "M"
    } else if FEMALE_SPEAKERS.contains(&speaker) {
        "F"
    } else {
        "Unknown"
    }
}

fn language(code: &str) -> String {
    match code {
        "EN" => "English".to_string(),
        "HI" => "Hindi".to_string(),
        other => other.to_string(),
    }
}

fn emotion(code: &str) -> String {
    match code {
        "A" => "Anger",
        "D" => "Disgust",
        "F" => "Fear",
        "H" | "Ha" => "Happy",
        "N" => "Neutral",
        "S" => "Sad",
        other => other,
    }
    .to_string()
}

fn defaults() -> VideoMetadata {
    [
        ("speaker", "unknown"),
        ("speaker_name", "Unknown Speaker"),
        ("gender", "Unknown"),
        ("language", "unknown"),
        ("language_full", "Unknown Language"),
        ("emotion", "unknown"),
        ("emotion_full", "Unknown Emotion"),
        ("detail", "unknown"),
        ("sentence", "Unknown sentence"),
    ]
    .into_iter()
    .collect()
}

impl MetadataResolver for FilenameMetadataResolver {
    fn resolve(&self, file_name: &str) -> VideoMetadata {
        let mut metadata = defaults();

        let base = std::path::Path::new(file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let parts: Vec<&str> = base.split('_').collect();

        if parts.len() != 4 {
            for (key, value) in ["speaker", "language", "emotion", "detail"].iter().zip(&parts) {
                metadata.insert(*key, *value);
            }
            warn!(
                "Filename structure unexpected: {}, expected 4 parts separated by underscores",
                file_name
            );
            return metadata;
        }

        let (speaker, lang, emotion_code, detail) =
            (parts[0].trim(), parts[1].trim(), parts[2].trim(), parts[3].trim());

        metadata.insert("speaker", speaker);
        metadata.insert("speaker_name", speaker_name(speaker));
        metadata.insert("gender", gender(speaker));
        metadata.insert("language", lang);
        metadata.insert("language_full", language(lang));
        metadata.insert("emotion", emotion_code);
        metadata.insert("emotion_full", emotion(emotion_code));
        metadata.insert("detail", detail);
        metadata.insert("sentence", sentence(detail));
        metadata
    }
}
