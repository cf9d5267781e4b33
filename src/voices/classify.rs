//! Voice name heuristics
//!
//! Guesses gender, vendor and quality tier from substrings of a voice name.
//! The keyword lists are short and biased toward Western English names, so a
//! lot of voices land on the fallback value.

use super::{Gender, Quality, Voice};

const FEMALE_KEYWORDS: &[&str] = &[
    "female", "woman", "girl", "samantha", "victoria", "karen", "moira", "tessa", "fiona",
    "veena", "zira", "susan", "hazel", "heera", "catherine", "allison", "ava", "serena",
    "kate", "monica", "paulina", "amelie", "anna", "alice", "ellen", "sara", "joana",
    "luciana", "nora", "zosia", "milena", "yuna", "mei-jia", "sin-ji", "ting-ting",
];

const MALE_KEYWORDS: &[&str] = &[
    "male", "man", "boy", "alex", "daniel", "fred", "tom", "david", "mark", "george",
    "james", "richard", "ravi", "rishi", "diego", "jorge", "juan", "thomas", "xander",
    "yuri", "maged", "oliver", "arthur", "aaron", "gordon", "lee",
];

const PROVIDER_KEYWORDS: &[(&str, &str)] = &[
    ("google", "Google"),
    ("microsoft", "Microsoft"),
    ("apple", "Apple"),
    ("siri", "Apple"),
    ("amazon", "Amazon"),
    ("polly", "Amazon"),
    ("ibm", "IBM"),
    ("watson", "IBM"),
];

const QUALITY_KEYWORDS: &[(&str, Quality)] = &[
    ("premium", Quality::Premium),
    ("plus", Quality::Premium),
    ("enhanced", Quality::Enhanced),
    ("hd", Quality::Enhanced),
    ("neural", Quality::Neural),
    ("wavenet", Quality::Neural),
    ("compact", Quality::Compact),
    ("lite", Quality::Compact),
];

/// Strategy used by the catalog to annotate voices.
pub trait VoiceClassifier: Send + Sync + std::fmt::Debug {
    fn gender(&self, voice: &Voice) -> Gender;
    fn provider(&self, voice: &Voice) -> String;
    fn quality(&self, voice: &Voice) -> Quality;
}

/// Case-insensitive keyword matcher over the voice name.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordClassifier;

impl VoiceClassifier for KeywordClassifier {
    fn gender(&self, voice: &Voice) -> Gender {
        let name = voice.name.to_lowercase();
        // "female" contains "male", so the female list must win.
        if FEMALE_KEYWORDS.iter().any(|k| name.contains(k)) {
            Gender::Female
        } else if MALE_KEYWORDS.iter().any(|k| name.contains(k)) {
            Gender::Male
        } else {
            Gender::Neutral
        }
    }

    fn provider(&self, voice: &Voice) -> String {
        let name = voice.name.to_lowercase();
        PROVIDER_KEYWORDS
            .iter()
            .find(|(keyword, _)| name.contains(keyword))
            .map(|(_, label)| *label)
            .unwrap_or("System")
            .to_string()
    }

    fn quality(&self, voice: &Voice) -> Quality {
        let name = voice.name.to_lowercase();
        QUALITY_KEYWORDS
            .iter()
            .find(|(keyword, _)| name.contains(keyword))
            .map(|(_, quality)| *quality)
            .unwrap_or(Quality::Standard)
    }
}
