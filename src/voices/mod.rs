//! Voice Catalog
//!
//! Host voices, their inferred annotations, and selection over them.

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod catalog;
pub mod classify;
pub mod loader;
pub mod selector;

pub use catalog::VoiceCatalog;
pub use classify::{KeywordClassifier, VoiceClassifier};
pub use loader::VoiceLoader;
pub use selector::{select, VoiceCriteria};

/// A voice as reported by the host engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    pub name: String,
    /// BCP-47 tag, e.g. `en-US`
    pub lang: String,
    /// Synthesized on-device rather than over the network
    pub local_service: bool,
    /// Host-preferred voice for its language
    pub default: bool,
}

impl Voice {
    pub fn new(name: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lang: lang.into(),
            local_service: true,
            default: false,
        }
    }

    pub fn with_default(mut self, default: bool) -> Self {
        self.default = default;
        self
    }

    pub fn with_local_service(mut self, local_service: bool) -> Self {
        self.local_service = local_service;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Neutral,
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Neutral => "neutral",
        })
    }
}

impl std::str::FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "male" => Ok(Self::Male),
            "female" => Ok(Self::Female),
            "neutral" => Ok(Self::Neutral),
            other => Err(format!("unknown gender '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Standard,
    Enhanced,
    Neural,
    Premium,
    Compact,
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Standard => "standard",
            Self::Enhanced => "enhanced",
            Self::Neural => "neural",
            Self::Premium => "premium",
            Self::Compact => "compact",
        })
    }
}

/// A host voice plus guessed metadata.
///
/// `gender`, `provider` and `quality` come from name heuristics and are
/// frequently wrong. Do not treat them as facts about the voice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotatedVoice {
    pub voice: Voice,
    pub gender: Gender,
    pub provider: String,
    pub quality: Quality,
}

/// Primary subtag of a BCP-47 tag (`en` for `en-US`), lowercased.
pub fn primary_subtag(lang: &str) -> String {
    lang.split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_subtag() {
        assert_eq!(primary_subtag("en-US"), "en");
        assert_eq!(primary_subtag("ES"), "es");
        assert_eq!(primary_subtag("zh_Hant_TW"), "zh");
        assert_eq!(primary_subtag(""), "");
    }

    #[test]
    fn test_gender_parse() {
        assert_eq!("Female".parse::<Gender>(), Ok(Gender::Female));
        assert!("robot".parse::<Gender>().is_err());
    }
}
