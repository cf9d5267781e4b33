//! Voice selection
//!
//! Resolves caller criteria to one voice with a fixed fallback chain:
//! exact name, then language (exact tag, primary subtag, prefix), then the
//! catalog default, then the first voice.

use super::{primary_subtag, AnnotatedVoice, Gender, Voice, VoiceCatalog};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceCriteria {
    pub name: Option<String>,
    pub lang: Option<String>,
    pub gender: Option<Gender>,
}

impl VoiceCriteria {
    pub fn lang(lang: impl Into<String>) -> Self {
        Self {
            lang: Some(lang.into()),
            ..Self::default()
        }
    }

    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_gender(mut self, gender: Gender) -> Self {
        self.gender = Some(gender);
        self
    }
}

/// Pick the best voice for `criteria`. Returns `None` only for an empty catalog.
pub fn select(catalog: &VoiceCatalog, criteria: &VoiceCriteria) -> Option<Voice> {
    let voices = catalog.as_slice();

    if let Some(name) = criteria.name.as_deref() {
        if let Some(found) = catalog.find_by_name(name) {
            debug!("🎙️ Voice matched by name: {}", found.voice.name);
            return Some(found.voice.clone());
        }
    }

    if let Some(lang) = criteria.lang.as_deref() {
        let candidates = language_candidates(voices, lang);
        if let Some(found) = pick_in_language(&candidates, criteria.gender) {
            debug!("🎙️ Voice matched by language {}: {}", lang, found.voice.name);
            return Some(found.voice.clone());
        }
    }

    voices
        .iter()
        .find(|v| v.voice.default)
        .or_else(|| voices.first())
        .map(|v| v.voice.clone())
}

fn language_candidates<'a>(voices: &'a [AnnotatedVoice], lang: &str) -> Vec<&'a AnnotatedVoice> {
    let exact: Vec<_> = voices
        .iter()
        .filter(|v| v.voice.lang.eq_ignore_ascii_case(lang))
        .collect();
    if !exact.is_empty() {
        return exact;
    }

    let primary = primary_subtag(lang);
    if primary.is_empty() {
        return Vec::new();
    }

    let same_primary: Vec<_> = voices
        .iter()
        .filter(|v| primary_subtag(&v.voice.lang) == primary)
        .collect();
    if !same_primary.is_empty() {
        return same_primary;
    }

    voices
        .iter()
        .filter(|v| v.voice.lang.to_ascii_lowercase().starts_with(&primary))
        .collect()
}

fn pick_in_language<'a>(
    candidates: &[&'a AnnotatedVoice],
    gender: Option<Gender>,
) -> Option<&'a AnnotatedVoice> {
    if let Some(gender) = gender {
        if let Some(found) = candidates.iter().find(|v| v.gender == gender) {
            return Some(found);
        }
    }

    candidates
        .iter()
        .find(|v| v.voice.default)
        .or_else(|| candidates.iter().find(|v| v.voice.local_service))
        .or_else(|| candidates.first())
        .copied()
}
