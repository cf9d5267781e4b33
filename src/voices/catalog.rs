//! Annotated voice catalog, rebuilt wholesale from the host voice list.

use super::{primary_subtag, AnnotatedVoice, Voice, VoiceClassifier};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default)]
pub struct VoiceCatalog {
    voices: Vec<AnnotatedVoice>,
}

impl VoiceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Annotate every host voice, preserving order.
    pub fn rebuild(voices: &[Voice], classifier: &dyn VoiceClassifier) -> Self {
        let voices = voices
            .iter()
            .map(|voice| AnnotatedVoice {
                gender: classifier.gender(voice),
                provider: classifier.provider(voice),
                quality: classifier.quality(voice),
                voice: voice.clone(),
            })
            .collect();
        Self { voices }
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnnotatedVoice> {
        self.voices.iter()
    }

    pub fn as_slice(&self) -> &[AnnotatedVoice] {
        &self.voices
    }

    pub fn find_by_name(&self, name: &str) -> Option<&AnnotatedVoice> {
        let name = name.to_lowercase();
        self.voices
            .iter()
            .find(|v| v.voice.name.to_lowercase() == name)
    }

    /// Voices whose language shares the primary subtag of `lang`.
    pub fn voices_for_language(&self, lang: &str) -> Vec<&AnnotatedVoice> {
        let primary = primary_subtag(lang);
        self.voices
            .iter()
            .filter(|v| primary_subtag(&v.voice.lang) == primary)
            .collect()
    }

    /// Sorted, de-duplicated language tags present in the catalog.
    pub fn languages(&self) -> Vec<String> {
        self.voices
            .iter()
            .map(|v| v.voice.lang.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}
