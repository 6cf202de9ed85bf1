use super::{Phonemizer, PhonemizerError, PhonemizerNote, PhonemizerPhoneme, Singer};
use std::sync::Arc;

/// Sings each lyric (or its phonetic hint) as a single phoneme at the note start.
///
/// Phonetic hints are split on whitespace; extra hint phonemes are spread
/// evenly across the note.
#[derive(Default)]
pub struct DefaultPhonemizer {
    singer: Option<Arc<dyn Singer>>,
}

impl DefaultPhonemizer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Phonemizer for DefaultPhonemizer {
    fn name(&self) -> &str {
        "default"
    }

    fn set_singer(&mut self, singer: Option<Arc<dyn Singer>>) {
        self.singer = singer;
    }

    fn process(
        &mut self,
        notes: &[PhonemizerNote],
        _prev: Option<&PhonemizerNote>,
        _next: Option<&PhonemizerNote>,
    ) -> Result<Vec<PhonemizerPhoneme>, PhonemizerError> {
        let first = notes
            .first()
            .ok_or_else(|| PhonemizerError::EmptyRun(self.name().to_string()))?;
        let aliases: Vec<&str> = match &first.phonetic_hint {
            Some(hint) => hint.split_whitespace().collect(),
            None if first.lyric.is_empty() => Vec::new(),
            None => vec![first.lyric.as_str()],
        };
        let count = aliases.len().max(1) as i32;
        let step = (first.duration / count).max(1);
        Ok(aliases
            .into_iter()
            .enumerate()
            .map(|(i, alias)| PhonemizerPhoneme::new(alias, i as i32 * step))
            .collect())
    }
}
