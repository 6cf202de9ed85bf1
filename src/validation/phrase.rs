//! Render phrases: maximal runs of notes without a rest between them

use crate::models::part::VoicePart;
use crate::phonemizer::PhraseRequest;
use std::ops::Range;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderPhrase {
    /// Part-relative tick where sound starts, including a leading consonant
    pub position: i32,
    /// Part-relative tick of the last note end
    pub end: i32,
    pub notes: Range<usize>,
    pub phonemes: Range<usize>,
}

impl RenderPhrase {
    pub fn duration(&self) -> i32 {
        self.end - self.position
    }

    /// Whether a part-relative tick falls inside the phrase
    pub fn contains(&self, tick: i32) -> bool {
        self.position <= tick && tick < self.end
    }

    pub fn request(&self, part: &VoicePart) -> PhraseRequest {
        PhraseRequest {
            position: self.position,
            end: self.end,
            tones: part.notes[self.notes.clone()].iter().map(|n| n.tone).collect(),
            phonemes: part.phonemes[self.phonemes.clone()]
                .iter()
                .map(|p| {
                    if p.phoneme_mapped.is_empty() {
                        p.phoneme.clone()
                    } else {
                        p.phoneme_mapped.clone()
                    }
                })
                .collect(),
        }
    }
}

/// Split a validated part into render phrases
pub fn render_phrases(part: &VoicePart) -> Vec<RenderPhrase> {
    let mut phrases: Vec<RenderPhrase> = Vec::new();
    let mut start = 0;
    for i in 0..part.notes.len() {
        let last = i + 1 == part.notes.len();
        if !last && part.notes[i + 1].position <= part.notes[i].end() {
            continue;
        }
        let notes = &part.notes[start..=i];
        let phonemes = notes[0].phonemes.start..notes[notes.len() - 1].phonemes.end;
        let lead = part
            .phonemes
            .get(phonemes.clone())
            .and_then(|ps| ps.first())
            .map_or(notes[0].position, |p| part.phoneme_tick(p));
        phrases.push(RenderPhrase {
            position: lead.min(notes[0].position),
            end: notes.iter().map(|n| n.end()).max().unwrap_or(notes[0].end()),
            notes: start..i + 1,
            phonemes,
        });
        start = i + 1;
    }
    phrases
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::note::Note;
    use crate::models::phoneme::Phoneme;

    fn part() -> VoicePart {
        let mut part = VoicePart::new(0, 0, 3840);
        part.insert_note(Note::new(60, 0, 480, "ka"));
        part.insert_note(Note::new(62, 480, 480, "a"));
        part.insert_note(Note::new(64, 1440, 480, "sa"));
        part
    }

    #[test]
    fn test_rest_splits_phrases() {
        let phrases = render_phrases(&part());
        assert_eq!(phrases.len(), 2);
        assert_eq!(phrases[0].notes, 0..2);
        assert_eq!(phrases[0].end, 960);
        assert_eq!(phrases[1].notes, 2..3);
        assert_eq!(phrases[1].position, 1440);
    }

    #[test]
    fn test_leading_consonant_extends_phrase() {
        let mut part = part();
        part.phonemes = vec![
            Phoneme::new(0, 0, 0, 0, "ka".to_string()),
            Phoneme::new(1, 0, 0, 0, "a".to_string()),
            Phoneme::new(2, 0, 0, -60, "s".to_string()),
            Phoneme::new(2, 1, 1, 0, "a".to_string()),
        ];
        part.notes[0].phonemes = 0..1;
        part.notes[1].phonemes = 1..2;
        part.notes[2].phonemes = 2..4;
        let phrases = render_phrases(&part);
        assert_eq!(phrases[1].position, 1380);
        assert_eq!(phrases[1].phonemes, 2..4);
        let request = phrases[1].request(&part);
        assert_eq!(request.tones, vec![64]);
        assert_eq!(request.phonemes, vec!["s".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_empty_part_has_no_phrases() {
        assert!(render_phrases(&VoicePart::new(0, 0, 480)).is_empty());
    }
}
