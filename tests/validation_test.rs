use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use vocal_score_engine::phonemizer::{
    OtoTableSinger, Phonemizer, PhonemizerError, PhonemizerNote, PhonemizerPhoneme, Singer,
};
use vocal_score_engine::*;

/// Emits scripted phonemes for every run and records what it was asked
struct ScriptedPhonemizer {
    calls: Arc<AtomicUsize>,
    run_sizes: Arc<Mutex<Vec<usize>>>,
    output: Vec<(&'static str, i32)>,
    fail: bool,
}

impl ScriptedPhonemizer {
    fn new(output: Vec<(&'static str, i32)>) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            run_sizes: Arc::new(Mutex::new(Vec::new())),
            output,
            fail: false,
        }
    }
}

impl Phonemizer for ScriptedPhonemizer {
    fn name(&self) -> &str {
        "scripted"
    }

    fn set_singer(&mut self, _singer: Option<Arc<dyn Singer>>) {}

    fn process(
        &mut self,
        notes: &[PhonemizerNote],
        _prev: Option<&PhonemizerNote>,
        _next: Option<&PhonemizerNote>,
    ) -> Result<Vec<PhonemizerPhoneme>, PhonemizerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.run_sizes.lock().unwrap().push(notes.len());
        if self.fail {
            return Err(PhonemizerError::Failed {
                name: "scripted".to_string(),
                message: "no dictionary".to_string(),
            });
        }
        Ok(self
            .output
            .iter()
            .map(|(alias, position)| PhonemizerPhoneme::new(alias, *position))
            .collect())
    }
}

fn singer() -> Arc<dyn Singer> {
    Arc::new(
        OtoTableSinger::new("test")
            .with_sample("s", 40.0, 10.0)
            .with_sample("a", 60.0, 20.0)
            .with_sample("k", 30.0, 10.0),
    )
}

fn document_with(phonemizer: ScriptedPhonemizer, notes: Vec<Note>) -> (Document, PartId) {
    let mut doc = Document::default();
    let mut track = Track::new("Lead");
    track.replace_singer(Some(singer()));
    let part = VoicePart::new(0, 0, 3840);
    let part_id = part.id;
    doc.execute_group(vec![
        Command::add_track(0, track),
        Command::ChangePhonemizer {
            index: 0,
            phonemizer: Box::new(phonemizer),
        },
        Command::add_part(Part::Voice(part)),
        Command::add_notes(part_id, notes),
    ])
    .unwrap();
    (doc, part_id)
}

#[test]
fn test_extender_chain_points_at_head() {
    let phonemizer = ScriptedPhonemizer::new(vec![("a", 0)]);
    let notes = vec![
        Note::new(60, 0, 480, "a"),
        Note::new(62, 480, 240, "+"),
        Note::new(64, 720, 240, "+"),
        Note::new(60, 960, 480, "a"),
    ];
    let (doc, part) = document_with(phonemizer, notes);
    let voice = doc.project().voice_part(part).unwrap();

    assert_eq!(voice.notes[1].extends, Some(0));
    assert_eq!(voice.notes[2].extends, Some(0));
    // Abuts the chain but has its own lyric, so it starts a new run
    assert_eq!(voice.notes[3].extends, None);
    assert_eq!(voice.notes[0].extended_duration, 960);
    assert!(voice.notes[1].phonemes.is_empty());
    assert!(voice.notes[2].phonemes.is_empty());
}

#[test]
fn test_phonemizer_called_once_per_run() {
    let phonemizer = ScriptedPhonemizer::new(vec![("a", 0)]);
    let calls = phonemizer.calls.clone();
    let run_sizes = phonemizer.run_sizes.clone();
    let notes = vec![Note::new(60, 0, 480, "a"), Note::new(62, 480, 480, "+")];
    let (_doc, _) = document_with(phonemizer, notes);

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(*run_sizes.lock().unwrap(), vec![2]);
}

#[test]
fn test_reused_phonemizer_output_on_expression_edit() {
    let phonemizer = ScriptedPhonemizer::new(vec![("a", 0)]);
    let calls = phonemizer.calls.clone();
    let notes = vec![Note::new(60, 0, 480, "a"), Note::new(62, 960, 480, "a")];
    let (mut doc, part) = document_with(phonemizer, notes);
    let before = calls.load(Ordering::SeqCst);
    let ids: Vec<NoteId> = doc.project().voice_part(part).unwrap().notes.iter().map(|n| n.id).collect();

    doc.execute_group(vec![Command::set_note_expression(
        part,
        ids.clone(),
        abbr::VOL,
        vec![Some(10.0), Some(20.0)],
    )])
    .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), before);

    // Moving a note changes the request, so the cache misses
    doc.execute_group(vec![Command::move_notes(part, vec![ids[1]], 0, 1)])
        .unwrap();
    assert!(calls.load(Ordering::SeqCst) > before);
}

#[test]
fn test_crowded_phonemes_are_pushed_apart() {
    // All three phonemes land on the same tick
    let phonemizer = ScriptedPhonemizer::new(vec![("s", 0), ("k", 0), ("a", 0)]);
    let notes = vec![Note::new(60, 480, 480, "sa")];
    let (doc, part) = document_with(phonemizer, notes);
    let voice = doc.project().voice_part(part).unwrap();
    let ticks: Vec<i32> = voice.phonemes.iter().map(|p| voice.phoneme_tick(p)).collect();

    assert_eq!(ticks.len(), 3);
    for pair in ticks.windows(2) {
        assert!(pair[1] - pair[0] >= 10, "ticks {:?}", ticks);
    }
    assert!(ticks.iter().all(|&t| t <= 480 + 480 - 10));
}

#[test]
fn test_phonemes_monotonic_across_notes() {
    let phonemizer = ScriptedPhonemizer::new(vec![("s", -60), ("a", 0)]);
    let notes = vec![
        Note::new(60, 0, 240, "sa"),
        Note::new(62, 240, 240, "sa"),
        Note::new(64, 480, 480, "sa"),
    ];
    let (doc, part) = document_with(phonemizer, notes);
    let voice = doc.project().voice_part(part).unwrap();
    let ticks: Vec<i32> = voice.phonemes.iter().map(|p| voice.phoneme_tick(p)).collect();

    assert_eq!(ticks.len(), 6);
    assert!(ticks.windows(2).all(|w| w[0] < w[1]), "ticks {:?}", ticks);
    for (i, phoneme) in voice.phonemes.iter().enumerate() {
        assert_eq!(phoneme.prev, i.checked_sub(1));
        assert!(phoneme.duration > 0);
    }
}

#[test]
fn test_phonemizer_failure_marks_error_phoneme() {
    let mut phonemizer = ScriptedPhonemizer::new(Vec::new());
    phonemizer.fail = true;
    let notes = vec![Note::new(60, 0, 480, "a")];
    let (doc, part) = document_with(phonemizer, notes);
    let voice = doc.project().voice_part(part).unwrap();

    assert_eq!(voice.phonemes.len(), 1);
    assert_eq!(voice.phonemes[0].phoneme, "error");
    assert!(voice.phonemes[0].error);
    assert!(voice.notes[0].error);
}

#[test]
fn test_overlapping_note_is_flagged_and_skipped() {
    let phonemizer = ScriptedPhonemizer::new(vec![("a", 0)]);
    let calls = phonemizer.calls.clone();
    let notes = vec![Note::new(60, 0, 480, "a"), Note::new(62, 240, 480, "a")];
    let (doc, part) = document_with(phonemizer, notes);
    let voice = doc.project().voice_part(part).unwrap();

    assert!(voice.notes[1].overlap_error);
    assert!(voice.notes[1].error);
    assert_eq!(voice.phonemes.len(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_part_grows_to_fit_notes() {
    let phonemizer = ScriptedPhonemizer::new(vec![("a", 0)]);
    let notes = vec![Note::new(60, 3600, 960, "a")];
    let (doc, part) = document_with(phonemizer, notes);
    let voice = doc.project().voice_part(part).unwrap();
    assert!(voice.duration >= 4560);
}
