//! Serde helpers for the persisted project layout

use super::part::{Part, VoicePart, WavePart};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Persist parts as separate voice and wave collections, ordered by (track, position)
pub mod split_parts {
    use super::*;

    #[derive(Serialize)]
    struct SplitRef<'a> {
        voice_parts: Vec<&'a VoicePart>,
        wave_parts: Vec<&'a WavePart>,
    }

    #[derive(Deserialize)]
    struct Split {
        #[serde(default)]
        voice_parts: Vec<VoicePart>,
        #[serde(default)]
        wave_parts: Vec<WavePart>,
    }

    #[allow(clippy::ptr_arg)]
    pub fn serialize<S>(parts: &Vec<Part>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut split = SplitRef {
            voice_parts: Vec::new(),
            wave_parts: Vec::new(),
        };
        let mut ordered: Vec<&Part> = parts.iter().collect();
        ordered.sort_by_key(|p| (p.track_no(), p.position()));
        for part in ordered {
            match part {
                Part::Voice(p) => split.voice_parts.push(p),
                Part::Wave(p) => split.wave_parts.push(p),
            }
        }
        split.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Part>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let split = Split::deserialize(deserializer)?;
        Ok(split
            .voice_parts
            .into_iter()
            .map(Part::Voice)
            .chain(split.wave_parts.into_iter().map(Part::Wave))
            .collect())
    }
}
