//! Score data model
//!
//! Persisted entities (project, track, part, note, expression, pitch) and
//! the derived phoneme data the validation pipeline rebuilds on every pass.

pub mod expression;
pub mod note;
pub mod part;
pub mod phoneme;
pub mod pitch;
pub mod project;
pub mod serde_helpers;
pub mod track;

// Re-export commonly used types
pub use expression::{abbr, Expression, ExpressionDescriptor, ExpressionType};
pub use note::{Note, NoteId};
pub use part::{Part, PartId, VoicePart, WavePart};
pub use phoneme::{Envelope, EnvelopePoint, Phoneme, PhonemeOverride, SampleDescriptor};
pub use pitch::{Pitch, PitchPoint, PitchPointShape, Vibrato};
pub use project::Project;
pub use track::Track;
