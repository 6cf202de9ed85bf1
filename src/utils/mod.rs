//! Utility modules for the score engine
//!
//! Music math helpers and tick/millisecond conversion.

pub mod music_math;
pub mod time_axis;

// Re-export commonly used types
pub use music_math::*;
pub use time_axis::TimeAxis;
