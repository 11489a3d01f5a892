//! Caption handling: WebVTT cue parsing/writing and word normalization
pub mod vtt;
pub mod tokenize;

pub use tokenize::{normalize, tokens};
pub use vtt::{format_timestamp, parse, parse_timestamp, Cue, MalformedCue, VttGenerator};
