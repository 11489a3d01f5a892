use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::error::{IndexError, Result};

/// Separator between the start and end timestamps of a timing line
pub const TIMING_DELIMITER: &str = "-->";

const BYTE_ORDER_MARK: char = '\u{feff}';

/// Line terminators other than `\n`: lone CR, vertical tab, form feed,
/// file/group/record separators, NEL, and the Unicode line/paragraph separators
const LINE_BREAKS: [char; 9] = [
    '\r', '\u{0b}', '\u{0c}', '\u{1c}', '\u{1d}', '\u{1e}', '\u{85}', '\u{2028}', '\u{2029}',
];

/// One timed caption entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    /// Spoken text, lines joined with single spaces
    pub text: String,
}

impl Cue {
    /// Create a new cue
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into().trim().to_string(),
        }
    }

    /// Duration in seconds (negative for malformed ranges)
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

impl fmt::Display for Cue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}\n{}\n",
            format_timestamp(self.start),
            TIMING_DELIMITER,
            format_timestamp(self.end),
            self.text.replace(TIMING_DELIMITER, "→")
        )
    }
}

/// A caption block that could not be turned into a cue.
///
/// Never leaves [`parse`]: the block is dropped and scanning resumes.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MalformedCue {
    #[error("timing line does not hold exactly two timestamps: {0:?}")]
    Timing(String),

    #[error("timestamp is not HH:MM:SS.mmm: {0:?}")]
    Timestamp(String),
}

/// Parse a WebVTT-style document into cues, in source order.
///
/// Lenient: blocks with unparseable timing lines are skipped together with
/// their text lines. Header, identifier and blank lines are ignored.
pub fn parse(raw: &str) -> Vec<Cue> {
    let lines: Vec<&str> = split_lines(raw)
        .map(|line| line.trim_matches(|c: char| c == BYTE_ORDER_MARK || c.is_whitespace()))
        .collect();

    let mut cues = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        i += 1;

        if !line.contains(TIMING_DELIMITER) {
            continue;
        }

        // Text lines belong to this block whether or not the timing parses
        let text_start = i;
        while i < lines.len() && !lines[i].is_empty() {
            i += 1;
        }

        match parse_timing_line(line) {
            Ok((start, end)) => cues.push(Cue::new(start, end, lines[text_start..i].join(" "))),
            Err(e) => debug!("Skipping caption block at line {}: {}", text_start, e),
        }
    }

    cues
}

/// Split on `\n`, `\r\n` and every other line terminator in [`LINE_BREAKS`]
fn split_lines(raw: &str) -> impl Iterator<Item = &str> {
    raw.split('\n')
        .flat_map(|line| line.strip_suffix('\r').unwrap_or(line).split(LINE_BREAKS))
}

fn parse_timing_line(line: &str) -> std::result::Result<(f64, f64), MalformedCue> {
    let mut parts = line.split(TIMING_DELIMITER);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(start), Some(end), None) => {
            Ok((parse_timestamp(start.trim())?, parse_timestamp(end.trim())?))
        }
        _ => Err(MalformedCue::Timing(line.to_string())),
    }
}

/// Parse a single `HH:MM:SS.mmm` timestamp to seconds
pub fn parse_timestamp(token: &str) -> std::result::Result<f64, MalformedCue> {
    let malformed = || MalformedCue::Timestamp(token.to_string());

    let fields: Vec<&str> = token.split(':').collect();
    let [hours, minutes, rest] = fields.as_slice() else {
        return Err(malformed());
    };
    let (seconds, millis) = rest.split_once('.').ok_or_else(malformed)?;
    if millis.contains('.') {
        return Err(malformed());
    }

    let field = |s: &str| s.parse::<u32>().map(u64::from).map_err(|_| malformed());
    let whole = field(*hours)? * 3600 + field(*minutes)? * 60 + field(seconds)?;

    Ok(whole as f64 + field(millis)? as f64 / 1000.0)
}

/// Format seconds as a caption timestamp (HH:MM:SS.mmm)
pub fn format_timestamp(seconds: f64) -> String {
    let total_millis = (seconds.max(0.0) * 1000.0).round() as u64;
    let total_seconds = total_millis / 1000;

    format!(
        "{:02}:{:02}:{:02}.{:03}",
        total_seconds / 3600,
        (total_seconds % 3600) / 60,
        total_seconds % 60,
        total_millis % 1000
    )
}

/// Renders cues as a WebVTT document
#[derive(Debug, Clone, Default)]
pub struct VttGenerator {
    entries: Vec<Cue>,
}

impl VttGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entry(&mut self, entry: Cue) {
        self.entries.push(entry);
    }

    pub fn add_entries(&mut self, entries: impl IntoIterator<Item = Cue>) {
        self.entries.extend(entries);
    }

    /// Sort entries by start time
    pub fn sort_entries(&mut self) {
        self.entries.sort_by(|a, b| a.start.total_cmp(&b.start));
    }

    /// Generate the document, header included
    pub fn generate(&self) -> String {
        let mut content = String::from("WEBVTT\n\n");

        for entry in &self.entries {
            content.push_str(&entry.to_string());
            content.push('\n');
        }

        content
    }

    /// Write the document to `path`
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        tokio::fs::write(path, self.generate())
            .await
            .map_err(|e| IndexError::storage(path, e))
    }

    /// Latest end time across all entries
    pub fn total_duration(&self) -> f64 {
        self.entries.iter().map(|e| e.end).fold(0.0, f64::max)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Cue] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_two_cues() {
        let raw = concat!(
            "00:00:01.000 --> 00:00:02.500\nHello, world!\n\n",
            "00:00:05.250 --> 00:00:06.000\nHello again.\n",
        );
        let cues = parse(raw);

        assert_eq!(
            cues,
            vec![
                Cue::new(1.0, 2.5, "Hello, world!"),
                Cue::new(5.25, 6.0, "Hello again."),
            ]
        );
    }

    #[test]
    fn test_parse_skips_header_identifiers_and_bom() {
        let raw = concat!(
            "\u{feff}WEBVTT\r\n\r\n1\r\n",
            "00:01:00.000 --> 00:01:02.000\r\n  first line \r\nsecond line\r\n\r\n",
            "intro\r\n01:00:00.001 --> 01:00:03.000\r\nlate\r\n",
        );
        let cues = parse(raw);

        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0], Cue::new(60.0, 62.0, "first line second line"));
        assert!((cues[1].start - 3600.001).abs() < 1e-9);
        assert_eq!(cues[1].text, "late");
    }

    #[test]
    fn test_parse_classic_mac_line_endings() {
        let raw = concat!(
            "WEBVTT\r\r",
            "00:00:01.000 --> 00:00:02.000\rfirst\rline\r\r",
            "00:00:03.000 --> 00:00:04.000\rnext\r",
        );
        let cues = parse(raw);

        assert_eq!(
            cues,
            vec![Cue::new(1.0, 2.0, "first line"), Cue::new(3.0, 4.0, "next")]
        );
    }

    #[test]
    fn test_parse_unicode_line_separators() {
        let raw = concat!(
            "00:00:01.000 --> 00:00:02.000\u{2028}hello\u{2029}\u{2029}",
            "00:00:03.000 --> 00:00:04.000\u{85}bye",
        );
        let cues = parse(raw);

        assert_eq!(cues, vec![Cue::new(1.0, 2.0, "hello"), Cue::new(3.0, 4.0, "bye")]);
    }

    #[test]
    fn test_parse_drops_malformed_block_and_continues() {
        let raw = concat!(
            "00:00:aa.000 --> 00:00:02.000\nbroken text\nmore broken\n\n",
            "00:00:03.000 --> 00:00:04.000\nkept\n",
        );
        let cues = parse(raw);

        assert_eq!(cues, vec![Cue::new(3.0, 4.0, "kept")]);
    }

    #[test]
    fn test_parse_rejects_extra_delimiter() {
        let raw = "00:00:01.000 --> 00:00:02.000 --> 00:00:03.000\ntext\n";
        assert!(parse(raw).is_empty());
    }

    #[test]
    fn test_parse_keeps_inverted_range() {
        let cues = parse("00:00:09.000 --> 00:00:01.000\nbackwards\n");
        assert_eq!(cues.len(), 1);
        assert!(cues[0].duration() < 0.0);
    }

    #[test]
    fn test_cue_without_text() {
        let cues = parse("00:00:01.000 --> 00:00:02.000\n\n00:00:03.000 --> 00:00:04.000");
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].text, "");
        assert_eq!(cues[1].text, "");
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("01:01:01.500"), Ok(3661.5));
        assert_eq!(parse_timestamp("00:00:00.000"), Ok(0.0));
        assert!(parse_timestamp("00:01.500").is_err());
        assert!(parse_timestamp("00:00:01,500").is_err());
        assert!(parse_timestamp("00:00:01.5.0").is_err());
        assert!(parse_timestamp("00:00:01.000 align:start").is_err());
        assert!(parse_timestamp("-1:00:01.000").is_err());
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(3661.0), "01:01:01.000");
        assert_eq!(format_timestamp(1.5), "00:00:01.500");
        assert_eq!(format_timestamp(0.9996), "00:00:01.000");
        assert_eq!(format_timestamp(-3.0), "00:00:00.000");
    }

    #[test]
    fn test_generator_output_parses_back() {
        let mut generator = VttGenerator::new();
        generator.add_entry(Cue::new(5.0, 7.0, "second"));
        generator.add_entry(Cue::new(0.5, 2.0, "first --> arrow"));
        generator.sort_entries();

        let content = generator.generate();
        assert!(content.starts_with("WEBVTT\n\n"));
        assert_eq!(generator.total_duration(), 7.0);

        let cues = parse(&content);
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].text, "first → arrow");
        assert_eq!(cues[1], Cue::new(5.0, 7.0, "second"));
    }
}
