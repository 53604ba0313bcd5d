//! Download file names for rendered output.

use std::path::Path;
use transposer_core::Semitones;

/// Stem used when the source has no usable name.
pub const DEFAULT_STEM: &str = "pitch-shifted";

/// `<stem>-pitch-<plus|minus><n>.<ext>`
///
/// The stem is the source file name without its last extension. Only the
/// final path component is used.
///
/// ```
/// use transposer::{output_file_name, Semitones};
///
/// let up = Semitones::new(3).unwrap();
/// assert_eq!(output_file_name(Some("song.mp3"), up, "wav"), "song-pitch-plus3.wav");
/// ```
pub fn output_file_name(source_name: Option<&str>, semitones: Semitones, extension: &str) -> String {
    let stem = source_name
        .and_then(|name| Path::new(name).file_name())
        .and_then(|name| name.to_str())
        .map(strip_extension)
        .filter(|stem| !stem.is_empty())
        .unwrap_or(DEFAULT_STEM);

    let value = semitones.value();
    let direction = if value > 0 { "plus" } else { "minus" };
    format!("{}-pitch-{}{}.{}", stem, direction, value.unsigned_abs(), extension)
}

fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(dot) => &name[..dot],
        None => name,
    }
}
