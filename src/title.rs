//! Track title cleanup.
//!
//! Raw titles come from file names produced by yt-dlp, e.g.
//! `03-Some Artist - Song Name (Official Video)`. Cleanup keeps the track
//! prefix, drops a leading artist name and removes bracketed annotations
//! such as `[4K]` or `(Lyrics)`.

use crate::error::{Error, Result};
use regex::Regex;

/// Annotation keywords stripped from titles when no configuration overrides them.
pub const DEFAULT_KEYWORDS: [&str; 7] = [
    "official",
    "video",
    "lyrics",
    "4k",
    "hd",
    "hq",
    "visualizer",
];

/// Cleans raw track titles into display and tag titles.
#[derive(Debug, Clone)]
pub struct TitleCleaner {
    annotations: Option<Regex>,
    replacements: Vec<String>,
}

impl Default for TitleCleaner {
    fn default() -> Self {
        // The default keywords are plain words, escaping keeps the pattern valid.
        Self::new(&DEFAULT_KEYWORDS).unwrap_or(Self {
            annotations: None,
            replacements: Vec::new(),
        })
    }
}

impl TitleCleaner {
    /// Creates a cleaner stripping bracketed segments containing any of `keywords`.
    ///
    /// An empty keyword list disables annotation stripping.
    pub fn new<S: AsRef<str>>(keywords: &[S]) -> Result<Self> {
        let alternatives = keywords
            .iter()
            .map(|keyword| keyword.as_ref().trim())
            .filter(|keyword| !keyword.is_empty())
            .map(regex::escape)
            .collect::<Vec<_>>();

        let annotations = if alternatives.is_empty() {
            None
        } else {
            let pattern = format!(
                r"(?i)\s*[\(\[][^\(\)\[\]]*?(?:{})[^\(\)\[\]]*?[\)\]]",
                alternatives.join("|")
            );
            let regex = Regex::new(&pattern)
                .map_err(|e| Error::Config(format!("invalid title keyword pattern: {e}")))?;
            Some(regex)
        };

        Ok(Self {
            annotations,
            replacements: Vec::new(),
        })
    }

    /// Sets user-authored titles, indexed by track position (0-based).
    ///
    /// Blank entries fall back to regular cleanup.
    pub fn with_replacements(mut self, titles: Vec<String>) -> Self {
        self.replacements = titles;
        self
    }

    pub fn replacements(&self) -> &[String] {
        &self.replacements
    }

    /// Produces the display/tag title for `raw`.
    ///
    /// A replacement at `index` is returned verbatim. Otherwise a leading
    /// `NN-` prefix is kept aside, the artist name and annotation segments
    /// are stripped, and the prefix is put back.
    pub fn clean(&self, raw: &str, artist: &str, index: Option<usize>) -> String {
        if let Some(replacement) = index
            .and_then(|i| self.replacements.get(i))
            .filter(|replacement| !replacement.trim().is_empty())
        {
            return replacement.clone();
        }

        let (prefix, mut title) = match split_track_prefix(raw) {
            Some((digits, rest)) if digits.len() == 2 => (&raw[..digits.len() + 1], rest),
            _ => ("", raw),
        };

        let artist = artist.trim();
        if !artist.is_empty() {
            if let Some(rest) = strip_prefix_ignore_case(title, artist) {
                title = rest.trim_start_matches(|c: char| c.is_whitespace() || c == '-' || c == ':');
            }
        }

        let title = match &self.annotations {
            Some(regex) => regex.replace_all(title, "").into_owned(),
            None => title.to_string(),
        };

        format!("{}{}", prefix, title).trim().to_string()
    }
}

/// Splits a leading `digits-` prefix into `(digits, rest)`.
pub(crate) fn split_track_prefix(name: &str) -> Option<(&str, &str)> {
    let digits_end = name
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(name.len());

    if digits_end == 0 {
        return None;
    }

    name[digits_end..]
        .strip_prefix('-')
        .map(|rest| (&name[..digits_end], rest))
}

/// Pads a single-digit `N-` prefix to `0N-`; other names are returned as-is.
pub(crate) fn pad_track_prefix(name: &str) -> String {
    match split_track_prefix(name) {
        Some((digits, rest)) if digits.len() == 1 => format!("0{}-{}", digits, rest),
        _ => name.to_string(),
    }
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let mut text_chars = text.char_indices();
    for expected in prefix.chars() {
        let (_, actual) = text_chars.next()?;
        if !actual.to_lowercase().eq(expected.to_lowercase()) {
            return None;
        }
    }

    match text_chars.next() {
        Some((offset, _)) => Some(&text[offset..]),
        None => Some(""),
    }
}
