use crate::error::{Error, Result};
use crate::paths::replace_separators;
use crate::title::{TitleCleaner, pad_track_prefix, split_track_prefix};
use lofty::{
    config::{ParseOptions, WriteOptions},
    file::{AudioFile, TaggedFileExt},
    picture::{MimeType, Picture, PictureType},
    probe::Probe,
    tag::{Accessor, ItemKey, Tag},
};
use log::{debug, error, info, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// Album-wide tag values; empty fields are left untouched in the files.
#[derive(Debug, Clone, Default)]
pub struct AlbumTags {
    pub artist: Option<String>,
    pub album: Option<String>,
    pub year: Option<String>,
    /// Front cover image bytes.
    pub cover: Option<Vec<u8>>,
}

/// What happened to one track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedTrack {
    pub path: PathBuf,
    pub track_number: Option<u32>,
    pub title: String,
    /// `false` when the rename was skipped because the target already existed.
    pub renamed: bool,
}

/// Result of tagging a folder.
#[derive(Debug, Clone, Default)]
pub struct TagReport {
    pub tagged: Vec<TaggedTrack>,
    /// Files that could not be tagged, with the reason.
    pub failed: Vec<(PathBuf, String)>,
}

fn detect_image_mime_type(bytes: &[u8]) -> MimeType {
    if bytes.len() < 4 {
        return MimeType::Jpeg;
    }

    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return MimeType::Jpeg;
    }

    if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return MimeType::Png;
    }

    MimeType::Jpeg
}

/// Lists the `.mp3` files directly inside `folder`, sorted by name.
pub fn audio_files(folder: &Path) -> Result<Vec<PathBuf>> {
    let mut files = fs::read_dir(folder)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("mp3"))
        })
        .collect::<Vec<_>>();
    files.sort();
    Ok(files)
}

/// The final file stem and track number for a raw file stem.
///
/// A leading `N-` is treated as the 1-based track index: it selects the
/// replacement title at `N - 1`, is padded to two digits, and is put back
/// in front of the clean title if cleanup dropped it.
pub fn track_name(stem: &str, artist: &str, cleaner: &TitleCleaner) -> (String, Option<u32>) {
    let padded = pad_track_prefix(stem);
    let prefix = split_track_prefix(&padded).map(|(digits, _)| digits.to_string());
    let track_number = prefix.as_deref().and_then(|digits| digits.parse::<u32>().ok());
    let index = track_number
        .and_then(|n| n.checked_sub(1))
        .map(|n| n as usize);

    let mut name = cleaner.clean(&padded, artist, index);
    if let Some(prefix) = &prefix {
        if split_track_prefix(&name).is_none() {
            name = format!("{}-{}", prefix, name);
        }
    }

    (pad_track_prefix(&name), track_number)
}

/// Tags and renames every MP3 in `folder`.
///
/// Failures are per file: they are logged, recorded in the report and the
/// remaining files are still processed.
pub fn tag_album(folder: &Path, tags: &AlbumTags, cleaner: &TitleCleaner) -> Result<TagReport> {
    let files = audio_files(folder)?;
    info!("Tagging {} file(s) in {}", files.len(), folder.display());

    let mut report = TagReport::default();
    for path in files {
        match tag_track(&path, tags, cleaner) {
            Ok(track) => report.tagged.push(track),
            Err(e) => {
                error!("Tag error for {}: {}", path.display(), e);
                report.failed.push((path, e.to_string()));
            }
        }
    }

    Ok(report)
}

/// Tags a single track and renames it to `NN-Title.mp3`.
pub fn tag_track(path: &Path, tags: &AlbumTags, cleaner: &TitleCleaner) -> Result<TaggedTrack> {
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| Error::Path(format!("{} has no usable file name", path.display())))?;
    let artist = tags.artist.as_deref().unwrap_or("").trim();

    let (clean_name, track_number) = track_name(stem, artist, cleaner);
    let title = match split_track_prefix(&clean_name) {
        Some((_, rest)) => rest.to_string(),
        None => clean_name.clone(),
    };

    write_tags(path, tags, track_number, &title)?;

    let target = path.with_file_name(format!("{}.mp3", replace_separators(&clean_name)));
    let renamed = if target == path {
        false
    } else if target.exists() {
        warn!(
            "Not renaming {}: {} already exists",
            path.display(),
            target.display()
        );
        false
    } else {
        fs::rename(path, &target)?;
        true
    };

    debug!("Tagged {} as {:?}", path.display(), title);
    Ok(TaggedTrack {
        path: if renamed { target } else { path.to_path_buf() },
        track_number,
        title,
        renamed,
    })
}

fn write_tags(path: &Path, tags: &AlbumTags, track_number: Option<u32>, title: &str) -> Result<()> {
    let mut tagged_file = Probe::open(path)?
        .options(ParseOptions::new().read_properties(false))
        .read()?;

    if tagged_file.primary_tag().is_none() {
        let tag_type = tagged_file.primary_tag_type();
        debug!("No tags found, creating a new tag of type `{tag_type:?}`");
        tagged_file.insert_tag(Tag::new(tag_type));
    }
    let tag = tagged_file
        .primary_tag_mut()
        .ok_or_else(|| Error::Command(format!("cannot create a tag for {}", path.display())))?;

    if let Some(artist) = non_empty(&tags.artist) {
        tag.set_artist(artist.to_string());
    }
    if let Some(album) = non_empty(&tags.album) {
        tag.set_album(album.to_string());
    }
    if let Some(year) = non_empty(&tags.year) {
        tag.insert_text(ItemKey::RecordingDate, year.to_string());
    }
    if let Some(number) = track_number {
        tag.set_track(number);
    }
    tag.set_title(title.to_string());

    if let Some(cover) = &tags.cover {
        let mime_type = detect_image_mime_type(cover);
        let front_cover = Picture::new_unchecked(
            PictureType::CoverFront,
            Some(mime_type),
            Some("Cover".to_string()),
            cover.clone(),
        );
        tag.remove_picture_type(PictureType::CoverFront);
        tag.push_picture(front_cover);
    }

    let write_options = WriteOptions::new()
        .use_id3v23(true)
        .remove_others(false)
        .respect_read_only(false);

    tagged_file.save_to_path(path, write_options)?;
    Ok(())
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
