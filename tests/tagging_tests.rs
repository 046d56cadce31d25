mod common;

use lofty::file::TaggedFileExt;
use lofty::picture::{MimeType, PictureType};
use lofty::tag::{Accessor, ItemKey};
use std::fs;
use std::path::Path;
use ytalbum::{AlbumTags, TitleCleaner, tag_album};

const PNG: [u8; 12] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

fn album_tags() -> AlbumTags {
    AlbumTags {
        artist: Some("The Band".to_string()),
        album: Some("Debut".to_string()),
        year: Some("1999".to_string()),
        cover: None,
    }
}

fn names(folder: &Path) -> Vec<String> {
    let mut names = fs::read_dir(folder)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
        .collect::<Vec<_>>();
    names.sort();
    names
}

#[test]
fn tags_and_renames_album_tracks() {
    let dir = tempfile::tempdir().unwrap();
    common::write_mp3(dir.path(), "1-The Band - Opener (Official Video)");
    common::write_mp3(dir.path(), "2-the band: Closer [Lyrics]");

    let report = tag_album(dir.path(), &album_tags(), &TitleCleaner::default()).unwrap();

    assert!(report.failed.is_empty(), "{:?}", report.failed);
    assert_eq!(report.tagged.len(), 2);
    assert_eq!(names(dir.path()), vec!["01-Opener.mp3", "02-Closer.mp3"]);

    let file = lofty::read_from_path(dir.path().join("02-Closer.mp3")).unwrap();
    let tag = file.primary_tag().unwrap();
    assert_eq!(tag.artist().as_deref(), Some("The Band"));
    assert_eq!(tag.album().as_deref(), Some("Debut"));
    assert_eq!(tag.title().as_deref(), Some("Closer"));
    assert_eq!(tag.track(), Some(2));
    assert!(
        tag.get_string(&ItemKey::RecordingDate)
            .is_some_and(|date| date.starts_with("1999"))
    );
    assert!(tag.pictures().is_empty());
}

#[test]
fn single_digit_prefix_is_padded_in_file_name() {
    let dir = tempfile::tempdir().unwrap();
    common::write_mp3(dir.path(), "5-Song");

    let report = tag_album(dir.path(), &AlbumTags::default(), &TitleCleaner::default()).unwrap();

    assert_eq!(names(dir.path()), vec!["05-Song.mp3"]);
    assert_eq!(report.tagged[0].track_number, Some(5));
    assert!(report.tagged[0].renamed);
}

#[test]
fn replacement_titles_are_looked_up_by_track_number() {
    let dir = tempfile::tempdir().unwrap();
    common::write_mp3(dir.path(), "01-whatever");
    common::write_mp3(dir.path(), "02-something else (HD)");

    let cleaner = TitleCleaner::default()
        .with_replacements(vec!["Intro".to_string(), "Main Theme".to_string()]);
    tag_album(dir.path(), &album_tags(), &cleaner).unwrap();

    assert_eq!(names(dir.path()), vec!["01-Intro.mp3", "02-Main Theme.mp3"]);
    let file = lofty::read_from_path(dir.path().join("02-Main Theme.mp3")).unwrap();
    assert_eq!(
        file.primary_tag().unwrap().title().as_deref(),
        Some("Main Theme")
    );
}

#[test]
fn separators_in_titles_stay_out_of_file_names() {
    let dir = tempfile::tempdir().unwrap();
    common::write_mp3(dir.path(), "01-whatever");

    let cleaner = TitleCleaner::default().with_replacements(vec!["AC/DC Tribute".to_string()]);
    let report = tag_album(dir.path(), &album_tags(), &cleaner).unwrap();

    assert!(report.failed.is_empty(), "{:?}", report.failed);
    assert_eq!(names(dir.path()), vec!["01-AC-DC Tribute.mp3"]);
    let file = lofty::read_from_path(dir.path().join("01-AC-DC Tribute.mp3")).unwrap();
    assert_eq!(
        file.primary_tag().unwrap().title().as_deref(),
        Some("AC/DC Tribute")
    );
}

#[test]
fn empty_fields_leave_existing_tags_alone() {
    let dir = tempfile::tempdir().unwrap();
    common::write_mp3(dir.path(), "03-Track");

    tag_album(dir.path(), &album_tags(), &TitleCleaner::default()).unwrap();
    let sparse = AlbumTags {
        artist: Some("  ".to_string()),
        ..AlbumTags::default()
    };
    tag_album(dir.path(), &sparse, &TitleCleaner::default()).unwrap();

    let file = lofty::read_from_path(dir.path().join("03-Track.mp3")).unwrap();
    let tag = file.primary_tag().unwrap();
    assert_eq!(tag.artist().as_deref(), Some("The Band"));
    assert_eq!(tag.album().as_deref(), Some("Debut"));
    assert_eq!(tag.track(), Some(3));
}

#[test]
fn cover_art_is_embedded_once_as_front_cover() {
    let dir = tempfile::tempdir().unwrap();
    common::write_mp3(dir.path(), "01-Track");

    let tags = AlbumTags {
        cover: Some(PNG.to_vec()),
        ..album_tags()
    };
    tag_album(dir.path(), &tags, &TitleCleaner::default()).unwrap();
    tag_album(dir.path(), &tags, &TitleCleaner::default()).unwrap();

    let file = lofty::read_from_path(dir.path().join("01-Track.mp3")).unwrap();
    let pictures = file.primary_tag().unwrap().pictures();
    assert_eq!(pictures.len(), 1);
    assert_eq!(pictures[0].pic_type(), PictureType::CoverFront);
    assert_eq!(pictures[0].mime_type(), Some(&MimeType::Png));
    assert_eq!(pictures[0].data(), &PNG);
}

#[test]
fn existing_target_keeps_first_writer() {
    let dir = tempfile::tempdir().unwrap();
    common::write_mp3(dir.path(), "01-Song");
    common::write_mp3(dir.path(), "1-Song");

    let report = tag_album(dir.path(), &album_tags(), &TitleCleaner::default()).unwrap();

    assert!(report.failed.is_empty());
    assert_eq!(names(dir.path()), vec!["01-Song.mp3", "1-Song.mp3"]);
    assert!(report.tagged.iter().all(|track| !track.renamed));
}

#[test]
fn non_mp3_files_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("1-cover.jpg"), b"jpeg").unwrap();
    fs::write(dir.path().join("notes.txt"), b"text").unwrap();

    let report = tag_album(dir.path(), &album_tags(), &TitleCleaner::default()).unwrap();

    assert!(report.tagged.is_empty());
    assert_eq!(names(dir.path()), vec!["1-cover.jpg", "notes.txt"]);
}

#[cfg(target_os = "linux")]
#[test]
fn one_bad_file_does_not_stop_the_batch() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let dir = tempfile::tempdir().unwrap();
    common::write_mp3(dir.path(), "01-First");
    let bad = dir.path().join(OsStr::from_bytes(b"02-\xff\xfe.mp3"));
    fs::write(&bad, common::mp3_bytes(20)).unwrap();
    common::write_mp3(dir.path(), "3-Third");

    let report = tag_album(dir.path(), &album_tags(), &TitleCleaner::default()).unwrap();

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, bad);
    assert_eq!(report.tagged.len(), 2);
    assert!(dir.path().join("01-First.mp3").exists());
    assert!(dir.path().join("03-Third.mp3").exists());
}
