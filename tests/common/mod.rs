use std::path::Path;

/// MPEG-1 Layer III, 128kbps, 44.1kHz, no padding.
const FRAME_HEADER: [u8; 4] = [0xFF, 0xFB, 0x90, 0x64];
const FRAME_LEN: usize = 417;

/// A silent MP3 stream of `frames` frames without any tag.
pub fn mp3_bytes(frames: usize) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(frames * FRAME_LEN);
    for _ in 0..frames {
        let mut frame = vec![0u8; FRAME_LEN];
        frame[..4].copy_from_slice(&FRAME_HEADER);
        bytes.extend(frame);
    }
    bytes
}

pub fn write_mp3(folder: &Path, stem: &str) {
    std::fs::write(folder.join(format!("{stem}.mp3")), mp3_bytes(20)).unwrap();
}
