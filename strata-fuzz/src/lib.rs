//! Fuzz entry points for strata-core
//!
//! To use with cargo-fuzz:
//! 1. Install cargo-fuzz: cargo install cargo-fuzz
//! 2. Wire a target to one of these functions and run: cargo fuzz run <target>
//!
//! Every entry point must return normally for any input.

use strata_core::{
    codec::{encode_bytes, StreamTrailer},
    decoder::decode_frame_from_bytes,
    reconstruct::{survey, Reconstructor},
    unpack, ArchiveStream, CodecParams, Entry,
};

/// Parse arbitrary bytes as one frame
pub fn fuzz_parse_frame(data: &[u8]) {
    let _ = decode_frame_from_bytes(data);
}

/// Parse arbitrary bytes as a canonical tar stream and as a stream trailer
pub fn fuzz_archive_parse(data: &[u8]) {
    if let Ok(stream) = ArchiveStream::from_tar_bytes(data) {
        // accepted streams are canonical, so they serialize back unchanged
        if let Ok(tar) = unpack(&stream) {
            assert_eq!(&tar[..], data);
        }
    }
    let _ = StreamTrailer::parse(data);
}

/// Damage the frames of a small archive as directed by `data`, then decode
///
/// Input is read as (frame index, byte offset, xor mask) triples; a zero
/// mask drops the frame instead.
pub fn fuzz_decode(data: &[u8]) {
    let stream = ArchiveStream::new(vec![
        Entry::directory("fz", 0o755),
        Entry::file("fz/a", 0o644, vec![0x5a; 700]),
    ]);
    let Ok(tar) = unpack(&stream) else {
        return;
    };
    let Ok(mut frames) = encode_bytes(tar, &CodecParams::new(3, 2, 256)) else {
        return;
    };

    let mut dropped = vec![false; frames.len()];
    for triple in data.chunks_exact(3) {
        let index = triple[0] as usize % frames.len();
        if triple[2] == 0 {
            dropped[index] = true;
            continue;
        }
        let frame = &mut frames[index];
        let mut payload = frame.payload.to_vec();
        let offset = triple[1] as usize % payload.len();
        payload[offset] ^= triple[2];
        frame.payload = payload.into();
    }

    let frames: Vec<_> = frames
        .into_iter()
        .zip(dropped)
        .filter(|(_, gone)| !gone)
        .map(|(frame, _)| frame)
        .collect();

    let _ = survey(frames.clone());
    if let Ok(decoded) = Reconstructor::new().decode(frames) {
        // payload damage is caught by checksums, never returned
        assert_eq!(decoded, stream);
    }
}
