//! Property-based tests using proptest

use bytes::Bytes;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::SeedableRng;
use strata_core::{
    codec::encode_bytes,
    decoder::decode_frame_from_bytes,
    encoder::encode_frame,
    reconstruct::{decode, survey},
    types::{CodecParams, Frame},
    unpack, ArchiveStream, Entry, Error,
};

fn stream_of(files: &[Vec<u8>]) -> ArchiveStream {
    let mut entries = vec![Entry::directory("root", 0o755)];
    for (i, content) in files.iter().enumerate() {
        entries.push(Entry::file(format!("root/f{:03}", i), 0o644, content.clone()));
    }
    ArchiveStream::new(entries)
}

fn params() -> impl Strategy<Value = CodecParams> {
    (1usize..6, 1usize..4, prop::sample::select(vec![64usize, 100, 512, 1024]))
        .prop_map(|(k, m, b)| CodecParams::new(k, m, b))
}

/// Drop `losses` random slots from every stripe
fn erase(frames: &[Frame], width: usize, losses: usize, seed: u64) -> Vec<Frame> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut kept = Vec::new();
    for stripe in frames.chunks(width) {
        let lost = sample(&mut rng, width, losses).into_vec();
        kept.extend(
            stripe
                .iter()
                .enumerate()
                .filter(|(slot, _)| !lost.contains(slot))
                .map(|(_, f)| f.clone()),
        );
    }
    kept
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_round_trip_with_m_losses_per_stripe(
        files in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..3000), 0..4),
        params in params(),
        seed in any::<u64>(),
    ) {
        let stream = stream_of(&files);
        let tar = unpack(&stream).unwrap();
        let frames = encode_bytes(tar.clone(), &params).unwrap();

        let kept = erase(&frames, params.width(), params.parity_shards, seed);
        let decoded = decode(kept).unwrap();

        prop_assert_eq!(unpack(&decoded).unwrap(), tar);
        prop_assert_eq!(decoded, stream);
    }

    #[test]
    fn prop_too_many_losses_fail(
        content in prop::collection::vec(any::<u8>(), 0..2000),
        params in params(),
        seed in any::<u64>(),
    ) {
        let tar = unpack(&stream_of(&[content])).unwrap();
        let frames = encode_bytes(tar, &params).unwrap();

        let kept = erase(&frames, params.width(), params.parity_shards + 1, seed);
        let result = decode(kept);

        // padding slots in the last stripe are known, so only stripes
        // without padding are guaranteed to fail
        if let Err(err) = result {
            prop_assert!(matches!(err, Error::InsufficientFrames { .. }), "{}", err);
        } else {
            prop_assert!(frames[0].header.total_blocks % params.data_shards as u64 != 0);
        }
    }

    #[test]
    fn prop_single_bit_flip_is_detected(
        content in prop::collection::vec(any::<u8>(), 0..500),
        frame_pick in any::<prop::sample::Index>(),
        bit in any::<prop::sample::Index>(),
    ) {
        let tar = unpack(&stream_of(&[content])).unwrap();
        let frames = encode_bytes(tar, &CodecParams::new(3, 2, 256)).unwrap();
        let frame = frame_pick.get(&frames);

        let mut encoded = encode_frame(frame).unwrap().to_vec();
        let bit = bit.index(encoded.len() * 8);
        encoded[bit / 8] ^= 1 << (bit % 8);

        prop_assert!(decode_frame_from_bytes(&encoded).is_err());
    }

    #[test]
    fn prop_decode_never_panics(
        data in prop::collection::vec(any::<u8>(), 0..4096)
    ) {
        // Should never panic, even on random data
        let result = decode_frame_from_bytes(&data);
        prop_assert!(result.is_ok() || result.is_err());
    }

    #[test]
    fn prop_reconstruct_never_panics_on_damaged_frames(
        content in prop::collection::vec(any::<u8>(), 0..2000),
        damage in prop::collection::vec((any::<prop::sample::Index>(), any::<u8>()), 0..12),
    ) {
        let tar = unpack(&stream_of(&[content])).unwrap();
        let mut frames = encode_bytes(tar, &CodecParams::new(2, 2, 128)).unwrap();

        for (pick, xor) in damage {
            let i = pick.index(frames.len());
            let mut payload = frames[i].payload.to_vec();
            payload[0] ^= xor;
            frames[i].payload = Bytes::from(payload);
        }

        let _ = survey(frames.clone());
        let _ = decode(frames);
    }
}
