//! Archive reconstruction from an arbitrary subset of frames
//!
//! Frames may arrive in any order, duplicated, damaged or mixed with frames
//! of other archives. Reconstruction:
//!
//! 1. drops frames that fail header validation or their checksum
//! 2. picks the target archive: the explicit one, or else the one with the
//!    most frames that has enough of them in every stripe
//! 3. drops frames whose layout disagrees with the target's majority layout
//! 4. checks every stripe has `k` usable blocks before allocating anything
//! 5. recovers stripes in parallel and joins them in block order
//! 6. checks the stream trailer, then parses the archive strictly

use crate::archive::ArchiveStream;
use crate::cancel::CancelToken;
use crate::codec::{expected_payload_len, map_stripes, StreamTrailer};
use crate::constants::TRAILER_SIZE;
use crate::error::{Error, FrameError};
use crate::fec::{RedundancyDecoder, RsStripeCoder};
use crate::types::{ArchiveId, Frame, Layout, SlotKind};
use bytes::Bytes;
use serde::Serialize;
use std::collections::BTreeMap;

#[cfg(feature = "logging")]
use tracing::{debug, info, warn};

/// Outcome of offering a frame to a [`FrameTable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insert {
    /// The slot was empty and now holds the frame
    Accepted,
    /// The slot was already filled; the frame was dropped
    Duplicate,
}

/// Frames of one archive, indexed by `stripe * (k + m) + slot`
#[derive(Debug, Clone)]
pub struct FrameTable {
    layout: Layout,
    slots: Vec<Option<Frame>>,
}

impl FrameTable {
    /// Empty table sized for every slot of `layout`
    ///
    /// The table holds `stripes * (k + m)` slots; callers decoding untrusted
    /// frames check stripe availability first.
    pub fn new(layout: Layout) -> Self {
        let len = layout.stripe_count() as usize * layout.width();
        Self {
            layout,
            slots: vec![None; len],
        }
    }

    /// Layout of the archive held by this table
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Offer a frame; the first valid frame for a slot wins
    pub fn insert(&mut self, frame: Frame) -> Result<Insert, Error> {
        frame.verify()?;
        if frame.archive_id() != self.layout.archive_id {
            return Err(Error::ForeignArchive {
                expected: self.layout.archive_id,
                found: frame.archive_id(),
            });
        }
        if frame.header.layout() != self.layout {
            return Err(Error::Frame(FrameError::InvalidStructure(
                "frame layout differs from the archive layout".to_string(),
            )));
        }

        let (stripe, slot) = frame.position();
        let cell = &mut self.slots[self.layout.table_index(stripe, slot)];
        if cell.is_some() {
            return Ok(Insert::Duplicate);
        }
        *cell = Some(frame);
        Ok(Insert::Accepted)
    }

    /// Frame held for `(stripe, slot)`
    pub fn get(&self, stripe: u64, slot: usize) -> Option<&Frame> {
        if stripe >= self.layout.stripe_count() || slot >= self.layout.width() {
            return None;
        }
        self.slots[self.layout.table_index(stripe, slot)].as_ref()
    }

    /// Usable blocks of a stripe: frames held plus known padding blocks
    pub fn available(&self, stripe: u64) -> usize {
        let present = (0..self.layout.width())
            .filter(|&slot| {
                self.layout.slot_kind(stripe, slot) != SlotKind::Padding
                    && self.get(stripe, slot).is_some()
            })
            .count();
        present + self.layout.padding_slots(stripe)
    }

    /// Held frames in (stripe, slot) order
    pub fn frames(&self) -> impl Iterator<Item = &Frame> {
        self.slots.iter().flatten()
    }
}

/// Counters collected while reconstructing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconstructStats {
    /// Frames offered
    pub frames_seen: usize,
    /// Frames placed in the table
    pub accepted: usize,
    /// Valid frames repeating a filled slot
    pub duplicates: usize,
    /// Frames failing validation or checksum
    pub invalid: usize,
    /// Valid frames of other archives
    pub foreign: usize,
    /// Frames of the target archive with a minority layout
    pub mismatched_layout: usize,
    /// Missing data blocks rebuilt from parity
    pub recovered_blocks: usize,
}

/// A verified reconstruction
#[derive(Debug, Clone)]
pub struct Reconstruction {
    /// Layout of the reconstructed archive
    pub layout: Layout,
    /// Archive bytes
    pub archive: Bytes,
    /// Parsed archive stream
    pub stream: ArchiveStream,
    /// Counters
    pub stats: ReconstructStats,
}

/// Rebuilds one archive from frames
#[derive(Debug, Clone, Default)]
pub struct Reconstructor {
    archive_id: Option<ArchiveId>,
    cancel: CancelToken,
}

impl Reconstructor {
    /// Reconstructor choosing the recoverable archive with the most frames
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconstruct this archive, ignoring every other
    pub fn with_archive_id(mut self, archive_id: ArchiveId) -> Self {
        self.archive_id = Some(archive_id);
        self
    }

    /// Check `cancel` between stripes
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Rebuild and parse the archive
    pub fn decode(&self, frames: impl IntoIterator<Item = Frame>) -> Result<ArchiveStream, Error> {
        Ok(self.reconstruct(frames)?.stream)
    }

    /// Rebuild the archive and report what was used
    pub fn reconstruct(
        &self,
        frames: impl IntoIterator<Item = Frame>,
    ) -> Result<Reconstruction, Error> {
        let mut stats = ReconstructStats::default();

        let mut valid = Vec::new();
        for frame in frames {
            stats.frames_seen += 1;
            match frame.verify() {
                Ok(()) => valid.push(frame),
                Err(_e) => {
                    stats.invalid += 1;
                    #[cfg(feature = "logging")]
                    debug!("Dropping frame {:?}: {}", frame.position(), _e);
                }
            }
        }

        let mut by_archive: BTreeMap<ArchiveId, Vec<Frame>> = BTreeMap::new();
        for frame in valid {
            by_archive.entry(frame.archive_id()).or_default().push(frame);
        }

        let order = match self.archive_id {
            Some(id) => vec![id],
            None => ranked_archives(&by_archive),
        };
        let mut chosen = None;
        let mut first_failure = None;
        for id in order {
            let frames = by_archive.get(&id).map(Vec::as_slice).unwrap_or_default();
            match recoverable_layout(frames) {
                Ok(layout) => {
                    chosen = Some((id, layout));
                    break;
                }
                Err(err) => {
                    #[cfg(feature = "logging")]
                    debug!("Archive {} cannot be rebuilt: {}", id, err);
                    if first_failure.is_none() {
                        first_failure = Some(err);
                    }
                }
            }
        }
        let (target, layout) = match chosen {
            Some(chosen) => chosen,
            None => return Err(first_failure.unwrap_or(NO_FRAMES)),
        };

        let candidates = by_archive.remove(&target).unwrap_or_default();
        stats.foreign = by_archive.values().map(Vec::len).sum();
        #[cfg(feature = "logging")]
        if stats.foreign > 0 {
            warn!(
                "Ignoring {} frames of archives other than {}",
                stats.foreign, target
            );
        }

        let (candidates, mismatched): (Vec<Frame>, Vec<Frame>) = candidates
            .into_iter()
            .partition(|f| f.header.layout() == layout);
        stats.mismatched_layout = mismatched.len();

        #[cfg(feature = "logging")]
        debug!(
            "Archive {}: {} candidate frames, {} stripes of {}+{}",
            target,
            candidates.len(),
            layout.stripe_count(),
            layout.params.data_shards,
            layout.params.parity_shards
        );

        let mut table = FrameTable::new(layout);
        for frame in candidates {
            match table.insert(frame)? {
                Insert::Accepted => stats.accepted += 1,
                Insert::Duplicate => stats.duplicates += 1,
            }
        }

        self.cancel.check()?;
        let coder = RsStripeCoder::new(&layout.params)?;
        let recovered = map_stripes(0..layout.stripe_count(), |stripe| {
            self.cancel.check()?;
            recover_stripe(&table, &coder, stripe)
        });

        let block_size = layout.params.block_size;
        let mut region = Vec::with_capacity(layout.total_blocks as usize * block_size);
        for stripe in recovered {
            let (blocks, rebuilt) = stripe?;
            stats.recovered_blocks += rebuilt;
            for block in blocks {
                region.extend_from_slice(&block);
            }
        }

        let archive = check_trailer(&table, region)?;
        self.cancel.check()?;
        let stream = ArchiveStream::from_tar_bytes(&archive)?;

        #[cfg(feature = "logging")]
        info!(
            "Reconstructed archive {} ({} bytes, {} entries, {} blocks rebuilt)",
            target,
            archive.len(),
            stream.len(),
            stats.recovered_blocks
        );

        Ok(Reconstruction {
            layout,
            archive,
            stream,
            stats,
        })
    }
}

/// Rebuild an archive stream from frames
pub fn decode(frames: impl IntoIterator<Item = Frame>) -> Result<ArchiveStream, Error> {
    Reconstructor::new().decode(frames)
}

/// Health of one stripe that has at least one frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StripeHealth {
    /// Stripe index
    pub stripe: u64,
    /// Usable blocks (frames plus padding)
    pub available: usize,
    /// Blocks needed (`k`)
    pub required: usize,
    /// Whether `available >= required`
    pub recoverable: bool,
}

/// Frame census of one archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveSurvey {
    /// Majority layout of the archive's frames
    pub layout: Layout,
    /// Valid frames carrying this archive id
    pub frames: usize,
    /// Frames repeating an already seen slot
    pub duplicates: usize,
    /// Frames with a minority layout
    pub mismatched_layout: usize,
    /// Stripes with at least one frame, in index order
    pub stripes: Vec<StripeHealth>,
    /// Stripes with no frame at all
    pub empty_stripes: u64,
    /// First stripe that cannot be recovered
    pub first_unrecoverable: Option<u64>,
}

impl ArchiveSurvey {
    /// Whether every stripe can be recovered
    pub fn recoverable(&self) -> bool {
        self.first_unrecoverable.is_none()
    }
}

/// Frame census of a whole frame set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SurveyReport {
    /// Frames examined
    pub frames_seen: usize,
    /// Frames failing validation or checksum
    pub invalid: usize,
    /// One entry per archive id, most frames first
    pub archives: Vec<ArchiveSurvey>,
}

/// Report stripe health per archive without decoding anything
pub fn survey(frames: impl IntoIterator<Item = Frame>) -> SurveyReport {
    let mut report = SurveyReport::default();
    let mut by_archive: BTreeMap<ArchiveId, Vec<Frame>> = BTreeMap::new();

    for frame in frames {
        report.frames_seen += 1;
        if frame.verify().is_err() {
            report.invalid += 1;
            continue;
        }
        by_archive.entry(frame.archive_id()).or_default().push(frame);
    }

    for frames in by_archive.into_values() {
        let Some(layout) = majority_layout(&frames) else {
            continue;
        };
        let total = frames.len();
        let matching: Vec<Frame> = frames
            .into_iter()
            .filter(|f| f.header.layout() == layout)
            .collect();

        let mut all_slots: Vec<(u64, usize)> = matching.iter().map(Frame::position).collect();
        all_slots.sort_unstable();
        all_slots.dedup();

        let keys = occupied_slots(&layout, &matching);
        let k = layout.params.data_shards;
        let mut stripes: Vec<StripeHealth> = Vec::new();
        for &(stripe, _) in &keys {
            match stripes.last_mut() {
                Some(last) if last.stripe == stripe => last.available += 1,
                _ => stripes.push(StripeHealth {
                    stripe,
                    available: 1 + layout.padding_slots(stripe),
                    required: k,
                    recoverable: false,
                }),
            }
        }
        for health in &mut stripes {
            health.recoverable = health.available >= health.required;
        }

        report.archives.push(ArchiveSurvey {
            layout,
            frames: total,
            duplicates: matching.len() - all_slots.len(),
            mismatched_layout: total - matching.len(),
            empty_stripes: layout.stripe_count() - stripes.len() as u64,
            first_unrecoverable: first_unrecoverable(&layout, &keys).map(|(s, _)| s),
            stripes,
        });
    }

    report
        .archives
        .sort_by(|a, b| b.frames.cmp(&a.frames).then(a.layout.cmp(&b.layout)));
    report
}

const NO_FRAMES: Error = Error::InsufficientFrames {
    stripe: 0,
    available: 0,
    required: 1,
};

/// Archive ids by frame count, most first; ties go to the smallest id
fn ranked_archives(by_archive: &BTreeMap<ArchiveId, Vec<Frame>>) -> Vec<ArchiveId> {
    let mut ranked: Vec<(ArchiveId, usize)> = by_archive
        .iter()
        .map(|(id, frames)| (*id, frames.len()))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.into_iter().map(|(id, _)| id).collect()
}

/// Majority layout of one archive's frames, if every stripe has `k` usable
/// blocks under it
fn recoverable_layout(frames: &[Frame]) -> Result<Layout, Error> {
    let layout = majority_layout(frames).ok_or(NO_FRAMES)?;
    let matching: Vec<Frame> = frames
        .iter()
        .filter(|f| f.header.layout() == layout)
        .cloned()
        .collect();
    let keys = occupied_slots(&layout, &matching);
    match first_unrecoverable(&layout, &keys) {
        Some((stripe, available)) => Err(Error::InsufficientFrames {
            stripe,
            available,
            required: layout.params.data_shards,
        }),
        None => Ok(layout),
    }
}

/// Most common layout among frames; ties go to the smallest layout
fn majority_layout(frames: &[Frame]) -> Option<Layout> {
    let mut counts: BTreeMap<Layout, usize> = BTreeMap::new();
    for frame in frames {
        *counts.entry(frame.header.layout()).or_default() += 1;
    }
    pick_most(counts)
}

fn pick_most<K: Copy>(counts: BTreeMap<K, usize>) -> Option<K> {
    let mut best: Option<(K, usize)> = None;
    for (key, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((key, count));
        }
    }
    best.map(|(key, _)| key)
}

/// Sorted, distinct `(stripe, slot)` pairs held by frames, padding excluded
fn occupied_slots(layout: &Layout, frames: &[Frame]) -> Vec<(u64, usize)> {
    let mut keys: Vec<(u64, usize)> = frames
        .iter()
        .map(Frame::position)
        .filter(|&(stripe, slot)| layout.slot_kind(stripe, slot) != SlotKind::Padding)
        .collect();
    keys.sort_unstable();
    keys.dedup();
    keys
}

/// First stripe with fewer than `k` usable blocks and its usable count
///
/// Walks the occupied keys only, so the cost does not depend on the stripe
/// count a header claims.
fn first_unrecoverable(layout: &Layout, keys: &[(u64, usize)]) -> Option<(u64, usize)> {
    let k = layout.params.data_shards;
    let mut next = 0u64;
    let mut i = 0;

    while i < keys.len() {
        let stripe = keys[i].0;
        if stripe > next {
            return Some((next, layout.padding_slots(next)));
        }
        let mut present = 0;
        while i < keys.len() && keys[i].0 == stripe {
            present += 1;
            i += 1;
        }
        let available = present + layout.padding_slots(stripe);
        if available < k {
            return Some((stripe, available));
        }
        next = stripe + 1;
    }

    if next < layout.stripe_count() {
        return Some((next, layout.padding_slots(next)));
    }
    None
}

/// Real data blocks of one stripe and how many had to be rebuilt
fn recover_stripe(
    table: &FrameTable,
    coder: &RsStripeCoder,
    stripe: u64,
) -> Result<(Vec<Vec<u8>>, usize), Error> {
    let layout = table.layout();
    let k = layout.params.data_shards;
    let block_size = layout.params.block_size;

    let mut shards: Vec<Option<Vec<u8>>> = (0..layout.width())
        .map(|slot| match layout.slot_kind(stripe, slot) {
            SlotKind::Padding => Some(vec![0u8; block_size]),
            _ => table.get(stripe, slot).map(|f| f.payload.to_vec()),
        })
        .collect();
    let missing = shards[..k].iter().filter(|s| s.is_none()).count();

    coder.recover_data(&mut shards).map_err(|e| match e {
        Error::InsufficientFrames {
            available,
            required,
            ..
        } => Error::InsufficientFrames {
            stripe,
            available,
            required,
        },
        other => other,
    })?;

    let real = k - layout.padding_slots(stripe);
    let blocks = shards
        .into_iter()
        .take(real)
        .map(|s| {
            s.ok_or_else(|| {
                Error::CorruptArchive(format!("stripe {} was not fully recovered", stripe))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    #[cfg(feature = "logging")]
    if missing > 0 {
        debug!("Stripe {}: rebuilt {} data blocks", stripe, missing);
    }

    Ok((blocks, missing))
}

/// Verify the trailer against the data region and return the archive bytes
fn check_trailer(table: &FrameTable, mut region: Vec<u8>) -> Result<Bytes, Error> {
    let layout = table.layout();
    let block_size = layout.params.block_size;
    let capacity = region.len() - TRAILER_SIZE;
    let trailer = StreamTrailer::parse(&region[capacity..])?;

    if trailer.archive_len > capacity as u64
        || layout.params.total_blocks_for(trailer.archive_len) != layout.total_blocks
    {
        return Err(Error::CorruptArchive(format!(
            "trailer length {} does not fit {} data blocks",
            trailer.archive_len, layout.total_blocks
        )));
    }
    let archive_len = trailer.archive_len as usize;

    if region[archive_len..capacity].iter().any(|&b| b != 0) {
        return Err(Error::CorruptArchive(
            "non-zero bytes between archive and trailer".to_string(),
        ));
    }
    if blake3::hash(&region[..archive_len]).as_bytes() != &trailer.digest {
        return Err(Error::CorruptArchive("archive digest mismatch".to_string()));
    }

    let id = ArchiveId::derive(&layout.params, trailer.archive_len, &trailer.digest);
    if id != layout.archive_id {
        return Err(Error::CorruptArchive(format!(
            "archive id {} does not match content (expected {})",
            layout.archive_id, id
        )));
    }

    for frame in table.frames() {
        let (stripe, slot) = frame.position();
        if let SlotKind::Data(index) = layout.slot_kind(stripe, slot) {
            let expected = expected_payload_len(trailer.archive_len, block_size, index);
            if frame.header.payload_len != expected {
                return Err(Error::CorruptArchive(format!(
                    "block {} claims {} archive bytes, trailer implies {}",
                    index, frame.header.payload_len, expected
                )));
            }
        }
    }

    region.truncate(archive_len);
    Ok(Bytes::from(region))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::Entry;
    use crate::codec::StripeEncoder;
    use crate::types::{CodecParams, FrameHeader};

    fn sample_stream() -> ArchiveStream {
        ArchiveStream::new(vec![
            Entry::directory("docs", 0o755),
            Entry::file("docs/a.bin", 0o644, vec![0xA5; 3000]),
            Entry::file("docs/b.txt", 0o644, &b"strata"[..]),
        ])
    }

    fn encoder(params: CodecParams) -> StripeEncoder {
        StripeEncoder::new(sample_stream().to_tar_bytes().unwrap(), params).unwrap()
    }

    #[test]
    fn test_decode_all_frames() {
        let frames = encoder(CodecParams::new(3, 2, 512)).encode_all().unwrap();
        let rec = Reconstructor::new().reconstruct(frames.clone()).unwrap();

        assert_eq!(rec.stream, sample_stream());
        assert_eq!(rec.stats.accepted, frames.len());
        assert_eq!(rec.stats.recovered_blocks, 0);
    }

    #[test]
    fn test_recovers_lost_data_blocks() {
        let frames = encoder(CodecParams::new(3, 2, 512)).encode_all().unwrap();
        let kept: Vec<Frame> = frames
            .into_iter()
            .filter(|f| f.header.slot_index > 1)
            .collect();

        let rec = Reconstructor::new().reconstruct(kept).unwrap();
        assert_eq!(rec.stream, sample_stream());
        assert!(rec.stats.recovered_blocks > 0);
    }

    #[test]
    fn test_first_unrecoverable_stripe_reported() {
        let frames = encoder(CodecParams::new(3, 2, 512)).encode_all().unwrap();
        let kept: Vec<Frame> = frames
            .into_iter()
            .filter(|f| !(f.header.stripe_index == 1 && f.header.slot_index < 3))
            .collect();

        assert_eq!(
            decode(kept).unwrap_err(),
            Error::InsufficientFrames {
                stripe: 1,
                available: 2,
                required: 3
            }
        );
    }

    #[test]
    fn test_no_frames() {
        assert!(matches!(
            decode(Vec::new()),
            Err(Error::InsufficientFrames { stripe: 0, .. })
        ));
    }

    #[test]
    fn test_crafted_block_count_fails_before_allocation() {
        let layout = Layout {
            archive_id: ArchiveId::from_bytes([1; 16]),
            params: CodecParams::new(1, 1, 64),
            total_blocks: u64::MAX / 2,
        };
        let frame = Frame::seal(FrameHeader::new(&layout, 5, 0, 64), Bytes::from(vec![0; 64]));

        assert_eq!(
            decode(vec![frame]).unwrap_err(),
            Error::InsufficientFrames {
                stripe: 0,
                available: 0,
                required: 1
            }
        );
    }

    #[test]
    fn test_foreign_frames_ignored() {
        let ours = encoder(CodecParams::new(3, 2, 512)).encode_all().unwrap();
        let other = ArchiveStream::new(vec![Entry::file("other", 0o600, vec![1u8; 100])]);
        let theirs = StripeEncoder::new(other.to_tar_bytes().unwrap(), CodecParams::new(3, 2, 512))
            .unwrap()
            .encode_all()
            .unwrap();

        let mixed: Vec<Frame> = ours.iter().cloned().chain(theirs.iter().cloned()).collect();
        let rec = Reconstructor::new().reconstruct(mixed.clone()).unwrap();
        assert_eq!(rec.stream, sample_stream());
        assert_eq!(rec.stats.foreign, theirs.len());

        // explicit id picks the minority archive
        let theirs_id = theirs[0].archive_id();
        let rec = Reconstructor::new()
            .with_archive_id(theirs_id)
            .reconstruct(mixed)
            .unwrap();
        assert_eq!(rec.stream, other);
    }

    #[test]
    fn test_damaged_majority_does_not_hide_intact_archive() {
        let ours = encoder(CodecParams::new(3, 2, 512)).encode_all().unwrap();
        let other = ArchiveStream::new(vec![Entry::file("other", 0o600, vec![1u8; 5])]);
        let theirs = StripeEncoder::new(other.to_tar_bytes().unwrap(), CodecParams::new(3, 2, 512))
            .unwrap()
            .encode_all()
            .unwrap();
        assert!(ours.len() > theirs.len());

        // stripe 0 of the larger archive keeps only two of five frames
        let damaged: Vec<Frame> = ours
            .iter()
            .filter(|f| !(f.header.stripe_index == 0 && f.header.slot_index < 3))
            .cloned()
            .collect();
        assert!(damaged.len() > theirs.len());

        let mixed: Vec<Frame> = damaged.iter().cloned().chain(theirs.iter().cloned()).collect();
        let rec = Reconstructor::new().reconstruct(mixed).unwrap();
        assert_eq!(rec.stream, other);
        assert_eq!(rec.stats.foreign, damaged.len());

        // with nothing recoverable the error names the larger archive
        let err = decode(damaged).unwrap_err();
        assert_eq!(
            err,
            Error::InsufficientFrames {
                stripe: 0,
                available: 2,
                required: 3
            }
        );
    }

    #[test]
    fn test_explicit_id_without_frames() {
        let frames = encoder(CodecParams::new(3, 2, 512)).encode_all().unwrap();
        let err = Reconstructor::new()
            .with_archive_id(ArchiveId::from_bytes([0xEE; 16]))
            .decode(frames)
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientFrames { stripe: 0, .. }));
    }

    #[test]
    fn test_table_rejects_foreign_frame() {
        let frames = encoder(CodecParams::new(3, 2, 512)).encode_all().unwrap();
        let other = StripeEncoder::new(vec![2u8; 10], CodecParams::new(3, 2, 512))
            .unwrap()
            .encode_all()
            .unwrap();

        let mut table = FrameTable::new(frames[0].header.layout());
        assert_eq!(table.insert(frames[0].clone()).unwrap(), Insert::Accepted);
        assert_eq!(table.insert(frames[0].clone()).unwrap(), Insert::Duplicate);
        assert_eq!(table.available(0), 1);
        assert!(table.get(0, 1).is_none());
        assert!(matches!(
            table.insert(other[0].clone()),
            Err(Error::ForeignArchive { .. })
        ));
    }

    #[test]
    fn test_invalid_frames_counted() {
        let mut frames = encoder(CodecParams::new(3, 2, 512)).encode_all().unwrap();
        let mut payload = frames[0].payload.to_vec();
        payload[17] ^= 0x10;
        frames[0].payload = Bytes::from(payload);

        let rec = Reconstructor::new().reconstruct(frames).unwrap();
        assert_eq!(rec.stats.invalid, 1);
        assert_eq!(rec.stream, sample_stream());
    }

    #[test]
    fn test_payload_len_must_match_trailer() {
        let enc = encoder(CodecParams::new(3, 2, 512));
        let mut frames = enc.encode_all().unwrap();
        let header = FrameHeader {
            payload_len: frames[0].header.payload_len - 1,
            ..frames[0].header
        };
        frames[0] = Frame::seal(header, frames[0].payload.clone());

        assert!(matches!(decode(frames), Err(Error::CorruptArchive(_))));
    }

    #[test]
    fn test_cancelled_decode() {
        let frames = encoder(CodecParams::new(3, 2, 512)).encode_all().unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        assert_eq!(
            Reconstructor::new()
                .with_cancel(cancel)
                .decode(frames)
                .unwrap_err(),
            Error::Cancelled
        );
    }

    #[test]
    fn test_survey_reports_stripe_health() {
        let enc = encoder(CodecParams::new(3, 2, 512));
        let frames = enc.encode_all().unwrap();
        let stripes = enc.stripe_count();
        let mut kept: Vec<Frame> = frames
            .into_iter()
            .filter(|f| !(f.header.stripe_index == 0 && f.header.slot_index < 3))
            .collect();
        kept.push(kept[0].clone());

        let report = survey(kept);
        assert_eq!(report.archives.len(), 1);
        let archive = &report.archives[0];
        assert_eq!(archive.duplicates, 1);
        assert_eq!(archive.first_unrecoverable, Some(0));
        assert!(!archive.recoverable());
        assert_eq!(archive.stripes.len() as u64, stripes);
        assert_eq!(archive.stripes[0].available, 2);
        assert!(archive.stripes[1..].iter().all(|s| s.recoverable));
    }
}
