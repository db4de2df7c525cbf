//! Frame codec: archive bytes to stripes of sealed frames
//!
//! The data region is the archive followed by zero padding and a
//! [`StreamTrailer`] filling the last 40 bytes of the last data block. The
//! region is cut into `N` blocks of `block_size` bytes and grouped into
//! stripes of `k` blocks. The final stripe is completed with all-zero padding
//! blocks, then every stripe gets `m` Reed-Solomon parity blocks.

use crate::archive::ArchiveStream;
use crate::constants::{DIGEST_SIZE, TRAILER_SIZE};
use crate::error::Error;
use crate::fec::{RedundancyEncoder, RsStripeCoder};
use crate::types::{ArchiveId, CodecParams, Frame, FrameHeader, Layout, SlotKind};
use bytes::{Buf, BufMut, Bytes};
use std::ops::Range;

#[cfg(feature = "logging")]
use tracing::{debug, info};

/// Length and digest of the archive, stored at the end of the data region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamTrailer {
    /// Archive length in bytes
    pub archive_len: u64,

    /// BLAKE3 digest of the archive bytes
    pub digest: [u8; DIGEST_SIZE],
}

impl StreamTrailer {
    /// Trailer describing `archive`
    pub fn for_archive(archive: &[u8]) -> Self {
        Self {
            archive_len: archive.len() as u64,
            digest: *blake3::hash(archive).as_bytes(),
        }
    }

    /// Wire form: length (u64, big-endian) then digest
    pub fn to_bytes(&self) -> [u8; TRAILER_SIZE] {
        let mut out = [0u8; TRAILER_SIZE];
        let mut buf = &mut out[..];
        buf.put_u64(self.archive_len);
        buf.put_slice(&self.digest);
        out
    }

    /// Parse the wire form
    pub fn parse(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != TRAILER_SIZE {
            return Err(Error::CorruptArchive(format!(
                "stream trailer is {} bytes, expected {}",
                bytes.len(),
                TRAILER_SIZE
            )));
        }
        let mut buf = bytes;
        let archive_len = buf.get_u64();
        let mut digest = [0u8; DIGEST_SIZE];
        buf.copy_to_slice(&mut digest);
        Ok(Self {
            archive_len,
            digest,
        })
    }
}

/// Archive bytes carried by data block `index`
pub fn expected_payload_len(archive_len: u64, block_size: usize, index: u64) -> u32 {
    let start = index.saturating_mul(block_size as u64);
    if start >= archive_len {
        0
    } else {
        (archive_len - start).min(block_size as u64) as u32
    }
}

/// Encodes one archive stripe by stripe
///
/// Stripes are independent, so callers may encode and persist them in
/// batches and stop at any stripe boundary.
#[derive(Debug)]
pub struct StripeEncoder {
    archive: Bytes,
    layout: Layout,
    trailer: StreamTrailer,
    coder: RsStripeCoder,
}

impl StripeEncoder {
    /// Prepare the layout of `archive` under `params`
    pub fn new(archive: impl Into<Bytes>, params: CodecParams) -> Result<Self, Error> {
        params.validate()?;
        let archive = archive.into();
        let coder = RsStripeCoder::new(&params)?;
        let trailer = StreamTrailer::for_archive(&archive);
        let layout = Layout {
            archive_id: ArchiveId::derive(&params, trailer.archive_len, &trailer.digest),
            params,
            total_blocks: params.total_blocks_for(trailer.archive_len),
        };

        #[cfg(feature = "logging")]
        debug!(
            "Archive {}: {} bytes, {} data blocks, {} stripes of {}+{}",
            layout.archive_id,
            trailer.archive_len,
            layout.total_blocks,
            layout.stripe_count(),
            params.data_shards,
            params.parity_shards
        );

        Ok(Self {
            archive,
            layout,
            trailer,
            coder,
        })
    }

    /// Layout shared by every frame
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Content-derived archive id
    pub fn archive_id(&self) -> ArchiveId {
        self.layout.archive_id
    }

    /// Trailer stored in the last data block
    pub fn trailer(&self) -> &StreamTrailer {
        &self.trailer
    }

    /// Number of stripes
    pub fn stripe_count(&self) -> u64 {
        self.layout.stripe_count()
    }

    /// Data block `index` of the data region
    pub fn data_block(&self, index: u64) -> Vec<u8> {
        let block_size = self.layout.params.block_size;
        let mut block = vec![0u8; block_size];

        let len = self.archive.len() as u64;
        let start = index.saturating_mul(block_size as u64);
        if start < len {
            let end = (start + block_size as u64).min(len);
            block[..(end - start) as usize]
                .copy_from_slice(&self.archive[start as usize..end as usize]);
        }
        if index + 1 == self.layout.total_blocks {
            block[block_size - TRAILER_SIZE..].copy_from_slice(&self.trailer.to_bytes());
        }
        block
    }

    /// All `k + m` frames of one stripe, in slot order
    pub fn encode_stripe(&self, stripe: u64) -> Result<Vec<Frame>, Error> {
        if stripe >= self.stripe_count() {
            return Err(Error::InvalidCodecParameters(format!(
                "stripe {} out of range ({} stripes)",
                stripe,
                self.stripe_count()
            )));
        }

        let k = self.layout.params.data_shards;
        let block_size = self.layout.params.block_size;

        let mut payload_lens = Vec::with_capacity(k);
        let data: Vec<Vec<u8>> = (0..k)
            .map(|slot| match self.layout.slot_kind(stripe, slot) {
                SlotKind::Data(index) => {
                    payload_lens.push(expected_payload_len(
                        self.trailer.archive_len,
                        block_size,
                        index,
                    ));
                    self.data_block(index)
                }
                _ => {
                    payload_lens.push(0);
                    vec![0u8; block_size]
                }
            })
            .collect();
        let parity = self.coder.encode_parity(&data)?;

        let data_frames = data
            .into_iter()
            .zip(payload_lens)
            .enumerate()
            .map(|(slot, (block, len))| self.seal(stripe, slot, len, block));
        let parity_frames = parity
            .into_iter()
            .enumerate()
            .map(|(i, block)| self.seal(stripe, k + i, block_size as u32, block));

        Ok(data_frames.chain(parity_frames).collect())
    }

    /// Frames of a range of stripes, in (stripe, slot) order
    pub fn encode_stripes(&self, stripes: Range<u64>) -> Result<Vec<Frame>, Error> {
        let encoded = map_stripes(stripes, |s| self.encode_stripe(s));

        let mut frames = Vec::new();
        for stripe in encoded {
            frames.extend(stripe?);
        }
        Ok(frames)
    }

    /// Every frame of the archive, in (stripe, slot) order
    pub fn encode_all(&self) -> Result<Vec<Frame>, Error> {
        let frames = self.encode_stripes(0..self.stripe_count())?;

        #[cfg(feature = "logging")]
        info!(
            "Encoded archive {} into {} frames",
            self.layout.archive_id,
            frames.len()
        );

        Ok(frames)
    }

    fn seal(&self, stripe: u64, slot: usize, payload_len: u32, block: Vec<u8>) -> Frame {
        Frame::seal(
            FrameHeader::new(&self.layout, stripe, slot, payload_len),
            Bytes::from(block),
        )
    }
}

/// Encode an archive stream into frames
pub fn encode(stream: &ArchiveStream, params: &CodecParams) -> Result<Vec<Frame>, Error> {
    encode_bytes(stream.to_tar_bytes()?, params)
}

/// Encode raw archive bytes into frames
pub fn encode_bytes(archive: impl Into<Bytes>, params: &CodecParams) -> Result<Vec<Frame>, Error> {
    StripeEncoder::new(archive, *params)?.encode_all()
}

/// Stripes handled per unit of work between cancellation checks
pub fn batch_width() -> u64 {
    #[cfg(feature = "parallel")]
    {
        rayon::current_num_threads().max(1) as u64
    }
    #[cfg(not(feature = "parallel"))]
    {
        1
    }
}

/// Apply `f` to every stripe, results in stripe order
pub(crate) fn map_stripes<T, F>(stripes: Range<u64>, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(u64) -> T + Sync + Send,
{
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        stripes.into_par_iter().map(f).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        stripes.map(f).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::HEADER_SIZE;
    use crate::encoder::encode_frame;

    fn archive(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 131 % 251) as u8).collect()
    }

    #[test]
    fn test_trailer_wire_form() {
        let trailer = StreamTrailer::for_archive(b"abc");
        let bytes = trailer.to_bytes();
        assert_eq!(&bytes[..8], &3u64.to_be_bytes());
        assert_eq!(&bytes[8..], blake3::hash(b"abc").as_bytes());
        assert_eq!(StreamTrailer::parse(&bytes).unwrap(), trailer);
        assert!(StreamTrailer::parse(&bytes[..39]).is_err());
    }

    #[test]
    fn test_expected_payload_len() {
        assert_eq!(expected_payload_len(28_160, 4096, 0), 4096);
        assert_eq!(expected_payload_len(28_160, 4096, 6), 3584);
        assert_eq!(expected_payload_len(28_160, 4096, 7), 0);
        assert_eq!(expected_payload_len(0, 4096, 0), 0);
        assert_eq!(expected_payload_len(10, 4096, u64::MAX), 0);
    }

    #[test]
    fn test_two_stripe_layout() {
        let data = archive(28_160);
        let frames = encode_bytes(data.clone(), &CodecParams::new(4, 2, 4096)).unwrap();

        assert_eq!(frames.len(), 12);
        let positions: Vec<(u64, usize)> = frames.iter().map(Frame::position).collect();
        assert_eq!(positions[0], (0, 0));
        assert_eq!(positions[6], (1, 0));
        assert_eq!(positions[11], (1, 5));

        let lens: Vec<u32> = frames.iter().map(|f| f.header.payload_len).collect();
        assert_eq!(
            lens,
            [4096, 4096, 4096, 4096, 4096, 4096, 4096, 4096, 3584, 0, 4096, 4096]
        );

        for frame in &frames {
            assert!(frame.verify().is_ok());
            assert_eq!(encode_frame(frame).unwrap().len(), HEADER_SIZE + 4096);
        }

        // padding slot is zero, trailer closes block 6
        assert!(frames[9].payload.iter().all(|&b| b == 0));
        let last = &frames[8].payload;
        assert_eq!(&last[..3584], &data[6 * 4096..]);
        assert_eq!(
            StreamTrailer::parse(&last[4096 - TRAILER_SIZE..]).unwrap(),
            StreamTrailer::for_archive(&data)
        );
    }

    #[test]
    fn test_trailer_spills_into_own_block() {
        let params = CodecParams::new(2, 1, 64);
        let encoder = StripeEncoder::new(archive(60), params).unwrap();
        assert_eq!(encoder.layout().total_blocks, 2);

        let frames = encoder.encode_all().unwrap();
        assert_eq!(frames[0].header.payload_len, 60);
        assert_eq!(frames[1].header.payload_len, 0);
        assert_eq!(&frames[1].payload[..24], &[0u8; 24]);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let params = CodecParams::new(3, 2, 256);
        let a = encode_bytes(archive(5000), &params).unwrap();
        let b = encode_bytes(archive(5000), &params).unwrap();
        assert_eq!(a, b);

        let other = encode_bytes(archive(5000), &CodecParams::new(3, 3, 256)).unwrap();
        assert_ne!(a[0].archive_id(), other[0].archive_id());
    }

    #[test]
    fn test_empty_archive_single_block() {
        let frames = encode_bytes(Vec::new(), &CodecParams::new(4, 2, 64)).unwrap();
        assert_eq!(frames.len(), 6);
        assert_eq!(frames[0].header.total_blocks, 1);
        assert!(frames[..4].iter().all(|f| f.header.payload_len == 0));
    }

    #[test]
    fn test_stripe_batches_match_full_encode() {
        let encoder = StripeEncoder::new(archive(9000), CodecParams::new(2, 1, 512)).unwrap();
        let all = encoder.encode_all().unwrap();

        let mut batched = Vec::new();
        let mut start = 0;
        while start < encoder.stripe_count() {
            let end = (start + 3).min(encoder.stripe_count());
            batched.extend(encoder.encode_stripes(start..end).unwrap());
            start = end;
        }
        assert_eq!(batched, all);
        assert!(encoder.encode_stripe(encoder.stripe_count()).is_err());
    }

    #[test]
    fn test_invalid_params() {
        assert!(matches!(
            encode_bytes(archive(10), &CodecParams::new(0, 2, 4096)),
            Err(Error::InvalidCodecParameters(_))
        ));
    }
}
