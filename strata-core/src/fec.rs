//! Forward Error Correction for one stripe
//!
//! A stripe holds `k` data blocks followed by `m` parity blocks. Parity is a
//! systematic Reed-Solomon code over GF(256): every parity block is a fixed
//! linear combination of the data blocks, so any `k` of the `k + m` blocks
//! determine the rest. Loss is handled as erasure: callers detect damaged
//! blocks by checksum and pass them as missing.

use crate::error::Error;
use crate::types::CodecParams;
use reed_solomon_erasure::galois_8::ReedSolomon;

/// Trait for computing parity over a stripe of data blocks
pub trait RedundancyEncoder {
    /// Compute the parity blocks for `data`
    ///
    /// # Arguments
    /// * `data` - Exactly `k` data blocks of equal length
    ///
    /// # Returns
    /// `m` parity blocks, each as long as a data block
    fn encode_parity(&self, data: &[Vec<u8>]) -> Result<Vec<Vec<u8>>, Error>;
}

/// Trait for recovering missing data blocks of a stripe
pub trait RedundancyDecoder {
    /// Fill every missing data slot of `shards` in place
    ///
    /// # Arguments
    /// * `shards` - `k + m` slots in stripe order; `None` marks a missing block
    ///
    /// Parity slots are not restored.
    fn recover_data(&self, shards: &mut [Option<Vec<u8>>]) -> Result<(), Error>;

    /// Check if `available` blocks are enough to recover the stripe
    fn can_reconstruct(&self, available: usize) -> bool;
}

/// Reed-Solomon stripe coder with a precomputed coding matrix
pub struct RsStripeCoder {
    data_shards: usize,
    parity_shards: usize,
    inner: ReedSolomon,
}

impl RsStripeCoder {
    /// Build the coder for validated parameters
    pub fn new(params: &CodecParams) -> Result<Self, Error> {
        params.validate()?;
        let inner = ReedSolomon::new(params.data_shards, params.parity_shards)
            .map_err(|e| Error::InvalidCodecParameters(format!("reed-solomon: {e:?}")))?;
        Ok(Self {
            data_shards: params.data_shards,
            parity_shards: params.parity_shards,
            inner,
        })
    }

    /// Data blocks per stripe
    pub fn data_shards(&self) -> usize {
        self.data_shards
    }

    /// Parity blocks per stripe
    pub fn parity_shards(&self) -> usize {
        self.parity_shards
    }
}

impl std::fmt::Debug for RsStripeCoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RsStripeCoder")
            .field("data_shards", &self.data_shards)
            .field("parity_shards", &self.parity_shards)
            .finish()
    }
}

impl RedundancyEncoder for RsStripeCoder {
    fn encode_parity(&self, data: &[Vec<u8>]) -> Result<Vec<Vec<u8>>, Error> {
        if data.len() != self.data_shards {
            return Err(Error::InvalidCodecParameters(format!(
                "expected {} data blocks, got {}",
                self.data_shards,
                data.len()
            )));
        }
        let block_len = data.first().map_or(0, Vec::len);

        let mut shards: Vec<Vec<u8>> = Vec::with_capacity(self.data_shards + self.parity_shards);
        shards.extend(data.iter().cloned());
        shards.extend((0..self.parity_shards).map(|_| vec![0u8; block_len]));

        self.inner
            .encode(&mut shards)
            .map_err(|e| Error::InvalidCodecParameters(format!("reed-solomon: {e:?}")))?;

        Ok(shards.split_off(self.data_shards))
    }
}

impl RedundancyDecoder for RsStripeCoder {
    fn recover_data(&self, shards: &mut [Option<Vec<u8>>]) -> Result<(), Error> {
        let available = shards.iter().filter(|s| s.is_some()).count();
        if !self.can_reconstruct(available) {
            return Err(Error::InsufficientFrames {
                stripe: 0,
                available,
                required: self.data_shards,
            });
        }
        if shards[..self.data_shards].iter().all(Option::is_some) {
            return Ok(());
        }

        self.inner
            .reconstruct_data(shards)
            .map_err(|e| Error::CorruptArchive(format!("reed-solomon: {e:?}")))
    }

    fn can_reconstruct(&self, available: usize) -> bool {
        available >= self.data_shards
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stripe(k: usize, len: usize) -> Vec<Vec<u8>> {
        (0..k)
            .map(|i| (0..len).map(|j| (i * 31 + j * 7) as u8).collect())
            .collect()
    }

    #[test]
    fn test_parity_shape() {
        let coder = RsStripeCoder::new(&CodecParams::new(4, 2, 64)).unwrap();
        let parity = coder.encode_parity(&stripe(4, 64)).unwrap();
        assert_eq!(parity.len(), 2);
        assert!(parity.iter().all(|p| p.len() == 64));
    }

    #[test]
    fn test_recover_every_double_erasure() {
        let (k, m) = (4, 2);
        let coder = RsStripeCoder::new(&CodecParams::new(k, m, 64)).unwrap();
        let data = stripe(k, 64);
        let parity = coder.encode_parity(&data).unwrap();
        let full: Vec<Vec<u8>> = data.iter().chain(parity.iter()).cloned().collect();

        for a in 0..k + m {
            for b in a + 1..k + m {
                let mut shards: Vec<Option<Vec<u8>>> = full.iter().cloned().map(Some).collect();
                shards[a] = None;
                shards[b] = None;
                coder.recover_data(&mut shards).unwrap();
                for i in 0..k {
                    assert_eq!(shards[i].as_deref(), Some(&data[i][..]), "lost {a},{b}");
                }
            }
        }
    }

    #[test]
    fn test_too_many_erasures() {
        let coder = RsStripeCoder::new(&CodecParams::new(4, 2, 64)).unwrap();
        let data = stripe(4, 64);
        let parity = coder.encode_parity(&data).unwrap();
        let mut shards: Vec<Option<Vec<u8>>> =
            data.into_iter().chain(parity).map(Some).collect();
        shards[0] = None;
        shards[1] = None;
        shards[5] = None;

        assert!(!coder.can_reconstruct(3));
        assert!(matches!(
            coder.recover_data(&mut shards),
            Err(Error::InsufficientFrames { .. })
        ));
    }

    #[test]
    fn test_rejects_oversized_stripe() {
        assert!(matches!(
            RsStripeCoder::new(&CodecParams::new(250, 6, 64)),
            Err(Error::InvalidCodecParameters(_))
        ));
    }
}
