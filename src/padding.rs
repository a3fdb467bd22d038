//! PKCS7-style block padding for WeChat message envelopes.
//!
//! WeChat pads the plaintext envelope to a 32-byte boundary before AES
//! encryption (the cipher itself runs with auto-padding disabled), using
//! the usual "pad value equals pad length" convention. Unpadding is
//! deliberately lenient: an out-of-range final byte means "no padding"
//! rather than an error, matching the platform's reference implementations.

/// Block padder with a configurable block size (WeChat uses 32).
#[derive(Debug, Clone, Copy)]
pub struct Pkcs7Padding {
    block_size: usize,
}

impl Default for Pkcs7Padding {
    fn default() -> Self {
        Self::new(32)
    }
}

impl Pkcs7Padding {
    /// Create a padder for the given block size.
    ///
    /// # Panics
    ///
    /// Panics if `block_size` is outside `1..=255`: pad bytes carry the pad
    /// length, so it must fit in a single byte.
    pub fn new(block_size: usize) -> Self {
        assert!(
            block_size >= 1 && block_size <= 255,
            "block size must be in 1..=255"
        );
        Self { block_size }
    }

    /// Pad `data` to a multiple of the block size.
    ///
    /// Always appends at least one byte: input already on a block boundary
    /// gains a full extra block.
    pub fn pad(&self, data: &[u8]) -> Vec<u8> {
        let amount = self.block_size - data.len() % self.block_size;
        let mut out = Vec::with_capacity(data.len() + amount);
        out.extend_from_slice(data);
        out.resize(data.len() + amount, amount as u8);
        out
    }

    /// Strip padding from `data`.
    ///
    /// The final byte is read as the pad length; values outside
    /// `1..=block_size`, or larger than the buffer itself, are treated as
    /// zero (nothing stripped). Total over every input, never errors.
    pub fn unpad<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        let pad = match data.last() {
            Some(&b)
                if b as usize >= 1 && b as usize <= self.block_size && b as usize <= data.len() =>
            {
                b as usize
            }
            _ => 0,
        };
        &data[..data.len() - pad]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pad_fills_to_block_boundary() {
        let p = Pkcs7Padding::new(32);
        let padded = p.pad(b"hello");
        assert_eq!(padded.len(), 32);
        assert_eq!(padded[5..], [27u8; 27]);
    }

    #[test]
    fn aligned_input_gains_full_block() {
        let p = Pkcs7Padding::new(16);
        let padded = p.pad(&[0xAAu8; 16]);
        assert_eq!(padded.len(), 32);
        assert_eq!(padded[16..], [16u8; 16]);
    }

    #[test]
    fn unpad_roundtrip_across_block_sizes() {
        for block in [16usize, 32] {
            let p = Pkcs7Padding::new(block);
            for len in 1..=(2 * block + 1) {
                let data: Vec<u8> = (0..len).map(|i| (i % 7) as u8 + 1).collect();
                let padded = p.pad(&data);
                assert_eq!(padded.len() % block, 0);
                assert_eq!(p.unpad(&padded), &data[..]);
            }
        }
    }

    #[test]
    fn unpad_out_of_range_byte_strips_nothing() {
        let p = Pkcs7Padding::new(32);
        // 0 and values above the block size are both "no padding"
        assert_eq!(p.unpad(&[1, 2, 3, 0]), &[1, 2, 3, 0]);
        assert_eq!(p.unpad(&[1, 2, 3, 40]), &[1, 2, 3, 40]);
        // 32 is in range for block size 32
        let mut buf = vec![7u8; 4];
        buf.extend_from_slice(&[32u8; 32]);
        assert_eq!(p.unpad(&buf), &[7u8; 4]);
    }

    #[test]
    fn unpad_candidate_larger_than_buffer_strips_nothing() {
        // in-range pad byte, but the buffer is shorter than it claims
        let p = Pkcs7Padding::new(32);
        assert_eq!(p.unpad(&[20u8; 16]), &[20u8; 16]);
        // a 1-byte buffer that is all padding is still stripped
        assert_eq!(p.unpad(&[1u8]), &[] as &[u8]);
        // but a claim of 2 exceeds the buffer
        assert_eq!(p.unpad(&[2u8]), &[2u8]);
    }

    #[test]
    fn unpad_empty_is_empty() {
        let p = Pkcs7Padding::default();
        assert_eq!(p.unpad(&[]), &[] as &[u8]);
    }

    #[test]
    #[should_panic(expected = "block size must be in 1..=255")]
    fn zero_block_size_is_rejected() {
        let _ = Pkcs7Padding::new(0);
    }
}
