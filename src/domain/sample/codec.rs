//! Compact text encoding for bitmap samples
//!
//! Wire layout: `base64( zlib(row-major pixel bytes) || [label byte] )`, where
//! each pixel byte is 0 or 1 and the optional trailing label byte is the
//! big-endian single-byte class index.

use std::io::{Read, Write};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};

use super::bitmap::{BitGrid, SAMPLE_HEIGHT, SAMPLE_WIDTH};
use super::label::{Label, LabelSet};
use crate::domain::DomainError;

/// Pure encoder/decoder pair for labeled bitmaps
#[derive(Debug, Clone)]
pub struct SampleCodec {
    labels: LabelSet,
    width: usize,
    height: usize,
}

impl SampleCodec {
    /// Creates a codec for the standard 40x20 sample size
    pub fn new(labels: LabelSet) -> Self {
        Self::with_size(labels, SAMPLE_WIDTH, SAMPLE_HEIGHT)
    }

    pub fn with_size(labels: LabelSet, width: usize, height: usize) -> Self {
        Self {
            labels,
            width,
            height,
        }
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Encodes a bitmap and optional label into a transport string
    pub fn encode(&self, grid: &BitGrid, label: Option<Label>) -> Result<String, DomainError> {
        if grid.width() != self.width || grid.height() != self.height {
            return Err(DomainError::size_mismatch(
                self.width * self.height,
                grid.len(),
            ));
        }

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&grid.to_bytes())
            .map_err(|e| DomainError::internal(format!("Failed to compress sample: {}", e)))?;
        let mut payload = encoder
            .finish()
            .map_err(|e| DomainError::internal(format!("Failed to compress sample: {}", e)))?;

        if let Some(label) = label {
            if !self.labels.contains(label) {
                return Err(DomainError::invalid_label(i64::from(label.value())));
            }
            payload.push(label.value());
        }

        Ok(STANDARD.encode(payload))
    }

    /// Decodes a transport string produced by `encode`
    pub fn decode(
        &self,
        encoded: &str,
        labeled: bool,
    ) -> Result<(BitGrid, Option<Label>), DomainError> {
        let mut payload = STANDARD
            .decode(encoded.trim())
            .map_err(|e| DomainError::decode(format!("Invalid base64: {}", e)))?;

        let label = if labeled {
            let byte = payload
                .pop()
                .ok_or_else(|| DomainError::decode("Labeled sample has no payload"))?;
            Some(self.labels.label(i64::from(byte))?)
        } else {
            None
        };

        let expected = self.width * self.height;
        let mut pixels = Vec::with_capacity(expected);

        // Reading one byte past the expected size is enough to detect oversize payloads
        ZlibDecoder::new(payload.as_slice())
            .take(expected as u64 + 1)
            .read_to_end(&mut pixels)
            .map_err(|e| DomainError::decode(format!("Failed to inflate sample: {}", e)))?;

        if pixels.len() != expected {
            return Err(DomainError::size_mismatch(expected, pixels.len()));
        }

        let grid = BitGrid::from_bytes(self.width, self.height, &pixels)?;

        Ok((grid, label))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn striped_grid(seed: usize) -> BitGrid {
        let mut grid = BitGrid::sample();

        for y in 0..SAMPLE_HEIGHT {
            for x in 0..SAMPLE_WIDTH {
                let v = (x * 7 + y * 13 + seed * 31) % 11;
                grid.set(x, y, v < 4);
            }
        }

        grid
    }

    #[test]
    fn test_round_trip_without_label() {
        let codec = SampleCodec::new(LabelSet::hello_world());
        let grid = striped_grid(1);

        let encoded = codec.encode(&grid, None).unwrap();
        let (decoded, label) = codec.decode(&encoded, false).unwrap();

        assert_eq!(decoded, grid);
        assert!(label.is_none());
    }

    #[test]
    fn test_round_trip_every_label() {
        let labels = LabelSet::flowers();
        let codec = SampleCodec::new(labels.clone());

        for (seed, label) in labels.labels().enumerate() {
            let grid = striped_grid(seed);
            let encoded = codec.encode(&grid, Some(label)).unwrap();
            let (decoded, decoded_label) = codec.decode(&encoded, true).unwrap();

            assert_eq!(decoded, grid);
            assert_eq!(decoded_label, Some(label));
        }
    }

    #[test]
    fn test_round_trip_edge_grids() {
        let codec = SampleCodec::new(LabelSet::hello_world());
        let empty = BitGrid::sample();
        let full = BitGrid::from_bits(SAMPLE_WIDTH, SAMPLE_HEIGHT, vec![true; 800]).unwrap();

        for grid in [empty, full] {
            let encoded = codec.encode(&grid, None).unwrap();
            assert_eq!(codec.decode(&encoded, false).unwrap().0, grid);
        }
    }

    #[test]
    fn test_label_zero_is_distinct_from_absent() {
        let codec = SampleCodec::new(LabelSet::hello_world());
        let grid = striped_grid(3);
        let zero = codec.labels().label(0).unwrap();

        let with_zero = codec.encode(&grid, Some(zero)).unwrap();
        let without = codec.encode(&grid, None).unwrap();

        assert_ne!(with_zero, without);
        assert_eq!(codec.decode(&with_zero, true).unwrap().1, Some(zero));
    }

    #[test]
    fn test_encode_is_deterministic() {
        let codec = SampleCodec::new(LabelSet::hello_world());
        let grid = striped_grid(5);
        let label = codec.labels().label(1).unwrap();

        assert_eq!(
            codec.encode(&grid, Some(label)).unwrap(),
            codec.encode(&grid, Some(label)).unwrap()
        );
    }

    #[test]
    fn test_decodes_externally_produced_sample() {
        // zlib level 6 output from a different producer, label byte 1
        let codec = SampleCodec::new(LabelSet::hello_world());
        let (grid, label) = codec
            .decode("eJxjZMQEDBQALMaNmjdq3pA1DwBTgwDJAQ==", true)
            .unwrap();

        assert_eq!(label.map(|l| l.value()), Some(1));
        assert_eq!(grid.count_ones(), 200);
        assert_eq!(grid.get(0, 0), Some(true));
        assert_eq!(grid.get(20, 0), Some(false));
        assert_eq!(grid.get(0, 1), Some(false));
    }

    #[test]
    fn test_malformed_base64() {
        let codec = SampleCodec::new(LabelSet::hello_world());
        let result = codec.decode("not base64 at all!", false);
        assert!(matches!(result, Err(DomainError::Decode { .. })));
    }

    #[test]
    fn test_inflate_failure() {
        let codec = SampleCodec::new(LabelSet::hello_world());
        let garbage = STANDARD.encode([1u8, 2, 3, 4, 5]);
        let result = codec.decode(&garbage, false);
        assert!(matches!(result, Err(DomainError::Decode { .. })));
    }

    #[test]
    fn test_size_mismatch_on_wrong_dimensions() {
        let small = SampleCodec::with_size(LabelSet::hello_world(), 10, 10);
        let encoded = small.encode(&BitGrid::new(10, 10), None).unwrap();

        let codec = SampleCodec::new(LabelSet::hello_world());
        let result = codec.decode(&encoded, false);
        assert!(matches!(
            result,
            Err(DomainError::SizeMismatch {
                expected: 800,
                actual: 100
            })
        ));
    }

    #[test]
    fn test_label_outside_enumeration() {
        let flowers = SampleCodec::new(LabelSet::flowers());
        let roses = flowers.labels().label(4).unwrap();
        let encoded = flowers.encode(&striped_grid(0), Some(roses)).unwrap();

        let binary = SampleCodec::new(LabelSet::hello_world());
        let result = binary.decode(&encoded, true);
        assert!(matches!(result, Err(DomainError::InvalidLabel { value: 4 })));
    }

    #[test]
    fn test_empty_labeled_payload() {
        let codec = SampleCodec::new(LabelSet::hello_world());
        let result = codec.decode("", true);
        assert!(matches!(result, Err(DomainError::Decode { .. })));
    }
}
