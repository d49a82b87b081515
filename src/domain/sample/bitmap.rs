//! Fixed-size one-bit-per-pixel bitmaps

use std::fmt;

use crate::domain::DomainError;

/// Width of a sample bitmap in pixels
pub const SAMPLE_WIDTH: usize = 40;

/// Height of a sample bitmap in pixels
pub const SAMPLE_HEIGHT: usize = 20;

/// Row-major grid of bits
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BitGrid {
    width: usize,
    height: usize,
    bits: Vec<bool>,
}

impl BitGrid {
    /// Creates an all-zero grid
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            bits: vec![false; width * height],
        }
    }

    /// Creates an all-zero grid of the standard sample size
    pub fn sample() -> Self {
        Self::new(SAMPLE_WIDTH, SAMPLE_HEIGHT)
    }

    /// Builds a grid from row-major bits
    pub fn from_bits(width: usize, height: usize, bits: Vec<bool>) -> Result<Self, DomainError> {
        let expected = width * height;

        if bits.len() != expected {
            return Err(DomainError::size_mismatch(expected, bits.len()));
        }

        Ok(Self {
            width,
            height,
            bits,
        })
    }

    /// Builds a grid from one byte per pixel; any non-zero byte is a set pixel
    pub fn from_bytes(width: usize, height: usize, bytes: &[u8]) -> Result<Self, DomainError> {
        Self::from_bits(width, height, bytes.iter().map(|b| *b != 0).collect())
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of pixels
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn bits(&self) -> &[bool] {
        &self.bits
    }

    pub fn get(&self, x: usize, y: usize) -> Option<bool> {
        if x >= self.width || y >= self.height {
            return None;
        }

        Some(self.bits[y * self.width + x])
    }

    /// Sets a pixel; out-of-range coordinates are ignored
    pub fn set(&mut self, x: usize, y: usize, value: bool) {
        if x < self.width && y < self.height {
            self.bits[y * self.width + x] = value;
        }
    }

    pub fn count_ones(&self) -> usize {
        self.bits.iter().filter(|b| **b).count()
    }

    /// Flattens the grid row-major into one byte (0 or 1) per pixel
    pub fn to_bytes(&self) -> Vec<u8> {
        self.bits.iter().map(|b| u8::from(*b)).collect()
    }
}

impl fmt::Debug for BitGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "BitGrid {}x{}", self.width, self.height)?;

        for row in self.bits.chunks(self.width.max(1)) {
            let line: String = row.iter().map(|b| if *b { '#' } else { '.' }).collect();
            writeln!(f, "{}", line)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_dimensions() {
        let grid = BitGrid::sample();
        assert_eq!(grid.width(), 40);
        assert_eq!(grid.height(), 20);
        assert_eq!(grid.len(), 800);
        assert_eq!(grid.count_ones(), 0);
    }

    #[test]
    fn test_row_major_layout() {
        let mut grid = BitGrid::new(3, 2);
        grid.set(2, 0, true);
        grid.set(0, 1, true);

        assert_eq!(grid.to_bytes(), vec![0, 0, 1, 1, 0, 0]);
        assert_eq!(grid.get(2, 0), Some(true));
        assert_eq!(grid.get(3, 0), None);
    }

    #[test]
    fn test_from_bytes_size_mismatch() {
        let result = BitGrid::from_bytes(3, 2, &[0, 1, 0]);
        assert!(matches!(
            result,
            Err(DomainError::SizeMismatch {
                expected: 6,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_from_bytes_treats_nonzero_as_set() {
        let grid = BitGrid::from_bytes(2, 1, &[0, 255]).unwrap();
        assert_eq!(grid.bits(), &[false, true]);
    }
}
