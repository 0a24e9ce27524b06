//! N-dimensional work-size descriptor.

use crate::error::{EngineError, Result};

/// A 0/1/2/3-dimensional extent plus its cached total element count.
/// Immutable after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NDRange {
    sizes: [usize; 3],
    dimensions: u32,
    space: usize,
}

impl NDRange {
    pub fn empty() -> Self {
        Self {
            sizes: [0; 3],
            dimensions: 0,
            space: 0,
        }
    }

    pub fn new1(size0: usize) -> Self {
        Self {
            sizes: [size0, 0, 0],
            dimensions: 1,
            space: size0,
        }
    }

    pub fn new2(size0: usize, size1: usize) -> Self {
        Self {
            sizes: [size0, size1, 0],
            dimensions: 2,
            space: size0 * size1,
        }
    }

    pub fn new3(size0: usize, size1: usize, size2: usize) -> Self {
        Self {
            sizes: [size0, size1, size2],
            dimensions: 3,
            space: size0 * size1 * size2,
        }
    }

    pub fn dimensions(&self) -> u32 {
        self.dimensions
    }

    pub fn space(&self) -> usize {
        self.space
    }

    pub fn sizes(&self) -> &[usize; 3] {
        &self.sizes
    }

    /// Rejects ranges the scheduler cannot split. The core only ever splits
    /// along dimension 0 (Open Question (a) in the design notes): any range
    /// with a non-trivial extent in dimension 1 or 2 cannot be handed to a
    /// scheduler and is a configuration error.
    pub fn require_splittable(&self) -> Result<()> {
        if self.dimensions > 1 && (self.sizes[1] > 1 || self.sizes[2] > 1) {
            return Err(EngineError::UnsplittableRange(
                self.sizes[..self.dimensions as usize].to_vec(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_is_the_product_of_sizes() {
        assert_eq!(NDRange::new1(1024).space(), 1024);
        assert_eq!(NDRange::new2(4, 8).space(), 32);
        assert_eq!(NDRange::new3(2, 3, 4).space(), 24);
    }

    #[test]
    fn one_dimensional_range_is_splittable() {
        assert!(NDRange::new1(1024).require_splittable().is_ok());
    }

    #[test]
    fn multi_dimensional_range_is_rejected() {
        assert!(NDRange::new2(4, 8).require_splittable().is_err());
        assert!(NDRange::new3(2, 1, 1).require_splittable().is_ok());
    }
}
