//! Random rectangular masking of image batches.
//!
//! A mask rectangle is cut out of every image: the region is copied into a
//! separate "missing" patch tensor and zeroed in the masked copy. Pasting the
//! patch back at the same rectangle restores the original image exactly.

use std::ops::Range;

use anyhow::{ensure, Result};
use burn::prelude::*;
use rand::Rng;

/// Rows `y1..y2` and columns `x1..x2` of a masked region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskRect {
    pub y1: usize,
    pub y2: usize,
    pub x1: usize,
    pub x2: usize,
}
impl MaskRect {
    /// Index ranges of this rectangle inside a single-image `[1, C, H, W]` tensor.
    fn region(&self, channels: usize) -> [Range<usize>; 4] {
        [0..1, 0..channels, self.y1..self.y2, self.x1..self.x2]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskDims {
    pub img_rows: usize,
    pub img_cols: usize,
    pub mask_height: usize,
    pub mask_width: usize,
}
impl MaskDims {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.mask_height > 0 && self.mask_width > 0,
            "mask must be at least 1x1, got {}x{}",
            self.mask_height,
            self.mask_width
        );
        ensure!(
            self.mask_height < self.img_rows && self.mask_width < self.img_cols,
            "mask {}x{} does not fit strictly inside a {}x{} image",
            self.mask_height,
            self.mask_width,
            self.img_rows,
            self.img_cols
        );
        Ok(())
    }
}

/// Draws one rectangle per image. Top-left corners are uniform over
/// `[0, rows - mask_height) x [0, cols - mask_width)`.
///
/// # Panics
///
/// If the mask does not fit strictly inside the image. Check with
/// [`MaskDims::validate`] first.
pub fn sample_rects<R: Rng + ?Sized>(batch: usize, dims: MaskDims, rng: &mut R) -> Vec<MaskRect> {
    (0..batch)
        .map(|_| {
            let y1 = rng.random_range(0..dims.img_rows - dims.mask_height);
            let x1 = rng.random_range(0..dims.img_cols - dims.mask_width);
            MaskRect {
                y1,
                y2: y1 + dims.mask_height,
                x1,
                x2: x1 + dims.mask_width,
            }
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct MaskedBatch<B: Backend> {
    /// `[batch, channels, rows, cols]`, zero inside each rectangle.
    pub masked: Tensor<B, 4>,
    /// `[batch, channels, mask_height, mask_width]`, the cut-out regions.
    pub missing: Tensor<B, 4>,
    pub rects: Vec<MaskRect>,
}

/// Masks each image of `images` with a freshly sampled rectangle.
pub fn mask_randomly<B: Backend, R: Rng + ?Sized>(
    images: Tensor<B, 4>,
    dims: MaskDims,
    rng: &mut R,
) -> MaskedBatch<B> {
    let rects = sample_rects(images.dims()[0], dims, rng);
    mask_with(images, rects)
}

/// Masks image `i` with `rects[i]`.
pub fn mask_with<B: Backend>(images: Tensor<B, 4>, rects: Vec<MaskRect>) -> MaskedBatch<B> {
    let [batch, channels, _, _] = images.dims();
    assert_eq!(batch, rects.len(), "one rectangle per image");
    let device = images.device();

    let mut masked = Vec::with_capacity(batch);
    let mut missing = Vec::with_capacity(batch);
    for (i, rect) in rects.iter().enumerate() {
        let image = images.clone().slice([i..i + 1]);
        let region = rect.region(channels);

        let patch = image.clone().slice(region.clone());
        let hole = Tensor::zeros(patch.dims(), &device);

        masked.push(image.slice_assign(region, hole));
        missing.push(patch);
    }

    MaskedBatch {
        masked: Tensor::cat(masked, 0),
        missing: Tensor::cat(missing, 0),
        rects,
    }
}

/// Writes `patches[i]` into `images[i]` at `rects[i]`.
pub fn paste_patches<B: Backend>(
    images: Tensor<B, 4>,
    patches: Tensor<B, 4>,
    rects: &[MaskRect],
) -> Tensor<B, 4> {
    let [batch, channels, _, _] = images.dims();
    assert_eq!(batch, rects.len(), "one rectangle per image");
    assert_eq!(batch, patches.dims()[0], "one patch per image");

    let filled = rects
        .iter()
        .enumerate()
        .map(|(i, rect)| {
            let image = images.clone().slice([i..i + 1]);
            let patch = patches.clone().slice([i..i + 1]);
            image.slice_assign(rect.region(channels), patch)
        })
        .collect();

    Tensor::cat(filled, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TestBackend;
    use burn::tensor::Distribution;
    use rand::{rngs::StdRng, SeedableRng};

    const DIMS: MaskDims = MaskDims {
        img_rows: 32,
        img_cols: 32,
        mask_height: 8,
        mask_width: 8,
    };

    fn random_images(batch: usize) -> Tensor<TestBackend, 4> {
        Tensor::random(
            [batch, 3, 32, 32],
            Distribution::Uniform(-1.0, 1.0),
            &Default::default(),
        )
    }

    #[test]
    fn test_rects_stay_inside_image() {
        let mut rng = StdRng::seed_from_u64(7);
        for rect in sample_rects(1000, DIMS, &mut rng) {
            assert_eq!(rect.y2 - rect.y1, DIMS.mask_height);
            assert_eq!(rect.x2 - rect.x1, DIMS.mask_width);
            assert!(rect.y2 <= DIMS.img_rows);
            assert!(rect.x2 <= DIMS.img_cols);
        }
    }

    #[test]
    fn test_non_square_image_and_mask() {
        let dims = MaskDims {
            img_rows: 10,
            img_cols: 20,
            mask_height: 9,
            mask_width: 3,
        };
        let mut rng = StdRng::seed_from_u64(1);
        for rect in sample_rects(200, dims, &mut rng) {
            assert_eq!(rect.y1, 0);
            assert_eq!(rect.y2, 9);
            assert!(rect.x2 <= 20);
        }
    }

    #[test]
    fn test_validate_rejects_oversized_mask() {
        let dims = MaskDims {
            mask_height: 32,
            ..DIMS
        };
        assert!(dims.validate().is_err());
        assert!(MaskDims { mask_width: 0, ..DIMS }.validate().is_err());
        assert!(DIMS.validate().is_ok());
    }

    #[test]
    #[should_panic]
    fn test_sampling_unvalidated_full_size_mask_panics() {
        let dims = MaskDims {
            mask_height: 32,
            ..DIMS
        };
        assert!(dims.validate().is_err());

        let mut rng = StdRng::seed_from_u64(0);
        sample_rects(1, dims, &mut rng);
    }

    #[test]
    fn test_masked_batch_shapes() {
        let mut rng = StdRng::seed_from_u64(3);
        let batch = mask_randomly(random_images(5), DIMS, &mut rng);

        assert_eq!(batch.masked.dims(), [5, 3, 32, 32]);
        assert_eq!(batch.missing.dims(), [5, 3, 8, 8]);
        assert_eq!(batch.rects.len(), 5);
    }

    #[test]
    fn test_mask_zeroes_only_the_rectangle() {
        let images = Tensor::<TestBackend, 4>::ones([1, 3, 32, 32], &Default::default());
        let rect = MaskRect {
            y1: 4,
            y2: 12,
            x1: 20,
            x2: 28,
        };
        let batch = mask_with(images, vec![rect]);

        let values = batch.masked.into_data().to_vec::<f32>().unwrap();
        for c in 0..3 {
            for y in 0..32 {
                for x in 0..32 {
                    let inside = (4..12).contains(&y) && (20..28).contains(&x);
                    let expected = if inside { 0.0 } else { 1.0 };
                    assert_eq!(values[c * 32 * 32 + y * 32 + x], expected);
                }
            }
        }
        let missing = batch.missing.into_data().to_vec::<f32>().unwrap();
        assert!(missing.iter().all(|v| *v == 1.0));
    }

    #[test]
    fn test_paste_back_restores_original() {
        let images = random_images(4);
        let mut rng = StdRng::seed_from_u64(11);
        let batch = mask_randomly(images.clone(), DIMS, &mut rng);

        let restored = paste_patches(batch.masked, batch.missing, &batch.rects);

        assert_eq!(
            restored.into_data().to_vec::<f32>().unwrap(),
            images.into_data().to_vec::<f32>().unwrap()
        );
    }

    #[test]
    fn test_repeated_masking_stays_valid() {
        let images = random_images(2);
        let original = images.clone().into_data().to_vec::<f32>().unwrap();
        let mut rng = StdRng::seed_from_u64(5);

        for _ in 0..10 {
            let batch = mask_randomly(images.clone(), DIMS, &mut rng);
            for rect in &batch.rects {
                assert_eq!(rect.y2 - rect.y1, 8);
                assert_eq!(rect.x2 - rect.x1, 8);
                assert!(rect.y2 <= 32 && rect.x2 <= 32);
            }
        }

        assert_eq!(images.into_data().to_vec::<f32>().unwrap(), original);
    }
}
