use anyhow::{anyhow, ensure, Result};
use burn::prelude::*;
use image::{imageops::FilterType, RgbImage};
use std::path::Path;

/// Maps model output in `[-1, 1]` to the display range `[0, 1]`.
pub fn to_display_range<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Tensor<B, D> {
    tensor * 0.5 + 0.5
}

/// Converts a `[3, H, W]` tensor with values in `[0, 1]` to an RGB image.
pub fn tensor_to_image<B: Backend>(image: Tensor<B, 3>) -> Result<RgbImage> {
    let [channels, height, width] = image.dims();
    ensure!(channels == 3, "expected 3 channels, got {channels}");

    let values = image
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| anyhow!("unable to read image tensor: {e:?}"))?;
    let plane = height * width;

    // [C, H, W] -> interleaved [H, W, C]
    let pixels = (0..plane)
        .flat_map(|i| (0..channels).map(move |c| c * plane + i))
        .map(|idx| (values[idx] * 255.0).clamp(0.0, 255.0) as u8)
        .collect::<Vec<_>>();

    RgbImage::from_raw(width as u32, height as u32, pixels)
        .ok_or_else(|| anyhow!("pixel buffer does not match {width}x{height}"))
}

/// Upscales `image` by `scale` with bicubic filtering and writes it to `path`.
pub fn save_scaled<Q: AsRef<Path>>(image: &RgbImage, scale: u32, path: Q) -> Result<()> {
    let resized = image::imageops::resize(
        image,
        image.width() * scale,
        image.height() * scale,
        FilterType::CatmullRom,
    );
    resized.save(path.as_ref())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TestBackend;

    #[test]
    fn test_display_range() {
        let device = Default::default();
        let tensor = Tensor::<TestBackend, 1>::from_floats([-1.0, 0.0, 1.0], &device);

        let values = to_display_range(tensor).into_data().to_vec::<f32>().unwrap();
        assert_eq!(values, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_tensor_to_image_interleaves_channels() {
        let device = Default::default();
        // red plane 1.0, green plane 0.0, blue plane 0.5
        let tensor = Tensor::<TestBackend, 1>::from_floats(
            [1.0, 1.0, 0.0, 0.0, 0.5, 0.5],
            &device,
        )
        .reshape([3, 1, 2]);

        let image = tensor_to_image(tensor).unwrap();

        assert_eq!(image.dimensions(), (2, 1));
        assert_eq!(image.get_pixel(0, 0).0, [255, 0, 127]);
        assert_eq!(image.get_pixel(1, 0).0, [255, 0, 127]);
    }

    #[test]
    fn test_save_scaled_doubles_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.png");
        let image = RgbImage::from_pixel(3, 2, image::Rgb([1, 2, 3]));

        save_scaled(&image, 2, &path).unwrap();

        let saved = image::open(&path).unwrap();
        assert_eq!((saved.width(), saved.height()), (6, 4));
    }
}
