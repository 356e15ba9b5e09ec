use anyhow::{anyhow, ensure, Context, Result};
use burn::{
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    prelude::*,
    tensor::TensorData,
};
use image::imageops::FilterType;
use rand::Rng;
use std::path::Path;
use walkdir::WalkDir;

pub const CIFAR_BATCH_FILES: [&str; 5] = [
    "data_batch_1.bin",
    "data_batch_2.bin",
    "data_batch_3.bin",
    "data_batch_4.bin",
    "data_batch_5.bin",
];
pub const CIFAR_SIDE: usize = 32;
const CIFAR_PIXELS: usize = 3 * CIFAR_SIDE * CIFAR_SIDE;
const CIFAR_RECORD: usize = 1 + CIFAR_PIXELS;

// ////////////////////////////////////////////////////////////////////////////
// Dataset
/// One image as raw `u8` pixels in channel-planar `[C, H, W]` order.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageItem {
    pub pixels: Vec<u8>,
    pub label: u8,
}

#[derive(Debug, Clone)]
pub struct InpaintDataset {
    items: Vec<ImageItem>,
    /// `[channels, rows, cols]` shared by every item.
    shape: [usize; 3],
}

impl InpaintDataset {
    pub fn from_items(items: Vec<ImageItem>, shape: [usize; 3]) -> Result<Self> {
        let expected = shape.iter().product::<usize>();
        for (i, item) in items.iter().enumerate() {
            ensure!(
                item.pixels.len() == expected,
                "item {} has {} pixel values, expected {} for shape {:?}",
                i,
                item.pixels.len(),
                expected,
                shape
            );
        }

        Ok(Self { items, shape })
    }

    /// Reads the CIFAR-10 binary training batches in `root`, keeping only `classes`.
    pub fn cifar10<P: AsRef<Path>>(root: P, classes: &[u8]) -> Result<Self> {
        let mut items = Vec::new();
        for file in CIFAR_BATCH_FILES {
            let path = root.as_ref().join(file);
            let bytes = std::fs::read(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let records = parse_cifar_records(&bytes, classes)
                .with_context(|| format!("failed to parse {}", path.display()))?;
            items.extend(records);
        }

        // group by class in the order given, matching a per-class concatenation
        items.sort_by_key(|item| classes.iter().position(|c| *c == item.label));

        Self::from_items(items, [3, CIFAR_SIDE, CIFAR_SIDE])
    }

    /// Loads every png/jpg under `root`, resized to `rows` x `cols`. Items get label 0.
    pub fn image_folder<P: AsRef<Path>>(root: P, rows: usize, cols: usize) -> Result<Self> {
        let mut items = Vec::new();
        for entry in WalkDir::new(root.as_ref()).into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            if let Some(ext) = path.extension() {
                if matches!(
                    ext.to_str().map(str::to_ascii_lowercase).as_deref(),
                    Some("jpg") | Some("jpeg") | Some("png")
                ) {
                    let image = image::open(path)
                        .with_context(|| format!("failed to load {}", path.display()))?
                        .to_rgb8();
                    let image = image::imageops::resize(
                        &image,
                        cols as u32,
                        rows as u32,
                        FilterType::Triangle,
                    );
                    items.push(ImageItem {
                        pixels: interleaved_to_planar(image.as_raw(), 3),
                        label: 0,
                    });
                }
            }
        }

        Self::from_items(items, [3, rows, cols])
    }

    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }
}

impl Dataset<ImageItem> for InpaintDataset {
    fn get(&self, index: usize) -> Option<ImageItem> {
        self.items.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

/// Parses raw CIFAR-10 records (1 label byte + 3072 planar RGB bytes each).
pub fn parse_cifar_records(bytes: &[u8], classes: &[u8]) -> Result<Vec<ImageItem>> {
    ensure!(
        bytes.len() % CIFAR_RECORD == 0,
        "{} bytes is not a whole number of {}-byte records",
        bytes.len(),
        CIFAR_RECORD
    );

    Ok(bytes
        .chunks_exact(CIFAR_RECORD)
        .filter(|record| classes.contains(&record[0]))
        .map(|record| ImageItem {
            label: record[0],
            pixels: record[1..].to_vec(),
        })
        .collect())
}

/// `[H, W, C]` interleaved pixels to `[C, H, W]`.
fn interleaved_to_planar(pixels: &[u8], channels: usize) -> Vec<u8> {
    (0..channels)
        .flat_map(|c| pixels.iter().skip(c).step_by(channels).copied())
        .collect()
}

// ////////////////////////////////////////////////////////////////////////////
// Batcher
#[derive(Debug, Clone)]
pub struct ImageBatch<B: Backend> {
    /// `[batch, channels, rows, cols]` scaled to `[-1, 1]`.
    pub images: Tensor<B, 4>,
    pub size: usize,
}

#[derive(Debug, Clone)]
pub struct ImageBatcher {
    shape: [usize; 3],
}
impl ImageBatcher {
    pub fn new(shape: [usize; 3]) -> Self {
        Self { shape }
    }
}
impl<B: Backend> Batcher<B, ImageItem, ImageBatch<B>> for ImageBatcher {
    fn batch(&self, items: Vec<ImageItem>, device: &B::Device) -> ImageBatch<B> {
        let [channels, rows, cols] = self.shape;
        let size = items.len();

        let values = items
            .iter()
            .flat_map(|item| item.pixels.iter().map(|p| *p as f32 / 127.5 - 1.0))
            .collect::<Vec<_>>();
        let images = Tensor::from_data(
            TensorData::new(values, [size, channels, rows, cols]),
            device,
        );

        ImageBatch { images, size }
    }
}

/// Draws `size` items uniformly with replacement and batches them.
pub fn random_batch<B: Backend, D: Dataset<ImageItem>, R: Rng + ?Sized>(
    dataset: &D,
    batcher: &ImageBatcher,
    size: usize,
    rng: &mut R,
    device: &B::Device,
) -> Result<ImageBatch<B>> {
    ensure!(!dataset.is_empty(), "cannot draw a batch from an empty dataset");

    let items = (0..size)
        .map(|_| {
            let index = rng.random_range(0..dataset.len());
            dataset
                .get(index)
                .ok_or_else(|| anyhow!("dataset has no item at index {index}"))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(batcher.batch(items, device))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TestBackend;
    use rand::{rngs::StdRng, SeedableRng};

    fn record(label: u8, value: u8) -> Vec<u8> {
        let mut bytes = vec![label];
        bytes.extend(std::iter::repeat_n(value, CIFAR_PIXELS));
        bytes
    }

    #[test]
    fn test_parse_filters_classes() {
        let bytes = [record(3, 10), record(1, 20), record(5, 30), record(3, 40)].concat();

        let items = parse_cifar_records(&bytes, &[3, 5]).unwrap();

        assert_eq!(
            items.iter().map(|i| i.label).collect::<Vec<_>>(),
            vec![3, 5, 3]
        );
        assert_eq!(items[1].pixels.len(), CIFAR_PIXELS);
        assert!(items[1].pixels.iter().all(|p| *p == 30));
    }

    #[test]
    fn test_parse_rejects_truncated_record() {
        let mut bytes = record(3, 0);
        bytes.pop();

        assert!(parse_cifar_records(&bytes, &[3]).is_err());
    }

    #[test]
    fn test_cifar_dir_concatenates_classes() {
        let dir = tempfile::tempdir().unwrap();
        for (i, file) in CIFAR_BATCH_FILES.iter().enumerate() {
            let bytes = [record(5, i as u8), record(3, i as u8), record(9, 0)].concat();
            std::fs::write(dir.path().join(file), bytes).unwrap();
        }

        let dataset = InpaintDataset::cifar10(dir.path(), &[3, 5]).unwrap();

        assert_eq!(dataset.len(), 10);
        assert!((0..5).all(|i| dataset.get(i).unwrap().label == 3));
        assert!((5..10).all(|i| dataset.get(i).unwrap().label == 5));
    }

    #[test]
    fn test_cifar_dir_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(InpaintDataset::cifar10(dir.path(), &[3, 5]).is_err());
    }

    #[test]
    fn test_image_folder_resizes_and_splits_channels() {
        let dir = tempfile::tempdir().unwrap();
        let image = image::RgbImage::from_pixel(4, 4, image::Rgb([255, 0, 128]));
        image.save(dir.path().join("a.png")).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let dataset = InpaintDataset::image_folder(dir.path(), 2, 2).unwrap();

        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.shape(), [3, 2, 2]);
        assert_eq!(
            dataset.get(0).unwrap().pixels,
            vec![255, 255, 255, 255, 0, 0, 0, 0, 128, 128, 128, 128]
        );
    }

    #[test]
    fn test_from_items_rejects_wrong_size() {
        let item = ImageItem {
            pixels: vec![0; 5],
            label: 0,
        };
        assert!(InpaintDataset::from_items(vec![item], [3, 2, 2]).is_err());
    }

    #[test]
    fn test_batcher_rescales_to_unit_range() {
        let items = vec![
            ImageItem {
                pixels: vec![0; 12],
                label: 0,
            },
            ImageItem {
                pixels: vec![255; 12],
                label: 0,
            },
        ];
        let batcher = ImageBatcher::new([3, 2, 2]);

        let batch: ImageBatch<TestBackend> = batcher.batch(items, &Default::default());

        assert_eq!(batch.size, 2);
        assert_eq!(batch.images.dims(), [2, 3, 2, 2]);
        let values = batch.images.into_data().to_vec::<f32>().unwrap();
        assert!(values[..12].iter().all(|v| (*v + 1.0).abs() < 1e-6));
        assert!(values[12..].iter().all(|v| (*v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_random_batch_from_empty_dataset() {
        let dataset = InpaintDataset::from_items(vec![], [3, 2, 2]).unwrap();
        let mut rng = StdRng::seed_from_u64(0);

        let batch = random_batch::<TestBackend, _, _>(
            &dataset,
            &ImageBatcher::new([3, 2, 2]),
            4,
            &mut rng,
            &Default::default(),
        );
        assert!(batch.is_err());
    }
}
