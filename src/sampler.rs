use anyhow::{anyhow, Context, Result};
use burn::{
    config::Config,
    module::Module,
    record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder},
    tensor::{backend::AutodiffBackend, Tensor},
};
use rand::Rng;
use std::path::Path;

use crate::{
    masking::{mask_randomly, paste_patches, MaskDims},
    model::{
        discriminator::{DiscriminatorConfig, DiscriminatorRecord},
        generator::{GeneratorConfig, GeneratorRecord},
    },
    training::InpaintingGan,
    utils::{save_scaled, tensor_to_image, to_display_range},
};

pub const SAMPLE_KINDS: [&str; 3] = ["original", "masked", "predicted"];
pub const GENERATOR_NAME: &str = "generator";
pub const DISCRIMINATOR_NAME: &str = "discriminator";

/// Masks `images`, fills the holes with the generator, and writes
/// `images/{original,masked,predicted}/{iteration}_{kind}_{index}.png` under `outdir`.
pub fn sample_images<B: AutodiffBackend, R: Rng + ?Sized>(
    gan: &InpaintingGan<B>,
    iteration: usize,
    images: Tensor<B, 4>,
    dims: MaskDims,
    outdir: &Path,
    scale: u32,
    rng: &mut R,
) -> Result<()> {
    for kind in SAMPLE_KINDS {
        let dir = outdir.join("images").join(kind);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    let batch = mask_randomly(images.clone(), dims, rng);
    let gen_missing = gan.predict(batch.masked.clone());

    let originals = to_display_range(images);
    let masked = to_display_range(batch.masked);
    let filled = paste_patches(masked.clone(), to_display_range(gen_missing), &batch.rects);

    for (kind, tensor) in SAMPLE_KINDS.into_iter().zip([originals, masked, filled]) {
        for i in 0..batch.rects.len() {
            let image: Tensor<B, 3> = tensor.clone().slice([i..i + 1]).squeeze(0);
            let image = tensor_to_image(image)?;

            let path = outdir
                .join("images")
                .join(kind)
                .join(format!("{iteration}_{kind}_{i}.png"));
            save_scaled(&image, scale, &path)
                .with_context(|| format!("failed to write {}", path.display()))?;
        }
    }

    Ok(())
}

fn recorder() -> NamedMpkFileRecorder<FullPrecisionSettings> {
    NamedMpkFileRecorder::<FullPrecisionSettings>::new()
}

/// Writes `<name>.json` (architecture) and `<name>_weights.mpk` for both
/// networks into `dir`, replacing any earlier save.
pub fn save_models<B: AutodiffBackend>(gan: &InpaintingGan<B>, dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;
    let recorder = recorder();

    let model_config = gan.model_config();

    model_config
        .generator_config
        .save(dir.join(format!("{GENERATOR_NAME}.json")))?;
    recorder.record(
        gan.generator().clone().into_record(),
        dir.join(format!("{GENERATOR_NAME}_weights")),
    )?;

    model_config
        .discriminator_config
        .save(dir.join(format!("{DISCRIMINATOR_NAME}.json")))?;
    recorder.record(
        gan.discriminator().clone().into_record(),
        dir.join(format!("{DISCRIMINATOR_NAME}_weights")),
    )?;

    Ok(())
}

/// Reads the architecture descriptions written by [`save_models`].
pub fn load_architectures(dir: &Path) -> Result<(GeneratorConfig, DiscriminatorConfig)> {
    let path = dir.join(format!("{GENERATOR_NAME}.json"));
    let generator = GeneratorConfig::load(&path)
        .map_err(|e| anyhow!("failed to load {}: {e:?}", path.display()))?;
    let path = dir.join(format!("{DISCRIMINATOR_NAME}.json"));
    let discriminator = DiscriminatorConfig::load(&path)
        .map_err(|e| anyhow!("failed to load {}: {e:?}", path.display()))?;

    Ok((generator, discriminator))
}

/// Restores both networks' weights from a directory written by [`save_models`].
pub fn load_models<B: AutodiffBackend>(
    gan: &mut InpaintingGan<B>,
    dir: &Path,
    device: &B::Device,
) -> Result<()> {
    let recorder = recorder();

    let path = dir.join(format!("{GENERATOR_NAME}_weights"));
    let record = recorder
        .load::<GeneratorRecord<B>>(path.clone(), device)
        .with_context(|| format!("failed to load generator weights from {}", path.display()))?;
    gan.generator = gan.generator.clone().load_record(record);

    let path = dir.join(format!("{DISCRIMINATOR_NAME}_weights"));
    let record = recorder
        .load::<DiscriminatorRecord<B>>(path.clone(), device)
        .with_context(|| {
            format!("failed to load discriminator weights from {}", path.display())
        })?;
    gan.discriminator = gan.discriminator.clone().load_record(record);

    Ok(())
}
