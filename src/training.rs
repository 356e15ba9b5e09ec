use anyhow::{ensure, Result};
use burn::{
    config::Config,
    module::{AutodiffModule, Module},
    nn::loss::{BinaryCrossEntropyLoss, BinaryCrossEntropyLossConfig, MseLoss, Reduction},
    optim::{adaptor::OptimizerAdaptor, Adam, AdamConfig, GradientsParams, Optimizer},
    tensor::{backend::AutodiffBackend, cast::ToElement, Int, Tensor},
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::path::Path;

use crate::{
    data::{random_batch, ImageBatcher, InpaintDataset},
    masking::{mask_randomly, MaskDims},
    model::{
        discriminator::{Discriminator, DiscriminatorConfig},
        generator::{Generator, GeneratorConfig},
        ModelConfig,
    },
    sampler::sample_images,
};

// ////////////////////////////////////////////////////////////////////////////
// Helpers
/// Target label of a discriminator half-batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Validity {
    Real,
    Fake,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DiscriminatorStep {
    pub loss: f32,
    pub accuracy: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeneratorLoss {
    /// Weighted sum that was minimised.
    pub total: f32,
    /// Mean squared error against the true patch.
    pub reconstruction: f32,
    /// Binary cross-entropy of the discriminator's verdict against "real".
    pub adversarial: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IterationStats {
    /// Mean of the real and fake discriminator steps.
    pub discriminator: DiscriminatorStep,
    pub generator: GeneratorLoss,
}

fn targets<B: AutodiffBackend>(
    size: usize,
    validity: Validity,
    device: &B::Device,
) -> Tensor<B, 2, Int> {
    match validity {
        Validity::Real => Tensor::ones([size, 1], device),
        Validity::Fake => Tensor::zeros([size, 1], device),
    }
}

// ////////////////////////////////////////////////////////////////////////////
// Training
#[derive(Config)]
pub struct TrainingConfig {
    pub model_config: ModelConfig,
    pub gen_optimizer: AdamConfig,
    pub disc_optimizer: AdamConfig,

    #[config(default = 1680)]
    pub iterations: usize,
    #[config(default = 64)]
    pub batch_size: usize,
    /// Save sample images every `sample_interval` iterations
    #[config(default = 50)]
    pub sample_interval: usize,
    #[config(default = 6)]
    pub sample_count: usize,
    #[config(default = 2)]
    pub scale_factor: u32,
    #[config(default = 2e-4)]
    pub lr: f64,
    #[config(default = 0.999)]
    pub reconstruction_weight: f32,
    #[config(default = 0.001)]
    pub adversarial_weight: f32,
    #[config(default = 32)]
    pub img_rows: usize,
    #[config(default = 32)]
    pub img_cols: usize,
    #[config(default = 8)]
    pub mask_height: usize,
    #[config(default = 8)]
    pub mask_width: usize,
    /// Dataset labels kept for training (cat and dog in CIFAR-10)
    #[config(default = "vec![3, 5]")]
    pub classes: Vec<u8>,
    #[config(default = "None")]
    pub seed: Option<u64>,
    #[config(default = "String::from(\".\")")]
    pub outdir: String,
}

impl TrainingConfig {
    /// Adam(2e-4, beta_1 = 0.5) for both networks with the default architectures.
    pub fn standard() -> Self {
        let optimizer = AdamConfig::new().with_beta_1(0.5).with_epsilon(1e-7);
        Self::new(
            ModelConfig::new(GeneratorConfig::new(), DiscriminatorConfig::new()),
            optimizer.clone(),
            optimizer,
        )
    }

    pub fn mask_dims(&self) -> MaskDims {
        MaskDims {
            img_rows: self.img_rows,
            img_cols: self.img_cols,
            mask_height: self.mask_height,
            mask_width: self.mask_width,
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.iterations > 0, "iterations must be positive");
        ensure!(self.batch_size > 0, "batch size must be positive");
        ensure!(self.sample_interval > 0, "sample interval must be positive");
        ensure!(self.scale_factor > 0, "scale factor must be positive");
        ensure!(!self.classes.is_empty(), "at least one class is required");
        self.mask_dims().validate()?;

        let generator = &self.model_config.generator_config;
        let discriminator = &self.model_config.discriminator_config;
        let rows = generator.output_size(self.img_rows);
        let cols = generator.output_size(self.img_cols);
        ensure!(
            rows == self.mask_height && cols == self.mask_width,
            "generator predicts {}x{} patches but the mask is {}x{}",
            rows,
            cols,
            self.mask_height,
            self.mask_width
        );
        ensure!(
            self.mask_height == self.mask_width
                && discriminator.patch_size == self.mask_height,
            "discriminator expects {}x{} patches but the mask is {}x{}",
            discriminator.patch_size,
            discriminator.patch_size,
            self.mask_height,
            self.mask_width
        );
        ensure!(
            generator.channels == discriminator.channels,
            "generator and discriminator disagree on channel count"
        );
        Ok(())
    }
}

/// Both networks, their optimizers and the losses tying them together.
pub struct InpaintingGan<B: AutodiffBackend> {
    pub(crate) generator: Generator<B>,
    pub(crate) discriminator: Discriminator<B>,
    pub(crate) model_config: ModelConfig,
    gen_optimizer: OptimizerAdaptor<Adam, Generator<B>, B>,
    disc_optimizer: OptimizerAdaptor<Adam, Discriminator<B>, B>,
    bce: BinaryCrossEntropyLoss<B>,
    mse: MseLoss,
    lr: f64,
    reconstruction_weight: f32,
    adversarial_weight: f32,
}

impl<B: AutodiffBackend> InpaintingGan<B> {
    pub fn new(config: &TrainingConfig, device: &B::Device) -> Self {
        if let Some(seed) = config.seed {
            B::seed(seed);
        }
        let (generator, discriminator) = config.model_config.init::<B>(device);

        Self {
            generator,
            discriminator,
            model_config: config.model_config.clone(),
            gen_optimizer: config.gen_optimizer.init(),
            disc_optimizer: config.disc_optimizer.init(),
            bce: BinaryCrossEntropyLossConfig::new().init(device),
            mse: MseLoss::new(),
            lr: config.lr,
            reconstruction_weight: config.reconstruction_weight,
            adversarial_weight: config.adversarial_weight,
        }
    }

    pub fn generator(&self) -> &Generator<B> {
        &self.generator
    }

    pub fn discriminator(&self) -> &Discriminator<B> {
        &self.discriminator
    }

    pub fn model_config(&self) -> &ModelConfig {
        &self.model_config
    }

    /// Predicts patches for `masked` in inference mode. The result carries no graph.
    pub fn predict(&self, masked: Tensor<B, 4>) -> Tensor<B, 4> {
        let generator = self.generator.valid();
        Tensor::from_inner(generator.forward(masked.inner()))
    }

    /// One optimizer step of the discriminator on a batch sharing a single label.
    pub fn train_discriminator(
        &mut self,
        patches: Tensor<B, 4>,
        validity: Validity,
    ) -> DiscriminatorStep {
        let size = patches.dims()[0];
        let device = patches.device();

        let output = self.discriminator.forward(patches.detach());

        let predicted_real = output
            .clone()
            .detach()
            .greater_elem(0.5)
            .float()
            .mean()
            .into_scalar()
            .to_f32();
        let accuracy = match validity {
            Validity::Real => predicted_real,
            Validity::Fake => 1.0 - predicted_real,
        };

        let loss = self.bce.forward(output, targets(size, validity, &device));
        let loss_value = loss.clone().into_scalar().to_f32();

        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &self.discriminator);
        self.discriminator = self
            .disc_optimizer
            .step(self.lr, self.discriminator.clone(), grads);

        DiscriminatorStep {
            loss: loss_value,
            accuracy,
        }
    }

    /// One optimizer step of the generator against reconstruction and a frozen discriminator.
    pub fn train_generator(&mut self, masked: Tensor<B, 4>, missing: Tensor<B, 4>) -> GeneratorLoss {
        let size = masked.dims()[0];
        let device = masked.device();

        let generated = self.generator.forward(masked);

        let frozen = self.discriminator.clone().no_grad();
        let adversarial_out = frozen.forward_frozen(generated.clone());
        let adversarial = self
            .bce
            .forward(adversarial_out, targets(size, Validity::Real, &device));

        let reconstruction = self
            .mse
            .forward(generated, missing.detach(), Reduction::Mean);

        let loss = reconstruction.clone() * self.reconstruction_weight
            + adversarial.clone() * self.adversarial_weight;

        let result = GeneratorLoss {
            total: loss.clone().into_scalar().to_f32(),
            reconstruction: reconstruction.into_scalar().to_f32(),
            adversarial: adversarial.into_scalar().to_f32(),
        };

        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &self.generator);
        self.generator = self
            .gen_optimizer
            .step(self.lr, self.generator.clone(), grads);

        result
    }

    /// Masks `images`, trains the discriminator on real then generated patches,
    /// then trains the generator on the same masked batch.
    pub fn step<R: Rng + ?Sized>(
        &mut self,
        images: Tensor<B, 4>,
        dims: MaskDims,
        rng: &mut R,
    ) -> IterationStats {
        let batch = mask_randomly(images, dims, rng);
        let fake_missing = self.predict(batch.masked.clone());

        let real = self.train_discriminator(batch.missing.clone(), Validity::Real);
        let fake = self.train_discriminator(fake_missing, Validity::Fake);
        let discriminator = DiscriminatorStep {
            loss: 0.5 * (real.loss + fake.loss),
            accuracy: 0.5 * (real.accuracy + fake.accuracy),
        };

        let generator = self.train_generator(batch.masked, batch.missing);

        IterationStats {
            discriminator,
            generator,
        }
    }
}

pub fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

/// Runs `config.iterations` training iterations, sampling images every
/// `config.sample_interval` iterations into `config.outdir/images`.
pub fn train<B: AutodiffBackend>(
    gan: &mut InpaintingGan<B>,
    config: &TrainingConfig,
    dataset: &InpaintDataset,
    device: &B::Device,
) -> Result<Vec<IterationStats>> {
    config.validate()?;
    let shape = dataset.shape();
    ensure!(
        shape == [config.model_config.generator_config.channels, config.img_rows, config.img_cols],
        "dataset images are {:?}, config expects {}x{}",
        shape,
        config.img_rows,
        config.img_cols
    );

    let outdir = Path::new(&config.outdir);
    std::fs::create_dir_all(outdir)?;
    config.save(outdir.join("config.json"))?;

    let mut rng = seeded_rng(config.seed);
    let batcher = ImageBatcher::new(shape);
    let dims = config.mask_dims();

    let mut history = Vec::with_capacity(config.iterations);
    for iteration in 0..config.iterations {
        let batch = random_batch::<B, _, _>(dataset, &batcher, config.batch_size, &mut rng, device)?;
        let stats = gan.step(batch.images, dims, &mut rng);

        // print progress
        println!(
            "{} [D loss: {:.6}, acc: {:.2}%] [G loss: {:.6}, mse: {:.6}]",
            iteration,
            stats.discriminator.loss,
            100.0 * stats.discriminator.accuracy,
            stats.generator.total,
            stats.generator.reconstruction
        );
        history.push(stats);

        // save sample
        if iteration % config.sample_interval == 0 {
            let samples =
                random_batch::<B, _, _>(dataset, &batcher, config.sample_count, &mut rng, device)?;
            sample_images(
                gan,
                iteration,
                samples.images,
                dims,
                outdir,
                config.scale_factor,
                &mut rng,
            )?;
        }
    }

    Ok(history)
}
