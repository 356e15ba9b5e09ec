//! # Command Line Arguments
//!
//! Every option has a default so that running the binary with no arguments
//! reproduces the standard run: 1680 iterations of batch size 64 on the CIFAR-10
//! cat and dog images, sampling every 50 iterations.
//!
//! ```bash
//! # Standard run, saving both models at the end
//! cargo run --release -- --save
//!
//! # Short run on a folder of images with a fixed seed
//! cargo run -- --data-dir photos --image-folder -n 200 -b 16 --seed 7
//! ```

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use burn::config::Config;
use clap::Parser;

use crate::{data::InpaintDataset, training::TrainingConfig};

#[derive(Parser, Debug)]
#[command(about = "Train a context-encoder GAN that inpaints a masked image region")]
pub struct Args {
    /// Directory holding the CIFAR-10 binary batches (or images with `--image-folder`)
    #[arg(long, default_value = "data/cifar-10-batches-bin")]
    pub data_dir: PathBuf,

    /// Treat `--data-dir` as a folder of png/jpg images instead of CIFAR-10
    #[arg(long)]
    pub image_folder: bool,

    /// Root for `images/` samples, `saved_model/` and `config.json`
    #[arg(short = 'o', long)]
    pub output_dir: Option<String>,

    /// Training configuration JSON written by a previous run
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Number of training iterations
    #[arg(short = 'n', long)]
    pub iterations: Option<usize>,

    #[arg(short = 'b', long)]
    pub batch_size: Option<usize>,

    /// Save sample images every this many iterations
    #[arg(short = 's', long)]
    pub sample_interval: Option<usize>,

    /// Seed for weight init, batch selection and masks. Random if omitted.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Write both models to `<output-dir>/saved_model` after training
    #[arg(long)]
    pub save: bool,

    /// Load weights from `<output-dir>/saved_model` before training
    #[arg(long)]
    pub resume: bool,
}

impl Args {
    /// The standard config (or the one given by `--config`) with CLI overrides applied.
    pub fn training_config(&self) -> Result<TrainingConfig> {
        let mut config = match &self.config {
            Some(path) => TrainingConfig::load(path)
                .map_err(|e| anyhow!("failed to load {}: {e:?}", path.display()))?,
            None => TrainingConfig::standard(),
        };

        if let Some(outdir) = &self.output_dir {
            config.outdir = outdir.clone();
        }
        if let Some(iterations) = self.iterations {
            config.iterations = iterations;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(sample_interval) = self.sample_interval {
            config.sample_interval = sample_interval;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn load_dataset(&self, config: &TrainingConfig) -> Result<InpaintDataset> {
        if self.image_folder {
            InpaintDataset::image_folder(&self.data_dir, config.img_rows, config.img_cols)
        } else {
            InpaintDataset::cifar10(&self.data_dir, &config.classes)
        }
    }
}
