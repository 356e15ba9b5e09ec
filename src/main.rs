use anyhow::Result;
use burn::{backend::Autodiff, data::dataset::Dataset};
use clap::Parser;
use std::path::Path;

use inpaint_gan::{
    args::Args,
    sampler::{load_models, save_models},
    training::{train, InpaintingGan},
};

#[cfg(feature = "wgpu")]
type MyBackend = burn::backend::Wgpu<f32>;
#[cfg(not(feature = "wgpu"))]
type MyBackend = burn::backend::NdArray<f32>;
type MyAutodiffBackend = Autodiff<MyBackend>;

fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.training_config()?;
    let device = Default::default();

    let dataset = args.load_dataset(&config)?;
    println!("Loaded {} training images", dataset.len());

    let mut gan = InpaintingGan::<MyAutodiffBackend>::new(&config, &device);

    // Continue where you left off?
    let model_dir = Path::new(&config.outdir).join("saved_model");
    if args.resume {
        match load_models(&mut gan, &model_dir, &device) {
            Ok(()) => println!("Continuing from previous run"),
            Err(err) => println!("Unable to load saved models ({err:#}). Starting new session..."),
        }
    }

    train(&mut gan, &config, &dataset, &device)?;

    if args.save {
        save_models(&gan, &model_dir)?;
        println!("Saved models to {}", model_dir.display());
    }

    Ok(())
}
