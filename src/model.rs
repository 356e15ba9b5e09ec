pub mod discriminator;
pub mod generator;
mod layers;

use burn::prelude::*;

use crate::model::{
    discriminator::{Discriminator, DiscriminatorConfig},
    generator::{Generator, GeneratorConfig},
};

#[derive(Config, Debug)]
pub struct ModelConfig {
    pub generator_config: GeneratorConfig,
    pub discriminator_config: DiscriminatorConfig,
}
impl ModelConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> (Generator<B>, Discriminator<B>) {
        let generator = self.generator_config.init(device);
        let discriminator = self.discriminator_config.init(device);

        (generator, discriminator)
    }
}
