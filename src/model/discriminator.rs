use burn::{
    module::Module,
    nn::{Linear, LinearConfig, Sigmoid},
    prelude::*,
};

use crate::model::layers::{conv_out, DownBlock};

/// Classifies a patch as real (close to 1) or generated (close to 0).
#[derive(Module, Debug)]
pub struct Discriminator<B: Backend> {
    disc_layer_1: DownBlock<B>,
    disc_layer_2: DownBlock<B>,
    disc_layer_3: DownBlock<B>,
    out_layer: Linear<B>,
    sig: Sigmoid,
}
impl<B: Backend> Discriminator<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 2> {
        let output = self.disc_layer_1.forward(input);
        let output = self.disc_layer_2.forward(output);
        let output = self.disc_layer_3.forward(output);

        let output = output.flatten(1, 3);
        let output = self.out_layer.forward(output);

        self.sig.forward(output).clamp(0.00001, 0.99999)
    }

    /// Judges patches with batch norm in inference mode and the running
    /// statistics left untouched. Used for the generator's adversarial term.
    pub fn forward_frozen(&self, input: Tensor<B, 4>) -> Tensor<B, 2> {
        let output = self.disc_layer_1.forward_frozen(input);
        let output = self.disc_layer_2.forward_frozen(output);
        let output = self.disc_layer_3.forward_frozen(output);

        let output = output.flatten(1, 3);
        let output = self.out_layer.forward(output);

        self.sig.forward(output).clamp(0.00001, 0.99999)
    }
}

#[derive(Config, Debug)]
pub struct DiscriminatorConfig {
    /// Side length of the (square) patches being judged.
    #[config(default = 8)]
    pub patch_size: usize,
    #[config(default = 3)]
    pub channels: usize,
    #[config(default = "[64, 128, 256]")]
    pub hidden_channels: [usize; 3],
}
impl DiscriminatorConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Discriminator<B> {
        let [c1, c2, c3] = self.hidden_channels;

        let disc_layer_1 = DownBlock::new([self.channels, c1], 2, device);
        let disc_layer_2 = DownBlock::new([c1, c2], 2, device);
        let disc_layer_3 = DownBlock::new([c2, c3], 1, device);

        let pixels = conv_out(conv_out(self.patch_size, 2), 2);
        let out_layer = LinearConfig::new(c3 * pixels * pixels, 1).init(device);
        let sig = Sigmoid::new();

        Discriminator {
            disc_layer_1,
            disc_layer_2,
            disc_layer_3,
            out_layer,
            sig,
        }
    }
}
