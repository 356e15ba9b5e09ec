use burn::{
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        Dropout, DropoutConfig, LeakyRelu, LeakyReluConfig, PaddingConfig2d,
    },
    prelude::*,
};

use crate::model::layers::{conv_out, DownBlock, UpBlock, LEAKY_SLOPE};

/// Encoder-decoder that maps a masked image to a prediction of its missing patch.
///
/// The encoder downsamples four times and the decoder upsamples twice, so the
/// predicted patch is a quarter of the input's side length.
#[derive(Module, Debug)]
pub struct Generator<B: Backend> {
    enc_layer_1: DownBlock<B>,
    enc_layer_2: DownBlock<B>,
    enc_layer_3: DownBlock<B>,
    bottleneck: Conv2d<B>,
    lrelu: LeakyRelu,
    dropout: Dropout,
    dec_layer_1: UpBlock<B>,
    dec_layer_2: UpBlock<B>,
    out_layer: Conv2d<B>,
}
impl<B: Backend> Generator<B> {
    /// `[batch, channels, rows, cols]` in `[-1, 1]` to `[batch, channels, rows / 4, cols / 4]` in `[-1, 1]`.
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let output = self.enc_layer_1.forward(input);
        let output = self.enc_layer_2.forward(output);
        let output = self.enc_layer_3.forward(output);

        let output = self.bottleneck.forward(output);
        let output = self.lrelu.forward(output);
        let output = self.dropout.forward(output);

        let output = self.dec_layer_1.forward(output);
        let output = self.dec_layer_2.forward(output);
        let output = self.out_layer.forward(output);

        burn::tensor::activation::tanh(output)
    }
}

#[derive(Config, Debug)]
pub struct GeneratorConfig {
    #[config(default = 3)]
    pub channels: usize,
    #[config(default = "[32, 64, 128, 512]")]
    pub encoder_channels: [usize; 4],
    #[config(default = "[128, 64]")]
    pub decoder_channels: [usize; 2],
    #[config(default = 0.5)]
    pub dropout: f64,
}
impl GeneratorConfig {
    /// Side length of the patch predicted for an input of side `size`.
    pub fn output_size(&self, size: usize) -> usize {
        let encoded = (0..4).fold(size, |s, _| conv_out(s, 2));
        encoded * 4
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Generator<B> {
        let [c1, c2, c3, c4] = self.encoder_channels;
        let [d1, d2] = self.decoder_channels;

        let enc_layer_1 = DownBlock::new([self.channels, c1], 2, device);
        let enc_layer_2 = DownBlock::new([c1, c2], 2, device);
        let enc_layer_3 = DownBlock::new([c2, c3], 2, device);

        let bottleneck = Conv2dConfig::new([c3, c4], [1, 1])
            .with_stride([2, 2])
            .init(device);
        let lrelu = LeakyReluConfig::new()
            .with_negative_slope(LEAKY_SLOPE)
            .init();
        let dropout = DropoutConfig::new(self.dropout).init();

        let dec_layer_1 = UpBlock::new([c4, d1], device);
        let dec_layer_2 = UpBlock::new([d1, d2], device);

        let out_layer = Conv2dConfig::new([d2, self.channels], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);

        Generator {
            enc_layer_1,
            enc_layer_2,
            enc_layer_3,
            bottleneck,
            lrelu,
            dropout,
            dec_layer_1,
            dec_layer_2,
            out_layer,
        }
    }
}
