use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        interpolate::{Interpolate2d, Interpolate2dConfig, InterpolateMode},
        BatchNorm, BatchNormConfig, LeakyRelu, LeakyReluConfig, PaddingConfig2d, Relu,
    },
    prelude::*,
};

/// Running-average weight given to the new batch statistics (0.8 kept for the old ones).
pub const BN_MOMENTUM: f64 = 0.2;
pub const BN_EPSILON: f64 = 1e-3;
pub const LEAKY_SLOPE: f64 = 0.2;

/// Spatial size after a 3x3 (padding 1) or 1x1 (padding 0) convolution with the given stride.
pub fn conv_out(size: usize, stride: usize) -> usize {
    size.div_ceil(stride)
}

/// Strided 3x3 convolution followed by LeakyReLU and batch norm.
#[derive(Module, Debug)]
pub struct DownBlock<B: Backend> {
    conv: Conv2d<B>,
    lrelu: LeakyRelu,
    bn: BatchNorm<B, 2>,
}
impl<B: Backend> DownBlock<B> {
    pub fn new(channels: [usize; 2], stride: usize, device: &B::Device) -> Self {
        let conv = Conv2dConfig::new(channels, [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .with_stride([stride, stride])
            .init(device);
        let lrelu = LeakyReluConfig::new()
            .with_negative_slope(LEAKY_SLOPE)
            .init();
        let bn = BatchNormConfig::new(channels[1])
            .with_momentum(BN_MOMENTUM)
            .with_epsilon(BN_EPSILON)
            .init(device);

        Self { conv, lrelu, bn }
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let output = self.conv.forward(input);
        let output = self.lrelu.forward(output);
        self.bn.forward(output)
    }

    /// Like [`forward`](Self::forward) but normalizes with the running statistics and
    /// never updates them, whatever the backend. Gradients still reach `input`.
    pub fn forward_frozen(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let output = self.conv.forward(input);
        let output = self.lrelu.forward(output);

        let channels = output.dims()[1];
        let shape = [1, channels, 1, 1];
        let mean = self.bn.running_mean.value().reshape(shape);
        let var = self.bn.running_var.value().reshape(shape);
        let gamma = self.bn.gamma.val().reshape(shape);
        let beta = self.bn.beta.val().reshape(shape);

        output
            .sub(mean)
            .div(var.add_scalar(self.bn.epsilon).sqrt())
            .mul(gamma)
            .add(beta)
    }
}

/// Nearest-neighbour x2 upsampling, 3x3 convolution, ReLU and batch norm.
#[derive(Module, Debug)]
pub struct UpBlock<B: Backend> {
    upsample: Interpolate2d,
    conv: Conv2d<B>,
    relu: Relu,
    bn: BatchNorm<B, 2>,
}
impl<B: Backend> UpBlock<B> {
    pub fn new(channels: [usize; 2], device: &B::Device) -> Self {
        let upsample = Interpolate2dConfig::new()
            .with_scale_factor(Some([2.0, 2.0]))
            .with_mode(InterpolateMode::Nearest)
            .init();
        let conv = Conv2dConfig::new(channels, [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        let relu = Relu::new();
        let bn = BatchNormConfig::new(channels[1])
            .with_momentum(BN_MOMENTUM)
            .with_epsilon(BN_EPSILON)
            .init(device);

        Self {
            upsample,
            conv,
            relu,
            bn,
        }
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let output = self.upsample.forward(input);
        let output = self.conv.forward(output);
        let output = self.relu.forward(output);
        self.bn.forward(output)
    }
}
