//! Context-encoder image inpainting with a generator/discriminator pair on burn.

pub mod args;
pub mod data;
pub mod masking;
pub mod model;
pub mod sampler;
pub mod training;
pub mod utils;

#[cfg(test)]
pub(crate) type TestBackend = burn::backend::NdArray<f32>;
#[cfg(test)]
pub(crate) type TestAutodiffBackend = burn::backend::Autodiff<TestBackend>;
