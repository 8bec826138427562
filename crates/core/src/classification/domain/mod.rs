pub mod classification_batcher;
pub mod classifier;
pub mod color_convention;
