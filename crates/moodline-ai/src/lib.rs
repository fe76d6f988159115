//! Local inference tier: lazily loaded sentiment engine with an ONNX Runtime backend.

pub mod engine;
pub mod labels;

pub use engine::{LocalClassifier, LocalEngine, LocalError, SentimentModel};
pub use labels::LabelMap;

#[cfg(feature = "onnx")]
mod classifier;
#[cfg(feature = "onnx")]
pub use classifier::OnnxSentimentModel;

/// Local engine over the exported ONNX model for `config.fallback_model`.
///
/// Nothing is read from disk until the first classification.
#[cfg(feature = "onnx")]
pub fn onnx_engine(config: &moodline_core::InferenceConfig) -> LocalEngine<OnnxSentimentModel> {
    let dir = config.fallback_model_dir();
    LocalEngine::new(config.fallback_model.clone(), move || {
        OnnxSentimentModel::load(&dir)
    })
}
