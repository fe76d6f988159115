//! ONNX Runtime sequence classifier for exported sentiment models.
//!
//! The model directory must contain `model.onnx`, `tokenizer.json`, and the
//! `config.json` carrying the `id2label` table (the layout produced by
//! `optimum-cli export onnx --task text-classification`).

use std::path::Path;

use moodline_core::LabelScore;
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;
use tracing::info;

use crate::engine::SentimentModel;
use crate::labels::LabelMap;

/// Maximum sequence length for RoBERTa-family models.
const MAX_TOKENS: usize = 512;

/// Single-input sentiment classifier backed by an ONNX session.
pub struct OnnxSentimentModel {
    session: Session,
    tokenizer: Tokenizer,
    labels: LabelMap,
    /// BERT-style graphs take `token_type_ids`; RoBERTa exports do not.
    wants_token_types: bool,
}

impl OnnxSentimentModel {
    /// Load a classifier from a directory containing `model.onnx`,
    /// `tokenizer.json`, and `config.json`.
    pub fn load(model_dir: &Path) -> anyhow::Result<Self> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");
        let config_path = model_dir.join("config.json");

        anyhow::ensure!(model_path.exists(), "model.onnx not found in {model_dir:?}");
        anyhow::ensure!(
            tokenizer_path.exists(),
            "tokenizer.json not found in {model_dir:?}"
        );
        anyhow::ensure!(config_path.exists(), "config.json not found in {model_dir:?}");

        let session = Session::builder()?.commit_from_file(&model_path)?;
        let wants_token_types = session
            .inputs()
            .iter()
            .any(|input| input.name() == "token_type_ids");

        let labels = LabelMap::from_config_file(&config_path)?;

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("load tokenizer: {e}"))?;
        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length: MAX_TOKENS,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("set truncation: {e}"))?;

        info!(
            labels = labels.len(),
            token_types = wants_token_types,
            model = %model_path.display(),
            "loaded sentiment model"
        );
        Ok(Self {
            session,
            tokenizer,
            labels,
            wants_token_types,
        })
    }

    pub fn labels(&self) -> &LabelMap {
        &self.labels
    }

    /// Raw logits for one text, one per label.
    fn logits(&mut self, text: &str) -> anyhow::Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow::anyhow!("tokenize: {e}"))?;

        let seq_len = encoding.get_ids().len();
        anyhow::ensure!(seq_len > 0, "tokenizer produced no tokens");

        let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let attention_mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| m as i64)
            .collect();
        let shape = [1i64, seq_len as i64];

        let ids_tensor = Tensor::from_array((shape, input_ids.into_boxed_slice()))?;
        let mask_tensor = Tensor::from_array((shape, attention_mask.into_boxed_slice()))?;

        let outputs = if self.wants_token_types {
            let token_type_ids: Vec<i64> =
                encoding.get_type_ids().iter().map(|&t| t as i64).collect();
            let type_tensor = Tensor::from_array((shape, token_type_ids.into_boxed_slice()))?;
            self.session.run(ort::inputs![
                "input_ids" => ids_tensor,
                "attention_mask" => mask_tensor,
                "token_type_ids" => type_tensor,
            ])?
        } else {
            self.session.run(ort::inputs![
                "input_ids" => ids_tensor,
                "attention_mask" => mask_tensor,
            ])?
        };

        // Logits: [1, num_labels].
        let (output_shape, output_data) = outputs[0].try_extract_tensor::<f32>()?;
        let dims: &[i64] = output_shape;
        anyhow::ensure!(
            dims.len() == 2 && dims[0] == 1 && dims[1] as usize == self.labels.len(),
            "unexpected output shape: {dims:?}, expected [1, {}]",
            self.labels.len()
        );

        Ok(output_data.to_vec())
    }
}

impl SentimentModel for OnnxSentimentModel {
    fn predict(&mut self, text: &str) -> anyhow::Result<LabelScore> {
        let logits = self.logits(text)?;
        let (label, prob) = self.labels.best(&logits)?;
        Ok(LabelScore::new(label, f64::from(prob)))
    }
}
