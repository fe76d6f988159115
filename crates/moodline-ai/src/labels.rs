//! Class labels for an exported sequence-classification model.
//!
//! Reads the `id2label` table from a model's `config.json` and turns raw
//! logits into the single best (label, probability) pair.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

/// Ordered class names; index `i` is the label for logit `i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMap {
    labels: Vec<String>,
}

#[derive(Deserialize)]
struct ModelConfig {
    id2label: HashMap<String, String>,
}

impl LabelMap {
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    /// Load the `id2label` table from a `config.json` file.
    pub fn from_config_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("read {}: {e}", path.display()))?;
        Self::from_config_json(&raw)
    }

    /// Parse `{"id2label": {"0": "negative", ...}}`.
    ///
    /// Ids must be exactly `0..n` with no gaps.
    pub fn from_config_json(raw: &str) -> anyhow::Result<Self> {
        let config: ModelConfig = serde_json::from_str(raw)?;
        anyhow::ensure!(!config.id2label.is_empty(), "id2label is empty");

        let mut indexed = Vec::with_capacity(config.id2label.len());
        for (id, label) in config.id2label {
            let idx: usize = id
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("non-numeric label id {id:?}"))?;
            indexed.push((idx, label));
        }
        indexed.sort_by_key(|(idx, _)| *idx);

        for (expected, (idx, _)) in indexed.iter().enumerate() {
            anyhow::ensure!(*idx == expected, "label ids are not contiguous: missing {expected}");
        }

        Ok(Self::new(indexed.into_iter().map(|(_, l)| l).collect()))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&str> {
        self.labels.get(idx).map(String::as_str)
    }

    /// Softmax `logits` and return the most probable class.
    ///
    /// Ties keep the lowest index.
    pub fn best(&self, logits: &[f32]) -> anyhow::Result<(String, f32)> {
        anyhow::ensure!(
            logits.len() == self.labels.len(),
            "model produced {} logits for {} labels",
            logits.len(),
            self.labels.len()
        );
        let probs = softmax(logits);
        let (idx, prob) = argmax(&probs).ok_or_else(|| anyhow::anyhow!("no logits"))?;
        Ok((self.labels[idx].clone(), prob))
    }
}

/// Numerically stable softmax.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum > 0.0 {
        exps.into_iter().map(|e| e / sum).collect()
    } else {
        exps
    }
}

fn argmax(values: &[f32]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (idx, &v) in values.iter().enumerate() {
        match best {
            Some((_, current)) if v <= current => {}
            _ => best = Some((idx, v)),
        }
    }
    best
}
