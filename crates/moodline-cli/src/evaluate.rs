//! Evaluation pipeline: replays a labelled CSV against a running service and
//! scores the predictions.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, bail};
use arrow::array::{Array, LargeStringArray, StringArray};
use arrow::csv::ReaderBuilder;
use arrow::csv::reader::Format;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::StreamExt;
use moodline_core::SentimentResult;
use serde::Deserialize;
use serde_json::json;

use crate::config::EvaluateArgs;
use crate::report::ClassificationReport;

const CSV_BATCH_SIZE: usize = 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub text: String,
    pub actual: String,
}

pub struct EvalStats {
    pub report: ClassificationReport,
    pub attempted: usize,
    pub skipped: usize,
    pub elapsed_secs: f64,
}

/// Read up to `limit` samples from a CSV file with a header row.
///
/// Every column is read as text. Rows with a blank text or label are dropped.
pub fn read_samples(
    path: &Path,
    text_column: &str,
    label_column: &str,
    limit: usize,
) -> anyhow::Result<Vec<Sample>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    read_samples_from(file, text_column, label_column, limit)
}

fn read_samples_from<R: Read + Seek>(
    mut reader: R,
    text_column: &str,
    label_column: &str,
    limit: usize,
) -> anyhow::Result<Vec<Sample>> {
    let format = Format::default().with_header(true);
    let (inferred, _) = format
        .infer_schema(&mut reader, Some(1))
        .context("reading CSV header")?;
    reader.seek(SeekFrom::Start(0))?;

    // Only the column names are kept; values are parsed as plain strings.
    let schema = Schema::new(
        inferred
            .fields()
            .iter()
            .map(|f| Field::new(f.name(), DataType::Utf8, true))
            .collect::<Vec<_>>(),
    );
    let text_idx = schema
        .index_of(text_column)
        .with_context(|| format!("column {text_column:?} not found"))?;
    let label_idx = schema
        .index_of(label_column)
        .with_context(|| format!("column {label_column:?} not found"))?;

    let csv = ReaderBuilder::new(Arc::new(schema))
        .with_format(format)
        .with_batch_size(CSV_BATCH_SIZE)
        .with_projection(vec![text_idx, label_idx])
        .build(reader)
        .context("building CSV reader")?;

    let mut samples = Vec::new();
    for batch in csv {
        let batch = batch.context("parsing CSV")?;
        let texts = string_column(&batch, text_column)?;
        let labels = string_column(&batch, label_column)?;
        for (text, actual) in texts.into_iter().zip(labels) {
            if samples.len() == limit {
                return Ok(samples);
            }
            fn present(v: Option<&str>) -> Option<&str> {
                v.filter(|s| !s.trim().is_empty())
            }
            if let (Some(text), Some(actual)) = (present(text), present(actual)) {
                samples.push(Sample {
                    text: text.to_string(),
                    actual: actual.to_string(),
                });
            }
        }
    }
    Ok(samples)
}

/// Values of a string column, `None` for nulls.
///
/// Handles both `Utf8` (StringArray) and `LargeUtf8` (LargeStringArray).
fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> anyhow::Result<Vec<Option<&'a str>>> {
    let col = batch
        .column_by_name(name)
        .with_context(|| format!("column {name:?} missing from batch"))?;
    if let Some(arr) = col.as_any().downcast_ref::<StringArray>() {
        Ok(arr.iter().collect())
    } else if let Some(arr) = col.as_any().downcast_ref::<LargeStringArray>() {
        Ok(arr.iter().collect())
    } else {
        bail!("unexpected type for column {name:?}: {:?}", col.data_type())
    }
}

#[derive(Deserialize)]
struct LoginResponse {
    access_token: String,
}

/// Minimal client for a running sentiment service.
pub struct ServiceClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ServiceClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    pub async fn login(&mut self, username: &str, password: &str) -> anyhow::Result<()> {
        let resp = self
            .http
            .post(format!("{}/login", self.base_url))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .context("sending login request")?;
        let status = resp.status();
        if !status.is_success() {
            bail!("login rejected with {status}");
        }
        let body: LoginResponse = resp.json().await.context("decoding login response")?;
        self.token = Some(body.access_token);
        Ok(())
    }

    pub async fn classify(&self, text: &str) -> anyhow::Result<SentimentResult> {
        let mut req = self
            .http
            .post(format!("{}/sentiment", self.base_url))
            .json(&json!({ "text": text }));
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await.context("sending sentiment request")?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("sentiment request failed with {status}: {body}");
        }
        resp.json().await.context("decoding sentiment response")
    }
}

/// Run the full evaluation: read CSV, log in, classify every row, score.
pub async fn run_evaluation(args: &EvaluateArgs) -> anyhow::Result<EvalStats> {
    let start = Instant::now();

    let samples = read_samples(&args.data, &args.text_column, &args.label_column, args.limit)?;
    let total = samples.len();
    eprintln!("  Read {total} rows from {}", args.data.display());

    let mut client = ServiceClient::new(&args.url)?;
    client
        .login(&args.username, &args.password)
        .await
        .with_context(|| format!("logging in to {}", args.url))?;

    let client = &client;
    let mut results = futures::stream::iter(samples.iter().map(|sample| async move {
        (sample, client.classify(&sample.text).await)
    }))
    .buffered(args.concurrency.max(1));

    let mut pairs = Vec::with_capacity(total);
    let mut skipped = 0usize;
    let mut processed = 0usize;
    while let Some((sample, result)) = results.next().await {
        match result {
            Ok(prediction) => pairs.push((sample.actual.clone(), prediction.label)),
            Err(err) => {
                skipped += 1;
                tracing::warn!(error = %format!("{err:#}"), "skipping row");
            }
        }
        processed += 1;
        eprint!(
            "\r  Classified {processed}/{total} ({:.1}%)",
            processed as f64 / total as f64 * 100.0
        );
    }
    if total > 0 {
        eprintln!();
    }

    Ok(EvalStats {
        report: ClassificationReport::from_pairs(&pairs),
        attempted: total,
        skipped,
        elapsed_secs: start.elapsed().as_secs_f64(),
    })
}
