//! Post-processing of the extracted output tree.
//!
//! Stages run one after another in a fixed order, because later stages work
//! on what earlier ones produced: alpha masks are merged before atlases are
//! cut, and flattening moves the final files only.

use derive_more::Display;
use sanity_config::Config;
use sanity_process::audio::{FfmpegTranscoder, Transcoder};
use sanity_process::schema::{FlatcDecoder, SchemaDecoder};
use sanity_process::{StageReport, alpha, atlas, audio, flatten, text};
use sanity_storage::BackendHandle;
use std::path::PathBuf;
use std::sync::Arc;

/// A post-processing stage, in run order.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    #[display("alpha")]
    Alpha,
    #[display("atlas")]
    Atlas,
    #[display("text")]
    Text,
    #[display("audio")]
    Audio,
    #[display("flatten")]
    Flatten,
}

/// External collaborators of the stages that need one.
#[derive(Clone, Default)]
pub struct Processors {
    /// Decodes tables by schema; without it tables are only decrypted.
    pub schema: Option<Arc<dyn SchemaDecoder>>,
    /// Without a transcoder the audio stage is skipped.
    pub transcoder: Option<Arc<dyn Transcoder>>,
}

impl Processors {
    /// Locate the external tools named by `config`.
    ///
    /// A tool that cannot be found disables its stage with a warning.
    pub fn discover(config: &Config) -> Self {
        let schema = match &config.decode.schema_dir {
            Some(dir) => match FlatcDecoder::discover(config.decode.flatc.as_deref(), dir) {
                Ok(decoder) => Some(Arc::new(decoder) as Arc<dyn SchemaDecoder>),
                Err(e) => {
                    tracing::warn!(error = ?e, "Schema decoding disabled");
                    None
                },
            },
            None => None,
        };
        let transcoder = match FfmpegTranscoder::discover(config.audio.ffmpeg.as_deref(), config.audio.bitrate.clone()) {
            Ok(transcoder) => Some(Arc::new(transcoder) as Arc<dyn Transcoder>),
            Err(e) => {
                tracing::warn!(error = ?e, "Audio transcoding disabled");
                None
            },
        };
        Self { schema, transcoder }
    }
}

/// Run every enabled stage over `roots`, returning one report per stage run.
#[tracing::instrument(skip_all, fields(roots = roots.len()))]
pub async fn process(
    backend: &BackendHandle,
    roots: &[PathBuf],
    processors: &Processors,
    config: &Config,
) -> Vec<(Stage, StageReport)> {
    let mut reports = Vec::with_capacity(5);
    let mut record = |stage: Stage, report: StageReport| {
        tracing::info!(%stage, %report, "Stage complete");
        reports.push((stage, report));
    };

    record(Stage::Alpha, alpha::recombine(backend, roots).await);
    record(Stage::Atlas, atlas::slice(backend, roots).await);
    record(Stage::Text, text::decode(backend, roots, processors.schema.as_deref()).await);
    match &processors.transcoder {
        Some(transcoder) => {
            let report = audio::transcode(backend, roots, transcoder.as_ref(), config.concurrency.transcodes).await;
            record(Stage::Audio, report);
        },
        None => tracing::warn!(stage = %Stage::Audio, "Stage skipped"),
    }
    if !config.flatten.is_empty() {
        record(Stage::Flatten, flatten::flatten(backend, roots, &config.flatten).await);
    }
    reports
}
