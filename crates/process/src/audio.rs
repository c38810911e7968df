//! WAV to MP3 transcoding.

use crate::error::{ErrorKind, Result};
use crate::{StageReport, Step, list_files, run_bounded, tool};
use async_trait::async_trait;
use exn::ResultExt;
use sanity_storage::{BackendHandle, extension_of};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Turns a complete WAV file into a complete MP3 file.
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn transcode(&self, wav: Vec<u8>) -> Result<Vec<u8>>;
}

/// [`Transcoder`] backed by the `ffmpeg` command line tool.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    program: PathBuf,
    bitrate: String,
}

impl FfmpegTranscoder {
    /// Locate `ffmpeg`, preferring the configured command.
    pub fn discover(ffmpeg: Option<&str>, bitrate: impl Into<String>) -> Result<Self> {
        Ok(Self {
            program: tool::discover(ffmpeg, "ffmpeg")?,
            bitrate: bitrate.into(),
        })
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(&self, wav: Vec<u8>) -> Result<Vec<u8>> {
        let dir = tempfile::tempdir().or_raise(|| ErrorKind::Io)?;
        let input = dir.path().join("input.wav");
        let output = dir.path().join("output.mp3");
        tokio::fs::write(&input, wav).await.or_raise(|| ErrorKind::Io)?;
        let args = [
            OsStr::new("-hide_banner"),
            OsStr::new("-loglevel"),
            OsStr::new("error"),
            OsStr::new("-y"),
            OsStr::new("-i"),
            input.as_os_str(),
            OsStr::new("-vn"),
            OsStr::new("-b:a"),
            OsStr::new(&self.bitrate),
            output.as_os_str(),
        ];
        tool::run(&self.program, args).await.or_raise(|| ErrorKind::Transcode)?;
        tokio::fs::read(&output).await.or_raise(|| ErrorKind::Transcode)
    }
}

/// Transcode every `.wav` below `roots` to `.mp3`, with at most `concurrency`
/// transcodes in flight.
///
/// The WAV is removed only once its MP3 has been written.
#[tracing::instrument(skip_all, fields(concurrency = concurrency))]
pub async fn transcode(
    backend: &BackendHandle,
    roots: &[PathBuf],
    transcoder: &dyn Transcoder,
    concurrency: usize,
) -> StageReport {
    let wavs: Vec<PathBuf> = list_files(backend, roots)
        .await
        .into_iter()
        .map(|file| file.path)
        .filter(|path| extension_of(path).as_deref() == Some("wav"))
        .collect();
    tracing::debug!(files = wavs.len(), "Audio files discovered");
    let jobs = wavs.iter().map(|path| async move { (path, transcode_file(backend, transcoder, path).await) });
    let mut report = StageReport::default();
    for (path, result) in run_bounded(jobs, concurrency).await {
        report.tally(path, result.map(|()| Step::Processed));
    }
    tracing::info!(%report, "Audio transcoding complete");
    report
}

async fn transcode_file(backend: &BackendHandle, transcoder: &dyn Transcoder, path: &Path) -> Result<()> {
    let wav = backend.read(path).await.or_raise(|| ErrorKind::Storage)?;
    let mp3 = transcoder.transcode(wav).await?;
    let output = path.with_extension("mp3");
    backend.write(&output, &mp3).await.or_raise(|| ErrorKind::Storage)?;
    backend.delete(path).await.or_raise(|| ErrorKind::Storage)?;
    tracing::debug!(path = %output.display(), "Audio transcoded");
    Ok(())
}
