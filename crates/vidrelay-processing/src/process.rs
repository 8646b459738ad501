use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;

use vidrelay_core::models::{normalize_sentinels, ContentMetadata, ValidationReport};

use crate::inspector::{ContentInspector, InspectorError};

const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Runs `<program> [args...] validate|metadata <path>` and reads JSON from stdout.
#[derive(Debug, Clone)]
pub struct ProcessInspector {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl ProcessInspector {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Arguments placed before the subcommand.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run<T: DeserializeOwned>(&self, subcommand: &str, path: &Path) -> Result<T, InspectorError> {
        let start = std::time::Instant::now();

        let output = tokio::time::timeout(
            self.timeout,
            Command::new(&self.program)
                .args(&self.args)
                .arg(subcommand)
                .arg(path)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| InspectorError::Timeout(self.timeout.as_secs()))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::warn!(
                program = %self.program,
                subcommand = subcommand,
                status = %output.status,
                stderr = %stderr,
                "Inspector failed"
            );
            return Err(InspectorError::Failed {
                status: output.status.to_string(),
                stderr,
            });
        }

        let raw: serde_json::Value = serde_json::from_slice(&output.stdout)?;
        let parsed = serde_json::from_value(normalize_sentinels(raw))?;

        tracing::debug!(
            subcommand = subcommand,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Inspector finished"
        );

        Ok(parsed)
    }
}

#[async_trait]
impl ContentInspector for ProcessInspector {
    #[tracing::instrument(skip(self), fields(path = %path.display()))]
    async fn validate(&self, path: &Path) -> Result<ValidationReport, InspectorError> {
        self.run("validate", path).await
    }

    #[tracing::instrument(skip(self), fields(path = %path.display()))]
    async fn extract_metadata(&self, path: &Path) -> Result<ContentMetadata, InspectorError> {
        self.run("metadata", path).await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    /// Shell stand-in for the inspector binary; `$1` is the subcommand.
    fn scripted(script: &str) -> ProcessInspector {
        ProcessInspector::new("sh").with_args(["-c", script, "inspector"])
    }

    #[tokio::test]
    async fn parses_validation_report() {
        let inspector = scripted(
            r#"[ "$1" = validate ] && echo '{"success":true,"basic":{"exists":true,"sizeInBytes":42,"containerFormat":"mp4","videoCodec":"h264","audioCodec":"aac","isValid":true},"stream":{"hasVideoStream":true,"hasAudioStream":true,"isPlayable":true}}'"#,
        );

        let report = inspector.validate(Path::new("/tmp/video.mp4")).await.unwrap();
        assert!(report.success);
        assert!(report.basic.is_valid);
        assert_eq!(report.basic.size_in_bytes, 42);
        assert_eq!(report.basic.video_codec.as_deref(), Some("h264"));
        assert!(report.stream.is_playable);
    }

    #[tokio::test]
    async fn metadata_sentinels_become_none() {
        let inspector = scripted(
            r#"[ "$1" = metadata ] && echo '{"technical":{"containerFormat":"mov","duration":"N/A","colorSpace":"unknown"},"quality":{"missingFrames":0}}'"#,
        );

        let metadata = inspector
            .extract_metadata(Path::new("/tmp/video.mov"))
            .await
            .unwrap();
        assert_eq!(metadata.technical.container_format.as_deref(), Some("mov"));
        assert_eq!(metadata.technical.duration, None);
        assert_eq!(metadata.technical.color_space, None);
        assert_eq!(metadata.quality.missing_frames, Some(0));
    }

    #[tokio::test]
    async fn non_zero_exit_is_an_error() {
        let inspector = scripted("echo 'probe crashed' >&2; exit 3");
        let err = inspector.validate(Path::new("/tmp/x")).await.unwrap_err();
        match err {
            InspectorError::Failed { stderr, .. } => assert_eq!(stderr, "probe crashed"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn garbage_output_is_a_parse_error() {
        let inspector = scripted("echo not-json");
        assert!(matches!(
            inspector.validate(Path::new("/tmp/x")).await,
            Err(InspectorError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn slow_inspector_times_out() {
        let inspector = scripted("sleep 5").with_timeout(Duration::from_millis(100));
        assert!(matches!(
            inspector.validate(Path::new("/tmp/x")).await,
            Err(InspectorError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let inspector = ProcessInspector::new("/nonexistent/vidrelay-inspector");
        assert!(matches!(
            inspector.validate(Path::new("/tmp/x")).await,
            Err(InspectorError::Spawn(_))
        ));
    }
}
