//! Runs yt-dlp for a single URL and reports what happened.

use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::Command;

use anyhow::Context;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::output::{self, Snapshot};
use crate::tools::{ToolError, EXTRACTOR};

/// yt-dlp output template; files are named after the video title.
pub const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

pub const INSTALL_HINT: &str = "Please install yt-dlp: pip install yt-dlp";

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("{tool} is not installed or could not be found (searched: {searched})")]
    ToolNotFound { tool: String, searched: String },

    #[error("Download failed ({})", describe_exit(.code))]
    ExecutionFailed {
        code: Option<i32>,
        stderr: String,
        stdout: String,
    },

    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}

impl From<ToolError> for DownloadError {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::NotFound { tool, searched } => DownloadError::ToolNotFound { tool, searched },
            other => DownloadError::Unexpected(other.into()),
        }
    }
}

/// Everything needed for one yt-dlp invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    pub output_directory: PathBuf,
    pub audio_format: String,
    pub quality_hint: Option<String>,
    pub tool_path: PathBuf,
    pub ffmpeg_path: Option<PathBuf>,
    pub no_playlist: bool,
    pub embed_metadata: bool,
}

impl DownloadRequest {
    /// Ordered argument list passed to the extraction tool.
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-x".into(),
            "--audio-format".into(),
            self.audio_format.clone().into(),
        ];

        if let Some(quality) = &self.quality_hint {
            args.push("--audio-quality".into());
            args.push(quality.into());
        }
        if let Some(ffmpeg) = &self.ffmpeg_path {
            args.push("--ffmpeg-location".into());
            args.push(ffmpeg.into());
        }

        args.push("-o".into());
        args.push(self.output_directory.join(OUTPUT_TEMPLATE).into());

        if self.no_playlist {
            args.push("--no-playlist".into());
        }
        if self.embed_metadata {
            args.push("--embed-metadata".into());
        }

        args.push(self.url.clone().into());
        args
    }

    /// Human readable command line, for display only.
    pub fn command_line(&self) -> String {
        std::iter::once(self.tool_path.clone().into_os_string())
            .chain(self.args())
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, Default)]
pub struct DownloadOutcome {
    pub stdout: String,
    /// Audio files that appeared or changed in the output directory.
    pub files: Vec<PathBuf>,
}

/// Run the extraction tool and wait for it to finish.
pub fn download_audio(request: &DownloadRequest) -> Result<DownloadOutcome, DownloadError> {
    output::ensure_dir(&request.output_directory)?;
    let before = Snapshot::take(&request.output_directory)?;

    debug!(command = %request.command_line(), "spawning {EXTRACTOR}");
    let output = Command::new(&request.tool_path)
        .args(request.args())
        .output()
        .map_err(|err| match err.kind() {
            // A present file failing with NotFound has a broken interpreter line.
            io::ErrorKind::NotFound if !request.tool_path.is_file() => {
                DownloadError::ToolNotFound {
                    tool: EXTRACTOR.to_string(),
                    searched: request.tool_path.display().to_string(),
                }
            }
            _ => anyhow::Error::new(err)
                .context(format!("Failed to run {}", request.tool_path.display()))
                .into(),
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() {
        debug!(status = %output.status, "{EXTRACTOR} failed");
        return Err(DownloadError::ExecutionFailed {
            code: output.status.code(),
            stderr,
            stdout,
        });
    }

    let files = match Snapshot::take(&request.output_directory)
        .context("Failed to rescan output directory")
    {
        Ok(after) => before.produced(&after, &request.audio_format),
        Err(err) => {
            warn!("{err:#}");
            Vec::new()
        }
    };
    info!(url = %request.url, files = files.len(), "download finished");

    Ok(DownloadOutcome { stdout, files })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn request() -> DownloadRequest {
        DownloadRequest {
            url: "https://www.youtube.com/watch?v=abc".to_string(),
            output_directory: PathBuf::from("downloaded_audios"),
            audio_format: "mp3".to_string(),
            quality_hint: Some("0".to_string()),
            tool_path: PathBuf::from("yt-dlp"),
            ffmpeg_path: None,
            no_playlist: true,
            embed_metadata: true,
        }
    }

    fn strings(args: Vec<OsString>) -> Vec<String> {
        args.into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn default_argument_order() {
        let template = Path::new("downloaded_audios")
            .join(OUTPUT_TEMPLATE)
            .to_string_lossy()
            .into_owned();
        assert_eq!(
            strings(request().args()),
            vec![
                "-x",
                "--audio-format",
                "mp3",
                "--audio-quality",
                "0",
                "-o",
                template.as_str(),
                "--no-playlist",
                "--embed-metadata",
                "https://www.youtube.com/watch?v=abc",
            ]
        );
    }

    #[test]
    fn ffmpeg_location_precedes_output_template() {
        let req = DownloadRequest {
            ffmpeg_path: Some(PathBuf::from("/usr/bin/ffmpeg")),
            quality_hint: None,
            no_playlist: false,
            embed_metadata: false,
            ..request()
        };
        let args = strings(req.args());

        assert!(!args.contains(&"--audio-quality".to_string()));
        assert!(!args.contains(&"--no-playlist".to_string()));
        let ffmpeg = args.iter().position(|a| a == "--ffmpeg-location").unwrap();
        let output = args.iter().position(|a| a == "-o").unwrap();
        assert_eq!(args[ffmpeg + 1], "/usr/bin/ffmpeg");
        assert!(ffmpeg < output);
        assert_eq!(args.last().unwrap(), "https://www.youtube.com/watch?v=abc");
    }

    #[test]
    fn command_line_starts_with_tool() {
        let line = request().command_line();
        assert!(line.starts_with("yt-dlp -x --audio-format mp3"));
        assert!(line.ends_with("https://www.youtube.com/watch?v=abc"));
    }

    #[test]
    fn exit_descriptions() {
        let err = DownloadError::ExecutionFailed {
            code: Some(2),
            stderr: String::new(),
            stdout: String::new(),
        };
        assert_eq!(err.to_string(), "Download failed (exit code 2)");

        let err = DownloadError::ExecutionFailed {
            code: None,
            stderr: String::new(),
            stdout: String::new(),
        };
        assert!(err.to_string().contains("signal"));
    }

    #[test]
    fn tool_errors_map_to_download_errors() {
        let err: DownloadError = ToolError::NotFound {
            tool: "yt-dlp".into(),
            searched: "PATH".into(),
        }
        .into();
        assert!(matches!(err, DownloadError::ToolNotFound { .. }));
        assert!(err.to_string().contains("not installed"));

        let err: DownloadError = ToolError::Permission {
            path: PathBuf::from("bin/yt-dlp"),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        }
        .into();
        assert!(matches!(err, DownloadError::Unexpected(_)));
    }

    #[cfg(unix)]
    #[test]
    fn missing_binary_is_tool_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let req = DownloadRequest {
            tool_path: dir.path().join("no-such-yt-dlp"),
            output_directory: dir.path().join("out"),
            ..request()
        };

        let err = download_audio(&req).unwrap_err();
        assert!(matches!(err, DownloadError::ToolNotFound { .. }));
        assert!(dir.path().join("out").is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn broken_interpreter_is_not_reported_as_missing_tool() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("yt-dlp");
        std::fs::write(&tool, "#!/nonexistent/interpreter\n").unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();
        let req = DownloadRequest {
            tool_path: tool,
            output_directory: dir.path().join("out"),
            ..request()
        };

        let err = download_audio(&req).unwrap_err();
        assert!(matches!(err, DownloadError::Unexpected(_)), "got {err:?}");
        assert!(err.to_string().starts_with("Failed to run"));
    }
}
