//! Settings for a run, independent of how they were supplied.

use std::path::PathBuf;

use tracing::debug;

use crate::db;
use crate::downloader::{DownloadError, DownloadRequest};
use crate::tools::{ToolLocator, DEFAULT_FFMPEG_FALLBACK};

pub const DEFAULT_OUTPUT_DIR: &str = "downloaded_audios";
pub const DEFAULT_AUDIO_FORMAT: &str = "mp3";
pub const DEFAULT_AUDIO_QUALITY: &str = "0";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub output_dir: PathBuf,
    pub audio_format: String,
    pub audio_quality: Option<String>,
    pub yt_dlp: Option<PathBuf>,
    pub ffmpeg: Option<PathBuf>,
    pub ffmpeg_fallback: PathBuf,
    pub use_ffmpeg: bool,
    pub no_playlist: bool,
    pub embed_metadata: bool,
    pub history_db: Option<PathBuf>,
    pub record_history: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            audio_format: DEFAULT_AUDIO_FORMAT.to_string(),
            audio_quality: Some(DEFAULT_AUDIO_QUALITY.to_string()),
            yt_dlp: None,
            ffmpeg: None,
            ffmpeg_fallback: PathBuf::from(DEFAULT_FFMPEG_FALLBACK),
            use_ffmpeg: true,
            no_playlist: true,
            embed_metadata: true,
            history_db: None,
            record_history: true,
        }
    }
}

impl Settings {
    /// Resolve tools and build the request for `url`.
    pub fn request(&self, url: &str, locator: &ToolLocator) -> Result<DownloadRequest, DownloadError> {
        let tool_path = locator.extractor(self.yt_dlp.as_deref())?;
        let ffmpeg_path = self
            .use_ffmpeg
            .then(|| locator.transcoder(self.ffmpeg.as_deref(), &self.ffmpeg_fallback))
            .map(|t| t.into_path());
        debug!(tool = %tool_path.display(), ffmpeg = ?ffmpeg_path, "tools resolved");

        Ok(DownloadRequest {
            url: url.to_string(),
            output_directory: self.output_dir.clone(),
            audio_format: self.audio_format.clone(),
            quality_hint: self.audio_quality.clone(),
            tool_path,
            ffmpeg_path,
            no_playlist: self.no_playlist,
            embed_metadata: self.embed_metadata,
        })
    }

    /// History database location: explicit, else the platform data directory.
    pub fn history_path(&self) -> Option<PathBuf> {
        self.history_db.clone().or_else(db::default_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    #[test]
    fn request_uses_explicit_tool_and_fallback_ffmpeg() {
        let dir = tempdir().unwrap();
        let tool = dir.path().join("yt-dlp");
        fs::write(&tool, "").unwrap();
        let settings = Settings {
            yt_dlp: Some(tool.clone()),
            ffmpeg_fallback: PathBuf::from("/fallback/ffmpeg"),
            ..Settings::default()
        };
        let locator = ToolLocator::new(
            Some(dir.path().as_os_str().to_owned()),
            None,
            dir.path().to_path_buf(),
        );

        let request = settings.request("https://youtu.be/x", &locator).unwrap();
        assert_eq!(request.tool_path, tool);
        assert_eq!(request.ffmpeg_path.as_deref(), Some(Path::new("/fallback/ffmpeg")));
        assert_eq!(request.output_directory, PathBuf::from(DEFAULT_OUTPUT_DIR));
        assert_eq!(request.audio_format, "mp3");
        assert_eq!(request.quality_hint.as_deref(), Some("0"));
        assert!(request.no_playlist && request.embed_metadata);
    }

    #[test]
    fn ffmpeg_can_be_disabled() {
        let dir = tempdir().unwrap();
        let tool = dir.path().join("yt-dlp");
        fs::write(&tool, "").unwrap();
        let settings = Settings {
            yt_dlp: Some(tool),
            use_ffmpeg: false,
            ..Settings::default()
        };
        let locator = ToolLocator::new(None, None, dir.path().to_path_buf());

        let request = settings.request("u", &locator).unwrap();
        assert_eq!(request.ffmpeg_path, None);
    }

    #[test]
    fn missing_tool_is_reported_before_any_request() {
        let dir = tempdir().unwrap();
        let locator = ToolLocator::new(
            Some(dir.path().as_os_str().to_owned()),
            None,
            dir.path().to_path_buf(),
        );

        let err = Settings::default().request("u", &locator).unwrap_err();
        assert!(matches!(err, DownloadError::ToolNotFound { .. }));
    }

    #[test]
    fn explicit_history_path_wins() {
        let settings = Settings {
            history_db: Some(PathBuf::from("/tmp/h.sqlite3")),
            ..Settings::default()
        };
        assert_eq!(settings.history_path(), Some(PathBuf::from("/tmp/h.sqlite3")));
    }
}
