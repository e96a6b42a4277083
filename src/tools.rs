//! Locating the external tools: `yt-dlp` for extraction and `ffmpeg` for
//! transcoding.
//!
//! The extraction tool is looked up in a fixed order: an explicit path, the
//! search `PATH`, then a copy bundled in `bin/` next to our own executable.
//! The transcoding tool never aborts a run; when it cannot be found a
//! configurable default path is handed to yt-dlp instead.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

pub const EXTRACTOR: &str = "yt-dlp";
pub const TRANSCODER: &str = "ffmpeg";

/// Directory (relative to the running executable) holding a bundled yt-dlp.
pub const BUNDLE_DIR: &str = "bin";

#[cfg(target_os = "windows")]
pub const DEFAULT_FFMPEG_FALLBACK: &str = r"C:\ffmpeg\bin\ffmpeg.exe";

#[cfg(target_os = "macos")]
pub const DEFAULT_FFMPEG_FALLBACK: &str = "/opt/homebrew/bin/ffmpeg";

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
pub const DEFAULT_FFMPEG_FALLBACK: &str = "/usr/bin/ffmpeg";

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("{tool} not found (searched: {searched})")]
    NotFound { tool: String, searched: String },

    #[error("Failed to make {path} executable: {source}")]
    Permission {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Where the transcoding tool came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transcoder {
    /// Given explicitly or found on the search path.
    Found(PathBuf),
    /// Not discoverable; the configured default is used instead.
    Fallback(PathBuf),
}

impl Transcoder {
    pub fn into_path(self) -> PathBuf {
        match self {
            Transcoder::Found(path) | Transcoder::Fallback(path) => path,
        }
    }
}

/// Resolves tool paths against a search path and a bundle directory.
#[derive(Debug, Clone)]
pub struct ToolLocator {
    search_path: Option<OsString>,
    bundle_dir: Option<PathBuf>,
    cwd: PathBuf,
}

impl ToolLocator {
    /// Locator backed by the process environment.
    pub fn from_env() -> Self {
        let bundle_dir = env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join(BUNDLE_DIR)));

        Self {
            search_path: env::var_os("PATH"),
            bundle_dir,
            cwd: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    pub fn new(search_path: Option<OsString>, bundle_dir: Option<PathBuf>, cwd: PathBuf) -> Self {
        Self {
            search_path,
            bundle_dir,
            cwd,
        }
    }

    /// Look a binary up on the search path.
    pub fn search(&self, name: &str) -> Option<PathBuf> {
        which::which_in(name, self.search_path.as_ref(), &self.cwd).ok()
    }

    /// Resolve the extraction tool.
    pub fn extractor(&self, explicit: Option<&Path>) -> Result<PathBuf, ToolError> {
        if let Some(path) = explicit {
            if path.is_file() {
                debug!(path = %path.display(), "using explicit {EXTRACTOR}");
                return Ok(path.to_path_buf());
            }
            return Err(ToolError::NotFound {
                tool: EXTRACTOR.to_string(),
                searched: path.display().to_string(),
            });
        }

        if let Some(path) = self.search(EXTRACTOR) {
            debug!(path = %path.display(), "found {EXTRACTOR} on PATH");
            return Ok(path);
        }

        let mut searched = vec!["PATH".to_string()];
        if let Some(dir) = &self.bundle_dir {
            let bundled = dir.join(format!("{EXTRACTOR}{}", env::consts::EXE_SUFFIX));
            if bundled.is_file() {
                ensure_executable(&bundled)?;
                debug!(path = %bundled.display(), "using bundled {EXTRACTOR}");
                return Ok(bundled);
            }
            searched.push(bundled.display().to_string());
        }

        Err(ToolError::NotFound {
            tool: EXTRACTOR.to_string(),
            searched: searched.join(", "),
        })
    }

    /// Resolve the transcoding tool, falling back to `fallback` with a warning.
    pub fn transcoder(&self, explicit: Option<&Path>, fallback: &Path) -> Transcoder {
        if let Some(path) = explicit {
            if !path.exists() {
                warn!(path = %path.display(), "explicit {TRANSCODER} does not exist, passing it on anyway");
            }
            return Transcoder::Found(path.to_path_buf());
        }

        if let Some(path) = self.search(TRANSCODER) {
            debug!(path = %path.display(), "found {TRANSCODER} on PATH");
            return Transcoder::Found(path);
        }

        warn!(
            fallback = %fallback.display(),
            "{TRANSCODER} not found on PATH, using fallback location"
        );
        Transcoder::Fallback(fallback.to_path_buf())
    }
}

/// Add execute permission to `path` if none of its execute bits are set.
#[cfg(unix)]
pub fn ensure_executable(path: &Path) -> Result<(), ToolError> {
    let to_err = |source| ToolError::Permission {
        path: path.to_path_buf(),
        source,
    };

    let mut perms = fs::metadata(path).map_err(to_err)?.permissions();
    let mode = perms.mode();
    if mode & 0o111 == 0 {
        perms.set_mode(mode | 0o755);
        fs::set_permissions(path, perms).map_err(to_err)?;
        debug!(path = %path.display(), "marked bundled tool executable");
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn ensure_executable(path: &Path) -> Result<(), ToolError> {
    fs::metadata(path)
        .map(|_| ())
        .map_err(|source| ToolError::Permission {
            path: path.to_path_buf(),
            source,
        })
}
