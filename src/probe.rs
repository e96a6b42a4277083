use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, MetadataRevision, StandardTagKey};
use symphonia::core::probe::Hint;

/// What we could learn about a downloaded audio file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackInfo {
    pub path: PathBuf,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub duration_seconds: Option<u64>,
}

impl TrackInfo {
    /// Title from tags, else the file stem (yt-dlp names files after the title).
    pub fn display_title(&self) -> String {
        self.title.clone().unwrap_or_else(|| {
            self.path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
    }
}

/// Open `path` with symphonia and read tags and duration.
pub fn probe(path: &Path) -> Result<TrackInfo> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let mut probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .with_context(|| format!("Unsupported audio file {}", path.display()))?;

    let mut info = TrackInfo {
        path: path.to_path_buf(),
        ..Default::default()
    };

    // ID3v2 is read during probing; container-level tags live on the reader.
    if let Some(rev) = probed.metadata.get().as_ref().and_then(|m| m.current()) {
        apply_tags(&mut info, rev);
    }
    if let Some(rev) = probed.format.metadata().current() {
        apply_tags(&mut info, rev);
    }

    if let Some(track) = probed.format.default_track() {
        let params = &track.codec_params;
        if let (Some(tb), Some(frames)) = (params.time_base, params.n_frames) {
            let time = tb.calc_time(frames);
            info.duration_seconds = Some(time.seconds + (time.frac >= 0.5) as u64);
        }
    }

    Ok(info)
}

fn apply_tags(info: &mut TrackInfo, rev: &MetadataRevision) {
    for tag in rev.tags() {
        match tag.std_key {
            Some(StandardTagKey::TrackTitle) if info.title.is_none() => {
                info.title = Some(tag.value.to_string());
            }
            Some(StandardTagKey::Artist) if info.artist.is_none() => {
                info.artist = Some(tag.value.to_string());
            }
            _ => {}
        }
    }
}

/// `m:ss`, or `h:mm:ss` past the hour.
pub fn format_duration(seconds: u64) -> String {
    let (h, m, s) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}
