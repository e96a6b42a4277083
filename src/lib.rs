pub mod cli;
pub mod config;
pub mod db;
pub mod downloader;
pub mod logging;
pub mod output;
pub mod probe;
pub mod tools;

pub use downloader::{download_audio, DownloadError, DownloadOutcome, DownloadRequest};
