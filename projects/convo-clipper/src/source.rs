// Video acquisition: URL in, local `.mp4` path out
//
// Downloads go through `yt-dlp` and are cached as `<video-dir>/<video-id>.mp4`;
// a cached file is reused without touching the network.

use crate::error::AcquisitionError;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

pub trait VideoSource {
    fn acquire(&self, url: &str) -> Result<PathBuf, AcquisitionError>;
}

pub struct YtDlpSource {
    video_dir: PathBuf,
    format: String,
}

impl YtDlpSource {
    pub fn new(video_dir: impl Into<PathBuf>) -> Self {
        Self {
            video_dir: video_dir.into(),
            format: "best[ext=mp4]".to_string(),
        }
    }

    pub fn cached_path(&self, video_id: &str) -> PathBuf {
        self.video_dir.join(format!("{}.mp4", video_id))
    }
}

impl VideoSource for YtDlpSource {
    fn acquire(&self, url: &str) -> Result<PathBuf, AcquisitionError> {
        let video_id =
            extract_video_id(url).ok_or_else(|| AcquisitionError::InvalidUrl(url.to_string()))?;

        fs::create_dir_all(&self.video_dir)?;
        let output_path = self.cached_path(&video_id);

        if is_usable_file(&output_path) {
            tracing::info!("Video already exists at {}", output_path.display());
            return Ok(output_path);
        }

        let yt_dlp = which::which("yt-dlp").map_err(|_| AcquisitionError::YtDlpNotFound)?;

        tracing::info!("Downloading video from {} to {}", url, output_path.display());
        let status = Command::new(yt_dlp)
            .arg("-f")
            .arg(&self.format)
            .arg("-o")
            .arg(&output_path)
            .arg(url)
            .status()?;

        if !status.success() {
            return Err(AcquisitionError::DownloadFailed {
                message: format!("yt-dlp exited with {}", status),
                exit_code: status.code(),
            });
        }

        if !is_usable_file(&output_path) {
            return Err(AcquisitionError::MissingOutput(output_path));
        }

        tracing::info!("Video downloaded to {}", output_path.display());
        Ok(output_path)
    }
}

fn is_usable_file(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

/// Extract the 11-character YouTube video id from the common URL shapes
/// (`watch?v=`, `youtu.be/`, `/embed/`, `/v/`, `/shorts/`).
pub fn extract_video_id(url: &str) -> Option<String> {
    let url = url.trim();
    let lower = url.to_ascii_lowercase();
    if !(lower.contains("youtube.com") || lower.contains("youtu.be")) {
        return None;
    }

    let markers = ["?v=", "&v=", "youtu.be/", "/embed/", "/v/", "/shorts/"];
    markers
        .iter()
        .filter_map(|marker| url.find(marker).map(|pos| &url[pos + marker.len()..]))
        .map(|rest| {
            let end = rest.find(['&', '#', '?', '/']).unwrap_or(rest.len());
            &rest[..end]
        })
        .find(|id| is_valid_video_id(id))
        .map(str::to_string)
}

fn is_valid_video_id(id: &str) -> bool {
    id.len() == 11
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_video_id_formats() {
        let expected = Some("dQw4w9WgXcQ".to_string());
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            expected
        );
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42s"),
            expected
        );
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?feature=share&v=dQw4w9WgXcQ"),
            expected
        );
        assert_eq!(extract_video_id("https://youtu.be/dQw4w9WgXcQ?si=abc"), expected);
        assert_eq!(
            extract_video_id("https://www.youtube.com/embed/dQw4w9WgXcQ"),
            expected
        );
        assert_eq!(
            extract_video_id("https://youtube.com/shorts/dQw4w9WgXcQ"),
            expected
        );
        assert_eq!(
            extract_video_id("  https://m.youtube.com/watch?v=dQw4w9WgXcQ  "),
            expected
        );
    }

    #[test]
    fn test_extract_video_id_rejects_bad_urls() {
        assert_eq!(extract_video_id("https://vimeo.com/123456"), None);
        assert_eq!(extract_video_id("https://www.youtube.com/watch?v=short"), None);
        assert_eq!(extract_video_id("https://www.youtube.com/"), None);
        assert_eq!(extract_video_id("not a url"), None);
    }

    #[test]
    fn test_cached_video_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let source = YtDlpSource::new(dir.path());
        let cached = source.cached_path("dQw4w9WgXcQ");
        fs::write(&cached, b"not really a video").unwrap();

        let path = source
            .acquire("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
            .unwrap();
        assert_eq!(path, cached);
        assert_eq!(fs::read(&path).unwrap(), b"not really a video");
    }

    #[test]
    fn test_invalid_url_is_acquisition_failure() {
        let dir = tempfile::tempdir().unwrap();
        let source = YtDlpSource::new(dir.path().join("videos"));
        let err = source.acquire("https://example.com/video").unwrap_err();
        assert!(matches!(err, AcquisitionError::InvalidUrl(_)));
        // Nothing is created for a URL that cannot be cached
        assert!(!dir.path().join("videos").exists());
    }
}
