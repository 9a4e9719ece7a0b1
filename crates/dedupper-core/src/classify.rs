use crate::config::{AppConfig, ScrapConfig};
use crate::model::{ClassifyType, FileState};
use chrono::{DateTime, Datelike};
use std::path::{Path, PathBuf};

pub const CACHE_SUFFIX: &str = "dpcache";
pub const LOCK_SUFFIX: &str = "dplock";

const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "webp", "tif", "tiff", "heic", "heif",
];
const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "m4v", "mov", "avi", "mkv", "wmv", "flv", "mpg", "mpeg", "3gp", "webm", "ts",
];

pub fn classify(path: &Path, scrap: &ScrapConfig) -> ClassifyType {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    if ext == CACHE_SUFFIX {
        return ClassifyType::DedupperCache;
    }
    if ext == LOCK_SUFFIX {
        return ClassifyType::DedupperLock;
    }
    if scrap.names.iter().any(|n| n.eq_ignore_ascii_case(&name))
        || scrap.extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext))
    {
        return ClassifyType::Scrap;
    }
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        return ClassifyType::Image;
    }
    if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        return ClassifyType::Video;
    }
    ClassifyType::Unknown
}

/// `<path>.<suffix>` next to `path`.
pub fn sidecar_path(path: &Path, suffix: &str) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".");
    os.push(suffix);
    PathBuf::from(os)
}

/// The file a `.dpcache` / `.dplock` sidecar belongs to.
pub fn sidecar_target(path: &Path) -> PathBuf {
    path.with_extension("")
}

/// Library destination: `<base>/<type>/<YYYY>/<MM>/<name>`.
pub fn library_destination(
    config: &AppConfig,
    file_type: ClassifyType,
    state: FileState,
    timestamp: i64,
    name: &str,
) -> PathBuf {
    let base = if state.is_keeping() {
        &config.keeping_path
    } else {
        &config.library_path
    };
    let mut dest = base.join(file_type.as_str());
    if let Some(date) = DateTime::from_timestamp_millis(timestamp) {
        dest.push(format!("{:04}", date.year()));
        dest.push(format!("{:02}", date.month()));
    }
    dest.push(name);
    dest
}
