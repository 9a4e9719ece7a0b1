#[cfg(windows)]
pub mod windows;

use std::io;
use std::path::Path;

#[cfg(windows)]
pub fn is_busy_error(error: &io::Error) -> bool {
    windows::is_busy_error(error)
}

#[cfg(unix)]
pub fn is_busy_error(error: &io::Error) -> bool {
    matches!(error.raw_os_error(), Some(libc::EBUSY) | Some(libc::ETXTBSY))
}

/// Rename across filesystems.
#[cfg(unix)]
pub fn is_cross_device_error(error: &io::Error) -> bool {
    error.raw_os_error() == Some(libc::EXDEV)
}

#[cfg(windows)]
pub fn is_cross_device_error(error: &io::Error) -> bool {
    windows::is_cross_device_error(error)
}

#[cfg(unix)]
pub fn symlink_file(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
pub fn symlink_file(target: &Path, link: &Path) -> io::Result<()> {
    windows::symlink_file(target, link)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_busy_codes() {
        assert!(is_busy_error(&io::Error::from_raw_os_error(libc::EBUSY)));
        assert!(is_busy_error(&io::Error::from_raw_os_error(libc::ETXTBSY)));
        assert!(!is_busy_error(&io::Error::from_raw_os_error(libc::ENOENT)));
        assert!(!is_busy_error(&io::Error::new(io::ErrorKind::Other, "x")));
        assert!(is_cross_device_error(&io::Error::from_raw_os_error(libc::EXDEV)));
        assert!(!is_cross_device_error(&io::Error::from_raw_os_error(libc::EBUSY)));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_file() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("target.jpg");
        std::fs::write(&target, b"x").unwrap();
        let link = tmp.path().join("link.jpg");
        symlink_file(&target, &link).unwrap();
        assert_eq!(std::fs::read_link(&link).unwrap(), target);
    }
}
