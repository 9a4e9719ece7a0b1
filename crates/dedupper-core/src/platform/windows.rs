use std::io;
use std::path::Path;
use winapi::shared::winerror::{ERROR_LOCK_VIOLATION, ERROR_NOT_SAME_DEVICE, ERROR_SHARING_VIOLATION};

pub fn is_busy_error(error: &io::Error) -> bool {
    match error.raw_os_error() {
        Some(code) => {
            code == ERROR_SHARING_VIOLATION as i32 || code == ERROR_LOCK_VIOLATION as i32
        }
        None => false,
    }
}

pub fn is_cross_device_error(error: &io::Error) -> bool {
    error.raw_os_error() == Some(ERROR_NOT_SAME_DEVICE as i32)
}

pub fn symlink_file(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let busy = io::Error::from_raw_os_error(ERROR_SHARING_VIOLATION as i32);
        assert!(is_busy_error(&busy));
        assert!(!is_cross_device_error(&busy));
        let cross = io::Error::from_raw_os_error(ERROR_NOT_SAME_DEVICE as i32);
        assert!(is_cross_device_error(&cross));
    }
}
