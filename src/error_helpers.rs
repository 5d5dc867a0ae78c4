//! Error helper functions for creating actionable error messages

use std::io;
use std::path::Path;

/// Check if an IO error is a permission denied error
pub fn is_permission_denied(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::PermissionDenied
}

/// Check if an IO error is a "not found" error
pub fn is_not_found(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::NotFound
}

/// Check if an IO error means the volume is out of space
pub fn is_storage_full(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::StorageFull
}

/// One-line hint appended to operator log lines for common failures
pub fn hint_for(err: &io::Error, path: &Path) -> Option<String> {
    let dir = path
        .parent()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| ".".to_string());

    if is_permission_denied(err) {
        Some(format!("check write access to '{}'", dir))
    } else if is_storage_full(err) {
        Some(format!("free some space on the volume holding '{}'", dir))
    } else if is_not_found(err) {
        Some(format!("'{}' does not exist", path.display()))
    } else {
        None
    }
}

/// Create an enhanced error message for a missing mountlist
pub fn mountlist_missing_error(path: &Path) -> String {
    format!(
        "Mountlist not found: '{}'\n\n\
         Possible fixes:\n\
         1. Install the cloud handlers so the mountlist is created\n\
         2. Point cloudcfg at the right directory: --cloud-dir <DIR>\n\
         3. Check 'dir' and 'mountlist' in ~/.cloudcfg/config.toml",
        path.display()
    )
}

/// Create an enhanced error message for file permission issues
pub fn permission_error(path: &Path, operation: &str) -> String {
    let parent_dir = path
        .parent()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| ".".to_string());

    format!(
        "Permission denied when {} '{}'\n\n\
         Possible fixes:\n\
         1. Check file permissions: ls -l '{}'\n\
         2. Ensure the directory is writable: chmod u+w '{}'",
        operation,
        path.display(),
        path.display(),
        parent_dir
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::ErrorKind;

    #[test]
    fn test_is_permission_denied() {
        let perm_err = io::Error::new(ErrorKind::PermissionDenied, "access denied");
        assert!(is_permission_denied(&perm_err));

        let not_found_err = io::Error::new(ErrorKind::NotFound, "not found");
        assert!(!is_permission_denied(&not_found_err));
    }

    #[test]
    fn test_is_storage_full() {
        let full = io::Error::new(ErrorKind::StorageFull, "disk full");
        assert!(is_storage_full(&full));
        assert!(!is_storage_full(&io::Error::new(ErrorKind::Other, "x")));
    }

    #[test]
    fn test_hint_for_permission() {
        let err = io::Error::new(ErrorKind::PermissionDenied, "denied");
        let hint = hint_for(&err, Path::new("/cloud/cloud.mountlist")).unwrap();
        assert!(hint.contains("/cloud"));
    }

    #[test]
    fn test_hint_for_other_is_none() {
        let err = io::Error::new(ErrorKind::Other, "odd");
        assert!(hint_for(&err, Path::new("/cloud/cloud.mountlist")).is_none());
    }

    #[test]
    fn test_mountlist_missing_error_formatting() {
        let msg = mountlist_missing_error(Path::new("/cloud/cloud.mountlist"));
        assert!(msg.contains("Mountlist not found"));
        assert!(msg.contains("/cloud/cloud.mountlist"));
        assert!(msg.contains("Possible fixes"));
    }

    #[test]
    fn test_permission_error_formatting() {
        let msg = permission_error(Path::new("/tmp/test.txt"), "writing");
        assert!(msg.contains("Permission denied"));
        assert!(msg.contains("writing"));
    }
}
