use crate::core::error::Result;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

/// Create parent directories for a path when missing.
pub fn make_parent_dirs<P: AsRef<Path>>(path: P) -> Result<()> {
    if let Some(parent) = path.as_ref().parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Detect whether a path uses a gzip extension.
pub fn is_gzipped<P: AsRef<Path>>(path: P) -> bool {
    matches!(
        path.as_ref().extension().unwrap_or_else(|| OsStr::new("")),
        ext if ext == "gz" || ext == "gzip"
    )
}

/// Sibling path a writer streams into before the destination is replaced.
pub fn staging_path<P: AsRef<Path>>(dest: P) -> PathBuf {
    let dest = dest.as_ref();
    let mut name = dest
        .file_name()
        .unwrap_or_else(|| OsStr::new("output"))
        .to_os_string();
    name.push(".partial");
    dest.with_file_name(name)
}

/// Move a finished staging path onto the destination, replacing any previous
/// file or directory there.
pub fn promote_staged(staged: &Path, dest: &Path) -> Result<()> {
    if dest.is_dir() {
        fs::remove_dir_all(dest)?;
    } else if dest.exists() {
        fs::remove_file(dest)?;
    }
    fs::rename(staged, dest)?;
    Ok(())
}

/// Best-effort cleanup of an abandoned staging path.
pub fn discard_staged(staged: &Path) {
    if staged.is_dir() {
        let _ = fs::remove_dir_all(staged);
    } else if staged.exists() {
        let _ = fs::remove_file(staged);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staging_path_appends_partial_suffix() {
        assert_eq!(
            staging_path(Path::new("/tmp/out.h5ad")),
            PathBuf::from("/tmp/out.h5ad.partial")
        );
        assert_eq!(staging_path(Path::new("out")), PathBuf::from("out.partial"));
    }

    #[test]
    fn gzip_detection_by_extension() {
        assert!(is_gzipped("quants_mat.mtx.gz"));
        assert!(!is_gzipped("quants_mat.mtx"));
    }
}
