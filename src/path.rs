//! Absolute-path splitting.

use crate::config::FILE_NAME_LEN;
use crate::error::{FsError, Result};

/// Splits an absolute `/`-separated path into its components. Repeated
/// slashes collapse. A missing leading slash or an over-long component is
/// `InvalidPath`; `"/"` alone is `NotFound`, since the root itself never
/// resolves to a containing directory.
pub fn components(path: &str) -> Result<Vec<&str>> {
    let rest = path.strip_prefix('/').ok_or(FsError::InvalidPath)?;
    let parts: Vec<&str> = rest.split('/').filter(|c| !c.is_empty()).collect();
    if parts.is_empty() {
        return Err(FsError::NotFound);
    }
    if parts.iter().any(|c| c.len() > FILE_NAME_LEN) {
        return Err(FsError::InvalidPath);
    }
    Ok(parts)
}
