//! Reading observed / ground-truth sequences from disk.

use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::{Frame, NowcastResult, Sequence};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)))
}

/// Keep PNG/JPEG paths and order them by file name.
pub fn select_images(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut out: Vec<PathBuf> = paths
        .iter()
        .filter(|p| is_supported_image(p))
        .cloned()
        .collect();
    out.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    out
}

/// Image files directly inside `dir`, filtered and sorted by name.
pub fn list_images(dir: &Path) -> NowcastResult<Vec<PathBuf>> {
    let mut paths = Vec::new();
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("read dir '{}'", dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("read dir entry in '{}'", dir.display()))?;
        let path = entry.path();
        if path.is_file() {
            paths.push(path);
        }
    }
    Ok(select_images(&paths))
}

/// Read frames in the given order. Bytes are not decoded here.
pub fn read_frames(paths: &[PathBuf]) -> NowcastResult<Sequence> {
    paths
        .iter()
        .map(|p| -> NowcastResult<Frame> {
            let bytes =
                std::fs::read(p).with_context(|| format!("read frame '{}'", p.display()))?;
            Ok(Frame::from_bytes(bytes))
        })
        .collect()
}
