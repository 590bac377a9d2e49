//! Query file discovery

use crate::error::{Result, SoundalikeError};
use crate::types::AudioFormat;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Discovered query file
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    pub format: AudioFormat,
    pub size_bytes: u64,
}

impl DiscoveredFile {
    /// Key used for this file in batch output
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Scan a path (file or directory) for query audio, sorted by path
pub fn scan(input: &Path, recursive: bool) -> Result<Vec<DiscoveredFile>> {
    if !input.exists() {
        return Err(SoundalikeError::FileNotFound(input.to_path_buf()));
    }

    let mut files = Vec::new();

    if input.is_file() {
        match try_discover_file(input) {
            Some(file) => files.push(file),
            None => {
                return Err(SoundalikeError::UnsupportedFormat {
                    path: input.to_path_buf(),
                    format: input
                        .extension()
                        .and_then(|e| e.to_str())
                        .unwrap_or("unknown")
                        .to_string(),
                });
            }
        }
    } else if input.is_dir() {
        let walker = if recursive {
            WalkDir::new(input)
        } else {
            WalkDir::new(input).max_depth(1)
        };

        for entry in walker.sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            if entry.file_type().is_file() {
                if let Some(file) = try_discover_file(path) {
                    debug!("Discovered: {}", file.path.display());
                    files.push(file);
                }
            }
        }
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    info!("Discovered {} audio files", files.len());

    if files.is_empty() {
        warn!("No supported audio files found in {}", input.display());
    }

    Ok(files)
}

fn try_discover_file(path: &Path) -> Option<DiscoveredFile> {
    let ext = path.extension()?.to_str()?;
    let format = AudioFormat::from_extension(ext)?;
    let size_bytes = std::fs::metadata(path).ok()?.len();

    Some(DiscoveredFile {
        path: path.to_path_buf(),
        format,
        size_bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_scan_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.wav"), b"x").unwrap();
        fs::write(dir.path().join("a.MP3"), b"x").unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("c.flac"), b"x").unwrap();

        let flat = scan(dir.path(), false).unwrap();
        let names: Vec<_> = flat.iter().map(|f| f.display_name()).collect();
        assert_eq!(names, vec!["a.MP3", "b.wav"]);
        assert_eq!(flat[0].format, AudioFormat::Mp3);

        let deep = scan(dir.path(), true).unwrap();
        assert_eq!(deep.len(), 3);
    }

    #[test]
    fn test_single_unsupported_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cover.jpg");
        fs::write(&path, b"x").unwrap();
        let err = scan(&path, false).unwrap_err();
        assert!(matches!(err, SoundalikeError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_missing_path() {
        let err = scan(Path::new("/nonexistent/query.mp3"), false).unwrap_err();
        assert!(matches!(err, SoundalikeError::FileNotFound(_)));
    }
}
