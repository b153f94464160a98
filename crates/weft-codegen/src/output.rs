use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{CodegenError, CodegenResult};

/// One generated file, relative to the output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub contents: String,
}

/// What an idempotent write pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteReport {
    pub written: Vec<PathBuf>,
    pub unchanged: Vec<PathBuf>,
}

/// Writes `contents` unless the file already holds exactly these bytes.
///
/// Returns whether the file was written. Parent directories are created as needed.
pub fn write_if_changed(path: &Path, contents: &str) -> CodegenResult<bool> {
    let io = |source| CodegenError::Io {
        path: path.to_path_buf(),
        source,
    };
    match fs::read(path) {
        Ok(existing) if existing == contents.as_bytes() => return Ok(false),
        Ok(_) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => return Err(io(err)),
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io)?;
    }
    fs::write(path, contents).map_err(io)?;
    Ok(true)
}

pub(crate) fn write_artifacts(output_root: &Path, artifacts: &[Artifact]) -> CodegenResult<WriteReport> {
    let mut report = WriteReport::default();
    for artifact in artifacts {
        let path = output_root.join(&artifact.path);
        if write_if_changed(&path, &artifact.contents)? {
            log::debug!("wrote {}", path.display());
            report.written.push(artifact.path.clone());
        } else {
            log::trace!("{} is up to date", path.display());
            report.unchanged.push(artifact.path.clone());
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_contents_are_not_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.txt");
        assert!(write_if_changed(&path, "one").unwrap());
        assert!(!write_if_changed(&path, "one").unwrap());
        assert!(write_if_changed(&path, "two").unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "two");
    }

    #[test]
    fn report_splits_written_and_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = vec![
            Artifact {
                path: "a.txt".into(),
                contents: "a".to_string(),
            },
            Artifact {
                path: "b.txt".into(),
                contents: "b".to_string(),
            },
        ];
        fs::write(dir.path().join("b.txt"), "b").unwrap();
        let report = write_artifacts(dir.path(), &artifacts).unwrap();
        assert_eq!(report.written, [PathBuf::from("a.txt")]);
        assert_eq!(report.unchanged, [PathBuf::from("b.txt")]);
    }
}
