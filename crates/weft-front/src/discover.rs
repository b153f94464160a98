use std::fs;
use std::path::{Path, PathBuf};

use crate::config::GeneratorConfig;
use crate::error::{DeclError, DeclResult};

/// Finds every declaration file under `source_root`.
///
/// Returns paths relative to `source_root`, sorted, so later stages see files in a stable
/// order regardless of directory iteration order.
pub fn discover(source_root: &Path, config: &GeneratorConfig) -> DeclResult<Vec<PathBuf>> {
    let mut found = Vec::new();
    walk(source_root, Path::new(""), config, &mut found)?;
    found.sort();
    log::debug!("found {} declaration files under {}", found.len(), source_root.display());
    Ok(found)
}

fn walk(root: &Path, relative: &Path, config: &GeneratorConfig, found: &mut Vec<PathBuf>) -> DeclResult<()> {
    let dir = root.join(relative);
    let entries = fs::read_dir(&dir).map_err(|source| DeclError::Io {
        path: dir.clone(),
        source,
    })?;

    for entry in entries {
        let entry = entry.map_err(|source| DeclError::Io {
            path: dir.clone(),
            source,
        })?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        let entry_path = entry.path();
        if entry_path.is_dir() {
            if config.input.exclude.iter().any(|excluded| excluded == name) {
                continue;
            }
            walk(root, &relative.join(name), config, found)?;
        } else if name.ends_with(config.input.declaration_suffix.as_str()) {
            found.push(relative.join(name));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_declarations_sorted_and_skips_excluded_dirs() {
        let dir = tempfile::tempdir().unwrap();
        for file in [
            "zlib.bind.toml",
            "node/fs.bind.toml",
            "node/fs.zig",
            "node/notes.toml",
            "node_modules/pkg/x.bind.toml",
            ".git/y.bind.toml",
            "a.bind.toml",
        ] {
            let path = dir.path().join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "").unwrap();
        }

        let found = discover(dir.path(), &GeneratorConfig::default()).unwrap();
        assert_eq!(
            found,
            [
                PathBuf::from("a.bind.toml"),
                PathBuf::from("node/fs.bind.toml"),
                PathBuf::from("zlib.bind.toml"),
            ]
        );
    }

    #[test]
    fn missing_root_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            discover(&missing, &GeneratorConfig::default()),
            Err(DeclError::Io { .. })
        ));
    }
}
