use std::path::{Path, PathBuf};

use anyhow::{Context, Error};
use tempfile::TempDir;

/// The private temporary directory of a single check, where drivers, objects and binaries are
/// written. The directory is removed on drop, unless it's marked to be kept.
#[derive(Debug)]
pub struct Scratch {
    /// `None` only during drop.
    dir: Option<TempDir>,
    /// Whether to keep the directory after drop.
    keep: bool,
}

impl Scratch {
    /// Make a new scratch directory inside `root`, named after `prefix`.
    pub fn new<P: AsRef<Path>>(root: P, prefix: &str, keep: bool) -> Result<Scratch, Error> {
        let root = root.as_ref();
        std::fs::create_dir_all(root)
            .with_context(|| format!("Failed to create scratch root {}", root.display()))?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("{}-", sanitize(prefix)))
            .tempdir_in(root)
            .with_context(|| format!("Failed to create scratch directory in {}", root.display()))?;
        Ok(Scratch {
            dir: Some(dir),
            keep,
        })
    }

    /// The path of the directory.
    pub fn path(&self) -> &Path {
        match &self.dir {
            Some(dir) => dir.path(),
            None => Path::new(""),
        }
    }

    /// The path of a file inside the directory.
    pub fn join<P: AsRef<Path>>(&self, name: P) -> PathBuf {
        self.path().join(name)
    }

    /// Write a file inside the directory, returning its path.
    pub fn write<P: AsRef<Path>, C: AsRef<[u8]>>(
        &self,
        name: P,
        content: C,
    ) -> Result<PathBuf, Error> {
        let path = self.join(name);
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Do not remove the directory on drop.
    pub fn keep(&mut self) {
        self.keep = true;
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        if self.keep {
            if let Some(dir) = self.dir.take() {
                let path = dir.keep();
                info!("Keeping scratch directory at {}", path.display());
            }
        }
    }
}

/// Only keep the characters that are safe in a file name.
fn sanitize(prefix: &str) -> String {
    prefix
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let scratch = Scratch::new(root.path(), "test 5.1", false).unwrap();
        let path = scratch.path().to_owned();
        assert!(path.starts_with(root.path()));
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("test_5_1-"));
        let file = scratch.write("driver.cpp", "int main() {}").unwrap();
        assert!(file.exists());
        drop(scratch);
        assert!(!path.exists());
    }

    #[test]
    fn test_kept() {
        let root = tempfile::tempdir().unwrap();
        let mut scratch = Scratch::new(root.path(), "kept", false).unwrap();
        scratch.keep();
        let path = scratch.path().to_owned();
        drop(scratch);
        assert!(path.exists());
    }
}
