use std::path::{Component, Path, PathBuf};

use crate::error::{JarvisError, Result};

/// Path-jailed filesystem access: every path is resolved inside `root`.
#[derive(Debug, Clone)]
pub struct SandboxedFs {
    root: PathBuf,
}

impl SandboxedFs {
    pub fn new(root: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&root)?;
        let root = root
            .canonicalize()
            .map_err(|e| JarvisError::SandboxViolation(format!("cannot canonicalize root: {e}")))?;
        Ok(Self { root })
    }

    /// Resolve a relative path within the sandbox. Rejects any path that escapes.
    pub fn resolve(&self, relative: &Path) -> Result<PathBuf> {
        if relative.is_absolute() {
            return Err(JarvisError::SandboxViolation(
                "absolute paths are not allowed".into(),
            ));
        }
        if relative
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(JarvisError::SandboxViolation(format!(
                "path escapes sandbox: {}",
                relative.display()
            )));
        }

        let candidate = self.root.join(relative);

        // Existing paths may still be symlinks pointing outside.
        if candidate.exists() {
            let canonical = candidate.canonicalize()?;
            if !canonical.starts_with(&self.root) {
                return Err(JarvisError::SandboxViolation(format!(
                    "path escapes sandbox: {}",
                    relative.display()
                )));
            }
            return Ok(canonical);
        }

        // New paths: the deepest existing ancestor must resolve inside the root.
        let mut existing = candidate.as_path();
        let mut rest = Vec::new();
        while !existing.exists() {
            let (Some(parent), Some(name)) = (existing.parent(), existing.file_name()) else {
                return Err(JarvisError::SandboxViolation("invalid filename".into()));
            };
            rest.push(name.to_os_string());
            existing = parent;
        }
        let mut resolved = existing.canonicalize()?;
        if !resolved.starts_with(&self.root) {
            return Err(JarvisError::SandboxViolation(format!(
                "path escapes sandbox: {}",
                relative.display()
            )));
        }
        resolved.extend(rest.iter().rev());
        Ok(resolved)
    }

    #[cfg(test)]
    fn root(&self) -> &Path {
        &self.root
    }

    pub async fn read_to_string(&self, relative: &Path) -> Result<String> {
        let path = self.resolve(relative)?;
        Ok(tokio::fs::read_to_string(path).await?)
    }

    pub async fn write(&self, relative: &Path, data: &[u8]) -> Result<()> {
        let path = self.resolve(relative)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(tokio::fs::write(path, data).await?)
    }

    pub async fn append(&self, relative: &Path, data: &[u8]) -> Result<()> {
        use tokio::io::AsyncWriteExt;

        let path = self.resolve(relative)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(data).await?;
        Ok(())
    }

    pub fn exists(&self, relative: &Path) -> bool {
        self.resolve(relative).map(|p| p.exists()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_valid_paths() {
        let tmp = tempfile::tempdir().unwrap();
        let sandbox = SandboxedFs::new(tmp.path().to_path_buf()).unwrap();

        let p1 = sandbox.resolve(Path::new("notes.txt")).unwrap();
        assert!(p1.ends_with("notes.txt"));
        assert!(p1.starts_with(sandbox.root()));

        let p2 = sandbox.resolve(Path::new("sub/notes.txt")).unwrap();
        assert!(p2.starts_with(sandbox.root()));
    }

    #[test]
    fn resolve_rejects_traversal() {
        let tmp = tempfile::tempdir().unwrap();
        let sandbox = SandboxedFs::new(tmp.path().to_path_buf()).unwrap();

        assert!(sandbox.resolve(Path::new("../etc/passwd")).is_err());
        assert!(sandbox.resolve(Path::new("sub/../../etc/passwd")).is_err());
        assert!(sandbox.resolve(Path::new("..")).is_err());
    }

    #[test]
    fn resolve_rejects_absolute_paths() {
        let tmp = tempfile::tempdir().unwrap();
        let sandbox = SandboxedFs::new(tmp.path().to_path_buf()).unwrap();
        assert!(sandbox.resolve(Path::new("/etc/passwd")).is_err());
    }

    #[tokio::test]
    async fn write_append_read() {
        let tmp = tempfile::tempdir().unwrap();
        let sandbox = SandboxedFs::new(tmp.path().to_path_buf()).unwrap();
        let rel = Path::new("todo.txt");

        assert!(!sandbox.exists(rel));
        sandbox.write(rel, b"one").await.unwrap();
        sandbox.append(rel, b"\ntwo").await.unwrap();
        assert!(sandbox.exists(rel));
        assert_eq!(sandbox.read_to_string(rel).await.unwrap(), "one\ntwo");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn new_file_under_symlinked_dir_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let sandbox = SandboxedFs::new(tmp.path().to_path_buf()).unwrap();
        std::os::unix::fs::symlink(outside.path(), tmp.path().join("link")).unwrap();

        for rel in ["link/pwned.txt", "link/deeper/pwned.txt"] {
            assert!(sandbox.resolve(Path::new(rel)).is_err(), "{rel}");
            assert!(sandbox.write(Path::new(rel), b"x").await.is_err());
            assert!(sandbox.append(Path::new(rel), b"x").await.is_err());
        }
        assert!(!outside.path().join("pwned.txt").exists());
        assert!(!outside.path().join("deeper").exists());
    }

    #[tokio::test]
    async fn new_nested_path_resolves_inside_root() {
        let tmp = tempfile::tempdir().unwrap();
        let sandbox = SandboxedFs::new(tmp.path().to_path_buf()).unwrap();
        let p = sandbox.resolve(Path::new("a/b/c.txt")).unwrap();
        assert_eq!(p, sandbox.root().join("a").join("b").join("c.txt"));
        sandbox.write(Path::new("a/b/c.txt"), b"ok").await.unwrap();
        assert_eq!(sandbox.read_to_string(Path::new("a/b/c.txt")).await.unwrap(), "ok");
    }
}
