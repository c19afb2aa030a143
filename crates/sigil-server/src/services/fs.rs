use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use sigil_json_rpc::CallContext;
use sigil_protocol::ProtocolError;
use sigil_protocol::fs::{File, FsInterface, ListArg, ListResult};
use tracing::debug;

/// Lists directories below a fixed root
#[derive(Debug, Clone)]
pub struct FsService {
    root: PathBuf,
}

impl FsService {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Relative path below the root, or `None` if it would leave it
    fn confine(path: &str) -> Option<PathBuf> {
        let mut relative = PathBuf::new();
        for component in Path::new(path).components() {
            match component {
                Component::Normal(part) => relative.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
            }
        }
        Some(relative)
    }

    /// Real directory to list; symlinks may not lead out of the root
    async fn resolve(&self, requested: &str, relative: &Path) -> Result<PathBuf, ProtocolError> {
        let io_error = |e: std::io::Error| match e.kind() {
            std::io::ErrorKind::NotFound => ProtocolError::not_found(requested),
            _ => ProtocolError::failed(e.to_string()),
        };
        let root = tokio::fs::canonicalize(&self.root).await.map_err(io_error)?;
        let target = tokio::fs::canonicalize(root.join(relative))
            .await
            .map_err(io_error)?;
        if !target.starts_with(&root) {
            return Err(leaves_root(requested));
        }
        Ok(target)
    }
}

fn leaves_root(path: &str) -> ProtocolError {
    ProtocolError::failed(format!("path {} leaves the shared root", path))
}

#[async_trait]
impl FsInterface for FsService {
    async fn list(&self, _ctx: CallContext, arg: ListArg) -> Result<ListResult, ProtocolError> {
        let relative = Self::confine(&arg.path).ok_or_else(|| leaves_root(&arg.path))?;
        let target = self.resolve(&arg.path, &relative).await?;

        let mut entries = match tokio::fs::read_dir(&target).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ProtocolError::not_found(arg.path));
            }
            Err(e) => return Err(ProtocolError::failed(e.to_string())),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ProtocolError::failed(e.to_string()))?
        {
            let path = relative.join(entry.file_name());
            files.push(File {
                path: path.to_string_lossy().into_owned(),
            });
        }
        files.sort();
        debug!(
            session_id = %arg.session_id,
            path = %arg.path,
            count = files.len(),
            "Listed directory"
        );
        Ok(ListResult { files })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigil_json_rpc::{ConnectionId, SessionId};

    fn list(path: &str) -> ListArg {
        ListArg {
            session_id: SessionId(1),
            path: path.to_string(),
        }
    }

    #[tokio::test]
    async fn test_lists_below_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join("docs/b.txt"), b"b").unwrap();
        std::fs::write(dir.path().join("docs/a.txt"), b"a").unwrap();
        let service = FsService::new(dir.path());
        let ctx = CallContext::new(ConnectionId(1));

        let root = service.list(ctx.clone(), list(".")).await.unwrap();
        assert_eq!(root.files, vec![File { path: "docs".into() }]);

        let docs = service.list(ctx.clone(), list("docs")).await.unwrap();
        let paths: Vec<_> = docs.files.into_iter().map(|f| f.path).collect();
        assert_eq!(paths, vec!["docs/a.txt", "docs/b.txt"]);

        assert!(matches!(
            service.list(ctx, list("missing")).await.unwrap_err(),
            ProtocolError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_escapes_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let service = FsService::new(dir.path());
        let ctx = CallContext::new(ConnectionId(1));

        for path in ["/etc", "../", "docs/../../x"] {
            let err = service.list(ctx.clone(), list(path)).await.unwrap_err();
            assert!(matches!(err, ProtocolError::Failed(_)), "{} accepted", path);
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinks_stay_inside_root() {
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret.txt"), b"s").unwrap();
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("docs")).unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("out")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("docs"), dir.path().join("alias")).unwrap();
        let service = FsService::new(dir.path());
        let ctx = CallContext::new(ConnectionId(1));

        let err = service.list(ctx.clone(), list("out")).await.unwrap_err();
        assert!(matches!(err, ProtocolError::Failed(_)));

        // A link to somewhere below the root is fine
        assert!(service.list(ctx, list("alias")).await.unwrap().files.is_empty());
    }
}
