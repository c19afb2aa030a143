use async_trait::async_trait;
use parking_lot::RwLock;
use sigil_json_rpc::CallContext;
use sigil_protocol::ProtocolError;
use sigil_protocol::favorite::{
    FavoriteAddArg, FavoriteDeleteArg, FavoriteInterface, FavoriteListArg, Folder,
};
use tracing::debug;

/// Server-wide favorite folders, shared by every session
#[derive(Debug, Default)]
pub struct FavoriteService {
    folders: RwLock<Vec<Folder>>,
}

impl FavoriteService {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FavoriteInterface for FavoriteService {
    async fn favorite_add(
        &self,
        _ctx: CallContext,
        arg: FavoriteAddArg,
    ) -> Result<(), ProtocolError> {
        if arg.folder.name.is_empty() {
            return Err(ProtocolError::failed("folder name is empty"));
        }
        let mut folders = self.folders.write();
        match folders.iter_mut().find(|f| f.name == arg.folder.name) {
            Some(existing) => *existing = arg.folder,
            None => {
                debug!(session_id = %arg.session_id, folder = %arg.folder.name, "Favorite added");
                folders.push(arg.folder);
            }
        }
        Ok(())
    }

    async fn favorite_delete(
        &self,
        _ctx: CallContext,
        arg: FavoriteDeleteArg,
    ) -> Result<(), ProtocolError> {
        let mut folders = self.folders.write();
        let before = folders.len();
        folders.retain(|f| f.name != arg.folder.name);
        if folders.len() != before {
            debug!(session_id = %arg.session_id, folder = %arg.folder.name, "Favorite deleted");
        }
        Ok(())
    }

    async fn favorite_list(
        &self,
        _ctx: CallContext,
        _arg: FavoriteListArg,
    ) -> Result<Vec<Folder>, ProtocolError> {
        Ok(self.folders.read().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigil_json_rpc::{ConnectionId, SessionId};

    fn ctx() -> CallContext {
        CallContext::new(ConnectionId(1))
    }

    fn add(name: &str) -> FavoriteAddArg {
        FavoriteAddArg {
            session_id: SessionId(7),
            folder: Folder::new(name),
        }
    }

    #[tokio::test]
    async fn test_add_is_idempotent() {
        let service = FavoriteService::new();
        service.favorite_add(ctx(), add("x")).await.unwrap();
        service.favorite_add(ctx(), add("x")).await.unwrap();

        let mut private = add("x");
        private.folder = private.folder.private(true);
        service.favorite_add(ctx(), private).await.unwrap();

        let listed = service
            .favorite_list(ctx(), FavoriteListArg { session_id: SessionId(7) })
            .await
            .unwrap();
        assert_eq!(listed, vec![Folder::new("x").private(true)]);
    }

    #[tokio::test]
    async fn test_delete_missing_is_a_no_op() {
        let service = FavoriteService::new();
        service
            .favorite_delete(
                ctx(),
                FavoriteDeleteArg {
                    session_id: SessionId(7),
                    folder: Folder::new("absent"),
                },
            )
            .await
            .unwrap();
        assert!(
            service
                .favorite_list(ctx(), FavoriteListArg { session_id: SessionId(7) })
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_empty_name_is_rejected() {
        let service = FavoriteService::new();
        let err = service.favorite_add(ctx(), add("")).await.unwrap_err();
        assert!(matches!(err, ProtocolError::Failed(_)));
    }
}
