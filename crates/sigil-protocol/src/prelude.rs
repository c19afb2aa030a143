//! Glob-importable protocol surface.

pub use crate::bytes::*;
pub use crate::crypto::{
    CiphertextBundle, CryptoClient, CryptoInterface, Ed25519SignatureInfo, SignEd25519Arg,
    SignToStringArg, UnboxAnyRes, UnboxBytes32AnyArg, UnboxBytes32Arg, crypto_protocol,
};
pub use crate::encrypt::{
    DecryptArg, EncryptArg, EncryptClient, EncryptInterface, EncryptOptions, Envelope,
    RecipientBox, encrypt_protocol,
};
pub use crate::error::ProtocolError;
pub use crate::favorite::{
    FavoriteAddArg, FavoriteClient, FavoriteDeleteArg, FavoriteInterface, FavoriteListArg, Folder,
    favorite_protocol,
};
pub use crate::fs::{File, FsClient, FsInterface, ListArg, ListResult, fs_protocol};
pub use crate::log_ui::{LogArg, LogLevel, LogUiClient, LogUiInterface, log_ui_protocol};
pub use crate::secret_ui::{
    GetSecretArg, GetSecretRes, PromptKind, SecretConstraints, SecretPrompt, SecretRequest,
    SecretUiClient, SecretUiInterface, secret_ui_protocol,
};
pub use sigil_json_rpc::{CallContext, SessionId};
