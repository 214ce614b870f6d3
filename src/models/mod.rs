//! Data models
//!
//! Database entities, their input types, and the role/permission model.

mod api_token;
mod audit_log;
mod comment;
mod library;
mod media;
mod pagination;
mod post;
mod role;
mod session;
mod user;

pub use api_token::{ApiToken, NewApiToken};
pub use audit_log::{AuditFilter, AuditLog, NewAuditLog};
pub use comment::{
    Comment, CommentStatus, CommentThread, ModerationAction, ModerationItem, NewComment,
    SubmitCommentInput,
};
pub use library::{LibraryItem, LibraryItemInput, LibraryKind};
pub use media::{MediaAsset, MediaAssetInput};
pub use pagination::{
    clamp_feed_limit, Cursor, CursorPage, InvalidCursor, ListParams, PagedResult,
    DEFAULT_FEED_LIMIT, MAX_FEED_LIMIT,
};
pub use post::{
    CreatePostInput, FeedFilter, Post, PostKind, PostStatus, PostSummary, UpdatePostInput,
};
pub use role::{CredentialKind, Permission, Principal, Role};
pub use session::Session;
pub use user::{CreateUserInput, User};
