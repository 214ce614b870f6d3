//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles the queries for a specific entity.

pub mod api_token;
pub mod audit_log;
pub mod comment;
pub mod library;
pub mod media;
pub mod post;
pub mod session;
pub mod user;

pub use api_token::{ApiTokenRepository, SqlxApiTokenRepository};
pub use audit_log::{AuditLogRepository, SqlxAuditLogRepository};
pub use comment::{CommentRepository, SqlxCommentRepository};
pub use library::{LibraryRepository, SqlxLibraryRepository};
pub use media::{MediaRepository, SqlxMediaRepository};
pub use post::{PostRecord, PostRepository, SqlxPostRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use user::{SqlxUserRepository, UserRepository};
