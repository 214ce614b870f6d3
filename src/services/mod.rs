//! Services layer - Business logic
//!
//! Services sit between the HTTP handlers and the repositories. They:
//! - enforce validation and permission rules
//! - coordinate repositories, the cache and the audit log
//! - translate storage failures into their own error enums

pub mod audit;
pub mod comment;
pub mod library;
pub mod mdx;
pub mod media;
pub mod password;
pub mod post;
pub mod rate_limiter;
pub mod revalidate;
pub mod token;
pub mod user;
pub mod validation;
pub mod wallet_demo;

pub use audit::{AuditService, AuditServiceError};
pub use comment::{build_threads, CommentService, CommentServiceError};
pub use library::{LibraryService, LibraryServiceError};
pub use mdx::{summarize, MdxSummary};
pub use media::{MediaService, MediaServiceError};
pub use password::{hash_password, verify_password};
pub use post::{render_sitemap, PostService, PostServiceError};
pub use rate_limiter::{LoginRateLimiter, RateLimiter};
pub use revalidate::{RevalidateError, RevalidateRequest, RevalidateResponse, RevalidateService};
pub use token::{IssuedToken, TokenService, TokenServiceError, TOKEN_PREFIX};
pub use user::{UserService, UserServiceError};
pub use validation::{generate_slug, is_valid_email, is_valid_slug};
pub use wallet_demo::{WalletDemoError, WalletDemoService};
