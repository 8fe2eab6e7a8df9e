//! Shares: codes, link tokens, keywords and the registry

pub mod code;
pub mod keywords;
pub mod link;
pub mod registry;
pub mod session;
pub mod shortlink;

pub use code::{is_share_code, random_alphanumeric, CodeGenerator};
pub use keywords::{derive_keywords, normalize_keywords, KEYWORD_COUNT};
pub use link::{DecodeError, LinkCodec, Selection, ShareLinks, VERIFY_PREFIX};
pub use registry::{NewShare, ShareRegistry, ShareTitle, ALBUM_TITLE, FILE_TITLE, SESSION_TITLE};
pub use session::{SessionDraft, ShareSessions};
pub use shortlink::LinkShortener;
