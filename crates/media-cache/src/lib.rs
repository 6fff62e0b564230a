//! C9: short-TTL cache of signed URLs for outbound backend media
//! downloads (§4.9).

mod backend;
mod cache;
mod error;

pub use backend::MediaBackend;
pub use cache::MediaUrlCache;
pub use error::{MediaCacheError, Result};
