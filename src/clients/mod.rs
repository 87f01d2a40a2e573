pub mod remote;
pub mod safety;

pub use remote::{FeedQuery, Fetcher, HttpFetcher};
pub use safety::ensure_safe_target;
