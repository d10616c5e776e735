pub mod github;
pub mod local;
pub mod memory;

pub use github::GitHubSource;
pub use local::LocalSource;
pub use memory::MemorySource;

use crate::error::Result;
use crate::model::RawCommit;

pub type Handles<'a, H> = Box<dyn Iterator<Item = Result<H>> + Send + 'a>;

/// Where commits come from.
///
/// `handles` lists the history oldest first. Listing is cheap and may be
/// paged lazily; an `Err` item means the listing broke part way through.
/// `fetch` does the expensive per-commit work and is called from many
/// producer threads at once.
pub trait CommitSource: Send + Sync {
    type Handle: Send + 'static;

    fn handles(&self) -> Result<Handles<'_, Self::Handle>>;

    fn fetch(&self, handle: &Self::Handle) -> Result<RawCommit>;

    /// Human readable name used in reports.
    fn describe(&self) -> String;
}
