use thiserror::Error;

pub type Result<T> = std::result::Result<T, ContribError>;

#[derive(Error, Debug)]
pub enum ContribError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Invalid date: {0}")]
    InvalidDate(String),
    #[error("Commit {sha} has neither a login nor an author email")]
    UnresolvedIdentity { sha: String },
    #[error("Commit source error: {0}")]
    Source(String),
    #[error("Runtime error: {0}")]
    Runtime(String),
    #[error("Git discover error: {0}")]
    GitDiscover(#[from] Box<gix::discover::Error>),
    #[error("Object find error: {0}")]
    ObjectFind(#[from] Box<gix::object::find::existing::Error>),
    #[error("Commit error: {0}")]
    Commit(#[from] Box<gix::object::commit::Error>),
    #[error("Reference find error: {0}")]
    RefFind(#[from] Box<gix::reference::find::existing::Error>),
    #[error("Head peel error: {0}")]
    HeadPeel(#[from] Box<gix::head::peel::to_commit::Error>),
    #[error("Object find with conversion error: {0}")]
    ObjectFindConv(#[from] Box<gix::object::find::existing::with_conversion::Error>),
    #[error("Object decode error: {0}")]
    ObjectDecode(#[from] Box<gix::objs::decode::Error>),
    #[error("Diff tree to tree error: {0}")]
    DiffTreeToTree(#[from] Box<gix::repository::diff_tree_to_tree::Error>),
}

// Manual From implementations for unboxed to boxed conversions
impl From<gix::discover::Error> for ContribError {
    fn from(err: gix::discover::Error) -> Self {
        ContribError::GitDiscover(Box::new(err))
    }
}

impl From<gix::object::find::existing::Error> for ContribError {
    fn from(err: gix::object::find::existing::Error) -> Self {
        ContribError::ObjectFind(Box::new(err))
    }
}

impl From<gix::object::commit::Error> for ContribError {
    fn from(err: gix::object::commit::Error) -> Self {
        ContribError::Commit(Box::new(err))
    }
}

impl From<gix::reference::find::existing::Error> for ContribError {
    fn from(err: gix::reference::find::existing::Error) -> Self {
        ContribError::RefFind(Box::new(err))
    }
}

impl From<gix::head::peel::to_commit::Error> for ContribError {
    fn from(err: gix::head::peel::to_commit::Error) -> Self {
        ContribError::HeadPeel(Box::new(err))
    }
}

impl From<gix::object::find::existing::with_conversion::Error> for ContribError {
    fn from(err: gix::object::find::existing::with_conversion::Error) -> Self {
        ContribError::ObjectFindConv(Box::new(err))
    }
}

impl From<gix::objs::decode::Error> for ContribError {
    fn from(err: gix::objs::decode::Error) -> Self {
        ContribError::ObjectDecode(Box::new(err))
    }
}

impl From<gix::repository::diff_tree_to_tree::Error> for ContribError {
    fn from(err: gix::repository::diff_tree_to_tree::Error) -> Self {
        ContribError::DiffTreeToTree(Box::new(err))
    }
}
