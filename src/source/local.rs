use super::{CommitSource, Handles};
use crate::error::{ContribError, Result};
use crate::model::{DateRange, RawCommit, RawFile};
use chrono::DateTime;
use gix::object::tree::diff::ChangeDetached;
use gix::{discover, ObjectId, ThreadSafeRepository};
use similar::{ChangeTag, TextDiff};
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

/// Commit history of a repository on disk.
///
/// There is no hosting platform behind a local repository, so commits never
/// carry a login and contributors resolve to their author email.
pub struct LocalSource {
    repo: ThreadSafeRepository,
    path: PathBuf,
    range: DateRange,
    include_merges: bool,
}

impl LocalSource {
    /// Open a repository at `path`, or current dir if `None`
    pub fn open<P: AsRef<Path>>(path: Option<P>, range: DateRange, include_merges: bool) -> Result<Self> {
        let repo_path = match path {
            Some(p) => p.as_ref().to_path_buf(),
            None => std::env::current_dir()?,
        };

        let repo = discover(&repo_path)?;
        let path = repo.workdir().unwrap_or_else(|| repo.path()).to_path_buf();

        Ok(Self {
            repo: repo.into_sync(),
            path,
            range,
            include_merges,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn collect_ids(&self) -> Result<Vec<ObjectId>> {
        let repo = self.repo.to_thread_local();
        let mut head = repo.head()?;
        let head_commit = head.peel_to_commit_in_place()?;

        let mut selected: Vec<(i64, ObjectId)> = Vec::new();
        let mut seen: HashSet<ObjectId> = HashSet::new();
        let mut stack: VecDeque<ObjectId> = VecDeque::from([head_commit.id]);

        while let Some(commit_id) = stack.pop_back() {
            if !seen.insert(commit_id) {
                continue;
            }

            let commit = repo.find_commit(commit_id)?;
            let secs = commit.time()?.seconds;
            let timestamp = DateTime::from_timestamp(secs, 0)
                .ok_or_else(|| ContribError::InvalidDate(format!("Invalid timestamp: {secs}")))?;
            let parents: Vec<ObjectId> = commit.parent_ids().map(|id| id.into()).collect();

            let is_merge = parents.len() > 1;
            if self.range.contains(&timestamp) && (self.include_merges || !is_merge) {
                selected.push((secs, commit_id));
            }
            stack.extend(parents);
        }

        // Oldest first; ties keep discovery order reversed so parents precede children.
        selected.reverse();
        selected.sort_by_key(|(secs, _)| *secs);
        Ok(selected.into_iter().map(|(_, id)| id).collect())
    }

    fn file_changes(&self, repo: &gix::Repository, change: ChangeDetached, files: &mut Vec<RawFile>) -> Result<()> {
        match change {
            ChangeDetached::Addition { id, location, entry_mode, .. } => {
                if !entry_mode.is_tree() {
                    let obj = repo.find_object(id)?;
                    let (added, _) = line_counts(&[], &obj.data);
                    files.push(RawFile::new(location.to_string(), added, 0));
                }
            }
            ChangeDetached::Deletion { id, location, entry_mode, .. } => {
                if !entry_mode.is_tree() {
                    let obj = repo.find_object(id)?;
                    let (_, deleted) = line_counts(&obj.data, &[]);
                    files.push(RawFile::new(location.to_string(), 0, deleted));
                }
            }
            ChangeDetached::Modification {
                previous_id,
                id,
                location,
                entry_mode,
                ..
            } => {
                if !entry_mode.is_tree() {
                    let old = repo.find_object(previous_id)?;
                    let new = repo.find_object(id)?;
                    let (added, deleted) = line_counts(&old.data, &new.data);
                    files.push(RawFile::new(location.to_string(), added, deleted));
                }
            }
            // Renames and copies are counted once, on the destination path.
            ChangeDetached::Rewrite {
                source_id,
                id,
                location,
                entry_mode,
                ..
            } => {
                if !entry_mode.is_tree() {
                    let old = repo.find_object(source_id)?;
                    let new = repo.find_object(id)?;
                    let (added, deleted) = line_counts(&old.data, &new.data);
                    files.push(RawFile::new(location.to_string(), added, deleted));
                }
            }
        }
        Ok(())
    }
}

impl CommitSource for LocalSource {
    type Handle = ObjectId;

    fn handles(&self) -> Result<Handles<'_, ObjectId>> {
        let ids = self.collect_ids()?;
        tracing::debug!(count = ids.len(), path = %self.path.display(), "walked local history");
        Ok(Box::new(ids.into_iter().map(Ok)))
    }

    fn fetch(&self, commit_id: &ObjectId) -> Result<RawCommit> {
        let repo = self.repo.to_thread_local();
        let commit = repo.find_commit(*commit_id)?;
        let secs = commit.time()?.seconds;
        let author = commit.author()?;
        let commit_tree = commit.tree()?;
        let parent_tree = match commit.parent_ids().next() {
            Some(parent) => Some(repo.find_commit(parent)?.tree()?),
            None => None,
        };

        let changes: Vec<ChangeDetached> =
            repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&commit_tree), None)?;

        let mut files = Vec::new();
        for change in changes {
            self.file_changes(&repo, change, &mut files)?;
        }

        Ok(RawCommit {
            sha: commit_id.to_string(),
            login: None,
            author_name: Some(author.name.to_string()),
            author_email: Some(author.email.to_string()),
            timestamp: DateTime::from_timestamp(secs, 0),
            stats: None,
            files,
        })
    }

    fn describe(&self) -> String {
        self.path.to_string_lossy().to_string()
    }
}

fn is_binary(data: &[u8]) -> bool {
    data.iter().take(8192).any(|&b| b == 0)
}

/// Lines added and removed between two blobs. Binary content counts as no change.
fn line_counts(old: &[u8], new: &[u8]) -> (u64, u64) {
    if is_binary(old) || is_binary(new) {
        return (0, 0);
    }
    let old = String::from_utf8_lossy(old);
    let new = String::from_utf8_lossy(new);
    let diff = TextDiff::from_lines(old.as_ref(), new.as_ref());

    diff.iter_all_changes()
        .fold((0, 0), |(added, deleted), change| match change.tag() {
            ChangeTag::Insert => (added + 1, deleted),
            ChangeTag::Delete => (added, deleted + 1),
            ChangeTag::Equal => (added, deleted),
        })
}
