use crate::error::{ContribError, Result};
use crate::model::{CommitRecord, Identity, LineStats, RawCommit};

/// Login first, then the raw author email. Blank values count as missing.
pub fn resolve_identity(raw: &RawCommit) -> Identity {
    let non_blank = |v: &Option<String>| {
        v.as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
    };

    if let Some(login) = non_blank(&raw.login) {
        Identity::Login(login)
    } else if let Some(email) = non_blank(&raw.author_email) {
        Identity::Email(email)
    } else {
        Identity::Unresolved
    }
}

/// Turn a raw commit into a [`CommitRecord`].
///
/// Returns `Ok(None)` when no file has a non-zero change; such commits are
/// silently excluded. A commit with substantive changes but no resolvable
/// identity yields [`ContribError::UnresolvedIdentity`], which callers treat
/// as a per-commit discard.
///
/// Pure: safe to call from any number of threads at once.
pub fn extract(raw: &RawCommit) -> Result<Option<CommitRecord>> {
    let substantive: Vec<_> = raw.files.iter().filter(|f| f.is_substantive()).collect();
    if substantive.is_empty() {
        return Ok(None);
    }

    let contributor_id = match resolve_identity(raw) {
        Identity::Login(login) => login,
        Identity::Email(email) => email,
        Identity::Unresolved => {
            return Err(ContribError::UnresolvedIdentity {
                sha: raw.sha.clone(),
            })
        }
    };

    let LineStats { additions, deletions } = raw.stats.unwrap_or_else(|| LineStats {
        additions: substantive.iter().map(|f| f.additions).sum(),
        deletions: substantive.iter().map(|f| f.deletions).sum(),
    });

    Ok(Some(CommitRecord {
        contributor_id,
        additions,
        deletions,
        files: substantive.into_iter().map(|f| f.path.clone()).collect(),
    }))
}
