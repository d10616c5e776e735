use super::{CommitSource, Handles};
use crate::config::Config;
use crate::error::{ContribError, Result};
use crate::model::{DateRange, LineStats, RawCommit, RawFile};
use chrono::{DateTime, Utc};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, LINK};
use reqwest::Url;
use serde::Deserialize;

const PER_PAGE: u32 = 100;
const USER_AGENT: &str = concat!("ghcontrib/", env!("CARGO_PKG_VERSION"));

#[derive(Deserialize)]
struct ListedCommit {
    sha: String,
}

#[derive(Deserialize)]
struct CommitResponse {
    sha: String,
    author: Option<ApiUser>,
    commit: GitCommit,
    stats: Option<ApiStats>,
    #[serde(default)]
    files: Vec<ApiFile>,
}

#[derive(Deserialize)]
struct ApiUser {
    login: Option<String>,
}

#[derive(Deserialize)]
struct GitCommit {
    author: Option<GitAuthor>,
}

#[derive(Deserialize)]
struct GitAuthor {
    name: Option<String>,
    email: Option<String>,
    date: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct ApiStats {
    additions: u64,
    deletions: u64,
}

#[derive(Deserialize)]
struct ApiFile {
    filename: String,
    additions: u64,
    deletions: u64,
}

impl From<CommitResponse> for RawCommit {
    fn from(resp: CommitResponse) -> Self {
        let (author_name, author_email, timestamp) = match resp.commit.author {
            Some(a) => (a.name, a.email, a.date),
            None => (None, None, None),
        };
        RawCommit {
            sha: resp.sha,
            login: resp.author.and_then(|u| u.login),
            author_name,
            author_email,
            timestamp,
            stats: resp.stats.map(|s| LineStats {
                additions: s.additions,
                deletions: s.deletions,
            }),
            files: resp
                .files
                .into_iter()
                .map(|f| RawFile::new(f.filename, f.additions, f.deletions))
                .collect(),
        }
    }
}

/// Commit history of a repository on the GitHub REST API.
pub struct GitHubSource {
    http: Client,
    api_url: String,
    repository: String,
    token: Option<String>,
    range: DateRange,
    first_page: Vec<String>,
    last_page: u32,
}

impl GitHubSource {
    /// Fetch the first listing page. Failing here (bad token, unknown repository)
    /// is fatal and happens before any aggregation starts.
    pub fn connect(config: &Config) -> Result<Self> {
        let http = Client::builder().user_agent(USER_AGENT).build()?;
        let mut source = Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            repository: config.repository(),
            token: config.access_token.clone(),
            range: config.range.clone(),
            first_page: Vec::new(),
            last_page: 1,
        };

        let (shas, last_page) = source.list_page(1)?;
        source.first_page = shas;
        source.last_page = last_page.unwrap_or(1).max(1);
        tracing::info!(
            repository = %source.repository,
            pages = source.last_page,
            "connected to commit listing"
        );
        Ok(source)
    }

    fn get(&self, url: &str) -> RequestBuilder {
        let rb = self
            .http
            .get(url)
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");
        match &self.token {
            Some(token) => rb.bearer_auth(token),
            None => rb,
        }
    }

    fn send(&self, rb: RequestBuilder) -> Result<Response> {
        let resp = rb.send()?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().unwrap_or_default();
            return Err(ContribError::Api { status, body });
        }
        Ok(resp)
    }

    /// Shas of one listing page (newest first, as the API returns them) and the last page number.
    fn list_page(&self, page: u32) -> Result<(Vec<String>, Option<u32>)> {
        let url = format!("{}/repos/{}/commits", self.api_url, self.repository);
        let mut query = vec![
            ("per_page".to_string(), PER_PAGE.to_string()),
            ("page".to_string(), page.to_string()),
        ];
        if let Some(since) = self.range.since {
            query.push(("since".to_string(), since.to_rfc3339()));
        }
        if let Some(until) = self.range.until {
            query.push(("until".to_string(), until.to_rfc3339()));
        }

        let resp = self.send(self.get(&url).query(&query))?;
        let last_page = resp
            .headers()
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(last_page_from_link);
        let listed: Vec<ListedCommit> = resp.json()?;
        tracing::debug!(page, count = listed.len(), "listed commits");
        Ok((listed.into_iter().map(|c| c.sha).collect(), last_page))
    }
}

impl CommitSource for GitHubSource {
    type Handle = String;

    fn handles(&self) -> Result<Handles<'_, String>> {
        Ok(Box::new(OldestFirst::new(self.last_page, move |page| {
            if page == 1 {
                Ok(self.first_page.clone())
            } else {
                self.list_page(page).map(|(shas, _)| shas)
            }
        })))
    }

    fn fetch(&self, sha: &String) -> Result<RawCommit> {
        let url = format!("{}/repos/{}/commits/{}", self.api_url, self.repository, sha);
        let resp: CommitResponse = self.send(self.get(&url))?.json()?;
        Ok(resp.into())
    }

    fn describe(&self) -> String {
        self.repository.clone()
    }
}

/// Walks listing pages from the last one back to the first, reversing each page.
///
/// `fetch_page` returns one page newest first. The first failing page is
/// yielded as an error and ends the walk.
struct OldestFirst<F> {
    fetch_page: F,
    next_page: u32,
    buffer: std::vec::IntoIter<String>,
    broken: bool,
}

impl<F> OldestFirst<F>
where
    F: FnMut(u32) -> Result<Vec<String>>,
{
    fn new(last_page: u32, fetch_page: F) -> Self {
        Self {
            fetch_page,
            next_page: last_page,
            buffer: Vec::new().into_iter(),
            broken: false,
        }
    }
}

impl<F> Iterator for OldestFirst<F>
where
    F: FnMut(u32) -> Result<Vec<String>>,
{
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(sha) = self.buffer.next() {
                return Some(Ok(sha));
            }
            if self.broken || self.next_page == 0 {
                return None;
            }

            let page = self.next_page;
            self.next_page -= 1;
            match (self.fetch_page)(page) {
                Ok(mut shas) => {
                    shas.reverse();
                    self.buffer = shas.into_iter();
                }
                Err(e) => {
                    self.broken = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Extract the `page` number of the `rel="last"` link from a `Link` header.
pub fn last_page_from_link(header: &str) -> Option<u32> {
    header
        .split(',')
        .filter(|part| part.contains("rel=\"last\""))
        .find_map(|part| {
            let start = part.find('<')? + 1;
            let end = part.find('>')?;
            let url = Url::parse(part.get(start..end)?).ok()?;
            url.query_pairs()
                .find(|(k, _)| k == "page")
                .and_then(|(_, v)| v.parse().ok())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn reads_last_page_from_link_header() {
        let header = r#"<https://api.github.com/repositories/1/commits?per_page=100&page=2>; rel="next", <https://api.github.com/repositories/1/commits?per_page=100&page=37>; rel="last""#;
        assert_eq!(last_page_from_link(header), Some(37));
    }

    #[test]
    fn link_header_without_last() {
        let header = r#"<https://api.github.com/repositories/1/commits?page=1>; rel="prev", <https://api.github.com/repositories/1/commits?page=1>; rel="first""#;
        assert_eq!(last_page_from_link(header), None);
        assert_eq!(last_page_from_link("garbage"), None);
    }

    fn listing(page: u32) -> Vec<String> {
        // Page 1 holds the newest commits, "9" down to "7".
        let top = 9 - (page - 1) * 3;
        (0..3).map(|i| (top - i).to_string()).collect()
    }

    #[test]
    fn walks_pages_oldest_first() {
        let mut requested = Vec::new();
        let shas: Vec<String> = OldestFirst::new(3, |page| {
            requested.push(page);
            Ok(listing(page))
        })
        .collect::<Result<_>>()
        .unwrap();
        assert_eq!(shas, (1..=9).map(|n| n.to_string()).collect::<Vec<_>>());
        assert_eq!(requested, vec![3, 2, 1]);
    }

    #[test]
    fn broken_page_ends_the_walk() {
        let mut walk = OldestFirst::new(3, |page| {
            if page == 2 {
                Err(ContribError::Api {
                    status: 502,
                    body: "bad gateway".to_string(),
                })
            } else {
                Ok(listing(page))
            }
        });

        let first: Vec<String> = walk.by_ref().take(3).map(|r| r.unwrap()).collect();
        assert_eq!(first, vec!["1", "2", "3"]);
        match walk.next() {
            Some(Err(ContribError::Api { status, .. })) => assert_eq!(status, 502),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(walk.next().is_none());
        assert!(walk.next().is_none());
    }

    #[test]
    fn single_page_listing() {
        let shas: Vec<String> = OldestFirst::new(1, |_| Ok(vec!["b".to_string(), "a".to_string()]))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(shas, vec!["a", "b"]);
    }

    #[test]
    fn commit_payload_with_login() {
        let json = r#"{
            "sha": "6dcb09b",
            "author": { "login": "octocat", "id": 1 },
            "commit": { "author": { "name": "The Octocat", "email": "octo@github.com", "date": "2011-04-14T16:00:49Z" } },
            "stats": { "additions": 104, "deletions": 4, "total": 108 },
            "files": [
                { "filename": "file1.txt", "additions": 10, "deletions": 2, "changes": 12, "status": "modified" },
                { "filename": "moved.txt", "additions": 0, "deletions": 0, "changes": 0, "status": "renamed" }
            ]
        }"#;
        let raw: RawCommit = serde_json::from_str::<CommitResponse>(json).unwrap().into();
        assert_eq!(raw.sha, "6dcb09b");
        assert_eq!(raw.login.as_deref(), Some("octocat"));
        assert_eq!(raw.author_email.as_deref(), Some("octo@github.com"));
        assert_eq!(raw.stats, Some(LineStats { additions: 104, deletions: 4 }));
        assert_eq!(raw.files.len(), 2);
        assert!(raw.timestamp.is_some());
    }

    #[test]
    fn commit_payload_without_account() {
        let json = r#"{
            "sha": "abc",
            "author": null,
            "commit": { "author": { "name": "Someone", "email": "someone@example.com", "date": "2020-01-01T00:00:00Z" } }
        }"#;
        let raw: RawCommit = serde_json::from_str::<CommitResponse>(json).unwrap().into();
        assert_eq!(raw.login, None);
        assert_eq!(raw.author_email.as_deref(), Some("someone@example.com"));
        assert!(raw.files.is_empty());
        assert_eq!(raw.stats, None);
    }
}
