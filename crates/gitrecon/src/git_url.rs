use url::Url;

/// The `owner/name` pair that identifies a repository on a hosting platform.
#[derive(Clone, PartialEq, Eq, Debug, PartialOrd, Ord, Hash)]
pub struct RepoPath {
    pub owner: String,
    pub name: String,
}

impl std::fmt::Display for RepoPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

const REPO_PATH_ERROR_MESSAGE: &str =
    "expected a repository URL ending in /<owner>/<name>, e.g., https://github.com/octocat/hello-world";

impl std::str::FromStr for RepoPath {
    type Err = &'static str;

    /// Parse the owner and name from the last two path segments of a repository URL.
    ///
    /// Accepts web, clone and API URLs (`https://api.github.com/repos/o/r`) as well as scp-style
    /// SSH locations (`git@github.com:o/r.git`). A trailing `.git` or `/` is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let path = match Url::parse(s) {
            Ok(url) => {
                if url.cannot_be_a_base() || url.host().is_none() {
                    return Err(REPO_PATH_ERROR_MESSAGE);
                }
                url.path().to_owned()
            }
            Err(_) => match s.split_once(':') {
                Some((host, path)) if !host.is_empty() && !host.contains('/') => path.to_owned(),
                _ => return Err(REPO_PATH_ERROR_MESSAGE),
            },
        };

        let mut segments = path.trim_end_matches('/').rsplit('/');
        let name = segments.next().unwrap_or_default();
        let name = name.strip_suffix(".git").unwrap_or(name);
        let owner = segments.next().unwrap_or_default();
        if owner.is_empty() || name.is_empty() || owner == ".." || name == ".." {
            return Err(REPO_PATH_ERROR_MESSAGE);
        }

        Ok(RepoPath {
            owner: owner.to_owned(),
            name: name.to_owned(),
        })
    }
}
