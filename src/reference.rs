use std::fmt;

use thiserror::Error;

/// A pull request addressed by the URL found in a notification email.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PullRequestReference {
    pub url: String,
    pub repo: String,
    pub number: u64,
}

impl PullRequestReference {
    /// Splits `.../<repo>/pull/<number>` on `/`: the trailing segment is the
    /// number and the segment two places before it is the repository.
    pub fn parse(url: &str) -> Result<Self, ReferenceError> {
        let segments: Vec<&str> = url.split('/').collect();
        if segments.len() < 3 {
            return Err(ReferenceError::TooFewSegments(url.to_owned()));
        }

        let last = segments[segments.len() - 1];
        if last.is_empty() || !last.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ReferenceError::NonNumeric(url.to_owned()));
        }
        let number = last
            .parse::<u64>()
            .map_err(|_| ReferenceError::NonNumeric(url.to_owned()))?;

        let repo = segments[segments.len() - 3];
        if repo.is_empty() {
            return Err(ReferenceError::EmptyRepo(url.to_owned()));
        }

        Ok(Self {
            url: url.to_owned(),
            repo: repo.to_owned(),
            number,
        })
    }
}

impl fmt::Display for PullRequestReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.repo, self.number)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("pull request URL `{0}` has fewer than three path segments")]
    TooFewSegments(String),
    #[error("pull request URL `{0}` does not end in a numeric segment")]
    NonNumeric(String),
    #[error("pull request URL `{0}` has an empty repository segment")]
    EmptyRepo(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canonical_url(owner: &str, repo: &str, number: u64) -> String {
        format!("https://github.com/{owner}/{repo}/pull/{number}")
    }

    #[test]
    fn parses_repo_and_number() {
        let reference =
            PullRequestReference::parse("https://github.com/acme/widgets/pull/42").expect("parse");
        assert_eq!(reference.repo, "widgets");
        assert_eq!(reference.number, 42);
        assert_eq!(reference.to_string(), "widgets#42");
    }

    #[test]
    fn rejects_non_numeric_tail() {
        let result = PullRequestReference::parse("https://github.com/acme/widgets/pull/abc");
        assert!(matches!(result, Err(ReferenceError::NonNumeric(_))));

        let result = PullRequestReference::parse("https://github.com/acme/widgets/pull/");
        assert!(matches!(result, Err(ReferenceError::NonNumeric(_))));
    }

    #[test]
    fn rejects_short_urls() {
        assert!(matches!(
            PullRequestReference::parse("42"),
            Err(ReferenceError::TooFewSegments(_))
        ));
        assert!(matches!(
            PullRequestReference::parse("pull/42"),
            Err(ReferenceError::TooFewSegments(_))
        ));
    }

    #[test]
    fn rejects_empty_repository_segment() {
        assert!(matches!(
            PullRequestReference::parse("https://github.com//pull/4"),
            Err(ReferenceError::EmptyRepo(_))
        ));
    }

    #[test]
    fn reparsing_canonical_url_is_stable() {
        let owners = ["acme", "gro-intelligence", "a"];
        let repos = ["widgets", "gro", "my.repo", "under_score", "x-y-z"];
        let numbers = [1_u64, 7, 42, 1000, 987_654_321];

        for owner in owners {
            for repo in repos {
                for number in numbers {
                    let url = canonical_url(owner, repo, number);
                    let first = PullRequestReference::parse(&url).expect("first parse");
                    let rebuilt = canonical_url(owner, &first.repo, first.number);
                    let second = PullRequestReference::parse(&rebuilt).expect("second parse");
                    assert_eq!((first.repo.as_str(), first.number), (repo, number));
                    assert_eq!(
                        (first.repo, first.number),
                        (second.repo, second.number),
                        "{url}"
                    );
                }
            }
        }
    }
}
