//! Glob matching for resource identifiers
//!
//! Globs are compiled into anchored regexes:
//! - `**` matches across `/` boundaries (zero or more segments)
//! - `*` matches within a single segment
//! - `?` matches exactly one character (never `/`)
//!
//! Everything else matches literally.

use crate::error::PatternError;
use regex::Regex;

/// A single compiled glob
#[derive(Debug, Clone)]
pub struct Glob {
    source: String,
    regex: Regex,
}

impl Glob {
    pub fn new(glob: &str) -> Result<Self, PatternError> {
        if glob.is_empty() {
            return Err(PatternError::EmptyGlob);
        }

        let regex = Regex::new(&glob_to_regex(glob)).map_err(|e| PatternError::InvalidGlob {
            glob: glob.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            source: glob.to_string(),
            regex,
        })
    }

    pub fn is_match(&self, resource: &str) -> bool {
        self.regex.is_match(resource)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// Compiled set of globs, matching when any member matches
#[derive(Debug, Clone, Default)]
pub struct GlobMatcher {
    globs: Vec<Glob>,
}

impl GlobMatcher {
    /// Create a new matcher from a list of globs
    pub fn new<S: AsRef<str>>(globs: &[S]) -> Result<Self, PatternError> {
        let globs = globs
            .iter()
            .map(|g| Glob::new(g.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { globs })
    }

    /// Create an empty matcher (matches nothing)
    pub fn empty() -> Self {
        Self { globs: Vec::new() }
    }

    /// Check if a resource matches any glob
    pub fn matches(&self, resource: &str) -> bool {
        self.globs.iter().any(|g| g.is_match(resource))
    }

    /// Check if a resource matches any glob, returning the matching glob
    pub fn find_match(&self, resource: &str) -> Option<&str> {
        self.globs
            .iter()
            .find(|g| g.is_match(resource))
            .map(Glob::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.globs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.globs.len()
    }

    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.globs.iter().map(Glob::as_str)
    }
}

/// Translate a glob into an anchored regex source
fn glob_to_regex(glob: &str) -> String {
    let chars: Vec<char> = glob.chars().collect();
    let mut out = String::with_capacity(glob.len() * 2 + 2);
    out.push('^');

    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                let at_segment_start = i == 0 || chars[i - 1] == '/';
                let followed_by_sep = chars.get(i + 2) == Some(&'/');
                let at_end = i + 2 == chars.len();

                if at_segment_start && followed_by_sep {
                    // `**/` : zero or more leading segments
                    out.push_str("(?:.*/)?");
                    i += 3;
                } else if at_end && i > 0 && chars[i - 1] == '/' {
                    // trailing `/**` : the directory itself or anything below it
                    out.pop();
                    out.push_str("(?:/.*)?");
                    i += 2;
                } else {
                    out.push_str(".*");
                    i += 2;
                }
            }
            '*' => {
                out.push_str("[^/]*");
                i += 1;
            }
            '?' => {
                out.push_str("[^/]");
                i += 1;
            }
            c => {
                out.push_str(&regex::escape(&c.to_string()));
                i += 1;
            }
        }
    }

    out.push('$');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glob(g: &str) -> Glob {
        Glob::new(g).unwrap()
    }

    #[test]
    fn test_empty_matcher() {
        let matcher = GlobMatcher::empty();
        assert!(!matcher.matches("anything"));
        assert!(matcher.is_empty());
    }

    #[test]
    fn test_empty_glob_rejected() {
        assert_eq!(Glob::new("").unwrap_err(), PatternError::EmptyGlob);
    }

    #[test]
    fn test_double_star_extension() {
        let g = glob("**/*.tsx");
        assert!(g.is_match("src/components/Button.tsx"));
        assert!(g.is_match("Button.tsx"));
        assert!(!g.is_match("src/components/Button.ts"));
        assert!(!g.is_match("src/components/Button.tsx.bak"));
    }

    #[test]
    fn test_double_star_directory() {
        let g = glob("**/migrations/**");
        assert!(g.is_match("database/migrations/001.sql"));
        assert!(g.is_match("migrations/001.sql"));
        assert!(g.is_match("a/b/migrations/2024/001.sql"));
        assert!(!g.is_match("database/migration/001.sql"));
    }

    #[test]
    fn test_single_star_stays_in_segment() {
        let g = glob("src/*.rs");
        assert!(g.is_match("src/lib.rs"));
        assert!(!g.is_match("src/access_control/mod.rs"));
    }

    #[test]
    fn test_middle_double_star() {
        let g = glob("src/**/mod.rs");
        assert!(g.is_match("src/mod.rs"));
        assert!(g.is_match("src/a/b/mod.rs"));
        assert!(!g.is_match("lib/a/mod.rs"));
    }

    #[test]
    fn test_question_mark() {
        let g = glob("logs/day-?.txt");
        assert!(g.is_match("logs/day-1.txt"));
        assert!(!g.is_match("logs/day-12.txt"));
        assert!(!g.is_match("logs/day-/.txt"));
    }

    #[test]
    fn test_literal_regex_characters_escaped() {
        let g = glob("api/v1/users(+).json");
        assert!(g.is_match("api/v1/users(+).json"));
        assert!(!g.is_match("api/v1/usersX.json"));
    }

    #[test]
    fn test_anchored() {
        let g = glob("secrets/*");
        assert!(g.is_match("secrets/key.pem"));
        assert!(!g.is_match("app/secrets/key.pem"));
    }

    #[test]
    fn test_find_match() {
        let matcher = GlobMatcher::new(&["**/*.sql", "**/legacy/**"]).unwrap();
        assert_eq!(matcher.find_match("db/001.sql"), Some("**/*.sql"));
        assert_eq!(matcher.find_match("src/legacy/a.ts"), Some("**/legacy/**"));
        assert_eq!(matcher.find_match("src/main.rs"), None);
        assert_eq!(matcher.len(), 2);
    }
}
