//! Default excludes applied while walking directories
//!
//! Patterns follow the Ant default-exclude conventions:
//! - a leading `**/` is ignored
//! - `name/**` excludes directories called `name`
//! - a pattern without `*` excludes files with exactly that name
//! - a pattern with a `*` matches file names by prefix and suffix around it

use std::collections::HashSet;
use std::fmt;

/// Ant's built-in default excludes
pub const ANT_DEFAULT_EXCLUDES: &[&str] = &[
    "**/%*%",
    "**/.#*",
    "**/._*",
    "**/#*#",
    "**/*~",
    "**/.DS_Store",
    "**/CVS",
    "**/CVS/**",
    "**/.cvsignore",
    "**/SCCS",
    "**/SCCS/**",
    "**/vssver.scc",
    "**/.svn",
    "**/.svn/**",
    "**/.git",
    "**/.git/**",
    "**/.gitattributes",
    "**/.gitignore",
    "**/.gitmodules",
    "**/.hg",
    "**/.hg/**",
    "**/.hgignore",
    "**/.hgsub",
    "**/.hgsubstate",
    "**/.hgtags",
    "**/.bzr",
    "**/.bzr/**",
    "**/.bzrignore",
];

#[derive(Debug, Clone)]
struct NameMatcher {
    prefix: String,
    suffix: String,
}

impl NameMatcher {
    fn matches(&self, name: &str) -> bool {
        name.starts_with(&self.prefix) && name.ends_with(&self.suffix)
    }
}

/// Compiled exclude set; equality compares the source patterns
#[derive(Clone)]
pub struct DefaultExcludes {
    patterns: Vec<String>,
    excluded_file_names: HashSet<String>,
    excluded_dir_names: HashSet<String>,
    file_name_matchers: Vec<NameMatcher>,
}

impl DefaultExcludes {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns: Vec<String> = patterns.into_iter().map(|p| p.as_ref().to_string()).collect();
        let mut excluded_file_names = HashSet::new();
        let mut excluded_dir_names = HashSet::new();
        let mut file_name_matchers = Vec::new();

        for pattern in &patterns {
            let pattern = pattern.strip_prefix("**/").unwrap_or(pattern);
            if let Some(dir) = pattern.strip_suffix("/**") {
                excluded_dir_names.insert(dir.to_string());
                continue;
            }
            match pattern.find('*') {
                None => {
                    excluded_file_names.insert(pattern.to_string());
                }
                Some(star) => file_name_matchers.push(NameMatcher {
                    prefix: pattern[..star].to_string(),
                    suffix: pattern[star + 1..].to_string(),
                }),
            }
        }

        Self {
            patterns,
            excluded_file_names,
            excluded_dir_names,
            file_name_matchers,
        }
    }

    pub fn ant_defaults() -> Self {
        Self::new(ANT_DEFAULT_EXCLUDES)
    }

    pub fn none() -> Self {
        Self::new(std::iter::empty::<&str>())
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn exclude_dir(&self, name: &str) -> bool {
        self.excluded_dir_names.contains(name)
    }

    pub fn exclude_file(&self, name: &str) -> bool {
        self.excluded_file_names.contains(name)
            || self.file_name_matchers.iter().any(|m| m.matches(name))
    }
}

impl Default for DefaultExcludes {
    fn default() -> Self {
        Self::ant_defaults()
    }
}

impl PartialEq for DefaultExcludes {
    fn eq(&self, other: &Self) -> bool {
        self.patterns == other.patterns
    }
}

impl Eq for DefaultExcludes {}

impl fmt::Debug for DefaultExcludes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DefaultExcludes").field(&self.patterns).finish()
    }
}
