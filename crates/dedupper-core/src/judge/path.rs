use super::RejectDetector;
use crate::config::PatternConfig;
use crate::error::Result;
use crate::model::{FileRecord, ReasonType};
use regex::Regex;
use std::path::Path;

/// Literal, case-insensitive and regex name rules.
#[derive(Debug, Clone, Default)]
pub struct PatternList {
    literal: Vec<String>,
    insensitive: Vec<String>,
    regex: Vec<Regex>,
}

impl PatternList {
    pub fn compile(config: &PatternConfig) -> Result<Self> {
        let regex = config
            .regex
            .iter()
            .map(|r| Regex::new(r))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self {
            literal: config.literal.clone(),
            insensitive: config.insensitive.iter().map(|s| s.to_lowercase()).collect(),
            regex,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.literal.is_empty() && self.insensitive.is_empty() && self.regex.is_empty()
    }

    fn matches_word(&self, word: &str) -> bool {
        if self.literal.iter().any(|l| l == word) {
            return true;
        }
        let lower = word.to_lowercase();
        self.insensitive.iter().any(|i| *i == lower)
    }

    pub fn matches(&self, text: &str) -> bool {
        self.matches_word(text) || self.regex.iter().any(|r| r.is_match(text))
    }

    /// Literal rules match any path component; regex rules match the whole path.
    pub fn matches_dir(&self, dir: &Path) -> bool {
        let any_component = dir
            .components()
            .any(|c| self.matches_word(&c.as_os_str().to_string_lossy()));
        any_component || {
            let text = dir.to_string_lossy();
            self.regex.iter().any(|r| r.is_match(&text))
        }
    }
}

/// Rejects files by name or containing directory.
pub struct PathPolicy {
    names: PatternList,
    dirs: PatternList,
}

impl PathPolicy {
    pub fn new(names: &PatternConfig, dirs: &PatternConfig) -> Result<Self> {
        Ok(Self {
            names: PatternList::compile(names)?,
            dirs: PatternList::compile(dirs)?,
        })
    }
}

impl RejectDetector for PathPolicy {
    fn detect(&self, file: &FileRecord) -> Option<ReasonType> {
        if !self.names.is_empty() && self.names.matches(&file.name) {
            return Some(ReasonType::NgFileName);
        }
        match file.from_dir() {
            Some(dir) if !self.dirs.is_empty() && self.dirs.matches_dir(dir) => {
                Some(ReasonType::NgDirPath)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(literal: &[&str], insensitive: &[&str], regex: &[&str]) -> PatternList {
        PatternList::compile(&PatternConfig {
            literal: literal.iter().map(|s| s.to_string()).collect(),
            insensitive: insensitive.iter().map(|s| s.to_string()).collect(),
            regex: regex.iter().map(|s| s.to_string()).collect(),
        })
        .unwrap()
    }

    #[test]
    fn test_literal_is_case_sensitive() {
        let list = patterns(&["cover.jpg"], &[], &[]);
        assert!(list.matches("cover.jpg"));
        assert!(!list.matches("COVER.jpg"));
    }

    #[test]
    fn test_insensitive_and_regex() {
        let list = patterns(&[], &["Folder.JPG"], &[r"^\._"]);
        assert!(list.matches("folder.jpg"));
        assert!(list.matches("._IMG_0001.jpg"));
        assert!(!list.matches("IMG_0001.jpg"));
    }

    #[test]
    fn test_dir_matches_component() {
        let list = patterns(&["@eaDir"], &[], &[r"/tmp/cache"]);
        assert!(list.matches_dir(Path::new("/photos/@eaDir/x")));
        assert!(list.matches_dir(Path::new("/var/tmp/cache/1")));
        assert!(!list.matches_dir(Path::new("/photos/2020")));
    }
}
