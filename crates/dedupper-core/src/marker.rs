//! File name markers.
//!
//! A marker token `.!<chars><index>` sits in front of the last extension
//! (`photo.!r2.jpg`). Each char is one [`FileMarker`]; the optional number is
//! a 1-based candidate index used by replace/transfer. A file without a token
//! inherits the marker of a `!<marker>` parent directory.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

const TOKEN_PREFIX: &str = ".!";

/// Declaration order is dispatch priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FileMarker {
    Hold,
    Block,
    Dedupe,
    Erase,
    Save,
    Replace,
    Transfer,
}

impl FileMarker {
    pub const ALL: [FileMarker; 7] = [
        FileMarker::Hold,
        FileMarker::Block,
        FileMarker::Dedupe,
        FileMarker::Erase,
        FileMarker::Save,
        FileMarker::Replace,
        FileMarker::Transfer,
    ];

    pub fn as_char(&self) -> char {
        match self {
            FileMarker::Hold => 'h',
            FileMarker::Block => 'b',
            FileMarker::Dedupe => 'd',
            FileMarker::Erase => 'e',
            FileMarker::Save => 's',
            FileMarker::Replace => 'r',
            FileMarker::Transfer => 't',
        }
    }

    pub fn from_char(c: char) -> Option<FileMarker> {
        FileMarker::ALL.into_iter().find(|m| m.as_char() == c)
    }

    pub fn name(&self) -> &'static str {
        match self {
            FileMarker::Hold => "hold",
            FileMarker::Block => "block",
            FileMarker::Dedupe => "dedupe",
            FileMarker::Erase => "erase",
            FileMarker::Save => "save",
            FileMarker::Replace => "replace",
            FileMarker::Transfer => "transfer",
        }
    }

    /// Name of the special subdirectory carrying this marker.
    pub fn dir_name(&self) -> String {
        format!("!{}", self.name())
    }

    pub fn from_dir_name(name: &str) -> Option<FileMarker> {
        let name = name.strip_prefix('!')?;
        FileMarker::ALL.into_iter().find(|m| m.name() == name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkerSet {
    marks: BTreeSet<FileMarker>,
    index: Option<usize>,
}

impl MarkerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of(marks: &[FileMarker]) -> Self {
        Self {
            marks: marks.iter().copied().collect(),
            index: None,
        }
    }

    pub fn with(mut self, marker: FileMarker) -> Self {
        self.marks.insert(marker);
        self
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    pub fn contains(&self, marker: FileMarker) -> bool {
        self.marks.contains(&marker)
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    /// Highest priority marker.
    pub fn primary(&self) -> Option<FileMarker> {
        self.marks.iter().next().copied()
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn iter(&self) -> impl Iterator<Item = FileMarker> + '_ {
        self.marks.iter().copied()
    }

    fn token(&self) -> String {
        let mut token: String = TOKEN_PREFIX.to_string();
        token.extend(self.marks.iter().map(|m| m.as_char()));
        if let Some(index) = self.index {
            token.push_str(&index.to_string());
        }
        token
    }
}

struct Token<'a> {
    base: &'a str,
    chars: &'a str,
    index: &'a str,
    ext: &'a str,
}

fn parse_token(name: &str) -> Option<Token<'_>> {
    let pos = name.rfind(TOKEN_PREFIX)?;
    if pos == 0 {
        return None;
    }
    let rest = &name[pos + TOKEN_PREFIX.len()..];
    let chars_len = rest
        .find(|c: char| FileMarker::from_char(c).is_none())
        .unwrap_or(rest.len());
    if chars_len == 0 {
        return None;
    }
    let after_chars = &rest[chars_len..];
    let index_len = after_chars
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(after_chars.len());
    let ext = &after_chars[index_len..];
    if !ext.is_empty() && (!ext.starts_with('.') || ext[1..].contains('.')) {
        return None;
    }
    Some(Token {
        base: &name[..pos],
        chars: &rest[..chars_len],
        index: &after_chars[..index_len],
        ext,
    })
}

/// File name with any marker token removed.
pub fn strip_name(name: &str) -> String {
    match parse_token(name) {
        Some(token) => format!("{}{}", token.base, token.ext),
        None => name.to_string(),
    }
}

pub fn strip(path: &Path) -> PathBuf {
    match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => path.with_file_name(strip_name(name)),
        None => path.to_path_buf(),
    }
}

/// Replace the marker token of `path` with `markers`. An empty set strips.
pub fn mark(path: &Path, markers: &MarkerSet) -> PathBuf {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return path.to_path_buf();
    };
    let stripped = strip_name(name);
    if markers.is_empty() {
        return path.with_file_name(stripped);
    }
    let stripped_path = Path::new(&stripped);
    let marked = match (
        stripped_path.file_stem().and_then(|s| s.to_str()),
        stripped_path.extension().and_then(|e| e.to_str()),
    ) {
        (Some(stem), Some(ext)) => format!("{}{}.{}", stem, markers.token(), ext),
        _ => format!("{}{}", stripped, markers.token()),
    };
    path.with_file_name(marked)
}

/// Markers of `path`, from its token or else from its parent directory name.
pub fn extract(path: &Path) -> MarkerSet {
    if let Some(token) = path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(parse_token)
    {
        return MarkerSet {
            marks: token.chars.chars().filter_map(FileMarker::from_char).collect(),
            index: token.index.parse().ok(),
        };
    }

    path.parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .and_then(FileMarker::from_dir_name)
        .map(|m| MarkerSet::new().with(m))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_inserts_before_extension() {
        let marked = mark(Path::new("/in/photo.jpg"), &MarkerSet::of(&[FileMarker::Dedupe]));
        assert_eq!(marked, PathBuf::from("/in/photo.!d.jpg"));
    }

    #[test]
    fn test_mark_without_extension() {
        let marked = mark(Path::new("/in/photo"), &MarkerSet::of(&[FileMarker::Hold]));
        assert_eq!(marked, PathBuf::from("/in/photo.!h"));
        assert_eq!(strip(&marked), PathBuf::from("/in/photo"));
    }

    #[test]
    fn test_round_trip_every_combination() {
        let path = Path::new("/in/a.b/IMG_0001.jpeg");
        for bits in 1u32..(1 << FileMarker::ALL.len()) {
            let marks: Vec<FileMarker> = FileMarker::ALL
                .iter()
                .enumerate()
                .filter(|(i, _)| bits & (1 << i) != 0)
                .map(|(_, m)| *m)
                .collect();
            let set = MarkerSet::of(&marks);
            let marked = mark(path, &set);
            assert_eq!(extract(&marked), set, "{}", marked.display());
            assert_eq!(strip(&marked), path);
        }
    }

    #[test]
    fn test_strip_of_empty_mark_is_identity() {
        let path = Path::new("/in/photo.jpg");
        assert_eq!(strip(&mark(path, &MarkerSet::new())), path);
    }

    #[test]
    fn test_remark_replaces_token() {
        let held = mark(Path::new("/in/photo.jpg"), &MarkerSet::of(&[FileMarker::Hold]));
        let replaced = mark(&held, &MarkerSet::of(&[FileMarker::Replace]).with_index(2));
        assert_eq!(replaced, PathBuf::from("/in/photo.!r2.jpg"));
        let extracted = extract(&replaced);
        assert_eq!(extracted.primary(), Some(FileMarker::Replace));
        assert_eq!(extracted.index(), Some(2));
    }

    #[test]
    fn test_extract_from_directory() {
        let extracted = extract(Path::new("/in/!dedupe/photo.jpg"));
        assert_eq!(extracted, MarkerSet::of(&[FileMarker::Dedupe]));
        assert!(extract(Path::new("/in/plain/photo.jpg")).is_empty());
    }

    #[test]
    fn test_token_wins_over_directory() {
        let extracted = extract(Path::new("/in/!dedupe/photo.!s.jpg"));
        assert_eq!(extracted, MarkerSet::of(&[FileMarker::Save]));
    }

    #[test]
    fn test_unrelated_bang_is_not_a_token() {
        assert_eq!(strip_name("wow.!zz.jpg"), "wow.!zz.jpg");
        assert_eq!(strip_name(".!h"), ".!h");
        assert!(extract(Path::new("/in/wow.!zz.jpg")).is_empty());
    }

    #[test]
    fn test_primary_follows_priority() {
        let set = MarkerSet::of(&[FileMarker::Replace, FileMarker::Hold, FileMarker::Dedupe]);
        assert_eq!(set.primary(), Some(FileMarker::Hold));
    }
}
