use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Classification of a candidate file. Each storable type owns one store file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifyType {
    Image,
    Video,
    Scrap,
    Unknown,
    DedupperLock,
    DedupperCache,
}

impl ClassifyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassifyType::Image => "image",
            ClassifyType::Video => "video",
            ClassifyType::Scrap => "scrap",
            ClassifyType::Unknown => "unknown",
            ClassifyType::DedupperLock => "dedupper_lock",
            ClassifyType::DedupperCache => "dedupper_cache",
        }
    }

    pub fn parse(value: &str) -> Option<ClassifyType> {
        match value {
            "image" => Some(ClassifyType::Image),
            "video" => Some(ClassifyType::Video),
            "scrap" => Some(ClassifyType::Scrap),
            "unknown" => Some(ClassifyType::Unknown),
            "dedupper_lock" => Some(ClassifyType::DedupperLock),
            "dedupper_cache" => Some(ClassifyType::DedupperCache),
            _ => None,
        }
    }

    /// Types that never touch the similarity store.
    pub fn is_forgettable(&self) -> bool {
        !matches!(self, ClassifyType::Image | ClassifyType::Video)
    }

    /// Types whose stored rows must carry perceptual hashes.
    pub fn uses_perceptual_hash(&self) -> bool {
        matches!(self, ClassifyType::Image)
    }
}

impl fmt::Display for ClassifyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state. Declaration order matches the division ordering, so the
/// derived `Ord` agrees with `division()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileState {
    Blocked,
    Deduped,
    Accepted,
    Keeping,
}

impl FileState {
    pub fn division(&self) -> i64 {
        match self {
            FileState::Blocked => 0,
            FileState::Deduped => 100,
            FileState::Accepted => 200,
            FileState::Keeping => 300,
        }
    }

    pub fn from_division(division: i64) -> Option<FileState> {
        match division {
            0 => Some(FileState::Blocked),
            100 => Some(FileState::Deduped),
            200 => Some(FileState::Accepted),
            300 => Some(FileState::Keeping),
            _ => None,
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.division() >= FileState::Accepted.division()
    }

    pub fn is_keeping(&self) -> bool {
        *self == FileState::Keeping
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    Hold,
    Delete,
    Save,
    Replace,
    Relocate,
    Transfer,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Hold => "HOLD",
            ActionType::Delete => "DELETE",
            ActionType::Save => "SAVE",
            ActionType::Replace => "REPLACE",
            ActionType::Relocate => "RELOCATE",
            ActionType::Transfer => "TRANSFER",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reason codes. The symbolic names are part of the report and log contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonType {
    HashMatchRelocate,
    HashMismatchRelocate,
    NgFileName,
    NgDirPath,
    UnknownFileType,
    ScrapFileType,
    KeepDedupperFile,
    SweepDedupperFile,
    FileMarkHold,
    FileMarkBlock,
    FileMarkDedupe,
    FileMarkErase,
    FileMarkSave,
    FileMarkReplace,
    FileMarkTransfer,
    Damaged,
    LowFileSize,
    LowResolution,
    LowLongSide,
    HashMatch,
    HashMatchTransfer,
    HashMatchRecovery,
    DeepLearning,
    PHashMatch,
    PHashMatchLostFile,
    PHashMatchTransfer,
    PHashMatchKeeping,
    PHashMayBe,
    PHashRejectLowResolution,
    PHashRejectLowFileSize,
    PHashRejectNewer,
    PHashRejectDifferentMean,
    PHashRejectLowEntropy,
    PHashRejectLowQuality,
    FileNameMatch,
    NoProblem,
    ProcessError,
}

impl ReasonType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonType::HashMatchRelocate => "HASH_MATCH_RELOCATE",
            ReasonType::HashMismatchRelocate => "HASH_MISMATCH_RELOCATE",
            ReasonType::NgFileName => "NG_FILE_NAME",
            ReasonType::NgDirPath => "NG_DIR_PATH",
            ReasonType::UnknownFileType => "UNKNOWN_FILE_TYPE",
            ReasonType::ScrapFileType => "SCRAP_FILE_TYPE",
            ReasonType::KeepDedupperFile => "KEEP_DEDUPPER_FILE",
            ReasonType::SweepDedupperFile => "SWEEP_DEDUPPER_FILE",
            ReasonType::FileMarkHold => "FILE_MARK_HOLD",
            ReasonType::FileMarkBlock => "FILE_MARK_BLOCK",
            ReasonType::FileMarkDedupe => "FILE_MARK_DEDUPE",
            ReasonType::FileMarkErase => "FILE_MARK_ERASE",
            ReasonType::FileMarkSave => "FILE_MARK_SAVE",
            ReasonType::FileMarkReplace => "FILE_MARK_REPLACE",
            ReasonType::FileMarkTransfer => "FILE_MARK_TRANSFER",
            ReasonType::Damaged => "DAMAGED",
            ReasonType::LowFileSize => "LOW_FILE_SIZE",
            ReasonType::LowResolution => "LOW_RESOLUTION",
            ReasonType::LowLongSide => "LOW_LONG_SIDE",
            ReasonType::HashMatch => "HASH_MATCH",
            ReasonType::HashMatchTransfer => "HASH_MATCH_TRANSFER",
            ReasonType::HashMatchRecovery => "HASH_MATCH_RECOVERY",
            ReasonType::DeepLearning => "DEEP_LEARNING",
            ReasonType::PHashMatch => "P_HASH_MATCH",
            ReasonType::PHashMatchLostFile => "P_HASH_MATCH_LOST_FILE",
            ReasonType::PHashMatchTransfer => "P_HASH_MATCH_TRANSFER",
            ReasonType::PHashMatchKeeping => "P_HASH_MATCH_KEEPING",
            ReasonType::PHashMayBe => "P_HASH_MAY_BE",
            ReasonType::PHashRejectLowResolution => "P_HASH_REJECT_LOW_RESOLUTION",
            ReasonType::PHashRejectLowFileSize => "P_HASH_REJECT_LOW_FILE_SIZE",
            ReasonType::PHashRejectNewer => "P_HASH_REJECT_NEWER",
            ReasonType::PHashRejectDifferentMean => "P_HASH_REJECT_DIFFERENT_MEAN",
            ReasonType::PHashRejectLowEntropy => "P_HASH_REJECT_LOW_ENTROPY",
            ReasonType::PHashRejectLowQuality => "P_HASH_REJECT_LOW_QUALITY",
            ReasonType::FileNameMatch => "FILE_NAME_MATCH",
            ReasonType::NoProblem => "NO_PROBLEM",
            ReasonType::ProcessError => "PROCESS_ERROR",
        }
    }

    /// State written to the store when a DELETE with this reason is executed.
    pub fn tombstone_state(&self) -> Option<FileState> {
        match self {
            ReasonType::FileMarkBlock => Some(FileState::Blocked),
            ReasonType::FileMarkDedupe
            | ReasonType::PHashRejectLowResolution
            | ReasonType::PHashRejectLowFileSize
            | ReasonType::PHashRejectNewer
            | ReasonType::PHashRejectLowEntropy
            | ReasonType::PHashRejectLowQuality => Some(FileState::Deduped),
            _ => None,
        }
    }
}

impl fmt::Display for ReasonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything known about one candidate file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub hash: String,
    pub p_hash: Option<String>,
    pub d_hash: Option<String>,
    pub width: u32,
    pub height: u32,
    pub ratio: f64,
    pub damaged: bool,
    pub size: u64,
    /// Capture or creation time, epoch milliseconds.
    pub timestamp: i64,
    /// Canonical file name with markers stripped.
    pub name: String,
    pub from_path: PathBuf,
    pub to_path: PathBuf,
    pub file_type: ClassifyType,
    pub state: FileState,
}

impl FileRecord {
    pub fn pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn long_side(&self) -> u32 {
        self.width.max(self.height)
    }

    pub fn from_dir(&self) -> Option<&Path> {
        self.from_path.parent()
    }

    pub fn has_perceptual_hashes(&self) -> bool {
        is_numeric_hash(self.p_hash.as_deref()) && is_numeric_hash(self.d_hash.as_deref())
    }
}

/// A row of the similarity store. Distances are only present on rows returned
/// from a perceptual-hash query and are never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub hash: String,
    pub p_hash: Option<String>,
    pub d_hash: Option<String>,
    pub width: u32,
    pub height: u32,
    pub ratio: f64,
    pub timestamp: i64,
    pub name: String,
    pub to_path: PathBuf,
    pub from_path: PathBuf,
    pub size: u64,
    pub state: FileState,
    pub p_hash_distance: Option<u32>,
    pub d_hash_distance: Option<u32>,
}

impl StoredRecord {
    pub fn pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Per-candidate decision kept when a perceptual-hash hit is ambiguous.
/// `action` is the pending intent, not the effective action.
#[derive(Debug, Clone, PartialEq)]
pub struct JudgeSubResult {
    pub action: ActionType,
    pub matched: StoredRecord,
    pub reason: ReasonType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JudgeResult {
    pub action: ActionType,
    pub matched: Option<StoredRecord>,
    pub reason: ReasonType,
    pub sub_results: Vec<JudgeSubResult>,
}

impl JudgeResult {
    pub fn new(action: ActionType, reason: ReasonType) -> Self {
        Self {
            action,
            matched: None,
            reason,
            sub_results: Vec::new(),
        }
    }

    pub fn matched(action: ActionType, matched: StoredRecord, reason: ReasonType) -> Self {
        Self {
            action,
            matched: Some(matched),
            reason,
            sub_results: Vec::new(),
        }
    }

    pub fn with_sub_results(mut self, sub_results: Vec<JudgeSubResult>) -> Self {
        self.sub_results = sub_results;
        self
    }
}

/// True when `value` is a non-empty decimal string.
pub fn is_numeric_hash(value: Option<&str>) -> bool {
    match value {
        Some(v) => !v.is_empty() && v.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}
