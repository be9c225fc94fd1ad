use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    Rendered,
    DuplicateSkipped,
    Invalid,
    Failed,
}

impl RecordStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordStatus::Rendered => "rendered",
            RecordStatus::DuplicateSkipped => "duplicate_skipped",
            RecordStatus::Invalid => "invalid",
            RecordStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordEntry {
    pub identifier: String,
    pub status: RecordStatus,
    pub output: Option<PathBuf>,
    pub detail: Option<String>,
}

impl RecordEntry {
    pub fn rendered(identifier: &str, output: PathBuf) -> Self {
        RecordEntry {
            identifier: identifier.to_string(),
            status: RecordStatus::Rendered,
            output: Some(output),
            detail: None,
        }
    }

    pub fn duplicate(identifier: &str) -> Self {
        RecordEntry {
            identifier: identifier.to_string(),
            status: RecordStatus::DuplicateSkipped,
            output: None,
            detail: Some("duplicate, skipped".to_string()),
        }
    }

    pub fn invalid(identifier: &str, reason: &str) -> Self {
        RecordEntry {
            identifier: identifier.to_string(),
            status: RecordStatus::Invalid,
            output: None,
            detail: Some(reason.to_string()),
        }
    }

    pub fn failed(identifier: &str, detail: String) -> Self {
        RecordEntry {
            identifier: identifier.to_string(),
            status: RecordStatus::Failed,
            output: None,
            detail: Some(detail),
        }
    }
}

// Entries are in input order. `aborted` carries the reason when the
// destination became unusable mid-run and dispatch stopped.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub entries: Vec<RecordEntry>,
    pub aborted: Option<String>,
}

impl RunSummary {
    pub fn count(&self, status: RecordStatus) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.status == status)
            .count()
    }

    pub fn rendered(&self) -> usize {
        self.count(RecordStatus::Rendered)
    }

    pub fn duplicates(&self) -> usize {
        self.count(RecordStatus::DuplicateSkipped)
    }

    pub fn invalid(&self) -> usize {
        self.count(RecordStatus::Invalid)
    }

    pub fn failed(&self) -> usize {
        self.count(RecordStatus::Failed)
    }

    pub fn outputs(&self) -> impl Iterator<Item = &Path> {
        self.entries.iter().filter_map(|entry| entry.output.as_deref())
    }
}
