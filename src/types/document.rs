//! Cases, pages and document groups

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A case folder holding the raw page files of one batch entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Case {
    /// Case identifier (the folder name)
    pub id: String,
    /// Directory containing the case's page files
    pub dir: PathBuf,
}

impl Case {
    pub fn new(id: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            dir: dir.into(),
        }
    }
}

/// A single page file belonging to a document group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRef {
    /// Full path to the page file
    pub path: PathBuf,
    /// File name as it appeared in the case directory
    pub file_name: String,
    /// Page number parsed from the file name (1 when none was found)
    pub page_number: u32,
    /// MIME type derived from the file extension
    pub mime_type: String,
}

/// Composite key identifying a document group across the whole batch
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupKey {
    pub case_id: String,
    pub base_name: String,
}

impl GroupKey {
    pub fn new(case_id: impl Into<String>, base_name: impl Into<String>) -> Self {
        Self {
            case_id: case_id.into(),
            base_name: base_name.into(),
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.case_id, self.base_name)
    }
}

/// Pages inferred to form one logical document within a case.
///
/// Pages are kept in ascending page-number order; the grouper is the only
/// producer and the group is never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentGroup {
    pub case_id: String,
    pub base_name: String,
    pub pages: Vec<PageRef>,
}

impl DocumentGroup {
    pub fn key(&self) -> GroupKey {
        GroupKey::new(self.case_id.clone(), self.base_name.clone())
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// File names of the group's pages, in page order
    pub fn file_names(&self) -> Vec<&str> {
        self.pages.iter().map(|p| p.file_name.as_str()).collect()
    }
}
