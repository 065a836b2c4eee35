//! Page grouping
//!
//! Turns the flat list of page files in a case folder into ordered
//! document groups. File names follow `<name>[<sep>]<page>.<ext>`, where the
//! separator is any run of spaces, underscores or the word "Page".

use crate::types::{Case, DocumentGroup, PageRef};
use crate::{log_debug, log_warn};

use anyhow::{Context, Result, anyhow};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

/// Prefix for groups whose file name is nothing but a page number
pub const NUMERIC_BASE_PREFIX: &str = "Document_";

static PAGE_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?P<base>.*?)(?:[ _]|page)*(?P<page>\d+)$")
        .expect("Failed to compile page suffix regex pattern")
});

/// File extensions accepted as pages, mapped to their MIME types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SupportedExtensions(BTreeMap<String, String>);

impl SupportedExtensions {
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            entries
                .into_iter()
                .map(|(ext, mime)| (ext.into().to_lowercase(), mime.into()))
                .collect(),
        )
    }

    /// MIME type for an extension, matched case-insensitively
    pub fn mime_for(&self, extension: &str) -> Option<&str> {
        self.0
            .get(&extension.to_lowercase())
            .map(String::as_str)
    }

    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for SupportedExtensions {
    fn default() -> Self {
        Self::new([
            ("pdf", "application/pdf"),
            ("png", "image/png"),
            ("jpg", "image/jpeg"),
            ("jpeg", "image/jpeg"),
            ("tif", "image/tiff"),
            ("tiff", "image/tiff"),
            ("webp", "image/webp"),
        ])
    }
}

/// Split a file stem (name without extension) into base name and page number.
///
/// Never returns an empty base name: a stem without a trailing number is its
/// own base on page 1, and a purely numeric stem becomes `Document_<n>`.
pub fn parse_page_name(stem: &str) -> (String, u32) {
    if let Some(caps) = PAGE_SUFFIX.captures(stem) {
        let base = caps["base"].trim_end_matches([' ', '_', '-', '.']);
        if !base.is_empty()
            && let Ok(page) = caps["page"].parse::<u32>()
        {
            return (base.to_string(), page);
        }
    }

    if !stem.is_empty() && stem.chars().all(|c| c.is_ascii_digit()) {
        return (format!("{NUMERIC_BASE_PREFIX}{stem}"), 1);
    }

    (stem.to_string(), 1)
}

/// Group a case's file names into document groups.
///
/// Files whose extension is not supported are skipped. The result is sorted by
/// base name and each group's pages by page number (ties by file name), so the
/// output does not depend on the order of `file_names`.
pub fn group_filenames<S: AsRef<str>>(
    case_id: &str,
    dir: &Path,
    file_names: &[S],
    supported: &SupportedExtensions,
) -> Vec<DocumentGroup> {
    let mut groups: BTreeMap<String, Vec<PageRef>> = BTreeMap::new();

    for file_name in file_names {
        let file_name = file_name.as_ref();
        let path = Path::new(file_name);

        let Some(mime_type) = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| supported.mime_for(ext))
        else {
            log_debug!("Skipping unsupported file '{}' in case {}", file_name, case_id);
            continue;
        };

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(file_name);
        let (base_name, page_number) = parse_page_name(stem);

        groups.entry(base_name).or_default().push(PageRef {
            path: dir.join(file_name),
            file_name: file_name.to_string(),
            page_number,
            mime_type: mime_type.to_string(),
        });
    }

    groups
        .into_iter()
        .map(|(base_name, mut pages)| {
            pages.sort_by(|a, b| {
                a.page_number
                    .cmp(&b.page_number)
                    .then_with(|| a.file_name.cmp(&b.file_name))
            });
            DocumentGroup {
                case_id: case_id.to_string(),
                base_name,
                pages,
            }
        })
        .collect()
}

/// Read a case directory and group its page files
pub fn group_case(case: &Case, supported: &SupportedExtensions) -> Result<Vec<DocumentGroup>> {
    let entries = fs::read_dir(&case.dir)
        .with_context(|| format!("Failed to read case directory {}", case.dir.display()))?;

    let mut file_names = Vec::new();
    for entry in entries {
        let entry = match entry.and_then(|entry| entry.file_type().map(|kind| (entry, kind))) {
            Ok((entry, kind)) if kind.is_file() => entry,
            Ok(_) => continue,
            Err(err) => {
                log_warn!("Skipping unreadable entry in case {}: {}", case.id, err);
                continue;
            }
        };
        match entry.file_name().into_string() {
            Ok(name) => file_names.push(name),
            Err(name) => log_warn!(
                "Skipping file with non UTF-8 name {:?} in case {}",
                name,
                case.id
            ),
        }
    }

    let groups = group_filenames(&case.id, &case.dir, &file_names, supported);
    log_debug!(
        "Grouped {} files for case {} into {} documents",
        file_names.len(),
        case.id,
        groups.len()
    );
    Ok(groups)
}

/// Every immediate subdirectory of the batch root is one case, sorted by id
pub fn discover_cases(root: &Path) -> Result<Vec<Case>> {
    let entries = fs::read_dir(root)
        .with_context(|| format!("Failed to read batch directory {}", root.display()))?;

    let mut cases = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let id = entry.file_name().to_string_lossy().into_owned();
        if id.starts_with('.') {
            continue;
        }
        cases.push(Case::new(id, entry.path()));
    }

    if cases.is_empty() {
        return Err(anyhow!("No case folders found in {}", root.display()));
    }

    cases.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(cases)
}

/// Discover all cases under a root and group each one.
///
/// Cases that cannot be read, or have no supported page files, are reported
/// and contribute no groups.
pub fn group_batch(root: &Path, supported: &SupportedExtensions) -> Result<Vec<DocumentGroup>> {
    let mut all_groups = Vec::new();
    for case in discover_cases(root)? {
        let groups = match group_case(&case, supported) {
            Ok(groups) => groups,
            Err(err) => {
                log_warn!("Skipping case {}: {:#}", case.id, err);
                continue;
            }
        };
        if groups.is_empty() {
            log_warn!("No processable documents found in case folder: {}", case.id);
        }
        all_groups.extend(groups);
    }
    Ok(all_groups)
}
