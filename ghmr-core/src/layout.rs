//! Visual file order and folder grouping for a pull request's file list.
//!
//! Files are grouped by parent directory: root-level files first, then
//! directories in byte order, each group keeping the API's file order. Navigation
//! and folder-level bulk toggles follow this order.

use std::collections::BTreeMap;

use crate::types::FileEntry;

/// Indices into `files` in display order.
pub fn visual_order(files: &[FileEntry]) -> Vec<usize> {
    folder_groups(files)
        .into_iter()
        .flat_map(|group| group.members)
        .collect()
}

/// Index of the file after `current` in `order`, clamped at the last file.
///
/// Returns `current` unchanged when it is not part of `order`.
pub fn next_index(current: usize, order: &[usize]) -> usize {
    match order.iter().position(|&i| i == current) {
        Some(pos) if pos + 1 < order.len() => order[pos + 1],
        _ => current,
    }
}

/// Index of the file before `current` in `order`, clamped at the first file.
pub fn prev_index(current: usize, order: &[usize]) -> usize {
    match order.iter().position(|&i| i == current) {
        Some(pos) if pos > 0 => order[pos - 1],
        _ => current,
    }
}

/// Index of the first unviewed file in API order, or 0 when all are viewed.
pub fn first_unviewed(files: &[FileEntry]) -> usize {
    files.iter().position(|f| !f.viewed).unwrap_or(0)
}

/// Tri-state summary of a folder's files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderState {
    AllViewed,
    PartiallyViewed,
    NoneViewed,
}

impl FolderState {
    /// Summarizes a set of `viewed` flags. An empty set counts as `NoneViewed`.
    pub fn from_flags(flags: impl IntoIterator<Item = bool>) -> Self {
        let (mut total, mut viewed) = (0usize, 0usize);
        for flag in flags {
            total += 1;
            viewed += usize::from(flag);
        }
        match viewed {
            0 => FolderState::NoneViewed,
            n if n == total => FolderState::AllViewed,
            _ => FolderState::PartiallyViewed,
        }
    }

    /// Target of a folder-level toggle when none is given explicitly: mark the
    /// folder viewed unless every file already is.
    pub fn default_force_status(self) -> bool {
        self != FolderState::AllViewed
    }

    pub fn marker(self) -> &'static str {
        match self {
            FolderState::AllViewed => "[x]",
            FolderState::PartiallyViewed => "[~]",
            FolderState::NoneViewed => "[ ]",
        }
    }
}

/// Files sharing one parent directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderGroup {
    /// Parent directory, `""` for the repository root.
    pub directory: String,
    /// Indices into the snapshot's file list, in API order.
    pub members: Vec<usize>,
}

impl FolderGroup {
    pub fn state(&self, files: &[FileEntry]) -> FolderState {
        FolderState::from_flags(self.members.iter().filter_map(|&i| files.get(i)).map(|f| f.viewed))
    }

    pub fn filenames<'a>(&self, files: &'a [FileEntry]) -> Vec<&'a str> {
        self.members
            .iter()
            .filter_map(|&i| files.get(i))
            .map(|f| f.filename.as_str())
            .collect()
    }
}

/// Groups `files` by parent directory in display order.
pub fn folder_groups(files: &[FileEntry]) -> Vec<FolderGroup> {
    // BTreeMap orders "" before every other key, which puts root files first.
    let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (index, file) in files.iter().enumerate() {
        groups.entry(file.directory()).or_default().push(index);
    }
    groups
        .into_iter()
        .map(|(directory, members)| FolderGroup {
            directory: directory.to_owned(),
            members,
        })
        .collect()
}

/// The group whose directory is exactly `directory` (trailing `/` ignored).
pub fn folder(files: &[FileEntry], directory: &str) -> Option<FolderGroup> {
    let directory = directory.trim_end_matches('/');
    folder_groups(files)
        .into_iter()
        .find(|group| group.directory == directory)
}
