use crate::types::FileEntry;

/// Review progress of one pull request, weighted by changed lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReviewStats {
    pub additions: u64,
    pub deletions: u64,
    pub viewed_additions: u64,
    pub viewed_deletions: u64,
    pub viewed_files: usize,
    pub total_files: usize,
    /// Share of changed lines in viewed files, rounded to the nearest percent.
    pub viewed_percentage: u8,
}

impl ReviewStats {
    pub fn from_files(files: &[FileEntry]) -> Self {
        let mut stats = ReviewStats {
            total_files: files.len(),
            ..Self::default()
        };
        for file in files {
            stats.additions += u64::from(file.additions);
            stats.deletions += u64::from(file.deletions);
            if file.viewed {
                stats.viewed_files += 1;
                stats.viewed_additions += u64::from(file.additions);
                stats.viewed_deletions += u64::from(file.deletions);
            }
        }
        let total = stats.additions + stats.deletions;
        let viewed = stats.viewed_additions + stats.viewed_deletions;
        if total > 0 {
            // Round half up in integer arithmetic.
            stats.viewed_percentage = ((viewed * 200 + total) / (total * 2)) as u8;
        }
        stats
    }

    pub fn is_complete(&self) -> bool {
        self.total_files > 0 && self.viewed_files == self.total_files
    }
}
