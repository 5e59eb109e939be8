//! Plain-text rendering for ghmr.
//!
//! Every function here is read-only over the state and returns the text that
//! the main loop prints to stdout.

use std::fmt::Write as _;

use ghmr_core::layout::{self, FolderState};
use ghmr_core::reconciler::{Reconciler, ReviewState, ToggleOutcome};
use ghmr_core::stats::ReviewStats;

use crate::app::{AppError, AppState};

fn checkbox(viewed: bool) -> &'static str {
    if viewed {
        "[x]"
    } else {
        "[ ]"
    }
}

/// One line per loaded pull request with its review progress.
pub fn pull_requests(reconciler: &Reconciler) -> String {
    let mut out = String::new();
    for snapshot in reconciler.snapshots() {
        let stats = ReviewStats::from_files(&snapshot.files);
        let _ = writeln!(
            out,
            "#{:<5} {:<40} {} ({}/{} files, {}%)",
            snapshot.meta.number,
            snapshot.meta.title,
            snapshot.meta.repository,
            stats.viewed_files,
            stats.total_files,
            stats.viewed_percentage,
        );
    }
    if out.is_empty() {
        out.push_str("no open pull requests");
    }
    out.trim_end().to_owned()
}

/// The file list grouped by folder, with the cursor marked by `>`.
pub fn files(review: &ReviewState, current: usize) -> String {
    let files = review.files();
    let mut out = String::new();
    for group in layout::folder_groups(files) {
        let state = group.state(files);
        let label = if group.directory.is_empty() { "/" } else { group.directory.as_str() };
        let _ = writeln!(out, "{} {label}", state.marker());
        for &index in &group.members {
            let file = &files[index];
            let cursor = if index == current { ">" } else { " " };
            let _ = writeln!(
                out,
                "  {cursor} {} {} {} +{} -{}",
                checkbox(file.viewed),
                file.status.badge(),
                file.filename,
                file.additions,
                file.deletions,
            );
        }
    }
    if out.is_empty() {
        out.push_str("pull request has no files");
    }
    out.trim_end().to_owned()
}

/// The file under the cursor and its position in the folder order.
pub fn current(state: &AppState) -> Result<String, AppError> {
    let review = state.review()?;
    let files = review.files();
    let order = layout::visual_order(files);
    let file = files.get(state.current).ok_or(AppError::NoFiles)?;
    let position = order.iter().position(|&i| i == state.current).map_or(0, |p| p + 1);
    Ok(format!(
        "PR #{} [{}/{}] {} {}",
        review.snapshot().meta.number,
        position,
        order.len(),
        checkbox(file.viewed),
        file.filename,
    ))
}

pub fn outcome(outcome: &ToggleOutcome) -> String {
    if outcome.changes.is_empty() {
        return "no matching files".to_owned();
    }
    outcome
        .changes
        .iter()
        .map(|(name, viewed)| format!("{} {name}", if *viewed { "viewed" } else { "unviewed" }))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn stats(review: &ReviewState) -> String {
    let stats = ReviewStats::from_files(review.files());
    let folders = layout::folder_groups(review.files())
        .iter()
        .filter(|g| g.state(review.files()) == FolderState::AllViewed)
        .count();
    let mut out = format!(
        "{}/{} files viewed, {}% of changed lines (+{}/{} -{}/{}), {folders} folder(s) done",
        stats.viewed_files,
        stats.total_files,
        stats.viewed_percentage,
        stats.viewed_additions,
        stats.additions,
        stats.viewed_deletions,
        stats.deletions,
    );
    if stats.is_complete() {
        out.push_str("\nreview complete");
    }
    out
}

pub fn help() -> &'static str {
    "\
prs                         list open pull requests
open <number>               start reviewing at the first unviewed file
files                       list files by folder
next | j, prev | k          move through files
mark | enter                mark current file viewed and advance
unmark | backspace          unmark current/previous file and move back
toggle [file]               flip one file
folder <dir> [viewed|unviewed]
                            set every file in a folder
stats                       review progress
refresh                     reload pull requests
quit                        flush pending writes and exit"
}
