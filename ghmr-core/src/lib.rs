//! Core of ghmr: per-file "viewed" tracking for open pull requests.
//!
//! A file counts as viewed only while its current content fingerprint equals the
//! one recorded when it was marked. [`oracle`] makes that call,
//! [`reconciler`] applies user toggles and rebuilds the record to persist,
//! [`write_queue`] writes it through to a [`persistence::ViewedStore`], and
//! [`snapshot`] assembles fresh per-refresh snapshots.

pub mod config;
pub mod error;
pub mod layout;
pub mod oracle;
pub mod persistence;
pub mod reconciler;
pub mod snapshot;
pub mod stats;
pub mod types;
pub mod write_queue;
