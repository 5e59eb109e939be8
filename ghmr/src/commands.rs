//! Command parser and dispatcher for ghmr.
//!
//! Translates stdin lines into [`Command`]s and applies them to [`AppState`],
//! returning a [`Dispatch`] telling the event loop what to do next. Review keys
//! have aliases: `enter` marks, `backspace` unmarks, `j`/`k` move.

use crate::app::{AppError, AppState};
use crate::render;

/// A parsed user command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List loaded pull requests.
    PullRequests,
    /// Open a pull request by number (or global id).
    Open(u64),
    /// List files of the open pull request in folder order.
    Files,
    Next,
    Prev,
    /// Mark the current file viewed and advance.
    Mark,
    /// Unmark the current or previous file and move back.
    Unmark,
    /// Flip one file; the current file when no name is given.
    Toggle(Option<String>),
    /// Bulk-set a folder; `None` picks the tri-state default.
    Folder { directory: String, force: Option<bool> },
    Stats,
    Refresh,
    Help,
    Quit,
}

impl Command {
    /// Parses one input line. Blank lines yield `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the line is not a valid command.
    pub fn parse(line: &str) -> Result<Option<Command>, String> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let rest: Vec<&str> = words.collect();

        let command = match (verb.to_ascii_lowercase().as_str(), rest.as_slice()) {
            ("prs" | "ls", []) => Command::PullRequests,
            ("open" | "o", [key]) => {
                let key = key.trim_start_matches('#');
                Command::Open(key.parse().map_err(|_| format!("not a pull request number: {key}"))?)
            }
            ("files" | "f", []) => Command::Files,
            ("next" | "j" | "n", []) => Command::Next,
            ("prev" | "k" | "p", []) => Command::Prev,
            ("mark" | "enter" | "m", []) => Command::Mark,
            ("unmark" | "backspace" | "u", []) => Command::Unmark,
            ("toggle" | "t", []) => Command::Toggle(None),
            ("toggle" | "t", [file]) => Command::Toggle(Some((*file).to_owned())),
            ("folder" | "d", [dir]) => Command::Folder {
                directory: normalize_dir(dir),
                force: None,
            },
            ("folder" | "d", [dir, target]) => Command::Folder {
                directory: normalize_dir(dir),
                force: Some(parse_target(target)?),
            },
            ("stats" | "s", []) => Command::Stats,
            ("refresh" | "r", []) => Command::Refresh,
            ("help" | "h" | "?", []) => Command::Help,
            ("quit" | "q" | "exit", []) => Command::Quit,
            (verb, _) => return Err(format!("unknown command or wrong arguments: {verb} (try `help`)")),
        };
        Ok(Some(command))
    }
}

/// `.` and `/` name the repository root.
fn normalize_dir(dir: &str) -> String {
    match dir {
        "." | "/" => String::new(),
        _ => dir.trim_end_matches('/').to_owned(),
    }
}

fn parse_target(target: &str) -> Result<bool, String> {
    match target {
        "viewed" | "on" | "true" => Ok(true),
        "unviewed" | "off" | "false" => Ok(false),
        other => Err(format!("folder target must be `viewed` or `unviewed`, got {other}")),
    }
}

/// Control-flow signal returned from the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Print this text and keep reading commands.
    Output(String),
    /// Rebuild snapshots from the source, then keep going.
    Refresh,
    /// Flush pending writes and exit.
    Quit,
}

/// Applies `command` to `state`.
pub fn dispatch(command: Command, state: &mut AppState) -> Dispatch {
    match run(command, state) {
        Ok(dispatch) => dispatch,
        Err(err) => Dispatch::Output(format!("error: {err}")),
    }
}

fn run(command: Command, state: &mut AppState) -> Result<Dispatch, AppError> {
    let text = match command {
        Command::PullRequests => render::pull_requests(&state.reconciler),
        Command::Open(key) => {
            state.open(key)?;
            render::current(state)?
        }
        Command::Files => render::files(state.review()?, state.current),
        Command::Next => {
            state.next()?;
            render::current(state)?
        }
        Command::Prev => {
            state.prev()?;
            render::current(state)?
        }
        Command::Mark => {
            let outcome = state.mark()?;
            with_outcome(outcome.as_ref(), render::current(state)?)
        }
        Command::Unmark => {
            let outcome = state.unmark()?;
            with_outcome(outcome.as_ref(), render::current(state)?)
        }
        Command::Toggle(file) => render::outcome(&state.toggle(file.as_deref())?),
        Command::Folder { directory, force } => render::outcome(&state.toggle_folder(&directory, force)?),
        Command::Stats => render::stats(state.review()?),
        Command::Refresh => return Ok(Dispatch::Refresh),
        Command::Help => render::help().to_owned(),
        Command::Quit => return Ok(Dispatch::Quit),
    };
    Ok(Dispatch::Output(text))
}

fn with_outcome(outcome: Option<&ghmr_core::reconciler::ToggleOutcome>, current: String) -> String {
    match outcome {
        Some(outcome) => format!("{}\n{current}", render::outcome(outcome)),
        None => current,
    }
}
