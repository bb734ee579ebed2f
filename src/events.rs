use crate::commands::Command;
use crate::session::SubmissionReport;

/// Everything the session loop reacts to, apart from snapshots
/// (those arrive on a watch channel so only the latest is kept).
#[derive(Debug)]
pub enum Event {
    // Market feed socket is up and subscribed
    FeedConnected,

    // Market feed dropped; the session keeps its last-known state
    FeedDisconnected { reason: String },

    // Parsed user input
    Command(Command),

    // A spawned submission finished
    SubmitFinished(SubmissionReport),

    // Ctrl+C, end of input, or "quit"
    Shutdown,
}
