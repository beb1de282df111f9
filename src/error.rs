use std::io;
use std::time::Duration;

use thiserror::Error;

/// Everything that can go wrong while driving the toolkit.
///
/// Stage-level failures (`Connectivity`, `Timeout`, `Parse`, `MissingInput`,
/// `UnexpectedEof`, `Toolkit`) abort the pipeline but are reported on the
/// console only; the process still exits 0. `Cancelled` unwinds to the
/// binary for cleanup. The remaining variants are environment faults.
#[derive(Debug, Error)]
pub enum Error {
    #[error("the metadata store is unreachable")]
    Connectivity,

    #[error("no expected output within {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("could not parse {0} from the tool output")]
    Parse(&'static str),

    #[error("missing input file: {0}")]
    MissingInput(String),

    #[error("interrupted")]
    Cancelled,

    #[error("the tool exited before any expected output appeared")]
    UnexpectedEof,

    #[error("the toolkit is incomplete:\n{0}")]
    Toolkit(String),

    #[error("failed to spawn {0}")]
    Spawn(String),

    #[error(transparent)]
    Pattern(#[from] regex::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// Failures the controller reports and absorbs rather than propagating.
    pub fn aborts_pipeline(&self) -> bool {
        matches!(
            self,
            Error::Connectivity
                | Error::Timeout(_)
                | Error::Parse(_)
                | Error::MissingInput(_)
                | Error::UnexpectedEof
                | Error::Toolkit(_)
        )
    }
}
