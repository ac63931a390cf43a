use sesmerge_board::{BoardError, NetCode};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Board(#[from] BoardError),

    #[error("Failed to parse session: {0}")]
    Session(#[from] sesmerge_ses::ParseError),

    #[error(transparent)]
    Merge(#[from] MergeError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    #[error("Net '{net}': wire on unsupported copper layer '{layer}'")]
    UnknownLayer { net: String, layer: String },

    #[error("Net '{net}': wire path with {points} point(s)")]
    DegeneratePath { net: String, points: usize },

    /// Internal invariant: a name resolved to two codes within one merge.
    #[error("Net '{name}' resolved to code {first} and then to {second}")]
    NetCodeConflict {
        name: String,
        first: NetCode,
        second: NetCode,
    },

    #[error("Board text has no closing parenthesis to insert before")]
    UnterminatedBoard,
}
