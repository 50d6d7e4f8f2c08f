pub mod types;

pub use types::{
    Division, LocalId, NewSubmission, PlayerData, PlayerEntry, Position, SubmissionRecord,
    MAX_PLAYERS,
};
