pub mod editor;
pub mod export;
pub mod grouping;

pub use editor::{PlayerField, RosterEditor};
pub use export::CsvDownload;
pub use grouping::{group_by_team, short_id, TeamGroup};
