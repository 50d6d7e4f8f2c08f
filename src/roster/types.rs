use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Upper bound on players in a single roster
pub const MAX_PLAYERS: usize = 50;

/// League division a player signs up for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Division {
    #[default]
    #[serde(rename = "Division 1")]
    D1,
    #[serde(rename = "Division 2")]
    D2,
}

impl Division {
    pub const ALL: [Division; 2] = [Division::D1, Division::D2];

    pub fn label(&self) -> &'static str {
        match self {
            Division::D1 => "Division 1",
            Division::D2 => "Division 2",
        }
    }
}

impl fmt::Display for Division {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for Division {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Division::ALL
            .into_iter()
            .find(|d| d.label() == s)
            .ok_or_else(|| format!("invalid division: {}", s))
    }
}

/// Court position. Labels are the exact strings shown to captains and
/// written to exports, casing included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Position {
    #[default]
    #[serde(rename = "Main Netty")]
    MainNetty,
    #[serde(rename = "Left Netty")]
    LeftNetty,
    #[serde(rename = "Right Netty")]
    RightNetty,
    #[serde(rename = "Left front")]
    LeftFront,
    #[serde(rename = "Right front")]
    RightFront,
    #[serde(rename = "Net center")]
    NetCenter,
    #[serde(rename = "Left Back")]
    LeftBack,
    #[serde(rename = "Right Back")]
    RightBack,
    #[serde(rename = "Back Center")]
    BackCenter,
    #[serde(rename = "Service man")]
    ServiceMan,
}

impl Position {
    pub const ALL: [Position; 10] = [
        Position::MainNetty,
        Position::LeftNetty,
        Position::RightNetty,
        Position::LeftFront,
        Position::RightFront,
        Position::NetCenter,
        Position::LeftBack,
        Position::RightBack,
        Position::BackCenter,
        Position::ServiceMan,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Position::MainNetty => "Main Netty",
            Position::LeftNetty => "Left Netty",
            Position::RightNetty => "Right Netty",
            Position::LeftFront => "Left front",
            Position::RightFront => "Right front",
            Position::NetCenter => "Net center",
            Position::LeftBack => "Left Back",
            Position::RightBack => "Right Back",
            Position::BackCenter => "Back Center",
            Position::ServiceMan => "Service man",
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for Position {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Position::ALL
            .into_iter()
            .find(|p| p.label() == s)
            .ok_or_else(|| format!("invalid position: {}", s))
    }
}

/// Identity of an entry inside one editor. Only used to keep list edits
/// stable; never written to a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalId(pub u32);

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One editable player row in a draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerEntry {
    pub id: LocalId,
    pub player_name: String,
    pub division: Division,
    pub position: Position,
}

impl PlayerEntry {
    pub fn new(id: LocalId) -> Self {
        Self {
            id,
            player_name: String::new(),
            division: Division::default(),
            position: Position::default(),
        }
    }

    pub fn to_data(&self) -> PlayerData {
        PlayerData {
            player_name: self.player_name.clone(),
            division: self.division,
            position: self.position,
        }
    }
}

/// A player as stored in a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerData {
    pub player_name: String,
    pub division: Division,
    pub position: Position,
}

/// Roster handed to the submission sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSubmission {
    pub team_name: String,
    pub players: Vec<PlayerData>,
}

/// A roster accepted by the store. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRecord {
    pub id: String,
    pub team_name: String,
    /// ISO-8601 timestamp, e.g. `2024-01-02T10:00:00.000Z`
    pub submitted_at: String,
    pub players: Vec<PlayerData>,
}
