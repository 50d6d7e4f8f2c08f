use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::errors::{AppError, RosterError, SinkError};
use crate::roster::{
    Division, LocalId, NewSubmission, PlayerEntry, Position, SubmissionRecord, MAX_PLAYERS,
};
use crate::store::SubmissionSink;

/// How long the confirmation stays up after a successful submit
pub const NOTICE_TTL: Duration = Duration::from_secs(5);

pub const SUCCESS_MESSAGE: &str = "Thanks! Your roster was submitted.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Success,
    Error,
}

/// Message shown above the form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    #[serde(skip)]
    expires_at: Option<Instant>,
}

impl Notice {
    fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            message: message.into(),
            expires_at: None,
        }
    }

    fn success(message: impl Into<String>, now: Instant) -> Self {
        Self {
            kind: NoticeKind::Success,
            message: message.into(),
            expires_at: Some(now + NOTICE_TTL),
        }
    }

    fn is_visible(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// A single field edit on one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerField {
    PlayerName(String),
    Division(Division),
    Position(Position),
}

/// Serializable snapshot of the editor for the form page
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftView {
    pub team_name: String,
    pub players: Vec<PlayerEntry>,
    pub count: usize,
    pub max_players: usize,
    pub can_add: bool,
    pub can_remove: bool,
    pub submitting: bool,
    pub notice: Option<Notice>,
}

/// In-progress roster for one captain.
///
/// Always holds between one and `max_players` entries. Entry ids come from
/// a counter owned by the editor, so they stay unique across resets.
#[derive(Debug, Clone)]
pub struct RosterEditor {
    team_name: String,
    entries: Vec<PlayerEntry>,
    next_id: u32,
    max_players: usize,
    submitting: bool,
    notice: Option<Notice>,
}

impl Default for RosterEditor {
    fn default() -> Self {
        Self::new()
    }
}

impl RosterEditor {
    pub fn new() -> Self {
        Self::with_max_players(MAX_PLAYERS)
    }

    pub fn with_max_players(max_players: usize) -> Self {
        let mut editor = Self {
            team_name: String::new(),
            entries: Vec::new(),
            next_id: 0,
            max_players: max_players.max(1),
            submitting: false,
            notice: None,
        };
        editor.reset();
        editor
    }

    fn fresh_entry(&mut self) -> PlayerEntry {
        let id = LocalId(self.next_id);
        self.next_id += 1;
        PlayerEntry::new(id)
    }

    /// Back to a blank team name and a single default entry.
    pub fn reset(&mut self) {
        self.team_name.clear();
        let entry = self.fresh_entry();
        self.entries = vec![entry];
    }

    pub fn team_name(&self) -> &str {
        &self.team_name
    }

    pub fn entries(&self) -> &[PlayerEntry] {
        &self.entries
    }

    pub fn max_players(&self) -> usize {
        self.max_players
    }

    pub fn can_add(&self) -> bool {
        self.entries.len() < self.max_players
    }

    pub fn can_remove(&self) -> bool {
        self.entries.len() > 1
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    /// Current notice, if any. A success notice disappears once its
    /// display time has passed.
    pub fn notice(&self, now: Instant) -> Option<&Notice> {
        self.notice.as_ref().filter(|n| n.is_visible(now))
    }

    pub fn set_team_name(&mut self, name: impl Into<String>) {
        self.team_name = name.into();
    }

    /// Appends a default entry. At the ceiling, leaves the list alone and
    /// raises a warning instead.
    pub fn add_entry(&mut self) -> Result<LocalId, RosterError> {
        if !self.can_add() {
            let err = RosterError::TooManyPlayers(self.max_players);
            self.notice = Some(Notice::error(err.to_string()));
            return Err(err);
        }
        let entry = self.fresh_entry();
        let id = entry.id;
        self.entries.push(entry);
        if matches!(self.notice, Some(Notice { kind: NoticeKind::Error, .. })) {
            self.notice = None;
        }
        Ok(id)
    }

    /// Returns whether an entry was removed. The last entry is never removed.
    pub fn remove_entry(&mut self, id: LocalId) -> bool {
        if !self.can_remove() {
            return false;
        }
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        before != self.entries.len()
    }

    pub fn update_entry(&mut self, id: LocalId, field: PlayerField) -> bool {
        let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) else {
            return false;
        };
        match field {
            PlayerField::PlayerName(name) => entry.player_name = name,
            PlayerField::Division(division) => entry.division = division,
            PlayerField::Position(position) => entry.position = position,
        }
        true
    }

    /// Validates the draft and marks it in flight. The returned roster is
    /// what goes to the sink; hand the sink's answer to `finish_submit`.
    pub fn begin_submit(&mut self) -> Result<NewSubmission, RosterError> {
        if self.submitting {
            return Err(RosterError::SubmitInFlight);
        }
        self.notice = None;

        let team_name = self.team_name.trim();
        if team_name.is_empty() || self.entries.iter().any(|e| e.player_name.trim().is_empty()) {
            let err = RosterError::MissingRequiredFields;
            self.notice = Some(Notice::error(err.to_string()));
            return Err(err);
        }
        self.submitting = true;
        Ok(NewSubmission {
            team_name: team_name.to_string(),
            players: self.entries.iter().map(PlayerEntry::to_data).collect(),
        })
    }

    /// Applies the sink's answer. On success the draft is reset; on failure
    /// it is kept as-is so the captain can retry.
    pub fn finish_submit(
        &mut self,
        result: Result<SubmissionRecord, SinkError>,
        now: Instant,
    ) -> Result<SubmissionRecord, SinkError> {
        self.submitting = false;
        match &result {
            Ok(record) => {
                debug!(id = %record.id, "Roster accepted, resetting draft");
                self.reset();
                self.notice = Some(Notice::success(SUCCESS_MESSAGE, now));
            }
            Err(e) => {
                warn!(error = %e, "Roster submission failed");
                self.notice = Some(Notice::error(format!("Submission failed: {}", e)));
            }
        }
        result
    }

    /// Drops the in-flight mark when the sink's answer will never arrive.
    /// The draft itself is left untouched.
    pub fn cancel_submit(&mut self) {
        if self.submitting {
            debug!("Abandoned roster submission, draft kept");
            self.submitting = false;
        }
    }

    pub async fn submit<S>(&mut self, sink: &S) -> Result<SubmissionRecord, AppError>
    where
        S: SubmissionSink + ?Sized,
    {
        let roster = self.begin_submit()?;
        let result = sink.insert(roster).await;
        Ok(self.finish_submit(result, Instant::now())?)
    }

    pub fn view(&self, now: Instant) -> DraftView {
        DraftView {
            team_name: self.team_name().to_string(),
            players: self.entries.clone(),
            count: self.entries.len(),
            max_players: self.max_players(),
            can_add: self.can_add(),
            can_remove: self.can_remove(),
            submitting: self.submitting,
            notice: self.notice(now).cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        received: Mutex<Vec<NewSubmission>>,
        fail_with: Option<String>,
    }

    #[async_trait]
    impl SubmissionSink for RecordingSink {
        async fn insert(&self, submission: NewSubmission) -> Result<SubmissionRecord, SinkError> {
            if let Some(msg) = &self.fail_with {
                return Err(SinkError::Rejected(msg.clone()));
            }
            let record = SubmissionRecord {
                id: "0123456789abcdef".to_string(),
                team_name: submission.team_name.clone(),
                submitted_at: "2024-01-02T10:00:00.000Z".to_string(),
                players: submission.players.clone(),
            };
            self.received.lock().expect("sink lock").push(submission);
            Ok(record)
        }
    }

    fn filled(team: &str, names: &[&str]) -> RosterEditor {
        let mut editor = RosterEditor::new();
        editor.set_team_name(team);
        let first = editor.entries()[0].id;
        editor.update_entry(first, PlayerField::PlayerName(names[0].to_string()));
        for name in &names[1..] {
            let id = editor.add_entry().expect("room for player");
            editor.update_entry(id, PlayerField::PlayerName(name.to_string()));
        }
        editor
    }

    #[test]
    fn starts_with_one_default_entry() {
        let editor = RosterEditor::new();
        assert_eq!(editor.team_name(), "");
        assert_eq!(editor.entries().len(), 1);
        let entry = &editor.entries()[0];
        assert_eq!(entry.player_name, "");
        assert_eq!(entry.division, Division::D1);
        assert_eq!(entry.position, Position::MainNetty);
        assert_eq!(editor.max_players(), MAX_PLAYERS);
    }

    #[test]
    fn add_keeps_existing_entries() {
        let mut editor = filled("Red", &["Ann", "Bo"]);
        editor.update_entry(editor.entries()[1].id, PlayerField::Position(Position::LeftBack));
        let before = editor.entries().to_vec();

        let id = editor.add_entry().expect("room");

        assert_eq!(editor.entries().len(), before.len() + 1);
        assert_eq!(&editor.entries()[..before.len()], &before[..]);
        assert_eq!(editor.entries().last().map(|e| e.id), Some(id));
        assert!(before.iter().all(|e| e.id != id));
    }

    #[test]
    fn add_at_ceiling_warns_without_mutating() {
        let mut editor = RosterEditor::with_max_players(2);
        editor.add_entry().expect("room");
        let before = editor.entries().to_vec();

        assert_eq!(editor.add_entry(), Err(RosterError::TooManyPlayers(2)));
        assert_eq!(editor.entries(), &before[..]);
        assert!(!editor.can_add());
        let notice = editor.notice(Instant::now()).expect("warning");
        assert_eq!(notice.kind, NoticeKind::Error);
        assert_eq!(notice.message, "You can add up to 2 players.");
    }

    #[test]
    fn default_ceiling_is_fifty() {
        let mut editor = RosterEditor::new();
        for _ in 1..MAX_PLAYERS {
            editor.add_entry().expect("room");
        }
        assert_eq!(editor.entries().len(), 50);
        assert_eq!(editor.add_entry(), Err(RosterError::TooManyPlayers(50)));
        assert_eq!(editor.entries().len(), 50);
    }

    #[test]
    fn successful_add_clears_previous_error() {
        let mut editor = RosterEditor::new();
        assert!(editor.begin_submit().is_err());
        assert!(editor.notice(Instant::now()).is_some());
        editor.add_entry().expect("room");
        assert!(editor.notice(Instant::now()).is_none());
    }

    #[test]
    fn remove_last_entry_is_noop() {
        let mut editor = RosterEditor::new();
        let only = editor.entries()[0].id;
        assert!(!editor.can_remove());
        assert!(!editor.remove_entry(only));
        assert_eq!(editor.entries().len(), 1);
    }

    #[test]
    fn remove_keeps_order_of_the_rest() {
        let mut editor = filled("Red", &["Ann", "Bo", "Cy"]);
        let bo = editor.entries()[1].id;
        assert!(editor.remove_entry(bo));
        let names: Vec<_> = editor.entries().iter().map(|e| e.player_name.as_str()).collect();
        assert_eq!(names, ["Ann", "Cy"]);
        assert!(!editor.remove_entry(bo));
    }

    #[test]
    fn update_touches_only_named_field() {
        let mut editor = filled("Red", &["Ann", "Bo"]);
        let ann = editor.entries()[0].id;
        let bo_before = editor.entries()[1].clone();

        assert!(editor.update_entry(ann, PlayerField::Division(Division::D2)));
        assert!(editor.update_entry(ann, PlayerField::Position(Position::ServiceMan)));

        let ann_after = &editor.entries()[0];
        assert_eq!(ann_after.id, ann);
        assert_eq!(ann_after.player_name, "Ann");
        assert_eq!(ann_after.division, Division::D2);
        assert_eq!(ann_after.position, Position::ServiceMan);
        assert_eq!(editor.entries()[1], bo_before);

        assert!(!editor.update_entry(LocalId(999), PlayerField::PlayerName("X".into())));
    }

    #[tokio::test]
    async fn blank_fields_never_reach_sink() {
        let sink = RecordingSink::default();

        let mut no_team = filled("   ", &["Ann"]);
        let mut blank_player = filled("Red", &["Ann", " \t"]);

        for editor in [&mut no_team, &mut blank_player] {
            let err = editor.submit(&sink).await.expect_err("should fail validation");
            assert!(matches!(err, AppError::Roster(RosterError::MissingRequiredFields)));
            let notice = editor.notice(Instant::now()).expect("error shown");
            assert_eq!(notice.message, "Please complete all required fields.");
            assert!(!editor.is_submitting());
        }
        assert!(sink.received.lock().expect("sink lock").is_empty());
    }

    #[tokio::test]
    async fn success_sends_trimmed_team_and_resets() {
        let sink = RecordingSink::default();
        let mut editor = filled("  Blue Sharks ", &["Ann", "Ann", "Cy"]);
        let old_ids: Vec<_> = editor.entries().iter().map(|e| e.id).collect();

        let record = editor.submit(&sink).await.expect("accepted");

        let sent = sink.received.lock().expect("sink lock");
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].team_name, "Blue Sharks");
        let names: Vec<_> = sent[0].players.iter().map(|p| p.player_name.as_str()).collect();
        assert_eq!(names, ["Ann", "Ann", "Cy"]);
        assert_eq!(record.players, sent[0].players);

        assert_eq!(editor.team_name(), "");
        assert_eq!(editor.entries().len(), 1);
        assert!(!old_ids.contains(&editor.entries()[0].id));
        let notice = editor.notice(Instant::now()).expect("confirmation");
        assert_eq!(notice.kind, NoticeKind::Success);
        assert_eq!(notice.message, SUCCESS_MESSAGE);
    }

    #[test]
    fn success_notice_expires() {
        let mut editor = filled("Red", &["Ann"]);
        editor.begin_submit().expect("valid");
        let now = Instant::now();
        let record = SubmissionRecord {
            id: "x".into(),
            team_name: "Red".into(),
            submitted_at: "2024-01-02T10:00:00.000Z".into(),
            players: Vec::new(),
        };
        editor.finish_submit(Ok(record), now).expect("ok");

        assert!(editor.notice(now + Duration::from_secs(4)).is_some());
        assert!(editor.notice(now + NOTICE_TTL).is_none());
    }

    #[tokio::test]
    async fn sink_failure_keeps_draft() {
        let sink = RecordingSink {
            fail_with: Some("duplicate key".to_string()),
            ..Default::default()
        };
        let mut editor = filled("Red", &["Ann", "Bo"]);
        let before = editor.entries().to_vec();

        let err = editor.submit(&sink).await.expect_err("sink refuses");
        assert!(matches!(err, AppError::Sink(SinkError::Rejected(_))));

        assert_eq!(editor.team_name(), "Red");
        assert_eq!(editor.entries(), &before[..]);
        assert!(!editor.is_submitting());
        let notice = editor.notice(Instant::now()).expect("error shown");
        assert_eq!(notice.kind, NoticeKind::Error);
        assert_eq!(notice.message, "Submission failed: duplicate key");
    }

    #[test]
    fn second_submit_while_in_flight_is_refused() {
        let mut editor = filled("Red", &["Ann"]);
        editor.begin_submit().expect("valid");
        assert!(editor.is_submitting());
        assert_eq!(editor.begin_submit(), Err(RosterError::SubmitInFlight));

        let err = SinkError::Rejected("offline".into());
        assert!(editor.finish_submit(Err(err), Instant::now()).is_err());
        assert!(editor.begin_submit().is_ok());
    }

    #[test]
    fn cancelled_submit_can_be_retried() {
        let mut editor = filled("Red", &["Ann", "Bo"]);
        let before = editor.entries().to_vec();
        editor.begin_submit().expect("valid");

        editor.cancel_submit();

        assert!(!editor.is_submitting());
        assert_eq!(editor.team_name(), "Red");
        assert_eq!(editor.entries(), &before[..]);
        assert!(editor.begin_submit().is_ok());
    }

    #[test]
    fn view_reflects_state() {
        let editor = filled("Red", &["Ann", "Bo"]);
        let view = editor.view(Instant::now());
        assert_eq!(view.count, 2);
        assert_eq!(view.max_players, MAX_PLAYERS);
        assert!(view.can_add);
        assert!(view.can_remove);
        assert!(!view.submitting);

        let json = serde_json::to_value(&view).expect("serializable");
        assert_eq!(json["teamName"], "Red");
        assert_eq!(json["players"][1]["playerName"], "Bo");
        assert_eq!(json["players"][1]["division"], "Division 1");
        assert!(json["notice"].is_null());
    }
}
