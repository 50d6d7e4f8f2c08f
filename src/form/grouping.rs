use serde::Serialize;

use crate::roster::SubmissionRecord;

/// All submissions sharing one team name, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamGroup {
    pub team_name: String,
    pub submissions: Vec<SubmissionRecord>,
}

/// Groups by exact team name. Groups appear in the order their team was
/// first seen; no case folding or trimming is applied.
pub fn group_by_team(submissions: &[SubmissionRecord]) -> Vec<TeamGroup> {
    let mut groups: Vec<TeamGroup> = Vec::new();
    for submission in submissions {
        match groups.iter_mut().find(|g| g.team_name == submission.team_name) {
            Some(group) => group.submissions.push(submission.clone()),
            None => groups.push(TeamGroup {
                team_name: submission.team_name.clone(),
                submissions: vec![submission.clone()],
            }),
        }
    }
    groups
}

/// First 8 characters of a submission id, for display
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(8) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}
