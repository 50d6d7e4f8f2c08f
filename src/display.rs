use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::form::export::team_filename;
use crate::form::{short_id, CsvDownload, TeamGroup};
use crate::roster::SubmissionRecord;

/// Formats an ISO timestamp in local time, falling back to the raw string
pub fn format_submitted_at(submitted_at: &str) -> String {
    match DateTime::parse_from_rfc3339(submitted_at) {
        Ok(at) => at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string(),
        Err(_) => submitted_at.to_string(),
    }
}

/// Prints every team with its submissions and players
pub fn print_team_groups(groups: &[TeamGroup]) {
    if groups.is_empty() {
        println!("No submissions yet.");
        return;
    }

    for group in groups {
        println!("\n=== {} ===", group.team_name);
        for submission in &group.submissions {
            println!(
                "  Submission ID: {} (submitted at {}, {} players)",
                short_id(&submission.id),
                format_submitted_at(&submission.submitted_at),
                submission.players.len()
            );
            for player in &submission.players {
                println!(
                    "    - {} | {} | {}",
                    player.player_name, player.division, player.position
                );
            }
        }
    }
}

/// Writes CSV exports into `out_dir`: one all-teams file, or with `team`
/// one file per submission of that team. Submissions that would share a
/// filename (same team, same day) get their short id appended.
pub fn write_exports(
    submissions: &[SubmissionRecord],
    out_dir: &Path,
    team: Option<&str>,
) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    if submissions.is_empty() {
        return Err("No submissions yet.".into());
    }
    std::fs::create_dir_all(out_dir)?;

    let downloads = match team {
        Some(team) => {
            let matching: Vec<&SubmissionRecord> =
                submissions.iter().filter(|s| s.team_name == team).collect();
            if matching.is_empty() {
                return Err(format!("No submissions for team '{}'", team).into());
            }

            let mut uses: HashMap<String, usize> = HashMap::new();
            for s in &matching {
                *uses.entry(team_filename(&s.team_name, &s.submitted_at)).or_default() += 1;
            }
            matching
                .into_iter()
                .map(|s| {
                    let mut download = CsvDownload::single(s);
                    if uses.get(&download.filename).copied().unwrap_or(0) > 1 {
                        let stem = download.filename.strip_suffix(".csv").unwrap_or(&download.filename);
                        download.filename = format!("{}_{}.csv", stem, short_id(&s.id));
                    }
                    download
                })
                .collect()
        }
        None => vec![CsvDownload::all_teams(submissions)],
    };

    let mut written = Vec::with_capacity(downloads.len());
    for download in &downloads {
        written.push(download.write_to(out_dir)?);
    }
    Ok(written)
}
