use actix_web::body::BoxBody;
use actix_web::http::header::ContentDisposition;
use actix_web::{HttpRequest, HttpResponse, Responder};
use std::borrow::Cow;
use std::path::{Path, PathBuf};

use crate::roster::{PlayerData, SubmissionRecord};

pub const CSV_HEADER: &str = "team_name,player_name,division,position,submitted_at\n";
pub const CSV_CONTENT_TYPE: &str = "text/csv;charset=utf-8";
pub const ALL_TEAMS_FILENAME: &str = "all_teams_rosters.csv";

/// Quotes a field if it contains a comma, a double quote or a newline,
/// doubling any embedded quotes. Anything else passes through untouched.
pub fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// One CSV line: team, player, division, position, timestamp.
pub fn build_row(team_name: &str, player: &PlayerData, submitted_at: &str) -> String {
    let fields = [
        team_name,
        player.player_name.as_str(),
        player.division.label(),
        player.position.label(),
        submitted_at,
    ];
    let mut row = fields
        .iter()
        .map(|f| escape_field(f))
        .collect::<Vec<_>>()
        .join(",");
    row.push('\n');
    row
}

/// Header plus one row per player per submission, in the order given.
pub fn generate_document(submissions: &[SubmissionRecord]) -> String {
    let mut content = String::from(CSV_HEADER);
    for submission in submissions {
        for player in &submission.players {
            content.push_str(&build_row(
                &submission.team_name,
                player,
                &submission.submitted_at,
            ));
        }
    }
    content
}

// Whitespace as browsers' `\s` sees it: U+FEFF counts, U+0085 does not.
fn is_separator_space(c: char) -> bool {
    (c.is_whitespace() && c != '\u{85}') || c == '\u{feff}'
}

/// `{team name with whitespace runs as "_"}_{date part of timestamp}.csv`
///
/// Control characters become `_` as well; they are not allowed in a
/// `Content-Disposition` header.
pub fn team_filename(team_name: &str, submitted_at: &str) -> String {
    let mut name = String::with_capacity(team_name.len());
    let mut in_space = false;
    for c in team_name.chars() {
        if c.is_control() && !is_separator_space(c) {
            name.push('_');
            in_space = false;
        } else if is_separator_space(c) {
            if !in_space {
                name.push('_');
            }
            in_space = true;
        } else {
            name.push(c);
            in_space = false;
        }
    }
    let date = submitted_at.split('T').next().unwrap_or(submitted_at);
    format!("{}_{}.csv", name, date)
}

/// A finished CSV document ready to be handed to the user, either as an
/// HTTP attachment or as a file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvDownload {
    pub filename: String,
    pub content: String,
}

impl CsvDownload {
    pub fn all_teams(submissions: &[SubmissionRecord]) -> Self {
        Self {
            filename: ALL_TEAMS_FILENAME.to_string(),
            content: generate_document(submissions),
        }
    }

    pub fn single(submission: &SubmissionRecord) -> Self {
        Self {
            filename: team_filename(&submission.team_name, &submission.submitted_at),
            content: generate_document(std::slice::from_ref(submission)),
        }
    }

    /// Writes the document into `dir`. Path separators in the filename are
    /// replaced so a team name can't escape the directory.
    pub fn write_to(&self, dir: &Path) -> std::io::Result<PathBuf> {
        let safe_name = self.filename.replace(['/', '\\'], "_");
        let path = dir.join(safe_name);
        std::fs::write(&path, self.content.as_bytes())?;
        Ok(path)
    }
}

impl Responder for CsvDownload {
    type Body = BoxBody;

    fn respond_to(self, _req: &HttpRequest) -> HttpResponse<Self::Body> {
        HttpResponse::Ok()
            .content_type(CSV_CONTENT_TYPE)
            .insert_header(ContentDisposition::attachment(self.filename))
            .body(self.content)
    }
}
