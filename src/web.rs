use actix_files::Files;
use actix_session::storage::CookieSessionStore;
use actix_session::{Session, SessionMiddleware};
use actix_web::cookie::Key;
use actix_web::http::{header, StatusCode};
use actix_web::{middleware, web, App, Either, HttpResponse, HttpServer, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::errors::RosterError;
use crate::form::{group_by_team, short_id, CsvDownload, PlayerField, RosterEditor};
use crate::roster::{Division, LocalId, PlayerData, Position, SubmissionRecord, MAX_PLAYERS};
use crate::session::{
    sign_in, sign_out, spawn_event_logger, AdminSession, Authenticator, ConfiguredAuthenticator,
    SessionEvent, SessionEvents,
};
use crate::store::{JsonFileStore, SubmissionSink, SubmissionSource};

pub const DRAFT_SESSION_KEY: &str = "draft";

/// Drafts nobody has touched for this long are dropped.
pub const DRAFT_IDLE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

struct DraftSlot {
    editor: RosterEditor,
    touched: Instant,
}

type Drafts = HashMap<String, DraftSlot>;

pub struct AppState {
    pub sink: Arc<dyn SubmissionSink>,
    pub source: Arc<dyn SubmissionSource>,
    pub authenticator: Box<dyn Authenticator>,
    pub events: SessionEvents,
    pub max_players: usize,
    draft_ttl: Duration,
    drafts: Mutex<Drafts>,
}

impl AppState {
    pub fn new<S>(store: Arc<S>, authenticator: Box<dyn Authenticator>, events: SessionEvents) -> Self
    where
        S: SubmissionSink + SubmissionSource + 'static,
    {
        Self {
            sink: store.clone(),
            source: store,
            authenticator,
            events,
            max_players: MAX_PLAYERS,
            draft_ttl: DRAFT_IDLE_TTL,
            drafts: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_draft_ttl(mut self, ttl: Duration) -> Self {
        self.draft_ttl = ttl;
        self
    }

    fn drafts(&self) -> Result<MutexGuard<'_, Drafts>> {
        self.drafts
            .lock()
            .map_err(|_| actix_web::error::ErrorInternalServerError("draft storage unavailable"))
    }

    /// Number of drafts currently held in memory.
    pub fn draft_count(&self) -> usize {
        self.drafts.lock().map(|d| d.len()).unwrap_or(0)
    }

    /// Drops drafts idle for longer than the TTL. Drafts waiting on the
    /// store are kept so their answer still has somewhere to land.
    fn sweep_idle(&self, drafts: &mut Drafts, now: Instant) {
        let before = drafts.len();
        drafts.retain(|_, slot| {
            slot.editor.is_submitting() || now.saturating_duration_since(slot.touched) < self.draft_ttl
        });
        let evicted = before - drafts.len();
        if evicted > 0 {
            debug!(evicted, remaining = drafts.len(), "Evicted idle drafts");
        }
    }

    /// Runs `f` against the visitor's draft, creating one on first use.
    fn with_draft<T>(&self, key: &str, f: impl FnOnce(&mut RosterEditor) -> T) -> Result<T> {
        let now = Instant::now();
        let mut drafts = self.drafts()?;
        self.sweep_idle(&mut drafts, now);
        let max_players = self.max_players;
        let slot = drafts.entry(key.to_string()).or_insert_with(|| DraftSlot {
            editor: RosterEditor::with_max_players(max_players),
            touched: now,
        });
        slot.touched = now;
        Ok(f(&mut slot.editor))
    }

    /// Renders the visitor's draft without creating one. Visitors that only
    /// look at the form get a blank view and cost nothing.
    fn view_draft(&self, key: Option<&str>) -> Result<HttpResponse> {
        let mut drafts = self.drafts()?;
        if let Some(slot) = key.and_then(|k| drafts.get_mut(k)) {
            slot.touched = Instant::now();
            return Ok(draft_response(StatusCode::OK, &slot.editor));
        }
        let blank = RosterEditor::with_max_players(self.max_players);
        Ok(draft_response(StatusCode::OK, &blank))
    }
}

/// Clears the in-flight mark on a draft if the submit request goes away
/// before the store answers, so the captain can submit again.
struct PendingSubmit<'a> {
    state: &'a AppState,
    key: &'a str,
    settled: bool,
}

impl Drop for PendingSubmit<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        warn!("Submit request dropped before the store answered");
        if let Ok(mut drafts) = self.state.drafts() {
            if let Some(slot) = drafts.get_mut(self.key) {
                slot.editor.cancel_submit();
            }
        }
    }
}

#[derive(Deserialize)]
pub struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamNameRequest {
    team_name: String,
}

/// Partial update of one player row; absent fields are left alone.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerUpdateRequest {
    player_name: Option<String>,
    division: Option<Division>,
    position: Option<Position>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionsResponse {
    divisions: Vec<&'static str>,
    positions: Vec<&'static str>,
    max_players: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionSummary {
    id: String,
    short_id: String,
    submitted_at: String,
    players: Vec<PlayerData>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamGroupResponse {
    team_name: String,
    submissions: Vec<SubmissionSummary>,
}

#[derive(Serialize)]
pub struct SubmissionsResponse {
    count: usize,
    groups: Vec<TeamGroupResponse>,
}

fn existing_draft_key(session: &Session) -> Option<String> {
    session.get::<String>(DRAFT_SESSION_KEY).ok().flatten()
}

/// Looks up the visitor's draft token, handing out a new one if needed.
fn draft_key(session: &Session) -> Result<String> {
    if let Some(key) = existing_draft_key(session) {
        return Ok(key);
    }
    let key = format!("{:032x}", rand::thread_rng().gen::<u128>());
    session
        .insert(DRAFT_SESSION_KEY, &key)
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?;
    Ok(key)
}

fn draft_response(status: StatusCode, editor: &RosterEditor) -> HttpResponse {
    HttpResponse::build(status).json(editor.view(Instant::now()))
}

fn roster_error_status(err: &RosterError) -> StatusCode {
    match err {
        RosterError::SubmitInFlight => StatusCode::CONFLICT,
        _ => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

// Options for the form's select boxes
async fn get_options(state: web::Data<AppState>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(OptionsResponse {
        divisions: Division::ALL.iter().map(Division::label).collect(),
        positions: Position::ALL.iter().map(Position::label).collect(),
        max_players: state.max_players,
    }))
}

async fn get_draft(session: Session, state: web::Data<AppState>) -> Result<HttpResponse> {
    let key = existing_draft_key(&session);
    state.view_draft(key.as_deref())
}

async fn set_team_name(
    req: web::Json<TeamNameRequest>,
    session: Session,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let key = draft_key(&session)?;
    let TeamNameRequest { team_name } = req.into_inner();
    state.with_draft(&key, |editor| {
        editor.set_team_name(team_name);
        draft_response(StatusCode::OK, editor)
    })
}

async fn add_player(session: Session, state: web::Data<AppState>) -> Result<HttpResponse> {
    let key = draft_key(&session)?;
    state.with_draft(&key, |editor| match editor.add_entry() {
        Ok(_) => draft_response(StatusCode::OK, editor),
        Err(e) => draft_response(roster_error_status(&e), editor),
    })
}

async fn update_player(
    id: web::Path<u32>,
    req: web::Json<PlayerUpdateRequest>,
    session: Session,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let key = draft_key(&session)?;
    let id = LocalId(id.into_inner());
    let update = req.into_inner();
    state.with_draft(&key, |editor| {
        let mut fields = Vec::new();
        if let Some(name) = update.player_name {
            fields.push(PlayerField::PlayerName(name));
        }
        if let Some(division) = update.division {
            fields.push(PlayerField::Division(division));
        }
        if let Some(position) = update.position {
            fields.push(PlayerField::Position(position));
        }
        if !editor.entries().iter().any(|e| e.id == id) {
            return draft_response(StatusCode::NOT_FOUND, editor);
        }
        for field in fields {
            editor.update_entry(id, field);
        }
        draft_response(StatusCode::OK, editor)
    })
}

async fn remove_player(
    id: web::Path<u32>,
    session: Session,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let key = draft_key(&session)?;
    let id = LocalId(id.into_inner());
    state.with_draft(&key, |editor| {
        if editor.remove_entry(id) {
            draft_response(StatusCode::OK, editor)
        } else if !editor.can_remove() {
            draft_response(StatusCode::UNPROCESSABLE_ENTITY, editor)
        } else {
            draft_response(StatusCode::NOT_FOUND, editor)
        }
    })
}

// Submit the visitor's draft. The draft stays marked in flight while the
// store works, so a second submit from the same visitor gets a 409. If the
// request is dropped mid-way the mark is cleared again.
async fn submit_draft(session: Session, state: web::Data<AppState>) -> Result<HttpResponse> {
    let key = draft_key(&session)?;
    let roster = match state.with_draft(&key, |editor| {
        editor
            .begin_submit()
            .map_err(|e| draft_response(roster_error_status(&e), editor))
    })? {
        Ok(roster) => roster,
        Err(response) => return Ok(response),
    };

    let mut pending = PendingSubmit {
        state: state.get_ref(),
        key: &key,
        settled: false,
    };
    let result = state.sink.insert(roster).await;
    pending.settled = true;

    state.with_draft(&key, |editor| match editor.finish_submit(result, Instant::now()) {
        Ok(_) => draft_response(StatusCode::OK, editor),
        Err(_) => draft_response(StatusCode::BAD_GATEWAY, editor),
    })
}

// Admin login endpoint
async fn admin_login(
    req: web::Json<LoginRequest>,
    session: Session,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    match state.authenticator.verify(&req.username, &req.password) {
        Ok(identity) => {
            sign_in(&session, &identity)?;
            state.events.publish(SessionEvent::SignedIn(identity.username));
            Ok(HttpResponse::Ok().json(serde_json::json!({"success": true})))
        }
        Err(e) => {
            warn!(user = %req.username, error = %e, "Rejected admin login");
            Err(e.into())
        }
    }
}

async fn admin_logout(session: Session, state: web::Data<AppState>) -> Result<HttpResponse> {
    if let Some(identity) = sign_out(&session) {
        state.events.publish(SessionEvent::SignedOut(identity.username));
    }
    Ok(HttpResponse::Ok().json(serde_json::json!({"success": true})))
}

async fn load_submissions(state: &AppState) -> Result<Vec<SubmissionRecord>> {
    state
        .source
        .load_all()
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(format!("Failed to load submissions: {}", e)))
}

// Stored rosters grouped by team
async fn list_submissions(
    _admin: AdminSession,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let submissions = load_submissions(&state).await?;
    let groups = group_by_team(&submissions)
        .into_iter()
        .map(|group| TeamGroupResponse {
            team_name: group.team_name,
            submissions: group
                .submissions
                .into_iter()
                .map(|s| SubmissionSummary {
                    short_id: short_id(&s.id).to_string(),
                    id: s.id,
                    submitted_at: s.submitted_at,
                    players: s.players,
                })
                .collect(),
        })
        .collect();

    Ok(HttpResponse::Ok().json(SubmissionsResponse {
        count: submissions.len(),
        groups,
    }))
}

async fn export_all(
    _admin: AdminSession,
    state: web::Data<AppState>,
) -> Result<Either<CsvDownload, HttpResponse>> {
    let submissions = load_submissions(&state).await?;
    if submissions.is_empty() {
        return Ok(Either::Right(HttpResponse::NotFound().json(
            serde_json::json!({"success": false, "error": "No submissions yet."}),
        )));
    }
    info!(count = submissions.len(), "Exporting all rosters");
    Ok(Either::Left(CsvDownload::all_teams(&submissions)))
}

async fn export_submission(
    _admin: AdminSession,
    id: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<Either<CsvDownload, HttpResponse>> {
    let submissions = load_submissions(&state).await?;
    match submissions.iter().find(|s| s.id == *id) {
        Some(submission) => Ok(Either::Left(CsvDownload::single(submission))),
        None => Ok(Either::Right(HttpResponse::NotFound().json(
            serde_json::json!({"success": false, "error": "Submission not found"}),
        ))),
    }
}

// HTML page handlers
async fn index() -> Result<HttpResponse> {
    let html = include_str!("../templates/index.html");
    Ok(HttpResponse::Ok().content_type("text/html").body(html))
}

async fn login_page() -> Result<HttpResponse> {
    let html = include_str!("../templates/login.html");
    Ok(HttpResponse::Ok().content_type("text/html").body(html))
}

async fn admin_page(admin: Option<AdminSession>) -> Result<HttpResponse> {
    if admin.is_none() {
        return Ok(HttpResponse::Found()
            .insert_header((header::LOCATION, "/login"))
            .finish());
    }
    let html = include_str!("../templates/admin.html");
    Ok(HttpResponse::Ok().content_type("text/html").body(html))
}

/// Page and API routes, shared by the server and the tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index))
        .route("/login", web::get().to(login_page))
        .route("/admin", web::get().to(admin_page))
        .route("/api/options", web::get().to(get_options))
        .route("/api/draft", web::get().to(get_draft))
        .route("/api/draft/team", web::put().to(set_team_name))
        .route("/api/draft/players", web::post().to(add_player))
        .service(
            web::resource("/api/draft/players/{id}")
                .route(web::patch().to(update_player))
                .route(web::delete().to(remove_player)),
        )
        .route("/api/draft/submit", web::post().to(submit_draft))
        .route("/api/login", web::post().to(admin_login))
        .route("/api/logout", web::post().to(admin_logout))
        .route("/api/submissions", web::get().to(list_submissions))
        .route("/api/export", web::get().to(export_all))
        .service(web::resource("/api/export/{id}").route(web::get().to(export_submission)));
}

pub async fn start_server(config: Config) -> std::io::Result<()> {
    let store = Arc::new(JsonFileStore::new(&config.data_dir));
    let authenticator =
        ConfiguredAuthenticator::new(config.admin_username.clone(), config.admin_password.clone());
    let events = SessionEvents::new();
    let event_logger = spawn_event_logger(&events);
    let app_state = web::Data::new(AppState::new(store, Box::new(authenticator), events));

    // Sessions don't survive a restart
    let key = Key::generate();
    let secure_cookies = config.secure_cookies;

    let result = HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(
                SessionMiddleware::builder(CookieSessionStore::default(), key.clone())
                    .cookie_secure(secure_cookies)
                    .build(),
            )
            .wrap(middleware::Logger::default())
            .service(Files::new("/static", "static"))
            .configure(configure)
    })
    .bind((config.bind.as_str(), config.port))?
    .run()
    .await;

    event_logger.abort();
    result
}
