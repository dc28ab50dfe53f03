use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use canvas::camera::Point;
use canvas::doc::{Note, NoteColor, NoteId, NotePatch};
use clap::{Args, Parser, Subcommand};
use serde_json::{Value, json};
use stickyboard::config::{BoardConfig, ConfigError};
use stickyboard::identity::LocalUser;
use stickyboard::notify::Severity;
use stickyboard::services::lock::LockState;
use stickyboard::session::{BoardSession, Change, Collection};
use stickyboard::storage::{FileStorage, LocalStorage, StorageError};
use stickyboard::store::open_store;

const READY_TIMEOUT: Duration = Duration::from_secs(10);
const PRESENCE_SETTLE: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("local storage failed: {0}")]
    Storage(#[from] StorageError),
    #[error("timed out waiting for the board to load")]
    Timeout,
    #[error("board subscriptions closed")]
    Closed,
    #[error("note {0} not found")]
    NotFound(NoteId),
    #[error("note {id} is being edited by {by}")]
    Locked { id: NoteId, by: String },
    #[error("nothing to change; pass --title or --content")]
    EmptyEdit,
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "stickyboard", about = "Collaborative sticky-note board CLI")]
struct Cli {
    #[arg(long, env = "STICKYBOARD_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[arg(long, env = "STICKYBOARD_DATABASE_URL")]
    database_url: Option<String>,

    #[arg(long, env = "STICKYBOARD_USERNAME")]
    username: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every note in paint order.
    List,
    /// Create a note at a canvas position.
    Add(AddArgs),
    /// Move a note to a canvas position.
    Move {
        id: NoteId,
        #[arg(allow_negative_numbers = true)]
        x: f64,
        #[arg(allow_negative_numbers = true)]
        y: f64,
    },
    /// Change a note's title or content.
    Edit(EditArgs),
    /// Delete a note.
    Rm { id: NoteId },
    /// Show online users and held locks.
    Who,
    /// Print board changes as they arrive.
    Watch {
        #[arg(long, help = "Stop after this many seconds")]
        seconds: Option<u64>,
    },
}

#[derive(Args, Debug)]
struct AddArgs {
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    x: f64,

    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    y: f64,

    #[arg(long, default_value = "yellow", value_parser = parse_color)]
    color: NoteColor,

    #[arg(long)]
    title: Option<String>,

    #[arg(long)]
    content: Option<String>,
}

#[derive(Args, Debug)]
struct EditArgs {
    id: NoteId,

    #[arg(long)]
    title: Option<String>,

    #[arg(long)]
    content: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("warning: could not load .env: {e}");
        }
    }
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    tracing::debug!(command = ?cli.command, "starting");
    let mut session = open_session(&cli).await?;
    let result = run(&mut session, cli.command).await;
    print_notices(&mut session);
    session.close().await;
    result
}

async fn open_session(cli: &Cli) -> Result<BoardSession, CliError> {
    let mut config = BoardConfig::from_env()?;
    if let Some(dir) = &cli.data_dir {
        config.data_dir.clone_from(dir);
    }
    if cli.database_url.is_some() {
        config.database_url.clone_from(&cli.database_url);
    }
    if cli.username.is_some() {
        config.username.clone_from(&cli.username);
    }

    let storage: Arc<dyn LocalStorage> = Arc::new(FileStorage::new(&config.data_dir));
    let user = LocalUser::load_or_create(storage.as_ref(), config.username.as_deref())?;
    let opened = open_store(&config, Arc::clone(&storage)).await;

    let mut session = BoardSession::open(opened.store, storage, user, config.timing);
    if let Some(notice) = opened.notice {
        session.push_notice(notice);
    }
    match tokio::time::timeout(READY_TIMEOUT, session.ready()).await {
        Ok(true) => Ok(session),
        Ok(false) => Err(CliError::Closed),
        Err(_) => Err(CliError::Timeout),
    }
}

async fn run(session: &mut BoardSession, command: Command) -> Result<(), CliError> {
    match command {
        Command::List => {
            let notes: Vec<&Note> = session.notes();
            print_json(&serde_json::to_value(notes)?)
        }
        Command::Add(args) => run_add(session, args).await,
        Command::Move { id, x, y } => {
            require_unlocked(session, id)?;
            session.move_note(id, x, y).await;
            print_note(session, id)
        }
        Command::Edit(args) => run_edit(session, args).await,
        Command::Rm { id } => {
            require_unlocked(session, id)?;
            session.delete_note(id).await;
            println!("deleted {id}");
            Ok(())
        }
        Command::Who => {
            await_own_presence(session).await;
            run_who(session)
        }
        Command::Watch { seconds } => run_watch(session, seconds).await,
    }
}

async fn run_add(session: &mut BoardSession, args: AddArgs) -> Result<(), CliError> {
    session.create_note(Point::new(args.x, args.y), args.color).await;
    let Some(id) = session.selection() else {
        return Err(CliError::Closed);
    };
    let patch = NotePatch { title: args.title, content: args.content, ..NotePatch::default() };
    if !patch.is_empty() {
        session.edit_note(id, patch).await;
    }
    print_note(session, id)
}

async fn run_edit(session: &mut BoardSession, args: EditArgs) -> Result<(), CliError> {
    let patch = NotePatch { title: args.title, content: args.content, ..NotePatch::default() };
    if patch.is_empty() {
        return Err(CliError::EmptyEdit);
    }
    require_unlocked(session, args.id)?;
    if !session.begin_edit(args.id).await {
        return Err(locked_error(session, args.id));
    }
    session.edit_note(args.id, patch).await;
    session.end_edit(args.id);
    print_note(session, args.id)
}

async fn await_own_presence(session: &mut BoardSession) {
    let me = session.user().user_id;
    let seen = tokio::time::timeout(PRESENCE_SETTLE, async {
        while !session.online_users().iter().any(|p| p.user_id == me) {
            if session.next_change().await.is_none() {
                break;
            }
        }
    })
    .await;
    if seen.is_err() {
        tracing::debug!("own presence not visible yet");
    }
}

fn run_who(session: &BoardSession) -> Result<(), CliError> {
    let users: Vec<Value> = session
        .online_users()
        .into_iter()
        .map(|p| json!({ "user_id": p.user_id, "username": p.username, "color": p.color }))
        .collect();
    let locks: Vec<Value> = session
        .locks()
        .into_iter()
        .map(|l| json!({ "note_id": l.note_id, "username": l.username, "locked_at": l.locked_at }))
        .collect();
    print_json(&json!({
        "backend": session.backend().as_str(),
        "me": session.user().username,
        "online": users,
        "locks": locks,
    }))
}

async fn run_watch(session: &mut BoardSession, seconds: Option<u64>) -> Result<(), CliError> {
    let deadline = seconds.map(|s| tokio::time::Instant::now() + Duration::from_secs(s));
    loop {
        let change = tokio::select! {
            change = session.next_change() => change,
            () = sleep_until(deadline) => return Ok(()),
            _ = tokio::signal::ctrl_c() => return Ok(()),
        };
        let Some(change) = change else {
            return Err(CliError::Closed);
        };
        match change {
            Change::Snapshot(Collection::Notes) => println!("notes: {}", session.notes().len()),
            Change::Snapshot(Collection::Locks) => println!("locks: {}", session.locks().len()),
            Change::Snapshot(Collection::Presence) => println!("online: {}", session.online_users().len()),
            Change::Snapshot(Collection::Cursors) => println!("cursors: {}", session.active_cursors().len()),
            Change::Failed(collection) => println!("{collection:?} subscription failed"),
        }
    }
}

async fn sleep_until(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

fn require_unlocked(session: &BoardSession, id: NoteId) -> Result<(), CliError> {
    if session.note(&id).is_none() {
        return Err(CliError::NotFound(id));
    }
    match session.lock_state(&id) {
        LockState::LockedByOther(_) => Err(locked_error(session, id)),
        LockState::Unlocked | LockState::LockedBySelf => Ok(()),
    }
}

fn locked_error(session: &BoardSession, id: NoteId) -> CliError {
    let by = match session.lock_state(&id) {
        LockState::LockedByOther(lock) => lock.username,
        LockState::Unlocked | LockState::LockedBySelf => "another user".to_owned(),
    };
    CliError::Locked { id, by }
}

fn print_note(session: &BoardSession, id: NoteId) -> Result<(), CliError> {
    let note = session.note(&id).ok_or(CliError::NotFound(id))?;
    print_json(&serde_json::to_value(note)?)
}

fn print_notices(session: &mut BoardSession) {
    for active in session.notices() {
        let label = match active.notice.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        eprintln!("{label}: {}", active.notice.message);
    }
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

fn parse_color(name: &str) -> Result<NoteColor, String> {
    NoteColor::parse(name).ok_or_else(|| format!("unknown color `{name}`; expected yellow, pink, blue or green"))
}
