use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use log::{info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use crate::cli::{Cli, CliCommand, HistoryArgs, StartArgs};
use crate::db::Database;
use crate::history::{format_duration, total_focus_time, HistoryStore};
use crate::models::SessionRecord;
use crate::services::{
    ApplicationDirectory, Collaborators, CompletionChoice, ConsolePrompt, DesktopOrganizer,
    FsDesktopOrganizer, SystemApplications, SystemMusicPlayer,
};
use crate::settings::{data_dir, SettingsStore};
use crate::timer::{SessionState, TimerController, TimerEvent, TimerSnapshot};

const DB_FILE: &str = "attention.sqlite3";
const SETTINGS_FILE: &str = "settings.json";

pub async fn dispatch(cli: Cli) -> Result<()> {
    let data_dir = data_dir()?;
    match cli.command.unwrap_or_else(|| CliCommand::Start(StartArgs::default())) {
        CliCommand::Start(args) => run_session(&data_dir, args).await,
        CliCommand::History(args) => show_history(&data_dir, args).await,
        CliCommand::Apps => list_apps().await,
        CliCommand::Restore { folder } => restore_desktop(folder).await,
        CliCommand::Settings => show_settings(&data_dir),
    }
}

fn open_settings(data_dir: &Path) -> Result<SettingsStore> {
    SettingsStore::new(data_dir.join(SETTINGS_FILE))
}

fn open_database(data_dir: &Path) -> Result<Database> {
    Database::new(data_dir.join(DB_FILE))
}

/// What a console line asks the session to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineAction {
    TogglePause,
    End,
    Nothing,
    Unknown,
}

fn parse_line(line: &str) -> LineAction {
    match line.trim().to_ascii_lowercase().as_str() {
        "p" | "pause" | "resume" => LineAction::TogglePause,
        "e" | "end" | "q" => LineAction::End,
        "" => LineAction::Nothing,
        _ => LineAction::Unknown,
    }
}

fn status_line(snapshot: &TimerSnapshot) -> String {
    match snapshot.state {
        SessionState::Running { remaining_secs } | SessionState::Paused { remaining_secs } => {
            format!(
                "{}  {}",
                format_duration(Duration::from_secs(remaining_secs)),
                snapshot.state.status_text()
            )
        }
        SessionState::Idle | SessionState::Completed => snapshot.state.status_text().to_string(),
    }
}

async fn run_session(data_dir: &Path, args: StartArgs) -> Result<()> {
    let settings_store = open_settings(data_dir)?;
    let settings = args.apply_to(settings_store.get());

    let database = open_database(data_dir)?;
    let prompt = Arc::new(ConsolePrompt::new());
    let apps: Arc<dyn ApplicationDirectory> = Arc::new(SystemApplications::new());
    let collaborators = Collaborators {
        apps: apps.clone(),
        desktop: Arc::new(FsDesktopOrganizer::for_current_user()?),
        music: Arc::new(SystemMusicPlayer::new(apps)),
        prompt: prompt.clone(),
    };

    let controller = TimerController::new(collaborators, Arc::new(database));
    let mut events = controller.subscribe();
    controller.start(settings.to_configuration()).await?;

    // Only settings that actually started a session are remembered.
    if args.save {
        settings_store.update(settings)?;
        info!("Saved settings to {}", settings_store.path().display());
    }
    println!("[p] pause/resume  [e] end early");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    render(&event);
                    if is_last_event(&event) {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!("console fell {skipped} events behind"),
                Err(RecvError::Closed) => break,
            },
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read from stdin")? else {
                    controller.end().await?;
                    break;
                };
                let Some(line) = prompt.offer(line) else { continue };
                match parse_line(&line) {
                    LineAction::TogglePause => {
                        controller.toggle_pause().await?;
                    }
                    LineAction::End => {
                        controller.end().await?;
                    }
                    LineAction::Nothing => {}
                    LineAction::Unknown => println!("\n[p] pause/resume  [e] end early"),
                }
            },
            _ = tokio::signal::ctrl_c() => {
                println!();
                controller.end().await?;
                break;
            }
        }
    }

    Ok(())
}

/// A session view closes once the session ended early or its completion
/// prompt has been answered (or given up on).
fn is_last_event(event: &TimerEvent) -> bool {
    matches!(
        event,
        TimerEvent::SessionEnded { .. } | TimerEvent::CompletionAnswered { .. }
    )
}

fn render(event: &TimerEvent) {
    match event {
        TimerEvent::StateChanged(snapshot) => {
            print!("\r{:<40}", status_line(snapshot));
            let _ = io::stdout().flush();
        }
        TimerEvent::SessionCompleted { record } => {
            println!("\nSession complete: {}", describe(record));
        }
        TimerEvent::SessionEnded { record } => {
            println!("\nSession ended early: {}", describe(record));
        }
        TimerEvent::CompletionAnswered { choice } => {
            if *choice == CompletionChoice::StartBreak {
                println!("Enjoy your break.");
            }
        }
        TimerEvent::DesktopCleared { folder } => {
            println!("\nDesktop cleared. Bring it back with `attention restore {folder}`");
        }
        TimerEvent::StarterTask { task } => println!("First task: {task}"),
        TimerEvent::Warning { source, message } => eprintln!("\n{source}: {message}"),
    }
}

fn describe(record: &SessionRecord) -> String {
    let actual = record
        .actual_duration()
        .map(format_duration)
        .unwrap_or_else(|| "unfinished".into());
    format!(
        "{} of {} focused",
        actual,
        format_duration(record.planned_duration())
    )
}

async fn show_history(data_dir: &Path, args: HistoryArgs) -> Result<()> {
    let database = open_database(data_dir)?;
    let records = if args.today {
        database.today().await?
    } else if args.week {
        database.this_week().await?
    } else {
        database.load_all().await?
    };
    write_history(&mut io::stdout().lock(), &records)?;
    Ok(())
}

fn write_history(out: &mut impl Write, records: &[SessionRecord]) -> io::Result<()> {
    if records.is_empty() {
        return writeln!(out, "No sessions recorded.");
    }
    for record in records {
        let started = record.started_at.with_timezone(&Local);
        let mark = if record.completed() { "done" } else { "open" };
        writeln!(
            out,
            "{}  {:>8}  planned {:>8}  {}",
            started.format("%Y-%m-%d %H:%M"),
            record
                .actual_duration()
                .map(format_duration)
                .unwrap_or_else(|| "-".into()),
            format_duration(record.planned_duration()),
            mark
        )?;
    }
    writeln!(
        out,
        "{} sessions, {} total focus",
        records.len(),
        format_duration(total_focus_time(records))
    )
}

async fn list_apps() -> Result<()> {
    let apps = tokio::task::spawn_blocking(|| SystemApplications::new().list_applications())
        .await
        .context("application scan panicked")??;
    let mut out = io::stdout().lock();
    for app in apps {
        writeln!(out, "{:<32} {}", app.name, app.bundle_id)?;
    }
    Ok(())
}

async fn restore_desktop(folder: String) -> Result<()> {
    let organizer = FsDesktopOrganizer::for_current_user()?;
    let shown = folder.clone();
    tokio::task::spawn_blocking(move || organizer.restore(&folder))
        .await
        .context("desktop restore panicked")??;
    println!("Restored {shown}");
    Ok(())
}

fn show_settings(data_dir: &Path) -> Result<()> {
    let store = open_settings(data_dir)?;
    println!("# {}", store.path().display());
    println!("{}", serde_json::to_string_pretty(&store.get())?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn lines_map_to_session_actions() {
        assert_eq!(parse_line("p\n"), LineAction::TogglePause);
        assert_eq!(parse_line(" E "), LineAction::End);
        assert_eq!(parse_line(""), LineAction::Nothing);
        assert_eq!(parse_line("write tests"), LineAction::Unknown);
    }

    #[test]
    fn view_closes_after_early_end_or_completion_answer() {
        let start = Utc.with_ymd_and_hms(2024, 6, 10, 9, 0, 0).unwrap();
        let record = SessionRecord::begin(start, 60).finish(start + chrono::Duration::seconds(60));

        assert!(is_last_event(&TimerEvent::SessionEnded {
            record: record.clone()
        }));
        assert!(is_last_event(&TimerEvent::CompletionAnswered {
            choice: CompletionChoice::Close
        }));
        assert!(!is_last_event(&TimerEvent::SessionCompleted { record }));
        assert!(!is_last_event(&TimerEvent::StarterTask {
            task: "outline".into()
        }));
    }

    #[test]
    fn status_shows_the_countdown() {
        let snapshot = TimerSnapshot {
            state: SessionState::Paused { remaining_secs: 754 },
            remaining_secs: 754,
            session_id: None,
            started_at: None,
        };
        assert_eq!(status_line(&snapshot), "12:34  Session paused");
    }

    #[test]
    fn history_lists_records_and_total() {
        let start = Utc.with_ymd_and_hms(2024, 6, 10, 9, 0, 0).unwrap();
        let done = SessionRecord::begin(start, 1500).finish(start + chrono::Duration::minutes(25));
        let open = SessionRecord::begin(start + chrono::Duration::hours(1), 600);

        let mut out = Vec::new();
        write_history(&mut out, &[done, open]).unwrap();
        let text = String::from_utf8(out).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("25:00") && lines[0].ends_with("done"));
        assert!(lines[1].ends_with("open"));
        assert_eq!(lines[2], "2 sessions, 25:00 total focus");
    }

    #[test]
    fn empty_history_says_so() {
        let mut out = Vec::new();
        write_history(&mut out, &[]).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "No sessions recorded.\n");
    }
}
