use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use notedue::config::Config;
use notedue::countdown::project;
use notedue::db::NoteStore;
use notedue::ipc;
use notedue::models::{Note, NoteKind, ReminderRule};
use notedue::notes::{save_draft, search, NoteDraft};
use notedue::notify::recording::{DispatchCall, RecordingDispatcher};
use notedue::schedule::Reconciler;

#[derive(Parser)]
#[command(name = "notes")]
#[command(about = "Notes with countdowns and reminders", long_about = None)]
struct Cli {
    /// Database path (defaults to user data directory)
    #[arg(short, long, global = true)]
    db_path: Option<PathBuf>,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new note
    Add {
        /// Note text
        text: String,

        #[command(flatten)]
        options: NoteOptions,
    },

    /// Edit an existing note; its countdown restarts from now
    Edit {
        /// Note ID
        id: String,

        /// New note text
        #[arg(long)]
        text: Option<String>,

        /// Remove the countdown
        #[arg(long, conflicts_with_all = ["countdown_days", "countdown_hours", "countdown_minutes", "countdown_seconds"])]
        no_countdown: bool,

        /// Remove the fixed-date reminder
        #[arg(long, conflicts_with = "remind_at")]
        clear_remind_at: bool,

        #[command(flatten)]
        options: NoteOptions,
    },

    /// Delete a note
    Delete {
        /// Note ID
        id: String,
    },

    /// Toggle a note's done flag
    Done {
        /// Note ID
        id: String,
    },

    /// List all notes
    List {
        /// Only show notes containing this text
        #[arg(short, long)]
        query: Option<String>,
    },

    /// Show the notifications a reconcile would schedule right now
    Triggers,

    /// Refresh countdowns every second
    Watch,
}

#[derive(Args)]
struct NoteOptions {
    /// Note type
    #[arg(long, value_enum)]
    kind: Option<KindArg>,

    /// Countdown days
    #[arg(long)]
    countdown_days: Option<String>,
    /// Countdown hours
    #[arg(long)]
    countdown_hours: Option<String>,
    /// Countdown minutes
    #[arg(long)]
    countdown_minutes: Option<String>,
    /// Countdown seconds
    #[arg(long)]
    countdown_seconds: Option<String>,

    /// When to remind before the countdown ends
    #[arg(long, value_enum)]
    remind: Option<RuleArg>,

    /// Custom reminder offset: days
    #[arg(long)]
    offset_days: Option<String>,
    /// Custom reminder offset: hours
    #[arg(long)]
    offset_hours: Option<String>,
    /// Custom reminder offset: minutes
    #[arg(long)]
    offset_minutes: Option<String>,
    /// Custom reminder offset: seconds
    #[arg(long)]
    offset_seconds: Option<String>,

    /// Fixed reminder time (RFC 3339 or "YYYY-MM-DD HH:MM" local)
    #[arg(long, value_parser = parse_instant)]
    remind_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Reminder,
    Todo,
    Idea,
    Personal,
}

#[derive(Clone, Copy, ValueEnum)]
enum RuleArg {
    #[value(name = "timeup")]
    TimeUp,
    #[value(name = "1hour")]
    OneHour,
    #[value(name = "1day")]
    OneDay,
    Custom,
}

impl From<KindArg> for NoteKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Reminder => NoteKind::Reminder,
            KindArg::Todo => NoteKind::Todo,
            KindArg::Idea => NoteKind::Idea,
            KindArg::Personal => NoteKind::Personal,
        }
    }
}

impl From<RuleArg> for ReminderRule {
    fn from(rule: RuleArg) -> Self {
        match rule {
            RuleArg::TimeUp => ReminderRule::TimeUp,
            RuleArg::OneHour => ReminderRule::OneHourBefore,
            RuleArg::OneDay => ReminderRule::OneDayBefore,
            RuleArg::Custom => ReminderRule::SpecificOffsetBefore,
        }
    }
}

impl NoteOptions {
    /// 只覆盖命令行给出的字段
    fn apply(self, draft: &mut NoteDraft) {
        if let Some(kind) = self.kind {
            draft.kind = kind.into();
        }

        let countdown = [
            (self.countdown_days, &mut draft.countdown.days),
            (self.countdown_hours, &mut draft.countdown.hours),
            (self.countdown_minutes, &mut draft.countdown.minutes),
            (self.countdown_seconds, &mut draft.countdown.seconds),
        ];
        let mut countdown_given = false;
        for (value, field) in countdown {
            if let Some(value) = value {
                *field = value;
                countdown_given = true;
            }
        }
        if countdown_given {
            draft.has_countdown = true;
        }

        let offset = [
            (self.offset_days, &mut draft.specific_offset.days),
            (self.offset_hours, &mut draft.specific_offset.hours),
            (self.offset_minutes, &mut draft.specific_offset.minutes),
            (self.offset_seconds, &mut draft.specific_offset.seconds),
        ];
        let mut offset_given = false;
        for (value, field) in offset {
            if let Some(value) = value {
                *field = value;
                offset_given = true;
            }
        }

        match self.remind {
            Some(rule) => draft.reminder_rule = rule.into(),
            None if offset_given => draft.reminder_rule = ReminderRule::SpecificOffsetBefore,
            None => {}
        }

        if let Some(at) = self.remind_at {
            draft.fixed_reminder_at = Some(at);
        }
    }
}

fn parse_instant(raw: &str) -> std::result::Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M")
        .map_err(|e| format!("invalid time {raw:?}: {e}"))?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| format!("{raw:?} does not exist in the local time zone"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.debug { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::load(cli.config.as_deref()).context("Failed to load config")?;
    let db_path = config.resolve_db_path(cli.db_path)?;
    let store = NoteStore::open(&db_path).context("Failed to open database")?;

    match cli.command {
        Some(Commands::Add { text, options }) => {
            let mut draft = NoteDraft::new(text);
            options.apply(&mut draft);
            let (note, _) = save_draft(&store, &draft, Utc::now())?;
            println!("✅ Note created with ID: {}", note.id);
            ping_daemon(&config);
        }
        Some(Commands::Edit {
            id,
            text,
            no_countdown,
            clear_remind_at,
            options,
        }) => {
            let existing = store
                .get(&id)?
                .with_context(|| format!("Note {} not found", id))?;
            let mut draft = NoteDraft::from_note(&existing);
            if let Some(text) = text {
                draft.text = text;
            }
            if clear_remind_at {
                draft.fixed_reminder_at = None;
            }
            options.apply(&mut draft);
            if no_countdown {
                draft.has_countdown = false;
            }
            save_draft(&store, &draft, Utc::now())?;
            println!("✅ Note {} updated", id);
            ping_daemon(&config);
        }
        Some(Commands::Delete { id }) => {
            store.remove(&id)?;
            println!("🗑️  Note {} deleted", id);
            ping_daemon(&config);
        }
        Some(Commands::Done { id }) => {
            let note = store
                .get(&id)?
                .with_context(|| format!("Note {} not found", id))?;
            store.set_done(&id, !note.done, Utc::now())?;
            println!("✅ Note {} marked as {}", id, if note.done { "open" } else { "done" });
        }
        Some(Commands::List { query }) => {
            let notes = store.list()?;
            let shown: Vec<&Note> = match &query {
                Some(query) => search(&notes, query),
                None => notes.iter().collect(),
            };
            if shown.is_empty() {
                println!("No notes found.");
            }
            let now = Utc::now();
            for note in shown {
                print_note(note, now);
            }
        }
        Some(Commands::Triggers) => {
            let notes = store.list()?;
            let now = Utc::now();
            let reconciler = Reconciler::new(RecordingDispatcher::default());
            reconciler.reconcile(&notes, now);
            let mut any = false;
            for call in reconciler.dispatcher().calls() {
                if let DispatchCall::Schedule {
                    fire_in_seconds,
                    title,
                    body,
                } = call
                {
                    any = true;
                    let at = now + chrono::Duration::seconds(fire_in_seconds as i64);
                    println!(
                        "in {:>8}s  {}  {:<18} {}",
                        fire_in_seconds,
                        at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"),
                        title,
                        body
                    );
                }
            }
            if !any {
                println!("No pending notifications.");
            }
        }
        Some(Commands::Watch) | None => loop {
            let notes = store.list()?;
            let now = Utc::now();
            // 清屏
            print!("\x1b[2J\x1b[H");
            println!("Countdowns ({}), Ctrl-C to quit\n", Local::now().format("%H:%M:%S"));
            for note in notes.iter().filter(|n| n.countdown_end().is_some()) {
                print_note(note, now);
            }
            std::thread::sleep(Duration::from_secs(1));
        },
    }

    Ok(())
}

fn print_note(note: &Note, now: DateTime<Utc>) {
    let status_icon = if note.done { "✅" } else { "⭕" };
    let countdown = match project(note, now) {
        Some(view) if view.is_done => "  ⏰ Time is up!".to_string(),
        Some(view) => format!("  ⏳ {}", view.display),
        None => String::new(),
    };
    let fixed = note
        .fixed_reminder_at
        .map(|at| {
            format!(
                "  🔔 {}",
                at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
            )
        })
        .unwrap_or_default();
    println!(
        "[{}] {} {:<8} {}{}{}",
        note.id,
        status_icon,
        note.kind.label(),
        note.text,
        countdown,
        fixed
    );
}

/// 通知守护进程重新对账，失败不影响保存
fn ping_daemon(config: &Config) {
    if let Err(e) = ipc::notify_daemon(&config.daemon.socket_name) {
        tracing::debug!("Reminder daemon not reachable: {}", e);
        println!("ℹ️  Reminder daemon is not running; start `noted` to receive notifications.");
    }
}
