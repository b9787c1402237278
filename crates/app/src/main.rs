use std::fmt;
use std::sync::Arc;

use prep_core::model::{Difficulty, ProgressKey, Question, UserId};
use services::{
    BeaconTransport, Clock, HttpBeacon, Identity, NoBeacon, Notice, PracticeSession,
    QuestionService, SyncConfig, TopicClient, TopicClientConfig, TopicQuery, UnloadPayload,
    apply_unload_payload,
};
use storage::repository::{ProgressRepository, Storage};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt as log_fmt};

mod seed;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidUser { raw: String },
    MissingUser,
    InvalidDifficulty { raw: String },
    InvalidPage { raw: String },
    MissingPayloadFile,
    MissingApiBase,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidUser { raw } => write!(f, "invalid --user value: {raw:?}"),
            ArgsError::MissingUser => write!(f, "progress requires --user or PREP_USER_ID"),
            ArgsError::InvalidDifficulty { raw } => {
                write!(f, "invalid --difficulty value (easy|medium|hard): {raw}")
            }
            ArgsError::InvalidPage { raw } => write!(f, "invalid --page value: {raw}"),
            ArgsError::MissingPayloadFile => write!(f, "ingest-flush requires a payload file"),
            ArgsError::MissingApiBase => write!(f, "topics requires PREP_API_BASE or --api"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  prep practice [--db <url>] [--user <id>] [--email <addr>] [--topic <t>] [--area <a>]");
    eprintln!("                [--difficulty <easy|medium|hard>] [--page <n>]");
    eprintln!("  prep progress [--db <url>] [--user <id>] [--topic <t>] [--area <a>]");
    eprintln!("  prep seed     [--db <url>]");
    eprintln!("  prep ingest-flush <payload.json> [--db <url>]");
    eprintln!("  prep topics   [--api <base>] [--area <a>] [--subject <s>] [--chapter <c>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite:prep.sqlite3  --topic polity  --area ssc  --page 1");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  PREP_DB_URL, PREP_USER_ID, PREP_USER_EMAIL, PREP_TOPIC, PREP_AREA,");
    eprintln!("  PREP_BEACON_URL, PREP_API_BASE, PREP_RETRY_CAP, PREP_PAGE_SIZE, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Practice,
    Progress,
    Seed,
    IngestFlush,
    Topics,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "practice" => Some(Self::Practice),
            "progress" => Some(Self::Progress),
            "seed" => Some(Self::Seed),
            "ingest-flush" => Some(Self::IngestFlush),
            "topics" => Some(Self::Topics),
            _ => None,
        }
    }
}

struct Args {
    db_url: String,
    user_id: Option<UserId>,
    email: Option<String>,
    topic: String,
    area: String,
    difficulty: Option<Difficulty>,
    page: u32,
    payload_file: Option<String>,
    api_base: Option<String>,
    subject: Option<String>,
    chapter: Option<String>,
}

impl Args {
    fn from_env() -> Self {
        Self {
            db_url: std::env::var("PREP_DB_URL")
                .ok()
                .map_or_else(|| "sqlite://prep.sqlite3".into(), normalize_sqlite_url),
            user_id: std::env::var("PREP_USER_ID")
                .ok()
                .and_then(|raw| raw.parse().ok()),
            email: std::env::var("PREP_USER_EMAIL").ok(),
            topic: std::env::var("PREP_TOPIC").unwrap_or_else(|_| "polity".into()),
            area: std::env::var("PREP_AREA").unwrap_or_else(|_| "ssc".into()),
            difficulty: None,
            page: 1,
            payload_file: None,
            api_base: TopicClientConfig::from_env().map(|c| c.base_url),
            subject: None,
            chapter: None,
        }
    }

    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut parsed = Self::from_env();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    parsed.db_url = normalize_sqlite_url(value);
                }
                "--user" => {
                    let value = require_value(args, "--user")?;
                    parsed.user_id = Some(
                        value
                            .parse()
                            .map_err(|_| ArgsError::InvalidUser { raw: value.clone() })?,
                    );
                }
                "--email" => parsed.email = Some(require_value(args, "--email")?),
                "--topic" => parsed.topic = require_value(args, "--topic")?,
                "--area" => parsed.area = require_value(args, "--area")?,
                "--difficulty" => {
                    let value = require_value(args, "--difficulty")?;
                    parsed.difficulty = Some(
                        value
                            .parse()
                            .map_err(|_| ArgsError::InvalidDifficulty { raw: value.clone() })?,
                    );
                }
                "--page" => {
                    let value = require_value(args, "--page")?;
                    parsed.page = value
                        .parse::<u32>()
                        .ok()
                        .filter(|p| *p > 0)
                        .ok_or(ArgsError::InvalidPage { raw: value })?;
                }
                "--api" => parsed.api_base = Some(require_value(args, "--api")?),
                "--subject" => parsed.subject = Some(require_value(args, "--subject")?),
                "--chapter" => parsed.chapter = Some(require_value(args, "--chapter")?),
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                other if !other.starts_with("--") && parsed.payload_file.is_none() => {
                    parsed.payload_file = Some(arg);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(parsed)
    }

    fn identity(&self) -> Option<Identity> {
        self.user_id.clone().map(|user_id| Identity {
            user_id,
            email: self.email.clone(),
        })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }
    Ok(())
}

async fn open_storage(db_url: &str) -> Result<Storage, Box<dyn std::error::Error>> {
    prepare_sqlite_file(db_url)?;
    Ok(Storage::sqlite(db_url).await?)
}

fn print_question(index: usize, question: &Question) {
    println!();
    println!("[{index}] ({}) {}", question.difficulty(), question.prompt());
    for (i, option) in question.options().iter().enumerate() {
        println!("    {}. {option}", i + 1);
    }
}

fn print_notice(notice: Option<&Notice>) {
    match notice {
        Some(Notice::Saved) => println!("    progress saved"),
        Some(Notice::Retrying { message }) => println!("    {message}"),
        Some(Notice::SignInRequired) => println!("    sign in (--user) to keep your progress"),
        None => {}
    }
}

async fn run_practice(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let storage = open_storage(&args.db_url).await?;
    let config = SyncConfig::from_env();
    let questions = QuestionService::new(storage.questions.clone(), &config, Clock::system());

    let page = questions
        .page(&args.area, &args.topic, args.difficulty, args.page)
        .await?;
    if page.questions.is_empty() {
        println!("No questions for {}/{} on page {}.", args.area, args.topic, args.page);
        return Ok(());
    }
    println!(
        "{} / {}: page {} of {} ({} questions)",
        args.area, args.topic, page.page, page.total_pages, page.total
    );

    let beacon: Arc<dyn BeaconTransport> = match HttpBeacon::from_env() {
        Some(beacon) => Arc::new(beacon),
        None => Arc::new(NoBeacon),
    };
    let mut session = PracticeSession::open(
        args.identity(),
        &args.topic,
        &args.area,
        storage.progress.clone(),
        beacon,
        config,
    )
    .await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    for (index, question) in page.questions.iter().enumerate() {
        print_question(index + 1, question);
        if session.progress().has_completed(question.id()) {
            println!("    already answered");
            continue;
        }

        let choice = loop {
            let Some(line) = lines.next_line().await? else {
                let outcome = session.close().await;
                info!(?outcome, "input closed, session flushed");
                return Ok(());
            };
            let line = line.trim();
            if line.eq_ignore_ascii_case("q") {
                let outcome = session.close().await;
                info!(?outcome, "session closed");
                return Ok(());
            }
            match line.parse::<usize>() {
                Ok(n) if (1..=question.options().len()).contains(&n) => break n - 1,
                _ => println!("    enter 1-{} or q", question.options().len()),
            }
        };

        let outcome = session.answer(question, choice).await;
        if outcome.correct {
            println!("    correct (+{})", outcome.points_awarded);
        } else {
            let right = &question.options()[question.answer_index()];
            println!("    wrong, answer: {right}");
        }
        if let Some(explanation) = question.explanation() {
            println!("    {explanation}");
        }
        print_notice(outcome.notice.as_ref());
    }

    let progress = session.progress();
    println!();
    println!(
        "completed {} / correct {} / points {}",
        progress.completed_count(),
        progress.correct_count(),
        progress.points
    );
    let outcome = session.close().await;
    info!(?outcome, "session closed");
    Ok(())
}

async fn run_progress(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let user_id = args.user_id.clone().ok_or(ArgsError::MissingUser)?;
    let storage = open_storage(&args.db_url).await?;
    let key = ProgressKey::new(user_id, args.topic.clone(), args.area.clone());
    let snapshot = storage
        .progress
        .fetch_progress(&key)
        .await?
        .unwrap_or_default();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

async fn run_ingest_flush(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let file = args
        .payload_file
        .as_ref()
        .ok_or(ArgsError::MissingPayloadFile)?;
    let raw = std::fs::read_to_string(file)?;
    let payload: UnloadPayload = serde_json::from_str(&raw)?;
    let storage = open_storage(&args.db_url).await?;
    let merged = apply_unload_payload(storage.progress.as_ref(), &payload).await?;
    println!("{}", serde_json::to_string_pretty(&merged)?);
    Ok(())
}

async fn run_topics(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let base_url = args.api_base.clone().ok_or(ArgsError::MissingApiBase)?;
    let config = SyncConfig::from_env();
    let client = TopicClient::new(
        TopicClientConfig { base_url },
        config.topic_cache,
        Clock::system(),
    );
    let mut query = TopicQuery::new(args.area.clone());
    if let Some(subject) = &args.subject {
        query = query.subject(subject.clone());
    }
    if let Some(chapter) = &args.chapter {
        query = query.chapter(chapter.clone());
    }
    for topic in client.list(&query).await? {
        println!("{} ({} questions)", topic.name, topic.question_count);
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None => Command::Practice,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Practice,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };
    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let mut iter = argv.into_iter();
    let args = Args::parse(&mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    match cmd {
        Command::Practice => run_practice(&args).await,
        Command::Progress => run_progress(&args).await,
        Command::Seed => {
            let storage = open_storage(&args.db_url).await?;
            let n = seed::seed_questions(storage.questions.as_ref()).await?;
            println!("seeded {n} questions into {}", args.db_url);
            Ok(())
        }
        Command::IngestFlush => run_ingest_flush(&args).await,
        Command::Topics => run_topics(&args).await,
    }
}

#[tokio::main]
async fn main() {
    log_fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
