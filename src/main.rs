use anyhow::{anyhow, Result};
use clap::{Arg, ArgMatches, Command};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use history_video_bot::bot::{BotHandler, Dispatcher, GitHubDispatcher};
use history_video_bot::collector::{collect_production, InterviewOutcome};
use history_video_bot::production::load_record;
use history_video_bot::{
    setup, AutoProducer, ChatTransport, Config, ProductionOutcome, ProductionRecord, ProductionStore, Session,
    SessionSettings, TelegramClient, VideoProducer, VideoType,
};

/// Exit status of a run cancelled by the operator
const EXIT_CANCELLED: i32 = 2;

fn cli() -> Command {
    Command::new("History Video Bot")
        .version(env!("CARGO_PKG_VERSION"))
        .author("TigreRoll")
        .about("Narrated history video production driven over a Telegram bot")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file (TOML)")
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(Command::new("collect").about("Collect title, description, tags and script over chat"))
        .subcommand(
            Command::new("produce")
                .about("Collect a production over chat and publish it")
                .arg(
                    Arg::new("record")
                        .short('r')
                        .long("record")
                        .value_name("FILE")
                        .help("Produce an existing production record instead of collecting one"),
                )
                .arg(
                    Arg::new("video-id")
                        .long("video-id")
                        .value_name("ID")
                        .help("Produce the stored record with this id")
                        .conflicts_with("record"),
                ),
        )
        .subcommand(
            Command::new("generate")
                .about("Generate and publish a video from an LLM script and local clips")
                .arg(
                    Arg::new("type")
                        .short('t')
                        .long("type")
                        .value_name("TYPE")
                        .help("short or long (default from config / VIDEO_TYPE)"),
                ),
        )
        .subcommand(
            Command::new("serve")
                .about("Run the request bot")
                .arg(
                    Arg::new("webhook")
                        .long("webhook")
                        .help("Serve Telegram webhooks over HTTP instead of polling")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(Command::new("setup").about("Create working directories and validate the environment"))
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "history_video_bot=debug,info"
    } else {
        "history_video_bot=info,warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(matches: &ArgMatches) -> Result<Config> {
    let config = match matches.get_one::<String>("config") {
        Some(path) => Config::load_from(&PathBuf::from(path))?,
        None => Config::load()?,
    };
    config.validate()?;
    Ok(config)
}

async fn open_session(config: &Config, fresh: bool) -> Result<Session> {
    let (_, chat_id) = config.require_telegram()?;
    let transport: Arc<dyn ChatTransport> = Arc::new(TelegramClient::from_config(&config.telegram)?);
    let marker = ProductionStore::new(config.paths.productions_dir.clone()).marker();
    let settings = SessionSettings::from(&config.collection);

    let session = if fresh {
        Session::start(transport, chat_id, marker, settings).await
    } else {
        Session::resume(transport, chat_id, marker, settings).await
    };
    Ok(session)
}

/// Run the interview; `Err(code)` carries the exit status when nothing was collected
async fn interview(session: &mut Session, config: &Config) -> Result<std::result::Result<ProductionRecord, i32>> {
    let store = ProductionStore::new(config.paths.productions_dir.clone());

    match collect_production(session, &store, &config.collection).await? {
        InterviewOutcome::Collected(record) => {
            info!("🎯 Title: {}", record.title);
            info!("📝 Script: {} words", record.word_count);
            info!("⏱️ Estimated duration: {:.1} min", record.estimated_duration);
            Ok(Ok(record))
        }
        InterviewOutcome::TimedOut(field) => {
            error!("❌ No answer for {}, workflow stopped", field);
            Ok(Err(1))
        }
        InterviewOutcome::Cancelled => {
            info!("🛑 Workflow cancelled by the operator");
            Ok(Err(EXIT_CANCELLED))
        }
    }
}

async fn run_collect(config: Config) -> Result<i32> {
    let mut session = open_session(&config, true).await?;
    Ok(match interview(&mut session, &config).await? {
        Ok(record) => {
            println!("{}", record.video_id);
            0
        }
        Err(code) => code,
    })
}

async fn run_produce(config: Config, matches: &ArgMatches) -> Result<i32> {
    let store = ProductionStore::new(config.paths.productions_dir.clone());

    let (mut session, record) = if let Some(path) = matches.get_one::<String>("record") {
        let record = load_record(&PathBuf::from(path)).await?;
        (open_session(&config, false).await?, record)
    } else if let Some(video_id) = matches.get_one::<String>("video-id") {
        let record = store.load(video_id).await?;
        (open_session(&config, false).await?, record)
    } else {
        let mut session = open_session(&config, true).await?;
        match interview(&mut session, &config).await? {
            Ok(record) => (session, record),
            Err(code) => return Ok(code),
        }
    };

    info!("🎥 Starting production of {}", record.video_id);
    let producer = VideoProducer::new(config);
    match producer.run(&mut session, record).await? {
        ProductionOutcome::Published { url } => {
            info!("🎉 Production completed: {}", url);
            Ok(0)
        }
        ProductionOutcome::Cancelled => {
            info!("🛑 Production cancelled by the operator");
            Ok(EXIT_CANCELLED)
        }
    }
}

async fn run_generate(mut config: Config, matches: &ArgMatches) -> Result<i32> {
    if let Some(video_type) = matches.get_one::<String>("type") {
        config.auto.video_type = video_type.parse::<VideoType>()?;
    }

    info!(
        "{} Starting automatic {} production",
        if config.auto.video_type == VideoType::Short { "📱" } else { "🎬" },
        config.auto.video_type
    );
    let run = AutoProducer::new(config)?.run().await?;
    info!("✅ Published {} ({})", run.entry.url, run.video_path.display());
    Ok(0)
}

async fn run_serve(config: Config, matches: &ArgMatches) -> Result<i32> {
    let transport: Arc<dyn ChatTransport> = Arc::new(TelegramClient::from_config(&config.telegram)?);
    let dispatcher: Arc<dyn Dispatcher> = Arc::new(GitHubDispatcher::new(&config.github)?);
    let handler = BotHandler::new(
        transport,
        ProductionStore::new(config.paths.productions_dir.clone()),
        dispatcher,
        config.telegram.chat_id,
        config.server.status_limit,
    );

    if config.telegram.chat_id.is_none() {
        warn!("⚠️ TELEGRAM_CHAT_ID is not set, every chat will be rejected");
    }

    if matches.get_flag("webhook") {
        return serve_webhook(handler, config).await;
    }

    handler
        .serve(Duration::from_secs(config.collection.poll_timeout_secs))
        .await?;
    Ok(0)
}

#[cfg(feature = "api")]
async fn serve_webhook(handler: BotHandler, config: Config) -> Result<i32> {
    use history_video_bot::api::ApiServer;

    ApiServer::new(Arc::new(handler), Arc::new(config)).start().await?;
    Ok(0)
}

#[cfg(not(feature = "api"))]
async fn serve_webhook(_handler: BotHandler, _config: Config) -> Result<i32> {
    Err(anyhow!("Webhook mode requires building with the `api` feature"))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let matches = cli().get_matches();
    init_logging(matches.get_flag("verbose"));

    let config = load_config(&matches)?;
    info!("🚀 History Video Bot starting...");
    tracing::debug!("{}", config.summary());

    let code = match matches.subcommand() {
        Some(("collect", _)) => run_collect(config).await?,
        Some(("produce", sub)) => run_produce(config, sub).await?,
        Some(("generate", sub)) => run_generate(config, sub).await?,
        Some(("serve", sub)) => run_serve(config, sub).await?,
        Some(("setup", _)) => {
            if setup::run(&config).await?.all_passed() {
                0
            } else {
                1
            }
        }
        _ => return Err(anyhow!("Unknown command")),
    };

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
