use anyhow::Result;
use chrono::Utc;
use dotenvy::dotenv;
use std::sync::Arc;

use bellebot::cli::{Cli, Commands};
use bellebot::jobs;
use bellebot::telegram::{run_webapp_server, AuthSettings, TelegramNotifier, WebAppState};
use bellecore::core::config;
use bellecore::{create_pool, init_logger, CascadeSettings, PdfCertificateRenderer};

/// Main entry point
///
/// Parses CLI arguments and dispatches to the matching subcommand.
///
/// # Errors
/// Returns an error if initialization fails (logging, database, missing token)
/// or the chosen job fails.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Load environment variables from .env if present, before any config static is read
    let _ = dotenv();

    init_logger(&config::LOG_FILE_PATH, &config::LOG_LEVEL)?;

    match cli.command {
        Some(Commands::Run { port }) => run_api(port.unwrap_or(*config::WEBAPP_PORT)).await,
        Some(Commands::Migrate) => {
            create_pool(&config::DATABASE_PATH)?;
            log::info!("Migrations applied to {}", config::DATABASE_PATH.as_str());
            Ok(())
        }
        Some(Commands::SendReminders { days }) => {
            let pool = create_pool(&config::DATABASE_PATH)?;
            let notifier = notifier()?;
            let report = jobs::send_reminders(&pool, &notifier, days, Utc::now()).await?;
            println!("sent: {}, failed: {}, total: {}", report.sent, report.failed, report.total());
            Ok(())
        }
        Some(Commands::RecheckChallenges { telegram_id }) => {
            let pool = create_pool(&config::DATABASE_PATH)?;
            let notifier = notifier()?;
            let (completed, _) = jobs::recheck_challenges(&pool, &notifier, telegram_id, Utc::now()).await?;
            println!("completed challenges: {:?}", completed);
            Ok(())
        }
        Some(Commands::AnnounceCourse { course_id }) => {
            let pool = create_pool(&config::DATABASE_PATH)?;
            let notifier = notifier()?;
            let report = jobs::announce_course(&pool, &notifier, course_id).await?;
            println!("sent: {}, failed: {}, total: {}", report.sent, report.failed, report.total());
            Ok(())
        }
        None => {
            log::info!("No command specified, serving the Mini App API");
            run_api(*config::WEBAPP_PORT).await
        }
    }
}

fn notifier() -> Result<TelegramNotifier> {
    let bot_token = config::BOT_TOKEN.as_str();
    if bot_token.is_empty() {
        return Err(anyhow::anyhow!("BOT_TOKEN environment variable not set"));
    }
    Ok(TelegramNotifier::new(bot_token))
}

async fn run_api(port: u16) -> Result<()> {
    let db_pool = Arc::new(
        create_pool(&config::DATABASE_PATH).map_err(|e| anyhow::anyhow!("Failed to create database pool: {}", e))?,
    );
    let settings = CascadeSettings::from_env();
    fs_err::create_dir_all(&settings.certificate_dir)?;

    if *config::WEBAPP_DEV_MODE {
        log::warn!("WEBAPP_DEV_MODE is on: X-Telegram-User-Id is trusted without a signature");
    }

    let state = WebAppState {
        db_pool,
        notifier: Arc::new(notifier()?),
        renderer: Arc::new(PdfCertificateRenderer),
        settings,
        auth: AuthSettings {
            bot_token: config::BOT_TOKEN.to_string(),
            max_age_secs: *config::INIT_DATA_MAX_AGE_SECS,
            dev_mode: *config::WEBAPP_DEV_MODE,
        },
    };

    run_webapp_server(port, state).await
}
