use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "bellebot")]
#[command(author, version, about = "Belle beauty-school Mini App backend", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the Mini App API
    Run {
        /// Port to listen on (defaults to WEBAPP_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Apply pending database migrations and exit
    Migrate,

    /// Remind students about courses they have not touched for a while
    SendReminders {
        /// Days without a completed lesson before a reminder goes out
        #[arg(long, default_value_t = bellecore::core::config::reminders::INACTIVE_DAYS)]
        days: i64,
    },

    /// Re-evaluate the running challenges of one student
    RecheckChallenges {
        /// Telegram id of the student
        #[arg(long)]
        telegram_id: i64,
    },

    /// Announce a published course to every active student
    AnnounceCourse {
        /// Course id
        #[arg(long)]
        course_id: i64,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
