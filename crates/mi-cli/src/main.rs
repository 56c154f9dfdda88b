use std::fs::File;
use std::io;
use std::num::NonZeroU64;
use std::path::PathBuf;

use clap::{CommandFactory, Parser};
use clap_complete::{generate, Shell};
use mi_crawler::{Config, Credentials, MemberStore, OnError, Pipeline, TargetPolicy};
use mi_web::{CssExtractor, ExtractorConfig, HttpConfig, HttpSession};
use serde::{Deserialize, Serialize};
use tokio::runtime;

const DEFAULT_LOG_FILTER: &str = "mi_crawler=info,mi_web=info,mi=info";

/// Collect community members and message the new ones
#[derive(Debug, Parser)]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: SubCommand,
}

#[derive(Debug, clap::Subcommand)]
pub enum SubCommand {
    /// Crawl every configured collection and record new members
    Populate(RunArgs),
    /// Message every member not messaged yet
    Send(RunArgs),
    /// Populate then send
    Full(RunArgs),
    /// Print member store statistics
    Status(StatusArgs),
    #[command(hide = true)]
    Completion,
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    Populate,
    Send,
    Full,
}

#[derive(Debug, clap::Args)]
pub struct RunArgs {
    /// Path to the yaml configuration file
    #[arg(env = "MI_CONFIG", long, short, default_value = "config.yml")]
    pub config: PathBuf,
    /// Path to the member database
    #[arg(long, default_value = "db/members.db")]
    pub db: PathBuf,
    /// Login user name
    #[arg(env = "MI_USER", long, short)]
    pub user: String,
    /// Login password
    #[arg(env = "MI_PASS", long, short, hide_env_values = true)]
    pub password: String,
    /// Override the number of members listed per page
    #[arg(long)]
    pub users_per_page: Option<NonZeroU64>,
    /// Override how message targets are chosen
    #[arg(value_enum, long)]
    pub target_policy: Option<TargetPolicy>,
    /// Override the handling of collections that fail to crawl
    #[arg(value_enum, long)]
    pub on_collection_error: Option<OnError>,
    /// When quiet no logs are outputted
    #[arg(long, short)]
    pub quiet: bool,
}

#[derive(Debug, clap::Args)]
pub struct StatusArgs {
    /// Path to the member database
    #[arg(long, default_value = "db/members.db")]
    pub db: PathBuf,
}

/// Everything read from the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(flatten)]
    pub pipeline: Config,

    #[serde(default)]
    pub extraction: ExtractorConfig,

    #[serde(default)]
    pub http: HttpConfig,
}

impl RunArgs {
    fn apply(&self, conf: &mut AppConfig) {
        if let Some(users_per_page) = self.users_per_page {
            conf.pipeline.users_per_page = users_per_page;
        }
        if let Some(target_policy) = self.target_policy {
            conf.pipeline.target_policy = target_policy;
        }
        if let Some(on_collection_error) = self.on_collection_error {
            conf.pipeline.on_collection_error = on_collection_error;
        }
    }
}

impl TryFrom<&RunArgs> for AppConfig {
    type Error = anyhow::Error;

    fn try_from(args: &RunArgs) -> Result<Self, Self::Error> {
        let file = File::open(&args.config).map_err(|e| {
            anyhow::anyhow!("Couldn't open config {}: {e}", args.config.display())
        })?;
        let mut conf: AppConfig = serde_yaml::from_reader(file)?;
        args.apply(&mut conf);
        Ok(conf)
    }
}

fn run(args: RunArgs, stage: Stage) -> anyhow::Result<()> {
    let conf = AppConfig::try_from(&args)?;
    let credentials = Credentials::new(args.user, args.password);

    log::info!("mi {}", env!("CARGO_PKG_VERSION"));
    log::info!("Database: {}", args.db.display());
    log::info!("User: {}", credentials.user);
    log::info!("Password: {}", credentials.masked_password());

    let store = MemberStore::open(&args.db)?;
    let session = HttpSession::new(&conf.http)?;
    let extractor = CssExtractor::new(conf.extraction)?;
    let mut pipeline = Pipeline::new(conf.pipeline, store, session, extractor)?;

    let rt = runtime::Builder::new_current_thread().enable_all().build()?;
    rt.block_on(async move {
        pipeline.login(&credentials).await?;
        log::info!("Starting {stage:?}");
        match stage {
            Stage::Populate => {
                let report = pipeline.populate().await?;
                log::info!("Added {} new members", report.added());
            }
            Stage::Send => {
                let report = pipeline.send().await?;
                log::info!("Sent {}/{} messages", report.sent, report.attempted);
            }
            Stage::Full => {
                let (populated, sent) = pipeline.full().await?;
                log::info!(
                    "Added {} new members, sent {}/{} messages",
                    populated.added(),
                    sent.sent,
                    sent.attempted
                );
            }
        }
        Ok::<_, anyhow::Error>(())
    })
}

fn status(args: StatusArgs) -> anyhow::Result<()> {
    let stats = MemberStore::open(&args.db)?.stats()?;
    println!("members:       {}", stats.total);
    println!("delivered:     {}", stats.delivered);
    println!("pending:       {}", stats.pending);
    println!("primary group: {}", stats.primary_group);
    Ok(())
}

fn init_logger(quiet: bool) {
    if !quiet {
        env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or(DEFAULT_LOG_FILTER),
        )
        .init();
    }
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    match args.cmd {
        SubCommand::Populate(args) => {
            init_logger(args.quiet);
            run(args, Stage::Populate)
        }
        SubCommand::Send(args) => {
            init_logger(args.quiet);
            run(args, Stage::Send)
        }
        SubCommand::Full(args) => {
            init_logger(args.quiet);
            run(args, Stage::Full)
        }
        SubCommand::Status(args) => status(args),
        SubCommand::Completion => {
            generate(Shell::Bash, &mut Args::command(), "mi", &mut io::stdout());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
start_url: https://example.org/login
own_meetup: https://example.org/mine
meetups: [https://example.org/rust]
message: "Hi username!"
extraction:
  member_selector: "ul.members > li"
http:
  user_agent: mi-test
"#;

    fn run_args(extra: &[&str]) -> RunArgs {
        let argv = ["mi", "populate", "--user", "jane", "--password", "secret"];
        let args = Args::try_parse_from(argv.iter().chain(extra)).unwrap();
        match args.cmd {
            SubCommand::Populate(args) => args,
            cmd => panic!("unexpected subcommand {cmd:?}"),
        }
    }

    #[test]
    fn cli_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn reads_every_section_of_the_config_file() {
        let conf: AppConfig = serde_yaml::from_str(CONFIG).unwrap();

        assert_eq!(Some("https://example.org/mine"), conf.pipeline.primary_collection());
        assert_eq!("ul.members > li", conf.extraction.member_selector);
        assert_eq!("data-memid", conf.extraction.member_id_attr);
        assert_eq!("mi-test", conf.http.user_agent);
    }

    #[test]
    fn flags_override_the_config_file() {
        let mut conf: AppConfig = serde_yaml::from_str(CONFIG).unwrap();
        let args = run_args(&[
            "--users-per-page",
            "50",
            "--target-policy",
            "precompute-target",
            "--on-collection-error",
            "fail",
        ]);
        args.apply(&mut conf);

        assert_eq!(50, conf.pipeline.users_per_page.get());
        assert_eq!(TargetPolicy::PrecomputeTarget, conf.pipeline.target_policy);
        assert_eq!(OnError::Fail, conf.pipeline.on_collection_error);
        assert_eq!(PathBuf::from("db/members.db"), args.db);
    }

    #[test]
    fn missing_flags_keep_the_config_file() {
        let mut conf: AppConfig = serde_yaml::from_str(CONFIG).unwrap();
        run_args(&[]).apply(&mut conf);

        assert_eq!(20, conf.pipeline.users_per_page.get());
        assert_eq!(TargetPolicy::FilterByGroup, conf.pipeline.target_policy);
    }
}
