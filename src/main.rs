use anyhow::Result;
use clap::Parser;
use composer_history::commands::{HistoryOptions, history};
use composer_history::repository::Mode;
use std::path::PathBuf;

/// composer-history - release history of Composer packages
///
/// Shows what changed between the installed version of a package and its
/// latest release on GitHub.
///
/// If the GITHUB_TOKEN environment variable is set, it will be used for authentication.
/// Otherwise the token from the project's config.github-oauth or from
/// $COMPOSER_HOME/auth.json is used, if any.
///
/// Examples:
///   composer-history history                     # History of every package
///   composer-history history monolog/monolog     # Details and history of one package
///   composer-history history -i --json           # Installed packages as JSON
#[derive(Parser, Debug)]
#[command(author, version = env!("COMPOSER_HISTORY_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project directory (defaults to the current directory; also via COMPOSER_HISTORY_DIR)
    #[arg(
        long = "working-dir",
        short = 'd',
        env = "COMPOSER_HISTORY_DIR",
        value_name = "DIR",
        global = true
    )]
    pub working_dir: Option<PathBuf>,

    /// GitHub API URL (defaults to https://api.github.com)
    #[arg(
        long = "api-url",
        env = "COMPOSER_HISTORY_API_URL",
        value_name = "URL",
        global = true
    )]
    pub api_url: Option<String>,

    /// Packagist URL (defaults to https://repo.packagist.org)
    #[arg(
        long = "packagist-url",
        env = "COMPOSER_HISTORY_PACKAGIST_URL",
        value_name = "URL",
        global = true
    )]
    pub packagist_url: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Show package details and the releases between the installed and latest versions
    History(HistoryArgs),
}

#[derive(clap::Args, Debug)]
pub struct HistoryArgs {
    /// Package to inspect; lists every package when omitted
    #[arg(value_name = "PACKAGE")]
    pub package: Option<String>,

    /// Version constraint, e.g. "^2.0"
    #[arg(value_name = "VERSION", requires = "package")]
    pub version: Option<String>,

    /// Only look at installed packages
    #[arg(long, short = 'i')]
    pub installed: bool,

    /// Only look at platform packages (php and extensions)
    #[arg(long, short = 'p')]
    pub platform: bool,

    /// Only look at packages available in the repositories
    #[arg(long, short = 'a')]
    pub available: bool,

    /// Print JSON instead of text
    #[arg(long, short = 'j')]
    pub json: bool,
}

impl From<HistoryArgs> for HistoryOptions {
    fn from(args: HistoryArgs) -> Self {
        HistoryOptions {
            mode: Mode::from_flags(args.platform, args.installed, args.available),
            package: args.package,
            version: args.version,
            json: args.json,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let runtime = composer_history::runtime::RealRuntime;

    match cli.command {
        Commands::History(args) => {
            history(
                runtime,
                cli.working_dir,
                cli.api_url,
                cli.packagist_url,
                args.into(),
            )
            .await?
        }
    }
    Ok(())
}
