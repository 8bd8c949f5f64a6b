use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use novelsync_cli::settings::{self, BrowserArgs};
use novelsync_cli::{OutputFormat, commands};
use novelsync_core::{NewTitle, TitleId};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "novelsync")]
#[command(author, version, about, long_about = None)]
#[command(
    about = "Keep a novel catalog in step with the site that publishes the chapters",
    long_about = "Novelsync tracks web-novel titles, compares the chapters published at the source \
                  site with those listed on the catalog, and submits the missing releases through \
                  the catalog's add-release form using a real Chrome session."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "pretty")]
    format: OutputFormat,

    /// Title store file (defaults to ~/.novelsync/titles.json)
    #[arg(long, global = true, env = "NOVELSYNC_STORE", value_name = "FILE")]
    store: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage tracked titles
    Titles {
        #[command(subcommand)]
        command: TitleCommands,
    },

    /// List chapters the source has that the catalog lacks (from the last refresh)
    Missing {
        /// Title id
        #[arg(value_name = "ID")]
        id: TitleId,
    },

    /// Scrape both sites and store fresh chapter snapshots
    Refresh {
        /// Title id
        #[arg(value_name = "ID")]
        id: TitleId,

        #[command(flatten)]
        browser: BrowserArgs,
    },

    /// Submit chapter releases to the catalog
    Submit {
        /// Title id
        #[arg(value_name = "ID")]
        id: TitleId,

        /// Chapter to submit, e.g. c16 or v2c77 (repeatable; all missing when omitted)
        #[arg(long = "chapter", value_name = "LABEL")]
        chapters: Vec<String>,

        #[command(flatten)]
        browser: BrowserArgs,
    },

    /// Generate shell completion scripts
    #[command(after_help = "SUPPORTED SHELLS:
    bash, zsh, fish, powershell, elvish

INSTALLATION:
    Bash:
        novelsync completion --shell bash > ~/.local/share/bash-completion/completions/novelsync
        # or add to ~/.bashrc:
        eval \"$(novelsync completion --shell bash)\"

    Zsh:
        novelsync completion --shell zsh > ~/.zfunc/_novelsync
        # then add to ~/.zshrc (before compinit):
        fpath=(~/.zfunc $fpath)

    Fish:
        novelsync completion --shell fish > ~/.config/fish/completions/novelsync.fish")]
    Completion {
        /// Shell to generate completions for
        #[arg(long, value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum TitleCommands {
    /// List tracked titles
    List,

    /// Start tracking a title
    Add {
        /// Display name
        #[arg(long)]
        name: String,

        /// Series page on the source site
        #[arg(long, value_name = "URL")]
        source_url: String,

        /// Series page on the catalog
        #[arg(long, value_name = "URL")]
        catalog_url: String,

        /// Translation group credited on releases
        #[arg(long, env = "NOVELSYNC_GROUP")]
        group: Option<String>,

        /// Catalog series id, skips the series live search
        #[arg(long, value_name = "ID")]
        series_id: Option<String>,

        /// Catalog group id, skips the group live search
        #[arg(long, value_name = "ID")]
        group_id: Option<String>,
    },

    /// Stop tracking a title
    Remove {
        /// Title id
        #[arg(value_name = "ID")]
        id: TitleId,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match cli.command {
        Commands::Titles { command } => {
            let store = settings::open_store(cli.store)?;
            match command {
                TitleCommands::List => commands::titles::list(&store, cli.format),
                TitleCommands::Add {
                    name,
                    source_url,
                    catalog_url,
                    group,
                    series_id,
                    group_id,
                } => commands::titles::add(
                    &store,
                    NewTitle {
                        name,
                        source_url,
                        catalog_url,
                        group_name: group,
                        catalog_series_id: series_id,
                        catalog_group_id: group_id,
                    },
                    cli.format,
                ),
                TitleCommands::Remove { id } => commands::titles::remove(&store, id),
            }
        }
        Commands::Missing { id } => {
            let pipeline = BrowserArgs::default().pipeline(settings::open_store(cli.store)?);
            commands::missing::execute(&pipeline, id, cli.format)
        }
        Commands::Refresh { id, browser } => {
            let pipeline = browser.pipeline(settings::open_store(cli.store)?);
            commands::refresh::execute(pipeline, id, cli.format)
        }
        Commands::Submit {
            id,
            chapters,
            browser,
        } => {
            let pipeline = browser.pipeline(settings::open_store(cli.store)?);
            commands::submit::execute(pipeline, id, &chapters, cli.format)
        }
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            commands::completion::execute(shell, &mut cmd)
        }
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new(
            "novelsync=debug,novelsync_cli=debug,novelsync_core=debug,novelsync_browser=debug,novelsync_pipeline=debug",
        )
    } else {
        EnvFilter::new("novelsync=info,novelsync_cli=info,novelsync_pipeline=info,novelsync_browser=warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}
