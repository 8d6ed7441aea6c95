use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::path::PathBuf;

mod commands;

/// modbridge - resolve and vet unit dependencies across game mod archives
#[derive(Parser)]
#[command(name = "modbridge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Where assets come from
#[derive(Args, Clone, Debug, Default)]
pub struct SourceArgs {
    /// Archive file or directory of archives (repeatable; defaults to configured search paths)
    #[arg(short, long = "archive", value_name = "PATH")]
    pub archives: Vec<PathBuf>,

    /// Loose asset directory probed when the archives lack an asset
    #[arg(long, value_name = "DIR")]
    pub asset_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List entries of the mounted archives
    List {
        #[command(flatten)]
        sources: SourceArgs,

        /// Only show names containing this text (case-insensitive)
        #[arg(short, long)]
        filter: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Extract one entry from the mounted archives
    Extract {
        /// Entry name (e.g., Data\INI\Object\AmericaInfantry.ini)
        name: String,

        /// Output file (defaults to the entry's file name in the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        sources: SourceArgs,
    },

    /// Build an archive from a directory
    Pack {
        /// Directory whose files become entries
        dir: PathBuf,

        /// Archive to write
        output: PathBuf,

        /// Prefix entry names with the priority marker
        #[arg(long)]
        priority: bool,
    },

    /// Resolve and print the dependency tree of a unit
    Analyze {
        #[command(flatten)]
        unit: UnitArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resolve a unit and run the acceptance policy on it
    Check {
        #[command(flatten)]
        unit: UnitArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resolve a weapon chain and check it for completeness
    Weapon {
        /// Definition file on disk or archive entry name
        definitions: String,

        /// Weapon name
        weapon: String,

        #[command(flatten)]
        sources: SourceArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Clone, Debug)]
pub struct UnitArgs {
    /// Definition file on disk or archive entry name
    pub definitions: String,

    /// Object name of the unit
    pub object: String,

    /// Unit identifier reported in results (defaults to the object name)
    #[arg(long)]
    pub id: Option<String>,

    /// Expand referenced assets through their own definitions
    #[arg(long)]
    pub follow: bool,

    /// Deepest dependency level (defaults to the configured value)
    #[arg(long)]
    pub max_depth: Option<usize>,

    #[command(flatten)]
    pub sources: SourceArgs,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Print the configuration file path
    Path,
}

fn main() {
    let cli = Cli::parse();

    commands::init_logging(cli.verbose);

    let result = match cli.command {
        Commands::List {
            sources,
            filter,
            json,
        } => commands::list::run(&sources, filter.as_deref(), json),
        Commands::Extract {
            name,
            output,
            sources,
        } => commands::extract::run(&name, output, &sources),
        Commands::Pack {
            dir,
            output,
            priority,
        } => commands::pack::run(&dir, &output, priority),
        Commands::Analyze { unit, json } => commands::analyze::run(&unit, json),
        Commands::Check { unit, json } => commands::check::run(&unit, json),
        Commands::Weapon {
            definitions,
            weapon,
            sources,
            json,
        } => commands::weapon::run(&definitions, &weapon, &sources, json),
        Commands::Config { action } => commands::config::run(&action),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "modbridge", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        if let Some(rejected) = e.downcast_ref::<commands::Rejected>() {
            eprintln!("{}", rejected);
            std::process::exit(commands::EXIT_REJECTED);
        }
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
