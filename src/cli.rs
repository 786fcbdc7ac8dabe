use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

#[derive(Debug, Parser)]
#[command(
    name = "attache",
    about = "Suggests which local files to attach for a given context"
)]
pub struct Cli {
    /// Override the XDG data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage watched root directories
    Root {
        #[command(subcommand)]
        action: RootAction,
    },
    /// Reconcile the index with the current files (incremental)
    Sync,
    /// Re-index everything from scratch
    Rebuild,
    /// Rank candidate files for a query context
    Suggest(SuggestArgs),
    /// Record and inspect file-selection history
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
    /// Configure automatic rescans
    Rescan {
        #[command(subcommand)]
        action: RescanAction,
    },
    /// Retrieve an indexed file's metadata and preview
    Get(GetArgs),
    /// Show index status and statistics
    Status(StatusArgs),
    /// Run scheduled rescans in the foreground
    Watch,
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Root subcommands --

#[derive(Debug, Subcommand)]
pub enum RootAction {
    /// Register a directory as a named root and index its contents
    Add {
        /// Path to the directory
        path: PathBuf,
        /// Human-readable root name
        #[arg(long)]
        name: String,
        /// Glob patterns to exclude (repeatable)
        #[arg(long = "exclude")]
        excludes: Vec<String>,
    },
    /// Remove a root and all its indexed data
    Remove {
        /// Name of the root to remove
        name: String,
    },
    /// List all registered roots
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

// -- Suggest --

#[derive(Debug, Parser)]
pub struct SuggestArgs {
    /// The query context (page text, prompt, field label, ...)
    pub context: String,

    /// Number of suggestions to return
    #[arg(short = 'n', long, default_value = "5")]
    pub count: usize,

    /// Destination site, for usage-history boosting
    #[arg(short = 's', long)]
    pub site: Option<String>,

    /// Only suggest files of this kind (text, document, image, other)
    #[arg(short = 'k', long)]
    pub kind: Option<String>,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

// -- History subcommands --

#[derive(Debug, Subcommand)]
pub enum HistoryAction {
    /// Record that a file was selected for a site
    Add {
        /// File reference: relative path, root:path, or #doc-id
        reference: String,
        /// Destination site identifier
        #[arg(short = 's', long)]
        site: String,
        /// Destination page URL
        #[arg(long, default_value = "")]
        url: String,
        /// Destination page title
        #[arg(long, default_value = "")]
        title: String,
        /// Free-text context captured at selection time
        #[arg(long, default_value = "")]
        context: String,
    },
    /// List recorded selections for a site
    List {
        /// Destination site identifier
        #[arg(short = 's', long)]
        site: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

// -- Rescan subcommands --

#[derive(Debug, Subcommand)]
pub enum RescanAction {
    /// Enable automatic rescans
    Enable,
    /// Disable automatic rescans
    Disable,
    /// Set the rescan interval in seconds
    Interval {
        secs: u64,
    },
    /// Show the current rescan configuration
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

// -- Get --

#[derive(Debug, Parser)]
pub struct GetArgs {
    /// File reference: relative path, root:path, or #doc-id
    pub reference: String,

    /// Print only metadata
    #[arg(long)]
    pub meta: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Status --

#[derive(Debug, Parser)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "attache",
            &mut std::io::stdout(),
        );
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn parse_suggest_defaults() {
        let cli = Cli::parse_from(["attache", "suggest", "upload your resume"]);
        match cli.command {
            Command::Suggest(args) => {
                assert_eq!(args.context, "upload your resume");
                assert_eq!(args.count, 5);
                assert!(args.site.is_none());
                assert!(args.kind.is_none());
                assert!(!args.json);
            }
            _ => panic!("expected suggest command"),
        }
    }

    #[test]
    fn parse_root_add_with_excludes() {
        let cli = Cli::parse_from([
            "attache", "root", "add", "/tmp/files", "--name", "home",
            "--exclude", "*.log", "--exclude", "target",
        ]);
        match cli.command {
            Command::Root {
                action: RootAction::Add {
                    path,
                    name,
                    excludes,
                },
            } => {
                assert_eq!(path, PathBuf::from("/tmp/files"));
                assert_eq!(name, "home");
                assert_eq!(excludes, vec!["*.log", "target"]);
            }
            _ => panic!("expected root add command"),
        }
    }

    #[test]
    fn parse_history_add() {
        let cli = Cli::parse_from([
            "attache", "history", "add", "resume/CV.pdf", "--site",
            "jobs.example",
        ]);
        match cli.command {
            Command::History {
                action: HistoryAction::Add { reference, site, .. },
            } => {
                assert_eq!(reference, "resume/CV.pdf");
                assert_eq!(site, "jobs.example");
            }
            _ => panic!("expected history add command"),
        }
    }
}
