use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "sc", about = concat!("shortcuts v", env!("CARGO_PKG_VERSION"), " - links, snippets and folders"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Use a different data directory
    #[arg(short = 'C', long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,

    /// More diagnostics on stderr (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the data directory and a default config
    Init(InitArgs),
    /// Show the folder tree
    List(ListArgs),
    /// Show one item
    Show(ShowArgs),
    /// Add a link, snippet or folder
    Add(AddCmd),
    /// Change an item's title, url or content
    Edit(EditArgs),
    /// Move an item to another folder or to root
    Mv(MvArgs),
    /// Delete an item (folders take their contents with them)
    Rm(RmArgs),
    /// Open or close a folder
    Toggle(ToggleArgs),
    /// Import items from a JSON array
    Import(ImportArgs),
    /// Print the collection as JSON
    Export(ExportArgs),
    /// Attach a data file that other programs can edit
    Attach(AttachArgs),
    /// Show where data is stored
    Status,
    /// Poll the attached file and report outside edits
    Watch(WatchArgs),
    /// Validate the collection
    Check,
    /// Search titles, urls and contents by regex
    Search(SearchArgs),
    /// List folders an item can be moved into
    Folders(FoldersArgs),
    /// View or manage the recovery log
    Recovery(RecoveryCmd),
}

#[derive(Args)]
pub struct InitArgs {
    /// Overwrite an existing config
    #[arg(long)]
    pub force: bool,
}

// ---------------------------------------------------------------------------
// Read command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ListArgs {
    /// Only show this folder's contents
    #[arg(long)]
    pub folder: Option<String>,
    /// Expand closed folders too
    #[arg(long)]
    pub all: bool,
}

#[derive(Args)]
pub struct ShowArgs {
    /// Item ID to show
    pub id: String,
}

#[derive(Args)]
pub struct SearchArgs {
    /// Regex pattern (case-insensitive; invalid patterns match literally)
    pub pattern: String,
}

#[derive(Args)]
pub struct FoldersArgs {
    /// Leave out this folder and everything under it
    #[arg(long)]
    pub exclude: Option<String>,
}

// ---------------------------------------------------------------------------
// Write command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct AddCmd {
    #[command(subcommand)]
    pub kind: AddKind,
}

#[derive(Subcommand)]
pub enum AddKind {
    /// Add a link
    Link(AddLinkArgs),
    /// Add a text snippet
    Snippet(AddSnippetArgs),
    /// Add a folder
    Folder(AddFolderArgs),
}

#[derive(Args)]
pub struct AddLinkArgs {
    pub title: String,
    pub url: String,
    /// Folder to add into (default: root)
    #[arg(long)]
    pub parent: Option<String>,
}

#[derive(Args)]
pub struct AddSnippetArgs {
    pub title: String,
    /// Snippet text ("-" reads stdin)
    pub content: String,
    /// Optional source url
    #[arg(long)]
    pub url: Option<String>,
    /// Folder to add into (default: root)
    #[arg(long)]
    pub parent: Option<String>,
}

#[derive(Args)]
pub struct AddFolderArgs {
    pub title: String,
    /// Folder to add into (default: root)
    #[arg(long)]
    pub parent: Option<String>,
    /// Create the folder closed
    #[arg(long)]
    pub closed: bool,
}

#[derive(Args)]
pub struct EditArgs {
    /// Item ID to edit
    pub id: String,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long, conflicts_with = "clear_url")]
    pub url: Option<String>,
    /// New snippet text ("-" reads stdin)
    #[arg(long)]
    pub content: Option<String>,
    /// Remove a snippet's url
    #[arg(long)]
    pub clear_url: bool,
}

#[derive(Args)]
pub struct MvArgs {
    /// Item ID to move
    pub id: String,
    /// Destination folder
    #[arg(long, conflicts_with = "root", required_unless_present = "root")]
    pub parent: Option<String>,
    /// Move to the top level
    #[arg(long)]
    pub root: bool,
}

#[derive(Args)]
pub struct RmArgs {
    /// Item ID to delete
    pub id: String,
}

#[derive(Args)]
pub struct ToggleArgs {
    /// Folder ID
    pub id: String,
}

#[derive(Args)]
pub struct ImportArgs {
    /// JSON file to import ("-" or nothing reads stdin)
    pub file: Option<PathBuf>,
}

#[derive(Args)]
pub struct ExportArgs {
    /// Write to a file instead of stdout
    #[arg(long, short)]
    pub out: Option<PathBuf>,
}

#[derive(Args)]
pub struct AttachArgs {
    /// Data file, or a directory to create the default file in
    pub path: PathBuf,
}

#[derive(Args)]
pub struct WatchArgs {
    /// Stop after this many polls (default: run until interrupted)
    #[arg(long)]
    pub ticks: Option<u64>,
}

// ---------------------------------------------------------------------------
// Recovery log
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct RecoveryCmd {
    #[command(subcommand)]
    pub action: Option<RecoveryAction>,
    /// Maximum number of entries to show (default: 10)
    #[arg(long)]
    pub limit: Option<usize>,
    /// Show entries after this timestamp (ISO-8601)
    #[arg(long)]
    pub since: Option<String>,
}

#[derive(Subcommand)]
pub enum RecoveryAction {
    /// Remove old entries
    Prune(RecoveryPruneArgs),
    /// Print the absolute path to the recovery log
    Path,
}

#[derive(Args)]
pub struct RecoveryPruneArgs {
    /// Remove entries older than this timestamp (default: 30 days ago)
    #[arg(long)]
    pub before: Option<String>,
    /// Remove all entries
    #[arg(long)]
    pub all: bool,
}
