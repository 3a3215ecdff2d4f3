use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "asl-cards",
    version,
    about = "Extract ASL vehicle and ordnance cards from PDF card sheets"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract cards and store them in the card database.
    Analyze(AnalyzeArgs),
    /// Extract cards and print them without touching a database.
    Parse(ParseArgs),
    /// Print the stored cards grouped by nationality.
    Dump(DumpArgs),
    Status(StatusArgs),
}

/// Engine settings shared by `analyze` and `parse`.
#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    /// A card PDF, or a directory of them.
    #[arg(long)]
    pub cards: PathBuf,

    /// Directory holding `<stem>.txt` override indexes.
    #[arg(long)]
    pub index_dir: Option<PathBuf>,

    /// Scratch directory for rendered pages.
    #[arg(long)]
    pub work_dir: Option<PathBuf>,

    /// Raster resolution for card images, in dpi.
    #[arg(long, value_enum, default_value_t = Resolution::Dpi300)]
    pub resolution: Resolution,

    /// Skip page rasterization and card images.
    #[arg(long, default_value_t = false, conflicts_with = "resolution")]
    pub no_images: bool,

    #[arg(long)]
    pub max_pages: Option<usize>,

    /// What to do when a file has no override index.
    #[arg(long, value_enum, default_value_t = LayoutFallback::Ask)]
    pub layout_fallback: LayoutFallback,

    /// Report failed files and continue with the rest of the batch.
    #[arg(long, default_value_t = false)]
    pub keep_going: bool,
}

impl ExtractArgs {
    pub fn image_resolution(&self) -> Option<u32> {
        (!self.no_images).then_some(self.resolution.dpi())
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum Resolution {
    #[value(name = "150")]
    Dpi150,
    #[value(name = "300")]
    Dpi300,
    #[value(name = "600")]
    Dpi600,
}

impl Resolution {
    pub fn dpi(self) -> u32 {
        match self {
            Self::Dpi150 => 150,
            Self::Dpi300 => 300,
            Self::Dpi600 => 600,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum LayoutFallback {
    Ask,
    Always,
    Never,
}

impl LayoutFallback {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ask => "ask",
            Self::Always => "always",
            Self::Never => "never",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub extract: ExtractArgs,

    #[arg(long, default_value = "asl-cards.db")]
    pub db: PathBuf,

    /// Keep previously stored cards instead of clearing them first.
    #[arg(long, default_value_t = false)]
    pub append: bool,

    /// Delete the database file and recreate its schema before analyzing.
    #[arg(long, default_value_t = false, conflicts_with = "append")]
    pub reset_db: bool,

    /// Run manifest path; defaults to `<db>.run.json`.
    #[arg(long)]
    pub manifest: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ParseArgs {
    #[command(flatten)]
    pub extract: ExtractArgs,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct DumpArgs {
    #[arg(long, default_value = "asl-cards.db")]
    pub db: PathBuf,

    /// Directory holding `natinfo.json` and `flags/`.
    #[arg(long)]
    pub natinfo_dir: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = "asl-cards.db")]
    pub db: PathBuf,
}
