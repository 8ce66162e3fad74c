mod commands;
mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "fieldscan",
    version,
    about = "Extract text from fixed page regions of scanned documents into a spreadsheet"
)]
struct Cli {
    /// Directory holding roi_sets.json and exclusions.json
    #[arg(long, global = true, env = "FIELDSCAN_STORE_DIR", value_name = "DIR")]
    store_dir: Option<PathBuf>,

    /// More log output (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run region OCR over documents and append the values to a workbook
    Extract {
        /// PDF or image files, processed in the given order
        #[arg(required = true)]
        documents: Vec<PathBuf>,

        /// Region set to apply to every page
        #[arg(short, long = "set", value_name = "NAME")]
        set: String,

        /// Region to column mapping, e.g. Name=A or 품명=품명 (repeatable)
        #[arg(short, long = "map", value_name = "NAME=COLUMN")]
        map: Vec<String>,

        /// JSON file with a { "region": "column" } mapping
        #[arg(long, value_name = "FILE")]
        mapping: Option<PathBuf>,

        /// JSON extraction config (dpi, recognizer, row_band, preprocess, ...)
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Workbook to append to; it is never modified in place
        #[arg(short, long, value_name = "XLSX")]
        template: Option<PathBuf>,

        /// Target sheet (default: first sheet)
        #[arg(long, value_name = "NAME")]
        sheet: Option<String>,

        /// Output workbook path
        #[arg(short = 'O', long = "out", value_name = "FILE", conflicts_with = "out_dir")]
        out: Option<PathBuf>,

        /// Directory for a timestamped output workbook
        #[arg(long, value_name = "DIR")]
        out_dir: Option<PathBuf>,

        /// Rendering DPI; must match the DPI the regions were drawn at
        #[arg(long)]
        dpi: Option<u32>,

        /// Tesseract language(s), e.g. kor+eng
        #[arg(long)]
        lang: Option<String>,

        /// Recognize regions one at a time
        #[arg(long)]
        sequential: bool,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,
    },
    /// Manage region sets
    Sets {
        #[command(subcommand)]
        action: SetsAction,
    },
    /// Manage exclusion strings and linked-field rules
    Exclusions {
        #[command(subcommand)]
        action: ExclusionsAction,
    },
}

#[derive(Subcommand)]
enum SetsAction {
    /// List stored region sets
    List,
    /// Show the regions of a set
    Show {
        name: String,
        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,
    },
    /// Import sets from a roi_sets.json file, replacing sets with the same name
    Import { file: PathBuf },
    /// Delete a set
    Delete { name: String },
    /// Validate a roi_sets.json file without importing it
    Validate { file: PathBuf },
}

#[derive(Subcommand)]
enum ExclusionsAction {
    /// List exclusion strings and rules
    List,
    /// Add exclusion strings
    Add {
        #[arg(required = true)]
        texts: Vec<String>,
    },
    /// Remove an exclusion string
    Remove { text: String },
    /// Add every value in column A of the first sheet of a workbook
    ImportXlsx { file: PathBuf },
    /// Blank FIELD and its linked fields when FIELD contains TEXT
    Link {
        #[arg(long)]
        field: String,
        #[arg(long)]
        text: String,
        /// Fields blanked together with FIELD (repeatable)
        #[arg(long = "linked", value_name = "FIELD")]
        linked: Vec<String>,
    },
    /// Remove a linked-field rule
    Unlink {
        #[arg(long)]
        field: String,
        #[arg(long)]
        text: String,
    },
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let store_dir = cli
        .store_dir
        .unwrap_or_else(fieldscan_core::config::default_store_dir);

    let result = match cli.command {
        Commands::Extract {
            documents,
            set,
            map,
            mapping,
            config,
            template,
            sheet,
            out,
            out_dir,
            dpi,
            lang,
            sequential,
            output,
        } => commands::extract::run(commands::extract::ExtractArgs {
            store_dir,
            documents,
            set,
            map,
            mapping,
            config,
            template,
            sheet,
            out,
            out_dir,
            dpi,
            lang,
            sequential,
            output,
        }),
        Commands::Sets { action } => match action {
            SetsAction::List => commands::sets::list(&store_dir),
            SetsAction::Show { name, output } => commands::sets::show(&store_dir, &name, &output),
            SetsAction::Import { file } => commands::sets::import(&store_dir, &file),
            SetsAction::Delete { name } => commands::sets::delete(&store_dir, &name),
            SetsAction::Validate { file } => commands::sets::validate(&file),
        },
        Commands::Exclusions { action } => match action {
            ExclusionsAction::List => commands::exclusions::list(&store_dir),
            ExclusionsAction::Add { texts } => commands::exclusions::add(&store_dir, &texts),
            ExclusionsAction::Remove { text } => commands::exclusions::remove(&store_dir, &text),
            ExclusionsAction::ImportXlsx { file } => {
                commands::exclusions::import_xlsx(&store_dir, &file)
            }
            ExclusionsAction::Link {
                field,
                text,
                linked,
            } => commands::exclusions::link(&store_dir, field, text, linked),
            ExclusionsAction::Unlink { field, text } => {
                commands::exclusions::unlink(&store_dir, &field, &text)
            }
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
