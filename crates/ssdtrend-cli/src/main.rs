//! CLI for ssdtrend: SSD telemetry snapshots in, aligned time series out.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ssdtrend")]
#[command(about = "ssdtrend: SSD telemetry snapshots in, aligned time series out")]
#[command(version = ssdtrend_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a snapshot directory into canonical time-series files
    Ingest {
        /// JSON pipeline configuration; flags below override it
        #[arg(long)]
        config: Option<String>,

        /// Directory of snapshot dumps
        #[arg(long)]
        input: Option<String>,

        /// Directory for the canonical files and manifest
        #[arg(long)]
        output: Option<String>,

        /// Reject the corpus when an object's empty-field share reaches this
        #[arg(long)]
        threshold: Option<f64>,

        /// Header object id (e.g. uid-240)
        #[arg(long)]
        header: Option<String>,

        /// Field path construction
        #[arg(long, value_parser = ["nested", "flat"])]
        parse_mode: Option<String>,

        /// Base name of the output files
        #[arg(long)]
        stem: Option<String>,

        /// Print the run manifest as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Summarise a canonical .ini or .tsv file
    Inspect {
        /// Canonical file to read
        path: String,

        /// Show the fields of a single object (e.g. uid-7)
        #[arg(long)]
        object: Option<String>,

        /// Also print the device signature from the header object
        #[arg(long)]
        header: Option<String>,

        /// With --object, print the object as a nested JSON tree
        #[arg(long)]
        json: bool,
    },

    /// Matrix profile, discords, motifs and stationarity per object
    Profile {
        /// Canonical file to read
        path: String,

        /// JSON pipeline configuration for defaults
        #[arg(long)]
        config: Option<String>,

        /// Comma-separated object ids; default: every object
        #[arg(long)]
        objects: Option<String>,

        /// Subsequence window
        #[arg(long)]
        window: Option<usize>,

        /// Discords and motifs reported per series
        #[arg(long, default_value = "3")]
        top_k: usize,

        /// Per-object deadline in seconds
        #[arg(long)]
        timeout_sec: Option<u64>,

        /// Write the full report as JSON
        #[arg(long)]
        output: Option<String>,

        /// Install the profiles as `<field>@mp<w>` series and write canonical files here
        #[arg(long)]
        install: Option<String>,
    },

    /// Drop constant and stationary series from a canonical file
    Prune {
        /// Canonical file to read
        path: String,

        /// Directory for the pruned canonical files
        #[arg(long, default_value = ".")]
        output: String,

        /// Base name of the pruned files
        #[arg(long, default_value = "time-series-pruned")]
        stem: String,

        /// ADF p-value above which a series counts as stationary
        #[arg(long, default_value = "0.05")]
        p_value: f64,

        /// Report the classification without writing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Fit an autoregressive model to one series and score it on a temporal split
    Forecast {
        /// Canonical file to read
        path: String,

        /// Object id (e.g. uid-7)
        #[arg(long)]
        object: String,

        /// Dotted field path
        #[arg(long)]
        field: String,

        /// JSON pipeline configuration for split ratios and gate threshold
        #[arg(long)]
        config: Option<String>,

        /// Autoregressive order
        #[arg(long, default_value = "2")]
        order: usize,

        /// Feed the matrix profile of this window instead of raw values
        #[arg(long)]
        mp_window: Option<usize>,

        /// Steps to forecast past the end of the series
        #[arg(long, default_value = "0")]
        horizon: usize,
    },

    /// Merge per-snapshot event logs (*_NLOG.txt) into one
    Nlog {
        /// Directory holding the event logs
        #[arg(long, default_value = ".")]
        input: String,

        /// Directory for the merged log
        #[arg(long)]
        output: Option<String>,

        /// Base name of the merged log
        #[arg(long, default_value = "time-series")]
        stem: String,
    },

    /// Rename legacy YYYYMMDDHHMMSSffffff_<a>_<b>.bin snapshots
    Rename {
        /// Directory holding the snapshots
        #[arg(default_value = ".")]
        dir: String,

        /// Print the renames without applying them
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ingest {
            config,
            input,
            output,
            threshold,
            header,
            parse_mode,
            stem,
            json,
        } => commands::ingest::run(commands::ingest::IngestCommandConfig {
            config_path: config.as_deref(),
            input: input.as_deref(),
            output: output.as_deref(),
            threshold,
            header: header.as_deref(),
            parse_mode: parse_mode.as_deref(),
            stem: stem.as_deref(),
            json,
        }),
        Commands::Inspect {
            path,
            object,
            header,
            json,
        } => commands::inspect::run(&path, object.as_deref(), header.as_deref(), json),
        Commands::Profile {
            path,
            config,
            objects,
            window,
            top_k,
            timeout_sec,
            output,
            install,
        } => commands::profile::run(commands::profile::ProfileCommandConfig {
            path: &path,
            config_path: config.as_deref(),
            objects: objects.as_deref(),
            window,
            top_k,
            timeout_sec,
            output_path: output.as_deref(),
            install_dir: install.as_deref(),
        }),
        Commands::Prune {
            path,
            output,
            stem,
            p_value,
            dry_run,
        } => commands::prune::run(&path, &output, &stem, p_value, dry_run),
        Commands::Forecast {
            path,
            object,
            field,
            config,
            order,
            mp_window,
            horizon,
        } => commands::forecast::run(commands::forecast::ForecastCommandConfig {
            path: &path,
            object: &object,
            field: &field,
            config_path: config.as_deref(),
            order,
            mp_window,
            horizon,
        }),
        Commands::Nlog {
            input,
            output,
            stem,
        } => commands::nlog::run(&input, output.as_deref().unwrap_or(&input), &stem),
        Commands::Rename { dir, dry_run } => commands::rename::run(&dir, dry_run),
    }
}
