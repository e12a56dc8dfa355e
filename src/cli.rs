use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for rowdeck
#[derive(Parser, Debug)]
#[command(version, about = "rowdeck")]
pub struct Args {
    /// Spreadsheet files to upload as one batch
    pub files: Vec<PathBuf>,

    /// Upload category lane (salesforce, cleaned, commission, referral)
    #[arg(long = "category", default_value = crate::category::SALESFORCE)]
    pub category: String,

    /// Override the processing service base URL from the config file
    #[arg(long = "service-url")]
    pub service_url: Option<String>,

    /// Slot to display after the batch completes (default: first)
    #[arg(long = "slot")]
    pub slot: Option<usize>,

    /// Search term applied to the displayed table
    #[arg(long = "search")]
    pub search: Option<String>,

    /// Column to sort by, ascending
    #[arg(long = "sort")]
    pub sort: Option<String>,

    /// Page size (one of the supported options: 10, 25, 50, 100)
    #[arg(long = "page-size")]
    pub page_size: Option<usize>,

    /// Page to display (0-based; out of range clamps)
    #[arg(long = "page")]
    pub page: Option<usize>,

    /// Also fetch and print chart series for the displayed slot
    #[arg(long = "charts", action)]
    pub charts: bool,
}
