use clap::Parser;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use tracing_subscriber::EnvFilter;

use rowdeck::analytics::HttpAnalyticsClient;
use rowdeck::cli::Args;
use rowdeck::config::ConfigManager;
use rowdeck::query::{cell_text, PageLabel, TablePage};
use rowdeck::slot::SlotState;
use rowdeck::upload::{HttpIngestClient, UploadFile};
use rowdeck::Session;

fn print_page(columns: &[String], page: &TablePage) {
    println!("{}", columns.join(" | "));
    for row in &page.rows {
        let cells: Vec<String> = columns.iter().map(|c| cell_text(row.get(c))).collect();
        println!("{}", cells.join(" | "));
    }
    println!(
        "{} rows, page {}/{}",
        page.total_filtered,
        page.page_index + 1,
        page.total_pages.max(1)
    );
    let pager: Vec<String> = page
        .page_labels
        .iter()
        .map(|label| match label {
            PageLabel::Page(i) if *i == page.page_index => format!("[{}]", i + 1),
            PageLabel::Page(i) => format!("{}", i + 1),
            PageLabel::Gap => "…".to_string(),
        })
        .collect();
    if !pager.is_empty() {
        println!("pages: {}", pager.join(" "));
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rowdeck=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if args.files.is_empty() {
        return Err(eyre!("no files given"));
    }

    let config = ConfigManager::new("rowdeck")?.load()?;
    let base_url = args
        .service_url
        .unwrap_or_else(|| config.service.base_url.clone());

    let files = args
        .files
        .iter()
        .map(|path| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| eyre!("not a file: {}", path.display()))?;
            Ok(UploadFile::new(name, std::fs::read(path)?))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut session = Session::new(
        HttpIngestClient::new(&base_url),
        HttpAnalyticsClient::new(&base_url),
        config.upload.max_files,
        config.upload.allowed_extensions.clone(),
    );

    let handles = session
        .start_batch(&args.category, files)
        .map_err(|e| eyre!(e))?;
    for handle in handles {
        handle.await?;
    }

    for (i, slot) in session.slots(&args.category).iter().enumerate() {
        match &slot.state {
            SlotState::Ready(data) => {
                println!("[{i}] {}: {} rows", slot.filename, data.total_rows)
            }
            SlotState::Failed(message) => println!("[{i}] {}: error: {message}", slot.filename),
            SlotState::Loading => println!("[{i}] {}: still loading", slot.filename),
        }
    }

    if let Some(index) = args.slot {
        session.set_selected(&args.category, index);
    }
    session.set_page_size(&args.category, args.page_size.unwrap_or(config.table.page_size));
    if let Some(term) = args.search {
        session.set_search(&args.category, term);
    }
    if let Some(column) = args.sort {
        session.toggle_sort(&args.category, &column);
    }
    if let Some(page) = args.page {
        session.set_page(&args.category, page);
    }

    if let (Some(columns), Some(page)) = (
        session.selected_columns(&args.category),
        session.render(&args.category),
    ) {
        println!();
        print_page(&columns, &page);
    }

    if args.charts {
        match session.charts(&args.category).await {
            Ok(Some(entry)) => {
                if entry.bundle.is_empty() {
                    println!("no chart series for this slot");
                } else {
                    if let Some(line) = &entry.bundle.line {
                        println!("line: {} points", line.labels.len());
                    }
                    if let Some(bar) = &entry.bundle.bar {
                        println!("bar: {} points", bar.labels.len());
                    }
                    for (i, pie) in entry.bundle.pies.iter().enumerate() {
                        println!("pie {}: {} slices", i, pie.slices.len());
                    }
                }
            }
            Ok(None) => println!("no slot data for charts"),
            // Table data stays usable; chart fetch can simply be retried.
            Err(err) => eprintln!("charts unavailable: {err}"),
        }
    }

    Ok(())
}
