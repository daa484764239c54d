//! Summarize a pod manifest's container limits

use anyhow::Result;
use colored::Colorize;
use filter_lib::aggregator::summarize;
use std::path::Path;
use tabled::Tabled;

use super::load_work_item;
use crate::output::{format_resource, print_info, print_rows, OutputFormat};

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Total Limit")]
    total: String,
}

pub fn show_summary(path: &Path, format: OutputFormat) -> Result<()> {
    let work = load_work_item(path)?;
    let summary = summarize(&work);

    if let OutputFormat::Table = format {
        println!("{} {}", "Pod:".bold(), work.id().cyan());
        println!("Containers: {}", work.containers.len());
        if summary.totals.is_empty() {
            print_info("No container declares limits");
            return Ok(());
        }
    }

    let rows = summary
        .totals
        .iter()
        .map(|(resource, value)| SummaryRow {
            resource: resource.clone(),
            total: format_resource(resource, *value),
        })
        .collect();
    print_rows(rows, &summary, format);
    Ok(())
}
