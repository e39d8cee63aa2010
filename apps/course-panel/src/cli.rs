use std::path::Path;

use anyhow::{Context, Result};
use course_db::Decision;
use course_db::models::registration::RegistrationFilter;

use crate::services::export_service::ExportService;
use crate::state::AppState;

pub async fn generate_codes(state: &AppState, reseller_id: &str, quantity: u32, ticket_type: &str) -> Result<()> {
    let codes = state
        .reseller_service
        .generate_codes(reseller_id, quantity, ticket_type)
        .await
        .with_context(|| format!("Failed to generate codes for reseller {}", reseller_id))?;

    for code in &codes {
        println!("{}", code.code);
    }
    eprintln!("{} codes issued to {}", codes.len(), reseller_id);
    Ok(())
}

/// Writes the CSV to `output`, or stdout when no path is given.
pub async fn export_registrations(state: &AppState, output: Option<&Path>) -> Result<()> {
    let regs = state
        .registrations
        .filter(&RegistrationFilter::default())
        .await
        .context("Failed to load registrations")?;
    let csv = ExportService::registrations_csv(&regs);

    match output {
        Some(path) => {
            tokio::fs::write(path, csv)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Exported {} registrations to {}", regs.len(), path.display());
        }
        None => print!("{}", csv),
    }
    Ok(())
}

/// Dry-run validation; nothing is recorded.
pub async fn check_code(state: &AppState, code: &str, requester: &str) -> Result<()> {
    match state.ledger.validate(code, requester).await? {
        Decision::Accepted => println!("{}: accepted", code),
        Decision::Rejected(reason) => println!("{}: rejected ({})", code, reason),
    }
    Ok(())
}
