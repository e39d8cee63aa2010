use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Months, Utc};
use course_db::CodeLedger;
use course_db::models::code::GeneratedCode;
use course_db::models::registration::PaymentMethod;
use course_db::models::reseller::{PayoutRequest, Reseller, Sale, SaleStatus};
use course_db::repositories::{ResellerRepository, SettingsRepository};
use serde::Serialize;
use tracing::info;

use super::analytics_service::percent;

const RECENT_SALES: usize = 10;
const PERFORMANCE_MONTHS: u32 = 6;
const SALE_ID_TAIL: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResellerStats {
    pub total_sales: usize,
    pub confirmed_commission: u32,
    pub pending_commission: u32,
    /// Sales per generated code, percent with one decimal.
    pub conversion_rate: f64,
    pub tickets_sold: usize,
    pub confirmed_amount: u32,
    pub generated_codes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyPerformance {
    /// `YYYY-MM`
    pub month: String,
    pub sales: usize,
    pub commission: u32,
}

/// A redeemed reseller code, as seen from the registration flow.
#[derive(Debug, Clone)]
pub struct CodeSale<'a> {
    pub reseller_id: &'a str,
    pub code: &'a str,
    pub student_name: String,
    pub student_email: String,
    pub requester_id: &'a str,
    /// Used only for batch entries issued without a stamped price.
    pub ticket_price: u32,
}

#[derive(Clone)]
pub struct ResellerService {
    ledger: Arc<CodeLedger>,
    repo: ResellerRepository,
    settings: SettingsRepository,
}

impl ResellerService {
    pub fn new(ledger: Arc<CodeLedger>, repo: ResellerRepository, settings: SettingsRepository) -> Self {
        Self { ledger, repo, settings }
    }

    pub async fn profile(&self, reseller_id: &str) -> Result<Reseller> {
        self.repo.profile_or_default(reseller_id).await
    }

    pub async fn save_profile(&self, reseller: &Reseller) -> Result<()> {
        self.repo.save_profile(reseller).await
    }

    pub async fn stats(&self, reseller_id: &str) -> Result<ResellerStats> {
        let sales = self.repo.sales(reseller_id).await?;
        let generated = self.repo.codes(reseller_id).await?.len();
        Ok(compute_stats(&sales, generated))
    }

    /// Issues `quantity` codes for the reseller, re-drawing any code that is
    /// already in their stored batch, and appends them to it. Each entry is
    /// stamped with the current ticket price and the reseller's commission.
    pub async fn generate_codes(&self, reseller_id: &str, quantity: u32, ticket_type: &str) -> Result<Vec<GeneratedCode>> {
        let reseller = self.profile(reseller_id).await?;
        let taken: HashSet<String> = self
            .repo
            .codes(reseller_id)
            .await?
            .into_iter()
            .map(|c| c.code)
            .collect();

        let mut codes = self
            .ledger
            .generate_avoiding(&reseller.name, quantity, ticket_type, &taken)?;

        let amount = self.settings.course().await?.ticket_price(ticket_type);
        let commission = reseller.commission_for(amount);
        for code in &mut codes {
            code.amount = amount;
            code.commission = commission;
        }

        self.repo
            .append_codes(reseller_id, &codes)
            .await
            .context("Failed to store generated batch")?;

        info!("Reseller {} generated {} {} codes", reseller_id, codes.len(), ticket_type);
        Ok(codes)
    }

    pub async fn codes(&self, reseller_id: &str) -> Result<Vec<GeneratedCode>> {
        self.repo.codes(reseller_id).await
    }

    pub async fn find_code(&self, reseller_id: &str, code: &str) -> Result<Option<GeneratedCode>> {
        Ok(self.repo.codes(reseller_id).await?.into_iter().find(|c| c.code == code))
    }

    pub async fn sales(&self, reseller_id: &str) -> Result<Vec<Sale>> {
        self.repo.sales(reseller_id).await
    }

    pub async fn recent_sales(&self, reseller_id: &str) -> Result<Vec<Sale>> {
        let mut sales = self.repo.sales(reseller_id).await?;
        sales.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        sales.truncate(RECENT_SALES);
        Ok(sales)
    }

    pub async fn monthly_performance(&self, reseller_id: &str, now: DateTime<Utc>) -> Result<Vec<MonthlyPerformance>> {
        let sales = self.repo.sales(reseller_id).await?;
        Ok(monthly_performance(&sales, now))
    }

    /// Flips the batch entry to used and books the sale at the price stamped
    /// on the entry. Codes that are not in this reseller's batch, or were
    /// already used, book nothing.
    pub async fn record_code_sale(&self, sale: CodeSale<'_>, at: DateTime<Utc>) -> Result<Option<Sale>> {
        let Some(entry) = self
            .repo
            .mark_code_used(sale.reseller_id, sale.code, sale.requester_id, at)
            .await?
        else {
            return Ok(None);
        };

        let (amount, commission) = if entry.amount > 0 {
            (entry.amount, entry.commission)
        } else {
            let reseller = self.profile(sale.reseller_id).await?;
            (sale.ticket_price, reseller.commission_for(sale.ticket_price))
        };

        let booked = Sale {
            id: format!("SALE_{}_{}", at.timestamp_millis(), self.ledger.token(SALE_ID_TAIL)),
            code: sale.code.to_string(),
            student_name: sale.student_name,
            student_email: sale.student_email,
            amount,
            commission,
            status: SaleStatus::Confirmed,
            timestamp: at,
            payment_method: PaymentMethod::Cash,
        };
        self.repo.append_sale(sale.reseller_id, booked.clone()).await?;

        info!("Booked sale of {} for reseller {}", booked.code, sale.reseller_id);
        Ok(Some(booked))
    }

    /// Requests payout of the confirmed commission. `None` when there is
    /// nothing to pay out.
    pub async fn request_payout(&self, reseller_id: &str, now: DateTime<Utc>) -> Result<Option<PayoutRequest>> {
        let stats = self.stats(reseller_id).await?;
        if stats.confirmed_commission == 0 {
            return Ok(None);
        }

        let payout = PayoutRequest {
            reseller_id: reseller_id.to_string(),
            amount: stats.confirmed_commission,
            timestamp: now,
        };
        self.repo.append_payout(payout.clone()).await?;

        info!("Payout requested by {}: ${}", reseller_id, payout.amount);
        Ok(Some(payout))
    }
}

pub fn compute_stats(sales: &[Sale], generated_codes: usize) -> ResellerStats {
    let confirmed: Vec<&Sale> = sales.iter().filter(|s| s.status == SaleStatus::Confirmed).collect();
    let pending_commission = sales
        .iter()
        .filter(|s| s.status == SaleStatus::Pending)
        .map(|s| s.commission)
        .sum();

    ResellerStats {
        total_sales: sales.len(),
        confirmed_commission: confirmed.iter().map(|s| s.commission).sum(),
        pending_commission,
        conversion_rate: percent(sales.len(), generated_codes),
        tickets_sold: confirmed.len(),
        confirmed_amount: confirmed.iter().map(|s| s.amount).sum(),
        generated_codes,
    }
}

/// Confirmed sales and commission for the current month and the five before
/// it, oldest first.
pub fn monthly_performance(sales: &[Sale], now: DateTime<Utc>) -> Vec<MonthlyPerformance> {
    let mut buckets: BTreeMap<(i32, u32), (usize, u32)> = BTreeMap::new();
    let current = now.date_naive().with_day(1).unwrap_or(now.date_naive());

    for back in 0..PERFORMANCE_MONTHS {
        if let Some(month) = current.checked_sub_months(Months::new(back)) {
            buckets.insert((month.year(), month.month()), (0, 0));
        }
    }

    for sale in sales.iter().filter(|s| s.status == SaleStatus::Confirmed) {
        let key = (sale.timestamp.year(), sale.timestamp.month());
        if let Some((count, commission)) = buckets.get_mut(&key) {
            *count += 1;
            *commission += sale.commission;
        }
    }

    buckets
        .into_iter()
        .map(|((year, month), (sales, commission))| MonthlyPerformance {
            month: format!("{:04}-{:02}", year, month),
            sales,
            commission,
        })
        .collect()
}
