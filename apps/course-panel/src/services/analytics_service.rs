use std::collections::BTreeMap;

use anyhow::Result;
use chrono::{Days, NaiveDate, Utc};
use course_db::models::registration::{Registration, RegistrationType};
use course_db::repositories::RegistrationRepository;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub total_registrations: usize,
    pub paid_registrations: usize,
    pub total_revenue: u64,
    /// Paid share of all registrations, percent with one decimal.
    pub conversion_rate: f64,
    pub by_type: BTreeMap<String, usize>,
    pub by_country: BTreeMap<String, usize>,
    pub timeline: Vec<DailyCount>,
    pub last_7_days: Vec<DailyCount>,
    pub revenue_by_type: BTreeMap<String, u64>,
}

#[derive(Clone)]
pub struct AnalyticsService {
    registrations: RegistrationRepository,
}

impl AnalyticsService {
    pub fn new(registrations: RegistrationRepository) -> Self {
        Self { registrations }
    }

    pub async fn dashboard_stats(&self) -> Result<DashboardStats> {
        let regs = self.registrations.list().await?;
        Ok(compute_stats(&regs, Utc::now().date_naive()))
    }
}

pub fn compute_stats(regs: &[Registration], today: NaiveDate) -> DashboardStats {
    let total = regs.len();
    let paid = regs.iter().filter(|r| r.is_paid()).count();
    let revenue: u64 = regs.iter().map(|r| r.amount as u64).sum();

    let mut by_type = BTreeMap::new();
    let mut by_country = BTreeMap::new();
    let mut per_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    let mut revenue_by_type = BTreeMap::from([
        (RegistrationType::SyriaPaid.as_str().to_string(), 0u64),
        (RegistrationType::International.as_str().to_string(), 0u64),
    ]);

    for reg in regs {
        *by_type.entry(reg.registration_type.as_str().to_string()).or_insert(0) += 1;
        *by_country.entry(reg.country.clone()).or_insert(0) += 1;
        *per_day.entry(reg.timestamp.date_naive()).or_insert(0) += 1;
        if let Some(sum) = revenue_by_type.get_mut(reg.registration_type.as_str()) {
            *sum += reg.amount as u64;
        }
    }

    let last_7_days = (0..7u64)
        .rev()
        .filter_map(|back| today.checked_sub_days(Days::new(back)))
        .map(|date| DailyCount {
            date,
            count: per_day.get(&date).copied().unwrap_or(0),
        })
        .collect();

    let timeline = per_day
        .into_iter()
        .map(|(date, count)| DailyCount { date, count })
        .collect();

    DashboardStats {
        total_registrations: total,
        paid_registrations: paid,
        total_revenue: revenue,
        conversion_rate: percent(paid, total),
        by_type,
        by_country,
        timeline,
        last_7_days,
        revenue_by_type,
    }
}

/// `part / whole` as a percentage rounded to one decimal; 0 when `whole` is 0.
pub fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 / whole as f64 * 1000.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::registration;
    use chrono::TimeZone;

    fn at(reg: &mut Registration, y: i32, m: u32, d: u32) {
        reg.timestamp = Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap();
    }

    #[test]
    fn five_sample_registrations() {
        let mut regs = vec![
            registration("1", "syria", RegistrationType::SyriaFree, 0),
            registration("2", "uae", RegistrationType::International, 150),
            registration("3", "syria", RegistrationType::SyriaPaid, 50),
            registration("4", "saudi", RegistrationType::International, 150),
            registration("5", "jordan", RegistrationType::International, 150),
        ];
        for (i, reg) in regs.iter_mut().enumerate() {
            at(reg, 2025, 1, 15 + i as u32);
        }

        let today = NaiveDate::from_ymd_opt(2025, 1, 19).unwrap();
        let stats = compute_stats(&regs, today);

        assert_eq!(stats.total_registrations, 5);
        assert_eq!(stats.paid_registrations, 4);
        assert_eq!(stats.total_revenue, 500);
        assert_eq!(stats.conversion_rate, 80.0);
        assert_eq!(stats.by_type["international"], 3);
        assert_eq!(stats.by_country["syria"], 2);
        assert_eq!(stats.revenue_by_type["international"], 450);
        assert_eq!(stats.revenue_by_type["syria-paid"], 50);
        assert_eq!(stats.timeline.len(), 5);

        assert_eq!(stats.last_7_days.len(), 7);
        assert_eq!(stats.last_7_days[0].date, NaiveDate::from_ymd_opt(2025, 1, 13).unwrap());
        let counts: Vec<usize> = stats.last_7_days.iter().map(|d| d.count).collect();
        assert_eq!(counts, vec![0, 0, 1, 1, 1, 1, 1]);
    }

    #[test]
    fn empty_ledger_has_zero_conversion() {
        let stats = compute_stats(&[], NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(stats.conversion_rate, 0.0);
        assert_eq!(stats.revenue_by_type.len(), 2);
    }

    #[test]
    fn percent_keeps_one_decimal() {
        assert_eq!(percent(1, 3), 33.3);
        assert_eq!(percent(2, 3), 66.7);
    }
}
