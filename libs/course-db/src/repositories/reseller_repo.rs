use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::keys;
use crate::models::code::{CodeStatus, GeneratedCode};
use crate::models::reseller::{DEFAULT_RESELLER_NAME, PayoutRequest, Reseller, Sale};
use crate::store::{self, KvStore, load_or_default};

/// Batches, sales and payouts are appended under one shared write lock.
#[derive(Clone)]
pub struct ResellerRepository {
    store: Arc<dyn KvStore>,
    write_lock: Arc<Mutex<()>>,
}

impl ResellerRepository {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn profile(&self, reseller_id: &str) -> Result<Option<Reseller>> {
        load_or_default(self.store.as_ref(), &keys::reseller_profile(reseller_id))
            .await
            .context("Failed to load reseller profile")
    }

    pub async fn profile_or_default(&self, reseller_id: &str) -> Result<Reseller> {
        Ok(self
            .profile(reseller_id)
            .await?
            .unwrap_or_else(|| Reseller::new(reseller_id, DEFAULT_RESELLER_NAME)))
    }

    pub async fn save_profile(&self, reseller: &Reseller) -> Result<()> {
        store::save(self.store.as_ref(), &keys::reseller_profile(&reseller.id), reseller)
            .await
            .context("Failed to save reseller profile")
    }

    pub async fn codes(&self, reseller_id: &str) -> Result<Vec<GeneratedCode>> {
        load_or_default(self.store.as_ref(), &keys::reseller_codes(reseller_id))
            .await
            .context("Failed to load generated codes")
    }

    pub async fn append_codes(&self, reseller_id: &str, new_codes: &[GeneratedCode]) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut codes = self.codes(reseller_id).await?;
        codes.extend_from_slice(new_codes);
        store::save(self.store.as_ref(), &keys::reseller_codes(reseller_id), &codes)
            .await
            .context("Failed to save generated codes")
    }

    /// Flips an unused batch entry to used and returns it. `None` when the
    /// code is not in this reseller's batch or was already used.
    pub async fn mark_code_used(
        &self,
        reseller_id: &str,
        code: &str,
        used_by: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<GeneratedCode>> {
        let _guard = self.write_lock.lock().await;
        let mut codes = self.codes(reseller_id).await?;
        let Some(entry) = codes
            .iter_mut()
            .find(|c| c.code == code && c.status == CodeStatus::Unused)
        else {
            return Ok(None);
        };

        entry.status = CodeStatus::Used;
        entry.used_at = Some(at);
        entry.used_by = Some(used_by.to_string());
        let used = entry.clone();

        store::save(self.store.as_ref(), &keys::reseller_codes(reseller_id), &codes)
            .await
            .context("Failed to save generated codes")?;
        Ok(Some(used))
    }

    pub async fn sales(&self, reseller_id: &str) -> Result<Vec<Sale>> {
        load_or_default(self.store.as_ref(), &keys::reseller_sales(reseller_id))
            .await
            .context("Failed to load sales")
    }

    pub async fn append_sale(&self, reseller_id: &str, sale: Sale) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut sales = self.sales(reseller_id).await?;
        sales.push(sale);
        store::save(self.store.as_ref(), &keys::reseller_sales(reseller_id), &sales)
            .await
            .context("Failed to save sales")
    }

    pub async fn payouts(&self, reseller_id: &str) -> Result<Vec<PayoutRequest>> {
        load_or_default(self.store.as_ref(), &keys::reseller_payouts(reseller_id))
            .await
            .context("Failed to load payout requests")
    }

    pub async fn append_payout(&self, payout: PayoutRequest) -> Result<()> {
        let key = keys::reseller_payouts(&payout.reseller_id);
        let _guard = self.write_lock.lock().await;
        let mut payouts = self.payouts(&payout.reseller_id).await?;
        payouts.push(payout);
        store::save(self.store.as_ref(), &key, &payouts)
            .await
            .context("Failed to save payout requests")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn batch_entry(code: &str) -> GeneratedCode {
        GeneratedCode {
            code: code.to_string(),
            reseller_name: "Ahmed Mohamed".to_string(),
            ticket_type: "syria-paid".to_string(),
            status: CodeStatus::Unused,
            amount: 50,
            commission: 5,
            issued_at: Utc::now(),
            used_at: None,
            used_by: None,
        }
    }

    #[tokio::test]
    async fn batches_are_scoped_per_reseller() {
        let repo = ResellerRepository::new(Arc::new(MemoryStore::new()));
        repo.append_codes("R1", &[batch_entry("AHMED-SYRIA-1")]).await.unwrap();
        repo.append_codes("R2", &[batch_entry("OMAR-SYRIA-1")]).await.unwrap();

        assert_eq!(repo.codes("R1").await.unwrap().len(), 1);
        assert_eq!(repo.codes("R2").await.unwrap()[0].code, "OMAR-SYRIA-1");
        assert!(repo.profile("R1").await.unwrap().is_none());
        assert_eq!(repo.profile_or_default("R1").await.unwrap().id, "R1");
    }

    #[tokio::test]
    async fn mark_used_is_terminal() {
        let repo = ResellerRepository::new(Arc::new(MemoryStore::new()));
        repo.append_codes("R1", &[batch_entry("AHMED-SYRIA-1")]).await.unwrap();

        let used = repo.mark_code_used("R1", "AHMED-SYRIA-1", "ip1", Utc::now()).await.unwrap().unwrap();
        assert_eq!(used.status, CodeStatus::Used);
        assert_eq!(used.amount, 50);
        assert!(repo.mark_code_used("R1", "AHMED-SYRIA-1", "ip2", Utc::now()).await.unwrap().is_none());
        assert!(repo.mark_code_used("R1", "AHMED-SYRIA-404", "ip2", Utc::now()).await.unwrap().is_none());

        let codes = repo.codes("R1").await.unwrap();
        assert_eq!(codes[0].status, CodeStatus::Used);
        assert_eq!(codes[0].used_by.as_deref(), Some("ip1"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_batches_are_all_kept() {
        let repo = ResellerRepository::new(Arc::new(MemoryStore::new()));
        let tasks: Vec<_> = (0..20)
            .map(|i| {
                let repo = repo.clone();
                tokio::spawn(async move {
                    repo.append_codes("R1", &[batch_entry(&format!("AHMED-SYRIA-{}", i))])
                        .await
                        .unwrap()
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(repo.codes("R1").await.unwrap().len(), 20);
    }
}
