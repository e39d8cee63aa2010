use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::Mutex;

use crate::keys;
use crate::models::registration::{Registration, RegistrationFilter, RegistrationStatus};
use crate::store::{self, KvStore, load_or_default};

/// Writes are read-modify-write over the whole collection, so every mutation
/// runs under `write_lock`. Clones share the lock.
#[derive(Clone)]
pub struct RegistrationRepository {
    store: Arc<dyn KvStore>,
    write_lock: Arc<Mutex<()>>,
}

impl RegistrationRepository {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn list(&self) -> Result<Vec<Registration>> {
        load_or_default(self.store.as_ref(), keys::REGISTRATIONS)
            .await
            .context("Failed to load registrations")
    }

    /// Newest first.
    pub async fn filter(&self, filter: &RegistrationFilter) -> Result<Vec<Registration>> {
        let mut regs: Vec<Registration> = self
            .list()
            .await?
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect();
        regs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(regs)
    }

    pub async fn recent(&self, limit: usize) -> Result<Vec<Registration>> {
        let mut regs = self.filter(&RegistrationFilter::default()).await?;
        regs.truncate(limit);
        Ok(regs)
    }

    pub async fn get(&self, id: &str) -> Result<Option<Registration>> {
        Ok(self.list().await?.into_iter().find(|r| r.id == id))
    }

    /// Confirmed plus pending; cancelled seats are free again.
    pub async fn count_active(&self) -> Result<usize> {
        Ok(self
            .list()
            .await?
            .iter()
            .filter(|r| r.status != RegistrationStatus::Cancelled)
            .count())
    }

    pub async fn insert(&self, registration: &Registration) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut regs = self.list().await?;
        regs.push(registration.clone());
        self.save(&regs).await
    }

    /// Stores `registration`, appending `_<tail>` to its id until the id is
    /// free. Returns the registration as stored.
    pub async fn insert_unique<F>(&self, mut registration: Registration, mut tail: F) -> Result<Registration>
    where
        F: FnMut() -> String + Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut regs = self.list().await?;

        while regs.iter().any(|r| r.id == registration.id) {
            registration.id = format!("{}_{}", registration.id, tail());
        }

        regs.push(registration.clone());
        self.save(&regs).await?;
        Ok(registration)
    }

    pub async fn delete(&self, id: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut regs = self.list().await?;
        let before = regs.len();
        regs.retain(|r| r.id != id);
        if regs.len() == before {
            return Ok(false);
        }
        self.save(&regs).await?;
        Ok(true)
    }

    pub async fn set_status(&self, id: &str, status: RegistrationStatus) -> Result<Option<Registration>> {
        let _guard = self.write_lock.lock().await;
        let mut regs = self.list().await?;
        let Some(reg) = regs.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        reg.status = status;
        let updated = reg.clone();
        self.save(&regs).await?;
        Ok(Some(updated))
    }

    async fn save(&self, regs: &[Registration]) -> Result<()> {
        store::save(self.store.as_ref(), keys::REGISTRATIONS, &regs)
            .await
            .context("Failed to save registrations")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::registration::RegistrationType;
    use crate::models::registration::fixtures::registration;
    use crate::store::MemoryStore;
    use chrono::Duration;

    fn repo() -> RegistrationRepository {
        RegistrationRepository::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn insert_get_delete() {
        let repo = repo();
        let reg = registration("REG_1", "syria", RegistrationType::SyriaFree, 0);
        repo.insert(&reg).await.unwrap();

        assert_eq!(repo.get("REG_1").await.unwrap(), Some(reg));
        assert!(repo.delete("REG_1").await.unwrap());
        assert!(!repo.delete("REG_1").await.unwrap());
        assert!(repo.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn recent_is_newest_first() {
        let repo = repo();
        let mut old = registration("old", "syria", RegistrationType::SyriaPaid, 50);
        old.timestamp = old.timestamp - Duration::days(2);
        let new = registration("new", "uae", RegistrationType::International, 150);
        repo.insert(&old).await.unwrap();
        repo.insert(&new).await.unwrap();

        let recent = repo.recent(1).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, "new");
    }

    #[tokio::test]
    async fn taken_id_gets_a_tail() {
        let repo = repo();
        let first = repo
            .insert_unique(registration("REG_1", "syria", RegistrationType::SyriaPaid, 50), || "X".to_string())
            .await
            .unwrap();
        let second = repo
            .insert_unique(registration("REG_1", "syria", RegistrationType::SyriaPaid, 50), || "X".to_string())
            .await
            .unwrap();
        let third = repo
            .insert_unique(registration("REG_1", "syria", RegistrationType::SyriaPaid, 50), || "X".to_string())
            .await
            .unwrap();

        assert_eq!(first.id, "REG_1");
        assert_eq!(second.id, "REG_1_X");
        assert_eq!(third.id, "REG_1_X_X");
        assert_eq!(repo.list().await.unwrap().len(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_inserts_are_all_kept() {
        let repo = repo();
        let tasks: Vec<_> = (0..40)
            .map(|i| {
                let repo = repo.clone();
                tokio::spawn(async move {
                    let reg = registration("REG_SAME", "syria", RegistrationType::SyriaPaid, 50);
                    repo.insert_unique(reg, move || format!("{:02}", i)).await.unwrap()
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let regs = repo.list().await.unwrap();
        assert_eq!(regs.len(), 40);
        let ids: std::collections::HashSet<_> = regs.iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids.len(), 40);
    }

    #[tokio::test]
    async fn cancelled_does_not_count_as_active() {
        let repo = repo();
        repo.insert(&registration("a", "syria", RegistrationType::SyriaPaid, 50)).await.unwrap();
        repo.insert(&registration("b", "syria", RegistrationType::SyriaPaid, 50)).await.unwrap();

        let updated = repo.set_status("b", RegistrationStatus::Cancelled).await.unwrap();
        assert_eq!(updated.map(|r| r.status), Some(RegistrationStatus::Cancelled));
        assert_eq!(repo.count_active().await.unwrap(), 1);
        assert!(repo.set_status("missing", RegistrationStatus::Pending).await.unwrap().is_none());
    }
}
