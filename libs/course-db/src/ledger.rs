//! Discount code ledger.
//!
//! Three persisted collections back every decision:
//! - the global used-code set (a code in it is never accepted again),
//! - per-requester redemption history (one lifetime free code per requester),
//! - an append-only usage log kept for the admin surface.
//!
//! [`CodeLedger::validate`] is a read-only check. A redemption only counts once
//! [`CodeLedger::record`] has written the used set and the requester history.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{LedgerError, Result};
use crate::keys;
use crate::models::code::{
    CODE_REGION, CodeStatus, DiscountCode, GeneratedCode, RedemptionMetadata, RequesterEntry,
    UsageLogEntry,
};
use crate::store::{self, KvStore, load_or_default};

pub const MIN_BATCH: u32 = 1;
pub const MAX_BATCH: u32 = 50;

const TIME_PART_MODULUS: i64 = 1_000_000;
const RANDOM_PART_LEN: usize = 4;
const FALLBACK_PREFIX: &str = "RESELLER";
const MAX_DRAWS_PER_CODE: usize = 32;
const BASE36: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

type RequesterHistory = BTreeMap<String, Vec<RequesterEntry>>;

/// Clock and randomness the ledger draws from.
pub trait Entropy: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// `len` characters from `0-9A-Z`.
    fn base36(&self, len: usize) -> String;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemEntropy;

impl Entropy for SystemEntropy {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn base36(&self, len: usize) -> String {
        let mut rng = rand::rng();
        (0..len)
            .map(|_| BASE36[rng.random_range(0..BASE36.len())] as char)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    #[error("code format is invalid")]
    InvalidFormat,
    #[error("code was already redeemed")]
    AlreadyRedeemed,
    #[error("requester already redeemed a free code")]
    RequesterLimitExceeded,
}

impl Rejection {
    pub fn user_message(&self) -> &'static str {
        match self {
            Rejection::InvalidFormat => "كود غير صحيح. يرجى التأكد من الكود أو التواصل معنا.",
            Rejection::AlreadyRedeemed => {
                "تم استخدام هذا الكود مسبقاً. كل كود يمكن استخدامه مرة واحدة فقط."
            }
            Rejection::RequesterLimitExceeded => {
                "تم استخدام كود دعم من هذا الجهاز مسبقاً. كل جهاز يحق له كود واحد فقط."
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "reason", rename_all = "snake_case")]
pub enum Decision {
    Accepted,
    Rejected(Rejection),
}

impl Decision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Decision::Accepted)
    }
}

pub struct CodeLedger {
    store: Arc<dyn KvStore>,
    entropy: Arc<dyn Entropy>,
    redeem_lock: Mutex<()>,
}

impl CodeLedger {
    pub fn new(store: Arc<dyn KvStore>, entropy: Arc<dyn Entropy>) -> Self {
        Self {
            store,
            entropy,
            redeem_lock: Mutex::new(()),
        }
    }

    pub fn with_system_entropy(store: Arc<dyn KvStore>) -> Self {
        Self::new(store, Arc::new(SystemEntropy))
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.entropy.now()
    }

    /// Upper-case base-36 tag from the ledger's entropy, for record ids.
    pub fn token(&self, len: usize) -> String {
        self.entropy.base36(len).to_uppercase()
    }

    pub async fn validate(&self, code: &str, requester_id: &str) -> Result<Decision> {
        if DiscountCode::parse(code).is_none() {
            return Ok(Decision::Rejected(Rejection::InvalidFormat));
        }

        if self.is_redeemed(code).await? {
            return Ok(Decision::Rejected(Rejection::AlreadyRedeemed));
        }

        let history: RequesterHistory =
            load_or_default(self.store.as_ref(), keys::REQUESTER_HISTORY).await?;
        if history.get(requester_id).is_some_and(|entries| !entries.is_empty()) {
            return Ok(Decision::Rejected(Rejection::RequesterLimitExceeded));
        }

        Ok(Decision::Accepted)
    }

    /// Marks `code` used and charges it to `requester_id`.
    ///
    /// The used set and the requester history go out in one `set_many`, used
    /// set first. The audit entry follows separately; losing it is logged and
    /// does not fail the redemption.
    pub async fn record(
        &self,
        code: &str,
        requester_id: &str,
        metadata: RedemptionMetadata,
    ) -> Result<()> {
        let now = self.entropy.now();
        let store = self.store.as_ref();

        let mut used: Vec<String> = load_or_default(store, keys::GLOBAL_USED_CODES).await?;
        if !used.iter().any(|c| c == code) {
            used.push(code.to_string());
        }

        let mut history: RequesterHistory = load_or_default(store, keys::REQUESTER_HISTORY).await?;
        let user_agent = metadata.user_agent.clone();
        history
            .entry(requester_id.to_string())
            .or_default()
            .push(RequesterEntry {
                code: code.to_string(),
                used_at: now,
                metadata,
            });

        store
            .set_many(vec![
                (
                    keys::GLOBAL_USED_CODES.to_string(),
                    store::to_document(keys::GLOBAL_USED_CODES, &used)?,
                ),
                (
                    keys::REQUESTER_HISTORY.to_string(),
                    store::to_document(keys::REQUESTER_HISTORY, &history)?,
                ),
            ])
            .await?;

        let entry = UsageLogEntry {
            code: code.to_string(),
            requester_id: requester_id.to_string(),
            timestamp: now,
            user_agent,
            success: true,
        };
        if let Err(e) = self.append_usage_log(entry).await {
            warn!("Redemption of {} is recorded but its audit entry was lost: {}", code, e);
        }

        info!("Recorded redemption of {} for requester {}", code, requester_id);
        Ok(())
    }

    /// Validate and record as one step. Serialized within this process so two
    /// requests cannot both pass validation for the same code.
    pub async fn redeem(
        &self,
        code: &str,
        requester_id: &str,
        metadata: RedemptionMetadata,
    ) -> Result<Decision> {
        let _guard = self.redeem_lock.lock().await;

        let decision = self.validate(code, requester_id).await?;
        match decision {
            Decision::Accepted => self.record(code, requester_id, metadata).await?,
            Decision::Rejected(reason) => {
                debug!("Rejected code {} for requester {}: {}", code, requester_id, reason)
            }
        }
        Ok(decision)
    }

    pub fn generate(
        &self,
        reseller_display_name: &str,
        quantity: u32,
        ticket_type: &str,
    ) -> Result<Vec<GeneratedCode>> {
        self.generate_avoiding(reseller_display_name, quantity, ticket_type, &HashSet::new())
    }

    /// Like [`generate`](Self::generate), re-drawing any code that is already
    /// in `taken` or earlier in the same batch.
    pub fn generate_avoiding(
        &self,
        reseller_display_name: &str,
        quantity: u32,
        ticket_type: &str,
        taken: &HashSet<String>,
    ) -> Result<Vec<GeneratedCode>> {
        if !(MIN_BATCH..=MAX_BATCH).contains(&quantity) {
            return Err(LedgerError::InvalidQuantity {
                requested: quantity,
                min: MIN_BATCH,
                max: MAX_BATCH,
            });
        }

        let prefix = code_prefix(reseller_display_name);
        let issued_at = self.entropy.now();
        let mut batch: HashSet<String> = HashSet::with_capacity(quantity as usize);
        let mut codes = Vec::with_capacity(quantity as usize);

        for _ in 0..quantity {
            let code = self.draw_unique(&prefix, &batch, taken)?;
            batch.insert(code.clone());
            codes.push(GeneratedCode {
                code,
                reseller_name: reseller_display_name.to_string(),
                ticket_type: ticket_type.to_string(),
                status: CodeStatus::Unused,
                amount: 0,
                commission: 0,
                issued_at,
                used_at: None,
                used_by: None,
            });
        }

        Ok(codes)
    }

    fn draw_unique(
        &self,
        prefix: &str,
        batch: &HashSet<String>,
        taken: &HashSet<String>,
    ) -> Result<String> {
        for _ in 0..MAX_DRAWS_PER_CODE {
            let millis = self.entropy.now().timestamp_millis();
            let time_part = format!("{:06}", millis.rem_euclid(TIME_PART_MODULUS));
            let random_part = self.entropy.base36(RANDOM_PART_LEN).to_uppercase();
            let code = format!("{}-{}-{}{}", prefix, CODE_REGION, time_part, random_part);

            if !batch.contains(&code) && !taken.contains(&code) {
                return Ok(code);
            }
        }

        Err(LedgerError::CodeCollision {
            attempts: MAX_DRAWS_PER_CODE,
        })
    }

    pub async fn is_redeemed(&self, code: &str) -> Result<bool> {
        let used: Vec<String> = load_or_default(self.store.as_ref(), keys::GLOBAL_USED_CODES).await?;
        Ok(used.iter().any(|c| c == code))
    }

    pub async fn used_codes(&self) -> Result<Vec<String>> {
        Ok(load_or_default(self.store.as_ref(), keys::GLOBAL_USED_CODES).await?)
    }

    pub async fn requester_history(&self, requester_id: &str) -> Result<Vec<RequesterEntry>> {
        let mut history: RequesterHistory =
            load_or_default(self.store.as_ref(), keys::REQUESTER_HISTORY).await?;
        Ok(history.remove(requester_id).unwrap_or_default())
    }

    pub async fn usage_log(&self) -> Result<Vec<UsageLogEntry>> {
        Ok(load_or_default(self.store.as_ref(), keys::CODE_USAGE_LOG).await?)
    }

    async fn append_usage_log(&self, entry: UsageLogEntry) -> std::result::Result<(), crate::StoreError> {
        let store = self.store.as_ref();
        let mut log: Vec<UsageLogEntry> = load_or_default(store, keys::CODE_USAGE_LOG).await?;
        log.push(entry);
        store::save(store, keys::CODE_USAGE_LOG, &log).await
    }
}

/// First whitespace-delimited token of the display name, upper-cased and
/// reduced to `A-Z`.
pub fn code_prefix(display_name: &str) -> String {
    let prefix: String = display_name
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_uppercase())
        .collect();

    if prefix.is_empty() {
        FALLBACK_PREFIX.to_string()
    } else {
        prefix
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

    /// Deterministic entropy: the clock advances 1ms per read and the
    /// random part counts up.
    pub struct StepEntropy {
        millis: AtomicI64,
        counter: AtomicU64,
    }

    impl StepEntropy {
        pub fn starting_at(millis: i64) -> Self {
            Self {
                millis: AtomicI64::new(millis),
                counter: AtomicU64::new(0),
            }
        }
    }

    impl Entropy for StepEntropy {
        fn now(&self) -> DateTime<Utc> {
            let millis = self.millis.fetch_add(1, Ordering::SeqCst);
            DateTime::from_timestamp_millis(millis).unwrap()
        }

        fn base36(&self, len: usize) -> String {
            let mut n = self.counter.fetch_add(1, Ordering::SeqCst);
            let mut out = vec![b'0'; len];
            for slot in out.iter_mut().rev() {
                *slot = BASE36[(n % 36) as usize];
                n /= 36;
            }
            String::from_utf8(out).unwrap()
        }
    }

    /// Always returns the same instant and the same random part.
    pub struct FrozenEntropy;

    impl Entropy for FrozenEntropy {
        fn now(&self) -> DateTime<Utc> {
            DateTime::from_timestamp_millis(1_736_937_000_000).unwrap()
        }

        fn base36(&self, len: usize) -> String {
            "A".repeat(len)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{FrozenEntropy, StepEntropy};
    use super::*;
    use crate::StoreError;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use serde_json::Value;

    fn ledger() -> (CodeLedger, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let ledger = CodeLedger::new(store.clone(), Arc::new(StepEntropy::starting_at(1_736_937_123_456)));
        (ledger, store)
    }

    fn is_reseller_code(code: &str, prefix: &str) -> bool {
        match DiscountCode::parse(code) {
            Some(DiscountCode::Reseller { prefix: p, .. }) => p == prefix,
            _ => false,
        }
    }

    #[tokio::test]
    async fn support_code_is_single_use_globally() {
        let (ledger, _) = ledger();

        assert_eq!(ledger.validate("ObaiLovesAi", "ip1").await.unwrap(), Decision::Accepted);
        ledger
            .record("ObaiLovesAi", "ip1", RedemptionMetadata::default())
            .await
            .unwrap();

        assert_eq!(
            ledger.validate("ObaiLovesAi", "ip2").await.unwrap(),
            Decision::Rejected(Rejection::AlreadyRedeemed)
        );
    }

    #[tokio::test]
    async fn requester_gets_one_free_code() {
        let (ledger, _) = ledger();

        assert_eq!(ledger.validate("XYZ-SYRIA-AAA111", "ip1").await.unwrap(), Decision::Accepted);
        ledger
            .record("XYZ-SYRIA-AAA111", "ip1", RedemptionMetadata::default())
            .await
            .unwrap();

        assert_eq!(
            ledger.validate("ANY-SYRIA-BBB222", "ip1").await.unwrap(),
            Decision::Rejected(Rejection::RequesterLimitExceeded)
        );
        assert_eq!(ledger.validate("ANY-SYRIA-BBB222", "ip9").await.unwrap(), Decision::Accepted);
    }

    #[tokio::test]
    async fn global_use_is_checked_before_requester_cap() {
        let (ledger, _) = ledger();
        ledger
            .record("XYZ-SYRIA-AAA111", "ip1", RedemptionMetadata::default())
            .await
            .unwrap();

        assert_eq!(
            ledger.validate("XYZ-SYRIA-AAA111", "ip1").await.unwrap(),
            Decision::Rejected(Rejection::AlreadyRedeemed)
        );
    }

    #[tokio::test]
    async fn unknown_shape_is_invalid_format() {
        let (ledger, _) = ledger();
        assert_eq!(
            ledger.validate("not-a-real-code", "ip3").await.unwrap(),
            Decision::Rejected(Rejection::InvalidFormat)
        );
    }

    #[tokio::test]
    async fn validate_does_not_mutate_state() {
        let (ledger, store) = ledger();

        for _ in 0..3 {
            assert_eq!(ledger.validate("ObaiLovesAi", "ip1").await.unwrap(), Decision::Accepted);
        }
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn record_writes_all_three_collections() {
        let (ledger, _) = ledger();
        let metadata = RedemptionMetadata {
            user_agent: Some("Mozilla/5.0".to_string()),
            email: Some("student@example.com".to_string()),
            reseller_id: None,
        };
        ledger.record("ObaiLovesAi", "ip1", metadata.clone()).await.unwrap();

        assert_eq!(ledger.used_codes().await.unwrap(), vec!["ObaiLovesAi".to_string()]);

        let history = ledger.requester_history("ip1").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].metadata, metadata);

        let log = ledger.usage_log().await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].requester_id, "ip1");
        assert!(log[0].success);
        assert_eq!(log[0].user_agent.as_deref(), Some("Mozilla/5.0"));
    }

    #[tokio::test]
    async fn redeem_only_records_accepted_codes() {
        let (ledger, _) = ledger();

        let first = ledger
            .redeem("ObaiLovesAi", "ip1", RedemptionMetadata::default())
            .await
            .unwrap();
        assert!(first.is_accepted());

        let second = ledger
            .redeem("ObaiLovesAi", "ip2", RedemptionMetadata::default())
            .await
            .unwrap();
        assert_eq!(second, Decision::Rejected(Rejection::AlreadyRedeemed));
        assert!(ledger.requester_history("ip2").await.unwrap().is_empty());
        assert_eq!(ledger.usage_log().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_redeems_of_one_code_accept_once() {
        let (ledger, _) = ledger();
        let ledger = Arc::new(ledger);

        let mut handles = Vec::new();
        for i in 0..8 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger
                    .redeem("ABC-SYRIA-XYZ789", &format!("ip{}", i), RedemptionMetadata::default())
                    .await
                    .unwrap()
            }));
        }

        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap().is_accepted() {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 1);
    }

    #[tokio::test]
    async fn corrupt_used_set_reads_as_empty() {
        let (ledger, store) = ledger();
        store
            .set(keys::GLOBAL_USED_CODES, serde_json::json!({"broken": true}))
            .await
            .unwrap();

        assert_eq!(ledger.validate("ObaiLovesAi", "ip1").await.unwrap(), Decision::Accepted);
    }

    #[test]
    fn generate_returns_requested_count() {
        let (ledger, _) = ledger();

        let codes = ledger.generate("Ahmed Mohamed", 3, "syria-paid").unwrap();
        assert_eq!(codes.len(), 3);

        let distinct: HashSet<_> = codes.iter().map(|c| c.code.as_str()).collect();
        assert_eq!(distinct.len(), 3);

        for code in &codes {
            assert!(code.code.starts_with("AHMED-SYRIA-"), "{}", code.code);
            assert!(is_reseller_code(&code.code, "AHMED"));
            assert_eq!(code.status, CodeStatus::Unused);
            assert_eq!(code.ticket_type, "syria-paid");
            assert!(code.used_by.is_none());
        }
    }

    #[test]
    fn generate_bounds_quantity() {
        let (ledger, _) = ledger();

        for bad in [0, 51] {
            let err = ledger.generate("Ahmed", bad, "syria-paid").unwrap_err();
            assert!(matches!(err, LedgerError::InvalidQuantity { requested, .. } if requested == bad));
        }
        assert_eq!(ledger.generate("Ahmed", 1, "syria-paid").unwrap().len(), 1);
        assert_eq!(ledger.generate("Ahmed", 50, "syria-paid").unwrap().len(), 50);
    }

    #[test]
    fn suffix_is_time_part_then_random_part() {
        let (ledger, _) = ledger();
        let codes = ledger.generate("omar", 1, "syria-paid").unwrap();
        // Clock starts at ...123456 and the first read is the batch timestamp.
        assert_eq!(codes[0].code, "OMAR-SYRIA-1234570000");
    }

    #[test]
    fn prefix_falls_back_for_non_latin_names() {
        assert_eq!(code_prefix("Ahmed Mohamed"), "AHMED");
        assert_eq!(code_prefix("  jean-luc picard"), "JEANLUC");
        assert_eq!(code_prefix("أحمد محمد"), "RESELLER");
        assert_eq!(code_prefix(""), "RESELLER");

        let (ledger, _) = ledger();
        let codes = ledger.generate("أحمد محمد", 2, "syria-paid").unwrap();
        assert!(codes.iter().all(|c| is_reseller_code(&c.code, "RESELLER")));
    }

    #[test]
    fn generate_avoiding_skips_taken_codes() {
        let store = Arc::new(MemoryStore::new());
        let ledger = CodeLedger::new(store, Arc::new(FrozenEntropy));

        let first = ledger.generate("Ahmed", 1, "syria-paid").unwrap();
        let taken: HashSet<String> = first.iter().map(|c| c.code.clone()).collect();

        let err = ledger
            .generate_avoiding("Ahmed", 1, "syria-paid", &taken)
            .unwrap_err();
        assert!(matches!(err, LedgerError::CodeCollision { .. }));
    }

    struct WriteFailure {
        inner: MemoryStore,
        fail_key: Option<&'static str>,
    }

    #[async_trait]
    impl KvStore for WriteFailure {
        async fn get(&self, key: &str) -> std::result::Result<Option<Value>, StoreError> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: Value) -> std::result::Result<(), StoreError> {
            match self.fail_key {
                Some(fail) if fail != key => self.inner.set(key, value).await,
                _ => Err(StoreError::Unavailable("disk full".to_string())),
            }
        }

        fn backend(&self) -> &'static str {
            "failing"
        }
    }

    #[tokio::test]
    async fn storage_failure_is_not_a_redemption() {
        let store = Arc::new(WriteFailure {
            inner: MemoryStore::new(),
            fail_key: None,
        });
        let ledger = CodeLedger::new(store, Arc::new(StepEntropy::starting_at(0)));

        let err = ledger
            .redeem("ObaiLovesAi", "ip1", RedemptionMetadata::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Storage(_)));
        assert!(!ledger.is_redeemed("ObaiLovesAi").await.unwrap());
    }

    #[tokio::test]
    async fn used_set_is_written_before_requester_history() {
        let store = Arc::new(WriteFailure {
            inner: MemoryStore::new(),
            fail_key: Some(keys::REQUESTER_HISTORY),
        });
        let ledger = CodeLedger::new(store, Arc::new(StepEntropy::starting_at(0)));

        let err = ledger
            .record("XYZ-SYRIA-AAA111", "ip1", RedemptionMetadata::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Storage(_)));

        // A half-written redemption still burns the code.
        assert!(ledger.is_redeemed("XYZ-SYRIA-AAA111").await.unwrap());
        assert_eq!(
            ledger.validate("XYZ-SYRIA-AAA111", "ip2").await.unwrap(),
            Decision::Rejected(Rejection::AlreadyRedeemed)
        );
        assert!(ledger.requester_history("ip1").await.unwrap().is_empty());
        assert!(ledger.usage_log().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn lost_audit_entry_still_redeems() {
        let store = Arc::new(WriteFailure {
            inner: MemoryStore::new(),
            fail_key: Some(keys::CODE_USAGE_LOG),
        });
        let ledger = CodeLedger::new(store, Arc::new(StepEntropy::starting_at(0)));

        ledger
            .record("ObaiLovesAi", "ip1", RedemptionMetadata::default())
            .await
            .unwrap();

        assert!(ledger.is_redeemed("ObaiLovesAi").await.unwrap());
        assert!(ledger.usage_log().await.unwrap().is_empty());
        assert_eq!(
            ledger.validate("ObaiLovesAi", "ip2").await.unwrap(),
            Decision::Rejected(Rejection::AlreadyRedeemed)
        );
    }
}
