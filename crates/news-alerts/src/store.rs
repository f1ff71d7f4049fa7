use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use analysis_core::Headline;
use async_trait::async_trait;
use fs4::fs_std::FileExt;

use crate::AlertError;

/// Holds a store's cross-process lock for the duration of a dedup pass.
/// Dropping it releases the lock.
#[derive(Debug)]
pub struct StoreGuard {
    _file: Option<File>,
    lease: Option<LockLease>,
}

impl StoreGuard {
    pub fn unlocked() -> Self {
        Self {
            _file: None,
            lease: None,
        }
    }

    /// Release now instead of on drop, reporting any failure.
    pub async fn release(mut self) -> Result<(), AlertError> {
        match self.lease.take() {
            Some(lease) => lease.release().await,
            None => Ok(()),
        }
    }
}

impl Drop for StoreGuard {
    fn drop(&mut self) {
        let Some(lease) = self.lease.take() else {
            return;
        };
        // Without a runtime the row is left to expire
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(e) = lease.release().await {
                    tracing::warn!("Failed to release seen-news lock: {}", e);
                }
            });
        }
    }
}

/// Claimed row in `seen_news_lock`.
#[derive(Debug)]
struct LockLease {
    db_pool: sqlx::AnyPool,
    holder: String,
}

impl LockLease {
    async fn release(self) -> Result<(), AlertError> {
        sqlx::query("DELETE FROM seen_news_lock WHERE id = 1 AND holder = ?")
            .bind(self.holder.as_str())
            .execute(&self.db_pool)
            .await?;
        tracing::debug!("Released seen-news lock {}", self.holder);
        Ok(())
    }
}

fn holder_token() -> String {
    static NEXT: AtomicU64 = AtomicU64::new(0);
    format!("{}:{}", std::process::id(), NEXT.fetch_add(1, Ordering::Relaxed))
}

/// Durable set of headlines that have already been alerted.
#[async_trait]
pub trait SeenNewsStore: Send + Sync {
    /// Exclusive access from load through save. Stores that are safe under
    /// concurrent writers keep the default no-op.
    async fn lock(&self) -> Result<StoreGuard, AlertError> {
        Ok(StoreGuard::unlocked())
    }

    async fn load(&self) -> Result<HashSet<Headline>, AlertError>;

    async fn save(&self, seen: &HashSet<Headline>) -> Result<(), AlertError>;

    /// Persist a pass's result: `seen` is the full grown set and `added`
    /// the headlines this pass put into it. Must be safe to repeat.
    async fn record(&self, seen: &HashSet<Headline>, _added: &[Headline]) -> Result<(), AlertError> {
        self.save(seen).await
    }
}

/// Seen-set kept as a sorted JSON array of strings in a single file.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(suffix);
        PathBuf::from(name)
    }
}

#[async_trait]
impl SeenNewsStore for JsonFileStore {
    async fn lock(&self) -> Result<StoreGuard, AlertError> {
        let lock_path = self.sibling(".lock");
        let file = tokio::task::spawn_blocking(move || -> Result<File, AlertError> {
            if let Some(parent) = lock_path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&lock_path)?;
            file.lock_exclusive()?;
            Ok(file)
        })
        .await
        .map_err(|e| AlertError::Lock(e.to_string()))??;

        tracing::debug!("Locked seen-news store {}", self.path.display());
        Ok(StoreGuard {
            _file: Some(file),
            lease: None,
        })
    }

    async fn load(&self) -> Result<HashSet<Headline>, AlertError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No seen-news file at {}, starting empty", self.path.display());
                return Ok(HashSet::new());
            }
            Err(e) => return Err(e.into()),
        };

        if contents.trim().is_empty() {
            return Ok(HashSet::new());
        }

        let items: Vec<Headline> = serde_json::from_str(&contents)
            .map_err(|e| AlertError::Corrupt(format!("{}: {}", self.path.display(), e)))?;
        Ok(items.into_iter().collect())
    }

    async fn save(&self, seen: &HashSet<Headline>) -> Result<(), AlertError> {
        let mut items: Vec<&Headline> = seen.iter().collect();
        items.sort();
        let json = serde_json::to_string_pretty(&items)
            .map_err(|e| AlertError::Corrupt(e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Write-then-rename so a crash never leaves a truncated file
        let tmp = self.sibling(".tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        tracing::debug!("Saved {} seen headlines to {}", items.len(), self.path.display());
        Ok(())
    }
}

const LOCK_LEASE: Duration = Duration::from_secs(600);
const LOCK_WAIT: Duration = Duration::from_secs(10);
const LOCK_POLL: Duration = Duration::from_millis(100);

/// Seen-set kept in a SQL table.
///
/// Passes are serialised through a single-row `seen_news_lock` table. A row
/// whose lease has run out belongs to a crashed run and is taken over.
pub struct SqliteSeenStore {
    db_pool: sqlx::AnyPool,
    lock_lease: Duration,
    lock_wait: Duration,
}

impl SqliteSeenStore {
    pub fn new(db_pool: sqlx::AnyPool) -> Self {
        Self {
            db_pool,
            lock_lease: LOCK_LEASE,
            lock_wait: LOCK_WAIT,
        }
    }

    pub fn with_lock_timing(mut self, lease: Duration, wait: Duration) -> Self {
        self.lock_lease = lease;
        self.lock_wait = wait;
        self
    }

    pub async fn connect(database_url: &str) -> Result<Self, AlertError> {
        sqlx::any::install_default_drivers();
        let pool = sqlx::any::AnyPoolOptions::new()
            .max_connections(2)
            .connect(database_url)
            .await?;
        let store = Self::new(pool);
        store.init_tables().await?;
        Ok(store)
    }

    pub async fn init_tables(&self) -> Result<(), AlertError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS seen_news (
                headline TEXT PRIMARY KEY,
                first_seen TEXT NOT NULL
            )",
        )
        .execute(&self.db_pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS seen_news_lock (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                holder TEXT NOT NULL,
                expires_at INTEGER NOT NULL
            )",
        )
        .execute(&self.db_pool)
        .await?;
        Ok(())
    }

    /// One attempt at the lock row; true when this call now holds it.
    async fn try_claim(&self, holder: &str) -> Result<bool, AlertError> {
        let now = chrono::Utc::now().timestamp();
        let lease = i64::try_from(self.lock_lease.as_secs()).unwrap_or(i64::MAX);

        sqlx::query("DELETE FROM seen_news_lock WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.db_pool)
            .await?;

        let result = sqlx::query(
            "INSERT INTO seen_news_lock (id, holder, expires_at) VALUES (1, ?, ?)
             ON CONFLICT(id) DO NOTHING",
        )
        .bind(holder)
        .bind(now.saturating_add(lease))
        .execute(&self.db_pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn insert_rows<'h>(
        &self,
        headlines: impl Iterator<Item = &'h Headline> + Send,
    ) -> Result<usize, AlertError> {
        let now = chrono::Utc::now().to_rfc3339();
        let mut inserted = 0;
        let mut tx = self.db_pool.begin().await?;
        for headline in headlines {
            let result = sqlx::query(
                "INSERT INTO seen_news (headline, first_seen) VALUES (?, ?)
                 ON CONFLICT(headline) DO NOTHING",
            )
            .bind(headline.as_str())
            .bind(now.as_str())
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected() as usize;
        }
        tx.commit().await?;
        Ok(inserted)
    }
}

#[async_trait]
impl SeenNewsStore for SqliteSeenStore {
    async fn lock(&self) -> Result<StoreGuard, AlertError> {
        let holder = holder_token();
        let started = tokio::time::Instant::now();
        while !self.try_claim(&holder).await? {
            if started.elapsed() >= self.lock_wait {
                return Err(AlertError::Lock(format!(
                    "seen_news still held by another pass after {}ms",
                    self.lock_wait.as_millis()
                )));
            }
            tokio::time::sleep(LOCK_POLL).await;
        }

        tracing::debug!("Locked seen-news table as {}", holder);
        Ok(StoreGuard {
            _file: None,
            lease: Some(LockLease {
                db_pool: self.db_pool.clone(),
                holder,
            }),
        })
    }

    async fn load(&self) -> Result<HashSet<Headline>, AlertError> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT headline FROM seen_news")
            .fetch_all(&self.db_pool)
            .await?;
        Ok(rows.into_iter().map(|(h,)| h).collect())
    }

    async fn save(&self, seen: &HashSet<Headline>) -> Result<(), AlertError> {
        self.insert_rows(seen.iter()).await?;
        Ok(())
    }

    /// Only the pass's own additions are written.
    async fn record(&self, _seen: &HashSet<Headline>, added: &[Headline]) -> Result<(), AlertError> {
        let inserted = self.insert_rows(added.iter()).await?;
        tracing::debug!("Inserted {} of {} new seen headlines", inserted, added.len());
        Ok(())
    }
}

/// In-process store, for tests and dry runs.
#[derive(Default)]
pub struct MemorySeenStore {
    seen: Mutex<HashSet<Headline>>,
}

impl MemorySeenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> HashSet<Headline> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SeenNewsStore for MemorySeenStore {
    async fn load(&self) -> Result<HashSet<Headline>, AlertError> {
        self.seen
            .lock()
            .map(|s| s.clone())
            .map_err(|e| AlertError::Lock(e.to_string()))
    }

    async fn save(&self, seen: &HashSet<Headline>) -> Result<(), AlertError> {
        let mut guard = self
            .seen
            .lock()
            .map_err(|e| AlertError::Lock(e.to_string()))?;
        *guard = seen.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> HashSet<Headline> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_json_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("seen_news.json"));
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_json_store_writes_sorted_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("seen_news.json");
        let store = JsonFileStore::new(&path);

        store.save(&set(&["b headline", "a headline"])).await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let parsed: Vec<String> = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, vec!["a headline", "b headline"]);
        assert_eq!(store.load().await.unwrap(), set(&["a headline", "b headline"]));
    }

    #[tokio::test]
    async fn test_json_store_resave_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen_news.json");
        let store = JsonFileStore::new(&path);
        store.save(&set(&["x", "y"])).await.unwrap();
        let before = std::fs::read_to_string(&path).unwrap();

        let loaded = store.load().await.unwrap();
        store.save(&loaded).await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }

    #[tokio::test]
    async fn test_json_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen_news.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = JsonFileStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, AlertError::Corrupt(_)));
    }

    #[tokio::test]
    async fn test_json_store_lock_creates_lock_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("seen_news.json"));
        let guard = store.lock().await.unwrap();
        assert!(dir.path().join("seen_news.json.lock").exists());
        drop(guard);
        // Re-acquiring after release must not block
        let _again = store.lock().await.unwrap();
    }

    #[tokio::test]
    async fn test_json_store_second_lock_waits_for_holder() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("seen_news.json"));
        let other = JsonFileStore::new(dir.path().join("seen_news.json"));

        let guard = store.lock().await.unwrap();
        let pending = tokio::time::timeout(Duration::from_millis(100), other.lock()).await;
        assert!(pending.is_err(), "second lock acquired while the first was held");

        drop(guard);
        let again = tokio::time::timeout(Duration::from_secs(5), other.lock()).await;
        assert!(again.unwrap().is_ok());
    }

    async fn sqlite_store() -> SqliteSeenStore {
        sqlx::any::install_default_drivers();
        let pool = sqlx::any::AnyPoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory SQLite");
        let store = SqliteSeenStore::new(pool);
        store.init_tables().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_sqlite_store_round_trip() {
        let store = sqlite_store().await;
        assert!(store.load().await.unwrap().is_empty());

        store.save(&set(&["one", "two"])).await.unwrap();
        // Saving a superset only adds the new row
        store.save(&set(&["one", "two", "three"])).await.unwrap();

        assert_eq!(store.load().await.unwrap(), set(&["one", "two", "three"]));
    }

    #[tokio::test]
    async fn test_sqlite_record_inserts_only_added_rows() {
        let store = sqlite_store().await;
        store.save(&set(&["old"])).await.unwrap();

        // "stale" is in the in-memory set but was not added by this pass
        let seen = set(&["old", "stale", "fresh"]);
        store.record(&seen, &["fresh".to_string()]).await.unwrap();

        assert_eq!(store.load().await.unwrap(), set(&["old", "fresh"]));
    }

    async fn sqlite_file_stores(dir: &Path) -> (SqliteSeenStore, SqliteSeenStore) {
        let url = format!("sqlite://{}?mode=rwc", dir.join("seen.db").display());
        let first = SqliteSeenStore::connect(&url).await.unwrap();
        let second = SqliteSeenStore::connect(&url).await.unwrap();
        (first, second)
    }

    #[tokio::test]
    async fn test_sqlite_lock_excludes_second_connection() {
        let dir = tempfile::tempdir().unwrap();
        let (first, second) = sqlite_file_stores(dir.path()).await;

        let guard = first.lock().await.unwrap();
        let pending = tokio::time::timeout(Duration::from_millis(300), second.lock()).await;
        assert!(pending.is_err(), "second lock acquired while the first was held");

        guard.release().await.unwrap();
        let _again = second.lock().await.unwrap();
    }

    #[tokio::test]
    async fn test_sqlite_lock_gives_up_after_wait() {
        let dir = tempfile::tempdir().unwrap();
        let (first, second) = sqlite_file_stores(dir.path()).await;
        let second = second.with_lock_timing(LOCK_LEASE, Duration::from_millis(150));

        let _guard = first.lock().await.unwrap();
        let err = second.lock().await.unwrap_err();
        assert!(matches!(err, AlertError::Lock(_)));
    }

    #[tokio::test]
    async fn test_sqlite_expired_lease_is_taken_over() {
        let dir = tempfile::tempdir().unwrap();
        let (first, second) = sqlite_file_stores(dir.path()).await;
        let first = first.with_lock_timing(Duration::ZERO, LOCK_WAIT);

        // A run that died without releasing
        std::mem::forget(first.lock().await.unwrap());

        let taken = tokio::time::timeout(Duration::from_secs(5), second.lock()).await;
        assert!(taken.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_memory_store_replaces_contents() {
        let store = MemorySeenStore::new();
        store.save(&set(&["a"])).await.unwrap();
        assert_eq!(store.load().await.unwrap(), set(&["a"]));
        assert_eq!(store.snapshot(), set(&["a"]));
    }
}
