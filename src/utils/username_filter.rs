use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use autoscale_cuckoo_filter::CuckooFilter;
use tracing::{info, warn};

use crate::repository::UserRepository;

const FALSE_POSITIVE_RATE: f64 = 0.001;

#[inline]
fn normalize(username: &str) -> String {
    username.trim().to_lowercase()
}

/// Probabilistic set of registered usernames.
///
/// A negative answer is only trusted after [`warmup`](Self::warmup) has loaded
/// every existing name; before that, callers must fall back to the database.
pub struct UsernameFilter {
    filter: RwLock<CuckooFilter<String>>,
    warmed: AtomicBool,
}

impl UsernameFilter {
    pub fn new(capacity: usize) -> Self {
        Self {
            filter: RwLock::new(CuckooFilter::new(capacity, FALSE_POSITIVE_RATE)),
            warmed: AtomicBool::new(false),
        }
    }

    /// True only when the filter is warm and has never seen `username`.
    /// False means "ask the database".
    pub fn is_definitely_free(&self, username: &str) -> bool {
        if !self.warmed.load(Ordering::Acquire) {
            return false;
        }
        let username = normalize(username);
        match self.filter.read() {
            Ok(filter) => !filter.contains(&username),
            Err(_) => {
                warn!("username filter lock poisoned");
                false
            }
        }
    }

    pub fn insert(&self, username: &str) {
        let username = normalize(username);
        match self.filter.write() {
            Ok(mut f) => {
                f.add(&username);
            }
            Err(_) => warn!("username filter lock poisoned, insert skipped"),
        }
    }

    /// Loads every existing username and marks the filter trustworthy.
    pub async fn warmup(&self, users: &dyn UserRepository) -> anyhow::Result<usize> {
        let names = users.list_usernames().await?;
        let total = names.len();
        {
            let mut filter = self
                .filter
                .write()
                .map_err(|_| anyhow::anyhow!("username filter lock poisoned"))?;
            for name in &names {
                filter.add(&normalize(name));
            }
        }
        self.warmed.store(true, Ordering::Release);
        info!(total, "Username filter warmup complete");
        Ok(total)
    }
}
