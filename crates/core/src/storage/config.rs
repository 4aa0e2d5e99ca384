use std::time::Duration;

use crate::keys::Index;

/// Physical names of the four overloaded global secondary indexes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexNames {
    pub gsi1: String,
    pub gsi2: String,
    pub gsi3: String,
    pub gsi4: String,
}

impl IndexNames {
    /// Physical name for `index`, `None` for the table itself.
    pub fn resolve(&self, index: Index) -> Option<&str> {
        match index {
            Index::Table => None,
            Index::Gsi1 => Some(&self.gsi1),
            Index::Gsi2 => Some(&self.gsi2),
            Index::Gsi3 => Some(&self.gsi3),
            Index::Gsi4 => Some(&self.gsi4),
        }
    }
}

impl Default for IndexNames {
    fn default() -> Self {
        Self {
            gsi1: "GSI1".to_string(),
            gsi2: "GSI2".to_string(),
            gsi3: "GSI3".to_string(),
            gsi4: "GSI4".to_string(),
        }
    }
}

/// Store tuning and table addressing.
///
/// Provided by the caller's composition root; nothing in this crate reads
/// the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub table_name: String,
    pub index_names: IndexNames,
    /// Keys per batch read request.
    pub batch_get_limit: usize,
    /// Entries per batch write request.
    pub batch_write_limit: usize,
    pub default_page_size: usize,
    /// Hard cap for multi-page traversals.
    pub max_items: usize,
    /// Retries of unprocessed batch entries after the first attempt.
    pub batch_retry_attempts: u32,
    pub batch_retry_base_delay: Duration,
    pub max_transaction_operations: usize,
    /// Candidates tried when generating a unique tag.
    pub tag_attempts: u32,
}

pub const DEFAULT_TABLE_NAME: &str = "tablestore";
pub const DEFAULT_BATCH_GET_LIMIT: usize = 100;
pub const DEFAULT_BATCH_WRITE_LIMIT: usize = 25;
pub const DEFAULT_PAGE_SIZE: usize = 25;
pub const DEFAULT_MAX_ITEMS: usize = 1000;
pub const DEFAULT_BATCH_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_BATCH_RETRY_BASE_DELAY: Duration = Duration::from_millis(50);
pub const DEFAULT_MAX_TRANSACTION_OPERATIONS: usize = 100;
pub const DEFAULT_TAG_ATTEMPTS: u32 = 5;

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            table_name: DEFAULT_TABLE_NAME.to_string(),
            index_names: IndexNames::default(),
            batch_get_limit: DEFAULT_BATCH_GET_LIMIT,
            batch_write_limit: DEFAULT_BATCH_WRITE_LIMIT,
            default_page_size: DEFAULT_PAGE_SIZE,
            max_items: DEFAULT_MAX_ITEMS,
            batch_retry_attempts: DEFAULT_BATCH_RETRY_ATTEMPTS,
            batch_retry_base_delay: DEFAULT_BATCH_RETRY_BASE_DELAY,
            max_transaction_operations: DEFAULT_MAX_TRANSACTION_OPERATIONS,
            tag_attempts: DEFAULT_TAG_ATTEMPTS,
        }
    }
}

impl StoreConfig {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            ..Self::default()
        }
    }

    pub fn with_index_names(mut self, index_names: IndexNames) -> Self {
        self.index_names = index_names;
        self
    }

    /// Zero limits are raised to one.
    pub fn with_batch_limits(mut self, get: usize, write: usize) -> Self {
        self.batch_get_limit = get.max(1);
        self.batch_write_limit = write.max(1);
        self
    }

    pub fn with_default_page_size(mut self, size: usize) -> Self {
        self.default_page_size = size.max(1);
        self
    }

    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items.max(1);
        self
    }

    pub fn with_batch_retry(mut self, attempts: u32, base_delay: Duration) -> Self {
        self.batch_retry_attempts = attempts;
        self.batch_retry_base_delay = base_delay;
        self
    }

    pub fn with_max_transaction_operations(mut self, max: usize) -> Self {
        self.max_transaction_operations = max.max(1);
        self
    }

    pub fn with_tag_attempts(mut self, attempts: u32) -> Self {
        self.tag_attempts = attempts.max(1);
        self
    }
}
