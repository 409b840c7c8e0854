//! Shared fixtures for unit tests.

use std::sync::Arc;

use crate::columns::{ColId, ColumnFactory};
use crate::metadata::{MemoryMdProvider, TableDesc, TableId};

/// Install the test logger so `RUST_LOG` works under `cargo test`.
/// Idempotent; later calls are no-ops.
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Two-table catalog: `t1(a, b)` with 1000 rows and `t2(c, d)` with 500.
pub(crate) struct TestCatalog {
    pub factory: ColumnFactory,
    pub provider: Arc<MemoryMdProvider>,
    pub t1: Arc<TableDesc>,
    pub t2: Arc<TableDesc>,
}

impl TestCatalog {
    pub fn new() -> Self {
        init_logger();
        let factory = ColumnFactory::new();
        let provider = Arc::new(MemoryMdProvider::new());
        let t1 = provider.register_table(TableId(1), "t1", &["a", "b"], 1000.0, &factory);
        let t2 = provider.register_table(TableId(2), "t2", &["c", "d"], 500.0, &factory);
        Self {
            factory,
            provider,
            t1,
            t2,
        }
    }

    pub fn col(&self, table: &TableDesc, idx: usize) -> ColId {
        table.columns[idx].id()
    }
}
