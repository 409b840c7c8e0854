//! Metadata accessor boundary.
//!
//! The search core never touches storage. Table shape and base statistics
//! come from an [`MdAccessor`] owned by the host; [`MemoryMdProvider`] is the
//! in-memory implementation used by tests.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::columns::{ColumnFactory, ColumnRef};
use crate::error::{OptError, OptResult};

/// Opaque table identity handed out by the host's metadata cache.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct TableId(pub u64);

/// Descriptor of one table: output columns plus base cardinality.
#[derive(Clone, Debug)]
pub struct TableDesc {
    pub id: TableId,
    pub name: String,
    pub columns: Vec<ColumnRef>,
    pub row_count: f64,
}

/// Read-only access to table descriptors by opaque id.
pub trait MdAccessor: Send + Sync + Debug {
    fn table_desc(&self, id: TableId) -> OptResult<Arc<TableDesc>>;
}

/// In-memory metadata provider.
#[derive(Debug, Default)]
pub struct MemoryMdProvider {
    tables: RwLock<HashMap<TableId, Arc<TableDesc>>>,
}

impl MemoryMdProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table, materializing fresh column identities from the
    /// session's factory.
    pub fn register_table(
        &self,
        id: TableId,
        name: impl Into<String>,
        column_names: &[&str],
        row_count: f64,
        factory: &ColumnFactory,
    ) -> Arc<TableDesc> {
        let desc = Arc::new(TableDesc {
            id,
            name: name.into(),
            columns: column_names
                .iter()
                .map(|name| factory.new_column(*name))
                .collect(),
            row_count,
        });
        self.tables.write().insert(id, desc.clone());
        desc
    }
}

impl MdAccessor for MemoryMdProvider {
    fn table_desc(&self, id: TableId) -> OptResult<Arc<TableDesc>> {
        self.tables
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| OptError::Unsupported(format!("unknown table id {:?}", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let factory = ColumnFactory::new();
        let provider = MemoryMdProvider::new();
        let desc = provider.register_table(TableId(1), "t1", &["a", "b"], 100.0, &factory);
        assert_eq!(2, desc.columns.len());

        let found = provider.table_desc(TableId(1)).unwrap();
        assert_eq!("t1", found.name);

        let missing = provider.table_desc(TableId(9));
        assert!(matches!(missing, Err(OptError::Unsupported(_))));
    }
}
