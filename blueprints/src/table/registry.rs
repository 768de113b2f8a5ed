//! Explicit registry of the blueprint tables a load cycle fills.

use std::fmt;
use std::sync::Arc;

use super::BlueprintTable;
use crate::error::{RegistryError, RegistryResult};

/// Tables in registration order, unique by name.
#[derive(Default, Clone)]
pub struct BlueprintRegistry {
    tables: Vec<Arc<dyn BlueprintTable>>,
}

impl BlueprintRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `table` and return a typed handle to it.
    pub fn register<T: BlueprintTable + 'static>(&mut self, table: T) -> RegistryResult<Arc<T>> {
        let table = Arc::new(table);
        self.register_shared(table.clone())?;
        Ok(table)
    }

    /// Register an already shared table.
    pub fn register_shared(&mut self, table: Arc<dyn BlueprintTable>) -> RegistryResult<()> {
        if self.get(table.name()).is_some() {
            return Err(RegistryError::DuplicateTable(table.name().to_string()));
        }
        self.tables.push(table);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn BlueprintTable>> {
        self.tables.iter().find(|t| t.name() == name)
    }

    pub fn tables(&self) -> &[Arc<dyn BlueprintTable>] {
        &self.tables
    }

    pub fn names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl fmt::Debug for BlueprintRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlueprintRegistry").field("tables", &self.names()).finish()
    }
}
