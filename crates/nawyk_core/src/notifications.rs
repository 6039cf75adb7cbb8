use crate::table::TableKind;

/// Display layers implement this to learn when a projection was rebuilt.
///
/// Observers are registered explicitly on the adapter (or through the service
/// builder) and fire after every successful mutation; a rejected operation
/// never notifies.
pub trait TableObserver: Send + Sync {
    fn table_changed(&self, table: TableKind);
}
