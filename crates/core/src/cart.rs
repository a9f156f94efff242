//! Shopping cart store with pluggable durable persistence.
//!
//! The store keeps line items in insertion order, keyed uniquely by product
//! id: adding an id that is already present merges by summing quantity.
//! Every mutation persists the full snapshot through a [`CartStorage`], so
//! state survives a process restart the way the browser cart survived a
//! page reload. Persistence failures are logged and never poison the
//! in-memory state; concurrent writers are last-write-wins by design.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Fixed namespace under which cart snapshots are persisted.
pub const CART_NAMESPACE: &str = "decorative-trees-cart";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: String,
    pub title: String,
    pub unit_price: Decimal,
    pub quantity: u32,
}

impl CartItem {
    pub fn subtotal(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// A catalog product as handed to `add_item` — a line item minus quantity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartProduct {
    pub id: String,
    pub title: String,
    pub unit_price: Decimal,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("could not read cart snapshot `{path}`: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("could not write cart snapshot `{path}`: {source}")]
    Write { path: PathBuf, source: std::io::Error },
    #[error("cart snapshot is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("cart snapshot namespace mismatch: expected `{expected}`, found `{found}`")]
    NamespaceMismatch { expected: String, found: String },
}

/// Durable storage seam for the cart. Swappable for tests.
pub trait CartStorage: Send + Sync {
    fn load(&self) -> Result<Vec<CartItem>, StorageError>;
    fn save(&self, items: &[CartItem]) -> Result<(), StorageError>;
}

/// Ephemeral storage for tests and embedded use.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    items: Mutex<Vec<CartItem>>,
}

impl CartStorage for InMemoryStorage {
    fn load(&self) -> Result<Vec<CartItem>, StorageError> {
        Ok(self.items.lock().expect("cart storage lock").clone())
    }

    fn save(&self, items: &[CartItem]) -> Result<(), StorageError> {
        *self.items.lock().expect("cart storage lock") = items.to_vec();
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CartSnapshot {
    namespace: String,
    items: Vec<CartItem>,
}

/// JSON-file-backed storage, the durable stand-in for browser local storage.
#[derive(Clone, Debug)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CartStorage for JsonFileStorage {
    fn load(&self) -> Result<Vec<CartItem>, StorageError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path)
            .map_err(|source| StorageError::Read { path: self.path.clone(), source })?;
        let snapshot: CartSnapshot = serde_json::from_str(&raw)?;
        if snapshot.namespace != CART_NAMESPACE {
            return Err(StorageError::NamespaceMismatch {
                expected: CART_NAMESPACE.to_string(),
                found: snapshot.namespace,
            });
        }
        Ok(snapshot.items)
    }

    fn save(&self, items: &[CartItem]) -> Result<(), StorageError> {
        let snapshot =
            CartSnapshot { namespace: CART_NAMESPACE.to_string(), items: items.to_vec() };
        let raw = serde_json::to_string_pretty(&snapshot)?;
        fs::write(&self.path, raw)
            .map_err(|source| StorageError::Write { path: self.path.clone(), source })
    }
}

/// The cart store. Created empty when storage has no snapshot; every
/// mutation persists the full item list.
pub struct CartStore {
    items: Vec<CartItem>,
    storage: Box<dyn CartStorage>,
}

impl CartStore {
    /// Opens the cart from storage. A missing or unreadable snapshot yields
    /// an empty cart rather than a hard failure; the decode error is logged.
    pub fn open(storage: Box<dyn CartStorage>) -> Self {
        let items = match storage.load() {
            Ok(items) => items,
            Err(error) => {
                warn!(
                    event_name = "cart.storage.load_failed",
                    error = %error,
                    "cart snapshot unreadable; starting from an empty cart"
                );
                Vec::new()
            }
        };
        Self { items, storage }
    }

    pub fn in_memory() -> Self {
        Self::open(Box::new(InMemoryStorage::default()))
    }

    /// Adds one unit of `product`, merging into an existing line item.
    pub fn add_item(&mut self, product: CartProduct) {
        self.add_item_with_quantity(product, 1);
    }

    /// Adds `quantity` units of `product`. An id already in the cart has its
    /// quantity incremented; the cart never holds two lines for one id.
    pub fn add_item_with_quantity(&mut self, product: CartProduct, quantity: u32) {
        match self.items.iter_mut().find(|item| item.id == product.id) {
            Some(existing) => existing.quantity += quantity,
            None => self.items.push(CartItem {
                id: product.id,
                title: product.title,
                unit_price: product.unit_price,
                quantity,
            }),
        }
        self.persist();
    }

    /// Removes the line item with `id`; no-op when absent.
    pub fn remove_item(&mut self, id: &str) {
        let before = self.items.len();
        self.items.retain(|item| item.id != id);
        if self.items.len() != before {
            self.persist();
        }
    }

    /// Sets the quantity for `id` exactly. Zero or negative removes the item.
    pub fn update_quantity(&mut self, id: &str, quantity: i64) {
        if quantity <= 0 {
            self.remove_item(id);
            return;
        }
        if let Some(item) = self.items.iter_mut().find(|item| item.id == id) {
            item.quantity = quantity as u32;
            self.persist();
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.persist();
    }

    /// Recomputed on every read, never cached.
    pub fn total(&self) -> Decimal {
        self.items.iter().map(CartItem::subtotal).sum()
    }

    /// Deep snapshot of the current line items, in insertion order.
    pub fn items(&self) -> Vec<CartItem> {
        self.items.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    fn persist(&self) {
        if let Err(error) = self.storage.save(&self.items) {
            warn!(
                event_name = "cart.storage.save_failed",
                error = %error,
                "cart snapshot could not be persisted; in-memory state kept"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{CartProduct, CartStore, CartStorage, JsonFileStorage, CART_NAMESPACE};

    fn tree(id: &str, price: i64) -> CartProduct {
        CartProduct {
            id: id.to_string(),
            title: format!("Tree {id}"),
            unit_price: Decimal::from(price),
        }
    }

    #[test]
    fn repeated_adds_merge_into_one_line_item() {
        let mut cart = CartStore::in_memory();
        cart.add_item(tree("fir", 100));
        cart.add_item_with_quantity(tree("fir", 100), 3);
        cart.add_item(tree("fir", 100));

        let items = cart.items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 5);
    }

    #[test]
    fn update_quantity_sets_exactly_and_zero_removes() {
        let mut cart = CartStore::in_memory();
        cart.add_item_with_quantity(tree("fir", 100), 4);

        cart.update_quantity("fir", 2);
        assert_eq!(cart.items()[0].quantity, 2);

        cart.update_quantity("fir", 0);
        assert!(cart.is_empty());

        cart.add_item(tree("fir", 100));
        cart.update_quantity("fir", -1);
        assert!(cart.is_empty());
    }

    #[test]
    fn remove_item_is_noop_for_unknown_id() {
        let mut cart = CartStore::in_memory();
        cart.add_item(tree("fir", 100));
        cart.remove_item("spruce");
        assert_eq!(cart.len(), 1);
    }

    #[test]
    fn total_recomputes_over_current_items() {
        let mut cart = CartStore::in_memory();
        assert_eq!(cart.total(), Decimal::ZERO);

        cart.add_item_with_quantity(tree("fir", 100), 2);
        cart.add_item_with_quantity(tree("spruce", 250), 1);
        assert_eq!(cart.total(), Decimal::from(450));

        cart.remove_item("spruce");
        assert_eq!(cart.total(), Decimal::from(200));
    }

    #[test]
    fn file_storage_round_trips_across_store_instances() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cart.json");

        let mut cart = CartStore::open(Box::new(JsonFileStorage::new(&path)));
        cart.add_item_with_quantity(tree("fir", 100), 2);
        drop(cart);

        let reopened = CartStore::open(Box::new(JsonFileStorage::new(&path)));
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.items()[0].quantity, 2);
    }

    #[test]
    fn file_storage_rejects_foreign_namespace() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cart.json");
        std::fs::write(&path, r#"{"namespace":"someone-else","items":[]}"#).expect("seed");

        let error = JsonFileStorage::new(&path).load().expect_err("namespace mismatch");
        assert!(error.to_string().contains(CART_NAMESPACE));
    }

    #[test]
    fn unreadable_snapshot_opens_an_empty_cart() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cart.json");
        std::fs::write(&path, "not json").expect("seed");

        let cart = CartStore::open(Box::new(JsonFileStorage::new(&path)));
        assert!(cart.is_empty());
    }
}
