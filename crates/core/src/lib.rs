//! ItemVoid core types: the item capability the host supplies, discovery records,
//! and the collectibility predicate.

#![forbid(unsafe_code)]

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

pub mod config;
pub mod item;

pub use config::VoidConfig;
pub use item::{AttributeModifier, Inventory, ItemMeta, ItemStack, Material};

/// Item payload as seen by the pipeline. Equality and hashing are the payload's own;
/// deduplication relies on them unchanged.
pub trait Stack: Clone + Eq + Hash + Send + Sync + 'static {
    type Meta: StackMeta<Self>;

    fn amount(&self) -> i32;
    fn is_air(&self) -> bool;
    fn meta(&self) -> Option<&Self::Meta>;

    fn has_meta(&self) -> bool { self.meta().is_some() }
}

/// Metadata view of a stack. `container` is `Some` only when the item embeds an
/// inventory of further stacks (a shulker box, a chest block item).
pub trait StackMeta<S> {
    fn has_custom_model_data(&self) -> bool;
    fn has_display_name(&self) -> bool;
    fn has_lore(&self) -> bool;
    fn has_attribute_modifiers(&self) -> bool;
    fn container(&self) -> Option<&[Option<S>]>;
}

/// Returns true when the stack is worth collecting: present, non-empty, not air,
/// carrying metadata that marks it as modeled, named, lored or attribute-modified.
pub fn is_collectible<S: Stack>(stack: Option<&S>) -> bool {
    let Some(stack) = stack else { return false };
    if stack.amount() < 1 || stack.is_air() {
        return false;
    }
    match stack.meta() {
        Some(meta) => {
            meta.has_custom_model_data()
                || meta.has_display_name()
                || meta.has_lore()
                || meta.has_attribute_modifiers()
        }
        None => false,
    }
}

/// Raw discovery record: when the stack was seen and the stack itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoidItem<S> {
    /// Milliseconds since the Unix epoch.
    pub discovered_at: i64,
    pub stack: S,
}

impl<S> VoidItem<S> {
    pub fn new(discovered_at: i64, stack: S) -> Self { Self { discovered_at, stack } }

    /// Record stamped with the current wall-clock time.
    pub fn now(stack: S) -> Self { Self::new(now_millis(), stack) }
}

/// Result-facing record handed to poll callers.
///
/// Two baked items are equal iff their stacks are equal; the timestamp does not take
/// part in equality or hashing, so a set of baked items holds one entry per distinct stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BakedItem<S>(VoidItem<S>);

impl<S> BakedItem<S> {
    pub fn new(discovered_at: i64, stack: S) -> Self { Self(VoidItem::new(discovered_at, stack)) }

    pub fn discovered_at(&self) -> i64 { self.0.discovered_at }
    pub fn stack(&self) -> &S { &self.0.stack }
    pub fn into_inner(self) -> VoidItem<S> { self.0 }
}

impl<S> From<VoidItem<S>> for BakedItem<S> {
    fn from(v: VoidItem<S>) -> Self { Self(v) }
}

impl<S: PartialEq> PartialEq for BakedItem<S> {
    fn eq(&self, other: &Self) -> bool { self.0.stack == other.0.stack }
}

impl<S: Eq> Eq for BakedItem<S> {}

impl<S: Hash> Hash for BakedItem<S> {
    fn hash<H: Hasher>(&self, state: &mut H) { self.0.stack.hash(state) }
}

pub fn now_millis() -> i64 { chrono::Utc::now().timestamp_millis() }

/// Errors from the fallible setup paths. Intake and polling never fail.
#[derive(Debug, thiserror::Error)]
pub enum VoidError {
    #[error("config: {0}")]
    Config(String),
    #[error("io: {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parse: {0}")]
    Parse(String),
    #[error("no tokio runtime available for poll tasks")]
    NoRuntime,
}

impl From<serde_yaml::Error> for VoidError {
    fn from(e: serde_yaml::Error) -> Self { VoidError::Parse(e.to_string()) }
}

impl From<serde_json::Error> for VoidError {
    fn from(e: serde_json::Error) -> Self { VoidError::Parse(e.to_string()) }
}

pub type VoidResult<T> = Result<T, VoidError>;

pub mod prelude {
    pub use super::{
        is_collectible, BakedItem, Inventory, ItemMeta, ItemStack, Material, Stack, StackMeta,
        VoidConfig, VoidError, VoidItem, VoidResult,
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn named(name: &str) -> ItemStack {
        ItemStack::new("minecraft:diamond_sword", 1).with_meta(ItemMeta::named(name))
    }

    #[test]
    fn collectible_requires_interesting_meta() {
        assert!(is_collectible(Some(&named("Excalibur"))));
        assert!(!is_collectible::<ItemStack>(None));
        assert!(!is_collectible(Some(&ItemStack::new("minecraft:stick", 1))));
        assert!(!is_collectible(Some(&ItemStack::new("minecraft:stick", 1).with_meta(ItemMeta::default()))));
    }

    #[test]
    fn collectible_rejects_empty_and_air() {
        let mut zero = named("Excalibur");
        zero.amount = 0;
        assert!(!is_collectible(Some(&zero)));

        let air = ItemStack::new("minecraft:air", 1).with_meta(ItemMeta::named("ghost"));
        assert!(!is_collectible(Some(&air)));
    }

    #[test]
    fn collectible_accepts_each_marker() {
        let model = ItemMeta { custom_model_data: Some(7), ..Default::default() };
        let lore = ItemMeta::default().with_lore(["forged in the deep"]);
        let attrs = ItemMeta {
            attribute_modifiers: vec![AttributeModifier::new("generic.attack_damage", 5)],
            ..Default::default()
        };
        for meta in [model, lore, attrs] {
            assert!(is_collectible(Some(&ItemStack::new("minecraft:stone", 3).with_meta(meta))));
        }
    }

    #[test]
    fn blank_name_and_lore_do_not_count() {
        let blank = ItemMeta { display_name: Some(String::new()), lore: Vec::new(), ..Default::default() };
        assert!(!is_collectible(Some(&ItemStack::new("minecraft:stone", 1).with_meta(blank))));
    }

    #[test]
    fn baked_equality_ignores_timestamp() {
        let a = BakedItem::new(1, named("Excalibur"));
        let b = BakedItem::from(VoidItem::new(99, named("Excalibur")));
        let c = BakedItem::new(1, named("Durendal"));
        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<_> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn baked_serializes_flat() {
        let b = BakedItem::new(42, ItemStack::new("minecraft:stick", 1));
        let v = serde_json::to_value(&b).unwrap();
        assert_eq!(v["discovered_at"], 42);
        assert_eq!(v["stack"]["material"], "minecraft:stick");
    }
}
