//! Recursive container expansion with a hard depth cutoff.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use itemvoid_core::{is_collectible, Stack, StackMeta};
use metrics::counter;
use rustc_hash::FxHashSet;
use tracing::error;

/// Collect every collectible stack nested inside `meta`'s container, descending through
/// containers-in-containers. Scanning stops once `depth` exceeds `max_depth`.
///
/// A slot item with metadata is added when collectible and is always descended into, so a
/// plain container can still yield named children. A panic while scanning one container
/// drops that container's contribution only.
pub fn expand<S: Stack>(meta: &S::Meta, depth: usize, max_depth: usize) -> FxHashSet<S> {
    if depth > max_depth {
        return FxHashSet::default();
    }
    isolate(depth, || scan_container::<S>(meta, depth, max_depth))
}

/// Run `work`, turning a panic into an empty result. The failure is logged and counted;
/// the caller carries on with its other entries.
pub fn isolate<T: Default>(depth: usize, work: impl FnOnce() -> T) -> T {
    match panic::catch_unwind(AssertUnwindSafe(work)) {
        Ok(found) => found,
        Err(payload) => {
            counter!("itemvoid_expand_failures_total", 1u64);
            error!(depth, reason = %panic_reason(payload.as_ref()), "item expansion failed; dropping branch");
            T::default()
        }
    }
}

fn scan_container<S: Stack>(meta: &S::Meta, depth: usize, max_depth: usize) -> FxHashSet<S> {
    let mut found = FxHashSet::default();
    let Some(slots) = meta.container() else { return found };
    for slot in slots.iter().flatten() {
        let Some(inner) = slot.meta() else { continue };
        if is_collectible(Some(slot)) {
            found.insert(slot.clone());
        }
        found.extend(expand::<S>(inner, depth + 1, max_depth));
    }
    found
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use itemvoid_core::{ItemMeta, ItemStack};

    fn sword(name: &str) -> Option<ItemStack> {
        Some(ItemStack::new("minecraft:diamond_sword", 1).with_meta(ItemMeta::named(name)))
    }

    fn chest(slots: Vec<Option<ItemStack>>) -> ItemStack {
        ItemStack::new("minecraft:chest", 1).with_meta(ItemMeta::container(slots))
    }

    fn names(found: &FxHashSet<ItemStack>) -> Vec<String> {
        let mut v: Vec<_> = found
            .iter()
            .filter_map(|s| s.meta.as_ref().and_then(|m| m.display_name.clone()))
            .collect();
        v.sort();
        v
    }

    #[test]
    fn non_container_meta_yields_nothing() {
        assert!(expand::<ItemStack>(&ItemMeta::named("solo"), 0, 3).is_empty());
    }

    #[test]
    fn skips_empty_slots_and_plain_items() {
        let meta = ItemMeta::container(vec![None, Some(ItemStack::new("minecraft:stick", 4)), sword("Excalibur")]);
        assert_eq!(names(&expand::<ItemStack>(&meta, 0, 3)), vec!["Excalibur"]);
    }

    #[test]
    fn descends_through_plain_containers() {
        let meta = ItemMeta::container(vec![Some(chest(vec![Some(chest(vec![sword("deep")]))]))]);
        assert_eq!(names(&expand::<ItemStack>(&meta, 0, 3)), vec!["deep"]);
    }

    #[test]
    fn named_container_is_kept_and_opened() {
        let mut named_box = chest(vec![sword("inner")]);
        named_box.meta.as_mut().unwrap().display_name = Some("Ender Stash".into());
        let meta = ItemMeta::container(vec![Some(named_box)]);
        assert_eq!(names(&expand::<ItemStack>(&meta, 0, 3)), vec!["Ender Stash", "inner"]);
    }

    #[test]
    fn identical_nested_items_collapse() {
        let meta = ItemMeta::container(vec![sword("twin"), sword("twin"), Some(chest(vec![sword("twin")]))]);
        assert_eq!(expand::<ItemStack>(&meta, 0, 3).len(), 1);
    }

    #[test]
    fn depth_past_limit_is_a_hard_stop() {
        let meta = ItemMeta::container(vec![sword("x")]);
        assert_eq!(expand::<ItemStack>(&meta, 2, 2).len(), 1);
        assert!(expand::<ItemStack>(&meta, 3, 2).is_empty());
    }

    /// Stack whose metadata access panics when trapped, standing in for a corrupted
    /// host block state.
    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    struct Probe {
        name: Option<String>,
        trap: bool,
        slots: Option<Vec<Option<Probe>>>,
    }

    impl Probe {
        fn named(n: &str) -> Option<Probe> { Some(Probe { name: Some(n.into()), trap: false, slots: None }) }
        fn trap() -> Option<Probe> { Some(Probe { name: Some("trap".into()), trap: true, slots: None }) }
        fn boxed(slots: Vec<Option<Probe>>) -> Probe { Probe { name: None, trap: false, slots: Some(slots) } }
    }

    impl Stack for Probe {
        type Meta = Probe;
        fn amount(&self) -> i32 { 1 }
        fn is_air(&self) -> bool { false }
        fn meta(&self) -> Option<&Probe> {
            if self.trap { panic!("corrupted block state") }
            Some(self)
        }
    }

    impl StackMeta<Probe> for Probe {
        fn has_custom_model_data(&self) -> bool { false }
        fn has_display_name(&self) -> bool { self.name.is_some() }
        fn has_lore(&self) -> bool { false }
        fn has_attribute_modifiers(&self) -> bool { false }
        fn container(&self) -> Option<&[Option<Probe>]> { self.slots.as_deref() }
    }

    #[test]
    fn panic_in_one_branch_spares_siblings() {
        let root = Probe::boxed(vec![
            Probe::named("kept"),
            Some(Probe::boxed(vec![Probe::named("lost"), Probe::trap()])),
            Some(Probe::boxed(vec![Probe::named("also kept")])),
        ]);
        let found = expand::<Probe>(&root, 0, 3);
        let mut got: Vec<_> = found.iter().filter_map(|p| p.name.clone()).collect();
        got.sort();
        assert_eq!(got, vec!["also kept", "kept"]);
    }
}
