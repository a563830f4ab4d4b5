//! Concrete item model. Mirrors the shape of a game item stack closely enough to be
//! loaded from JSON/YAML dumps and to exercise nested containers.

use serde::{Deserialize, Serialize};

use crate::{Stack, StackMeta};

/// Namespaced material id, e.g. `minecraft:shulker_box`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Material(String);

impl Material {
    pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }
    pub fn as_str(&self) -> &str { &self.0 }

    /// Empty ids and the air family count as air.
    pub fn is_air(&self) -> bool {
        let id = self.0.trim();
        let bare = id.strip_prefix("minecraft:").unwrap_or(id);
        matches!(bare, "" | "air" | "cave_air" | "void_air")
    }
}

impl From<&str> for Material {
    fn from(s: &str) -> Self { Self::new(s) }
}

impl std::fmt::Display for Material {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.pad(&self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemStack {
    pub material: Material,
    #[serde(default = "default_amount")]
    pub amount: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<ItemMeta>,
}

fn default_amount() -> i32 { 1 }

impl ItemStack {
    pub fn new(material: impl Into<Material>, amount: i32) -> Self {
        Self { material: material.into(), amount, meta: None }
    }

    pub fn with_meta(mut self, meta: ItemMeta) -> Self {
        self.meta = Some(meta);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_model_data: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub lore: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attribute_modifiers: Vec<AttributeModifier>,
    /// Block-state inventory for container items.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inventory: Option<Inventory>,
}

impl ItemMeta {
    pub fn named(name: impl Into<String>) -> Self {
        Self { display_name: Some(name.into()), ..Default::default() }
    }

    pub fn container(slots: Vec<Option<ItemStack>>) -> Self {
        Self { inventory: Some(Inventory { slots }), ..Default::default() }
    }

    pub fn with_lore<I, L>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<String>,
    {
        self.lore = lines.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Inventory {
    /// `None` marks an empty slot.
    pub slots: Vec<Option<ItemStack>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributeModifier {
    pub attribute: String,
    /// Fixed-point amount in thousandths, keeps the type hashable.
    pub amount_milli: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<String>,
}

impl AttributeModifier {
    pub fn new(attribute: impl Into<String>, amount: i64) -> Self {
        Self { attribute: attribute.into(), amount_milli: amount.saturating_mul(1000), slot: None }
    }
}

impl Stack for ItemStack {
    type Meta = ItemMeta;

    fn amount(&self) -> i32 { self.amount }
    fn is_air(&self) -> bool { self.material.is_air() }
    fn meta(&self) -> Option<&ItemMeta> { self.meta.as_ref() }
}

impl StackMeta<ItemStack> for ItemMeta {
    fn has_custom_model_data(&self) -> bool { self.custom_model_data.is_some() }
    fn has_display_name(&self) -> bool { self.display_name.as_deref().is_some_and(|n| !n.is_empty()) }
    fn has_lore(&self) -> bool { !self.lore.is_empty() }
    fn has_attribute_modifiers(&self) -> bool { !self.attribute_modifiers.is_empty() }
    fn container(&self) -> Option<&[Option<ItemStack>]> { self.inventory.as_ref().map(|inv| inv.slots.as_slice()) }
}
