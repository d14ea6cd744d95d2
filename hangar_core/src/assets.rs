use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::ids::{ItemId, TypeId};

const SHIP_FLAG_PREFIXES: &[&str] = &[
    "HiSlot",
    "MedSlot",
    "LoSlot",
    "RigSlot",
    "SubSystemSlot",
    "FighterTube",
    "Specialized",
];

const SHIP_FLAGS: &[&str] = &[
    "Cargo",
    "DroneBay",
    "FighterBay",
    "FleetHangar",
    "ShipHangar",
    "FrigateEscapeBay",
    "QuantumCoreRoom",
];

/// One entry of the provider's asset listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawAsset {
    pub item_id: ItemId,
    pub type_id: TypeId,
    pub location_id: i64,
    pub location_flag: String,
    pub quantity: u64,
    pub is_singleton: bool,
}

/// An assembled ship and the items sitting directly inside it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShipHoldings {
    pub item_id: ItemId,
    pub type_name: String,
    pub items: BTreeMap<String, u64>,
}

impl ShipHoldings {
    pub fn quantity_of(&self, item_name: &str) -> u64 {
        self.items.get(item_name).copied().unwrap_or(0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetSnapshot {
    pub owner_name: String,
    pub is_corporation: bool,
    pub ships: Vec<ShipHoldings>,
}

impl AssetSnapshot {
    /// Groups a flat asset listing into per-ship holdings.
    ///
    /// A ship is any asset that directly contains something in a fitting slot
    /// or ship bay. Ships come out ordered by item id. Types missing from
    /// `type_names` are labelled `Type <id>`.
    pub fn from_assets(
        owner_name: impl Into<String>,
        is_corporation: bool,
        assets: &[RawAsset],
        type_names: &HashMap<TypeId, String>,
    ) -> Self {
        let by_item_id: HashMap<i64, &RawAsset> = assets
            .iter()
            .map(|asset| (asset.item_id.0, asset))
            .collect();

        let mut ships: BTreeMap<ItemId, ShipHoldings> = BTreeMap::new();
        for asset in assets {
            if !is_ship_location_flag(&asset.location_flag) {
                continue;
            }
            let Some(container) = by_item_id.get(&asset.location_id) else {
                continue;
            };

            let ship = ships
                .entry(container.item_id)
                .or_insert_with(|| ShipHoldings {
                    item_id: container.item_id,
                    type_name: type_name(type_names, container.type_id),
                    items: BTreeMap::new(),
                });
            *ship
                .items
                .entry(type_name(type_names, asset.type_id))
                .or_insert(0) += asset.quantity;
        }

        Self {
            owner_name: owner_name.into(),
            is_corporation,
            ships: ships.into_values().collect(),
        }
    }

    pub fn ships_of_type<'a>(
        &'a self,
        type_name: &'a str,
    ) -> impl Iterator<Item = &'a ShipHoldings> + 'a {
        self.ships
            .iter()
            .filter(move |ship| ship.type_name == type_name)
    }
}

/// Type ids that need a name before `AssetSnapshot::from_assets` can label them.
pub fn referenced_type_ids(assets: &[RawAsset]) -> BTreeSet<TypeId> {
    assets.iter().map(|asset| asset.type_id).collect()
}

pub fn is_ship_location_flag(flag: &str) -> bool {
    SHIP_FLAGS.contains(&flag)
        || SHIP_FLAG_PREFIXES
            .iter()
            .any(|prefix| flag.starts_with(prefix))
}

fn type_name(type_names: &HashMap<TypeId, String>, type_id: TypeId) -> String {
    type_names
        .get(&type_id)
        .cloned()
        .unwrap_or_else(|| format!("Type {type_id}"))
}
