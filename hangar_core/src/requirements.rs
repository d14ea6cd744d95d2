use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

use crate::assets::{AssetSnapshot, ShipHoldings};

/// Required item quantities per ship type.
///
/// The document form is TOML with one table per ship type:
///
/// ```toml
/// [Rifter]
/// "220mm AutoCannon II" = 3
/// "Damage Control II" = 1
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequirementSpec {
    ships: BTreeMap<String, BTreeMap<String, u64>>,
}

#[derive(Debug, thiserror::Error)]
pub enum RequirementParseError {
    #[error("invalid requirements document: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("requirements could not be rendered: {0}")]
    Render(#[from] toml::ser::Error),
}

impl RequirementSpec {
    pub fn parse(input: &str) -> Result<Self, RequirementParseError> {
        Ok(toml::from_str(input)?)
    }

    pub fn to_document(&self) -> Result<String, RequirementParseError> {
        Ok(toml::to_string(self)?)
    }

    /// Current holdings expressed as requirements. Hulls sharing a type
    /// contribute the largest quantity seen for each item.
    pub fn from_snapshot(snapshot: &AssetSnapshot) -> Self {
        let mut spec = Self::default();
        for ship in &snapshot.ships {
            let required = spec.ships.entry(ship.type_name.clone()).or_default();
            for (item, &quantity) in &ship.items {
                let entry = required.entry(item.clone()).or_insert(0);
                *entry = (*entry).max(quantity);
            }
        }
        spec
    }

    pub fn require(&mut self, ship: impl Into<String>, item: impl Into<String>, quantity: u64) {
        self.ships
            .entry(ship.into())
            .or_default()
            .insert(item.into(), quantity);
    }

    pub fn is_empty(&self) -> bool {
        self.ships.is_empty()
    }

    pub fn ships(&self) -> impl Iterator<Item = (&str, &BTreeMap<String, u64>)> {
        self.ships
            .iter()
            .map(|(ship, items)| (ship.as_str(), items))
    }

    /// Lazily yields every shortage of `snapshot` against this spec.
    ///
    /// Order is ship type, then hull in snapshot order, then item name, so two
    /// calls over the same inputs yield the same sequence. A ship type with no
    /// hull in the snapshot is short of everything it requires.
    pub fn check<'a>(
        &'a self,
        snapshot: &'a AssetSnapshot,
    ) -> impl Iterator<Item = Deficiency> + 'a {
        self.ships.iter().flat_map(move |(ship_name, required)| {
            let mut hulls: Vec<Option<&'a ShipHoldings>> =
                snapshot.ships_of_type(ship_name).map(Some).collect();
            if hulls.is_empty() {
                hulls.push(None);
            }

            hulls.into_iter().flat_map(move |hull| {
                required.iter().filter_map(move |(item, &needed)| {
                    let held = hull.map_or(0, |ship| ship.quantity_of(item));
                    (held < needed).then(|| Deficiency {
                        ship: ship_name.clone(),
                        item: item.clone(),
                        shortage: needed - held,
                    })
                })
            })
        })
    }

    pub fn accumulate_buy_list(&self, snapshot: &AssetSnapshot, mut buy_list: BuyList) -> BuyList {
        for deficiency in self.check(snapshot) {
            buy_list.add(deficiency.item, deficiency.shortage);
        }
        buy_list
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Deficiency {
    pub ship: String,
    pub item: String,
    pub shortage: u64,
}

impl fmt::Display for Deficiency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: missing {}x {}", self.ship, self.shortage, self.item)
    }
}

/// Item name to total shortage. Merging is summation, so the order in which
/// snapshots are folded in does not matter.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BuyList(BTreeMap<String, u64>);

impl BuyList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, item: impl Into<String>, quantity: u64) {
        if quantity == 0 {
            return;
        }
        let entry = self.0.entry(item.into()).or_insert(0);
        *entry = entry.saturating_add(quantity);
    }

    pub fn merge(mut self, other: BuyList) -> Self {
        for (item, quantity) in other.0 {
            self.add(item, quantity);
        }
        self
    }

    pub fn get(&self, item: &str) -> u64 {
        self.0.get(item).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(item, &quantity)| (item.as_str(), quantity))
    }
}

impl<S: Into<String>> FromIterator<(S, u64)> for BuyList {
    fn from_iter<I: IntoIterator<Item = (S, u64)>>(iter: I) -> Self {
        let mut buy_list = Self::new();
        for (item, quantity) in iter {
            buy_list.add(item, quantity);
        }
        buy_list
    }
}

/// Multibuy paste format, one `<item> <quantity>` per line.
impl fmt::Display for BuyList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, (item, quantity)) in self.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{item} {quantity}")?;
        }
        Ok(())
    }
}
