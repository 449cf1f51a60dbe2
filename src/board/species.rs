use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ability::AbilityId;

// === Enums ===

/// Elemental type of a species (and of a stage's target).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PkType {
    None,
    Normal,
    Fire,
    Water,
    Electric,
    Grass,
    Ice,
    Fighting,
    Poison,
    Ground,
    Flying,
    Psychic,
    Bug,
    Rock,
    Ghost,
    Dragon,
    Dark,
    Steel,
    Fairy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Effectiveness {
    Super,
    Normal,
    NotVery,
}

impl Effectiveness {
    pub fn multiplier(self) -> f64 {
        match self {
            Effectiveness::Super => 2.0,
            Effectiveness::Normal => 1.0,
            Effectiveness::NotVery => 0.5,
        }
    }
}

impl PkType {
    pub fn all() -> &'static [PkType] {
        use PkType::*;
        &[
            Normal, Fire, Water, Electric, Grass, Ice, Fighting, Poison, Ground, Flying, Psychic,
            Bug, Rock, Ghost, Dragon, Dark, Steel, Fairy,
        ]
    }

    /// Effectiveness of an attack of this type against `defender`.
    /// Immunities collapse to `NotVery`; the typeless side is always neutral.
    pub fn effectiveness(self, defender: PkType) -> Effectiveness {
        if self == PkType::None || defender == PkType::None {
            return Effectiveness::Normal;
        }
        if super_effective_against(self).contains(&defender) {
            Effectiveness::Super
        } else if resisted_by(self).contains(&defender) {
            Effectiveness::NotVery
        } else {
            Effectiveness::Normal
        }
    }
}

fn super_effective_against(attacker: PkType) -> &'static [PkType] {
    use PkType::*;
    match attacker {
        None | Normal => &[],
        Fire => &[Grass, Ice, Bug, Steel],
        Water => &[Fire, Ground, Rock],
        Electric => &[Water, Flying],
        Grass => &[Water, Ground, Rock],
        Ice => &[Grass, Ground, Flying, Dragon],
        Fighting => &[Normal, Ice, Rock, Dark, Steel],
        Poison => &[Grass, Fairy],
        Ground => &[Fire, Electric, Poison, Rock, Steel],
        Flying => &[Grass, Fighting, Bug],
        Psychic => &[Fighting, Poison],
        Bug => &[Grass, Psychic, Dark],
        Rock => &[Fire, Ice, Flying, Bug],
        Ghost => &[Psychic, Ghost],
        Dragon => &[Dragon],
        Dark => &[Psychic, Ghost],
        Steel => &[Ice, Rock, Fairy],
        Fairy => &[Fighting, Dragon, Dark],
    }
}

fn resisted_by(attacker: PkType) -> &'static [PkType] {
    use PkType::*;
    match attacker {
        None => &[],
        Normal => &[Rock, Steel, Ghost],
        Fire => &[Fire, Water, Rock, Dragon],
        Water => &[Water, Grass, Dragon],
        Electric => &[Electric, Grass, Dragon, Ground],
        Grass => &[Fire, Grass, Poison, Flying, Bug, Dragon, Steel],
        Ice => &[Fire, Water, Ice, Steel],
        Fighting => &[Poison, Flying, Psychic, Bug, Fairy, Ghost],
        Poison => &[Poison, Ground, Rock, Ghost, Steel],
        Ground => &[Grass, Bug, Flying],
        Flying => &[Electric, Rock, Steel],
        Psychic => &[Psychic, Steel, Dark],
        Bug => &[Fire, Fighting, Poison, Flying, Ghost, Steel, Fairy],
        Rock => &[Fighting, Ground, Steel],
        Ghost => &[Dark, Normal],
        Dragon => &[Steel, Fairy],
        Dark => &[Fighting, Dark, Fairy],
        Steel => &[Fire, Water, Electric, Steel],
        Fairy => &[Fire, Poison, Steel],
    }
}

// === Species ===

/// Index of a species inside a [`SpeciesCatalog`]. The first four ids are
/// reserved for the structural species every catalog carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct SpeciesId(pub u16);

impl SpeciesId {
    pub const AIR: SpeciesId = SpeciesId(0);
    pub const WOOD: SpeciesId = SpeciesId(1);
    pub const METAL: SpeciesId = SpeciesId(2);
    pub const COIN: SpeciesId = SpeciesId(3);

    pub fn is_air(self) -> bool {
        self == SpeciesId::AIR
    }

    /// Empty cells and structural obstructions can never carry the frozen flag.
    pub fn is_freezable(self) -> bool {
        !matches!(self, SpeciesId::AIR | SpeciesId::WOOD | SpeciesId::METAL)
    }

    pub fn is_matchable(self) -> bool {
        !matches!(self, SpeciesId::AIR | SpeciesId::WOOD | SpeciesId::METAL)
    }

    /// Obstructions and currency tiles, the tiles disruption-clearing abilities target.
    pub fn is_disruption(self) -> bool {
        matches!(self, SpeciesId::WOOD | SpeciesId::METAL | SpeciesId::COIN)
    }
}

/// Attack bonus by level (0-10) for ordinary species.
const LEVEL_BONUS: [u32; 11] = [0, 0, 5, 10, 15, 20, 25, 30, 35, 40, 45];
/// Attack bonus by level for species whose base attack is [`LOW_ATTACK`].
const LOW_LEVEL_BONUS: [u32; 11] = [0, 0, 3, 6, 8, 10, 12, 14, 16, 18, 20];
const LOW_ATTACK: u32 = 30;

/// Immutable catalog entry for one species.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesDef {
    pub name: String,
    pub attack: u32,
    pub kind: PkType,
    pub ability: AbilityId,
    #[serde(default)]
    pub mega_name: Option<String>,
    #[serde(default)]
    pub mega_ability: Option<AbilityId>,
}

impl SpeciesDef {
    pub fn new(name: &str, attack: u32, kind: PkType, ability: AbilityId) -> Self {
        Self {
            name: name.to_string(),
            attack,
            kind,
            ability,
            mega_name: None,
            mega_ability: None,
        }
    }

    pub fn with_mega(mut self, mega_name: &str, mega_ability: AbilityId) -> Self {
        self.mega_name = Some(mega_name.to_string());
        self.mega_ability = Some(mega_ability);
        self
    }

    /// Attack at `level`; levels past 10 use the level-10 bonus.
    pub fn attack_at(&self, level: u8) -> u32 {
        let idx = (level as usize).min(10);
        let table = if self.attack == LOW_ATTACK {
            &LOW_LEVEL_BONUS
        } else {
            &LEVEL_BONUS
        };
        self.attack + table[idx]
    }
}

/// Lookup from [`SpeciesId`] and name to species definitions.
#[derive(Debug, Clone)]
pub struct SpeciesCatalog {
    species: Vec<SpeciesDef>,
    by_name: HashMap<String, SpeciesId>,
}

impl Default for SpeciesCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeciesCatalog {
    /// A catalog holding only the structural species.
    pub fn new() -> Self {
        let mut catalog = SpeciesCatalog {
            species: Vec::new(),
            by_name: HashMap::new(),
        };
        catalog.insert(SpeciesDef::new("Air", 0, PkType::None, AbilityId::Air));
        catalog.insert(SpeciesDef::new("Wood", 0, PkType::None, AbilityId::Wood));
        catalog.insert(SpeciesDef::new("Metal", 0, PkType::None, AbilityId::Metal));
        catalog.insert(SpeciesDef::new("Coin", 0, PkType::None, AbilityId::Coin));
        catalog
    }

    /// Register a species, replacing any existing entry with the same name.
    pub fn insert(&mut self, def: SpeciesDef) -> SpeciesId {
        if let Some(&id) = self.by_name.get(&def.name) {
            self.species[id.0 as usize] = def;
            return id;
        }
        let id = SpeciesId(self.species.len() as u16);
        self.by_name.insert(def.name.clone(), id);
        self.species.push(def);
        id
    }

    /// Definition for `id`; unknown ids resolve to the empty species.
    pub fn get(&self, id: SpeciesId) -> &SpeciesDef {
        self.species
            .get(id.0 as usize)
            .unwrap_or(&self.species[SpeciesId::AIR.0 as usize])
    }

    pub fn id_of(&self, name: &str) -> Option<SpeciesId> {
        self.by_name.get(name).copied()
    }

    pub fn name_of(&self, id: SpeciesId) -> &str {
        &self.get(id).name
    }

    pub fn len(&self) -> usize {
        self.species.len()
    }

    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SpeciesId, &SpeciesDef)> {
        self.species
            .iter()
            .enumerate()
            .map(|(i, def)| (SpeciesId(i as u16), def))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_species_are_preregistered() {
        let catalog = SpeciesCatalog::new();
        assert_eq!(catalog.id_of("Air"), Some(SpeciesId::AIR));
        assert_eq!(catalog.id_of("Wood"), Some(SpeciesId::WOOD));
        assert_eq!(catalog.id_of("Metal"), Some(SpeciesId::METAL));
        assert_eq!(catalog.id_of("Coin"), Some(SpeciesId::COIN));
        assert_eq!(catalog.len(), 4);
    }

    #[test]
    fn insert_replaces_same_name() {
        let mut catalog = SpeciesCatalog::new();
        let a = catalog.insert(SpeciesDef::new("Pikachu", 50, PkType::Electric, AbilityId::None));
        let b = catalog.insert(SpeciesDef::new("Pikachu", 60, PkType::Electric, AbilityId::None));
        assert_eq!(a, b);
        assert_eq!(catalog.get(a).attack, 60);
    }

    #[test]
    fn unknown_id_resolves_to_air() {
        let catalog = SpeciesCatalog::new();
        assert_eq!(catalog.get(SpeciesId(999)).name, "Air");
    }

    #[test]
    fn attack_uses_level_tables() {
        let normal = SpeciesDef::new("A", 50, PkType::Normal, AbilityId::None);
        let low = SpeciesDef::new("B", 30, PkType::Normal, AbilityId::None);
        assert_eq!(normal.attack_at(0), 50);
        assert_eq!(normal.attack_at(1), 50);
        assert_eq!(normal.attack_at(10), 95);
        assert_eq!(normal.attack_at(15), 95);
        assert_eq!(low.attack_at(10), 50);
        assert_eq!(low.attack_at(2), 33);
    }

    #[test]
    fn type_chart_samples() {
        assert_eq!(PkType::Water.effectiveness(PkType::Fire), Effectiveness::Super);
        assert_eq!(PkType::Fire.effectiveness(PkType::Water), Effectiveness::NotVery);
        assert_eq!(PkType::Normal.effectiveness(PkType::Water), Effectiveness::Normal);
        // immunity collapses to not very effective
        assert_eq!(PkType::Normal.effectiveness(PkType::Ghost), Effectiveness::NotVery);
        assert_eq!(PkType::None.effectiveness(PkType::Dragon), Effectiveness::Normal);
        assert_eq!(Effectiveness::Super.multiplier(), 2.0);
        assert_eq!(Effectiveness::NotVery.multiplier(), 0.5);
    }

    #[test]
    fn freezable_and_matchable_flags() {
        assert!(!SpeciesId::AIR.is_freezable());
        assert!(!SpeciesId::WOOD.is_freezable());
        assert!(SpeciesId::COIN.is_freezable());
        assert!(SpeciesId::COIN.is_matchable());
        assert!(!SpeciesId::METAL.is_matchable());
        assert!(SpeciesId(7).is_matchable());
        assert!(SpeciesId::METAL.is_disruption());
        assert!(!SpeciesId(7).is_disruption());
    }
}
