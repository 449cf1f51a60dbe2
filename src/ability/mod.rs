mod attack;
mod effects;
mod mega;

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::board::{Board, Coord, SpeciesId};
use crate::simulation::combo::{Combo, EraseMode};
use crate::simulation::context::TrialContext;
use crate::simulation::state::TrialState;

/// Ticks between a combo finalising and its cells turning empty.
pub const DEFAULT_ERASURE_DELAY: u32 = 24;
/// Ticks between two steps of a progressive ability.
pub const DEFAULT_REPEAT_DELAY: u32 = 8;

// === Odds tables (match size 3, 4, 5, 6+) ===

pub(crate) const NEVER: [u8; 4] = [0, 0, 0, 0];
pub(crate) const ALWAYS: [u8; 4] = [100, 100, 100, 100];
pub(crate) const COMMON: [u8; 4] = [30, 50, 100, 100];
pub(crate) const STRONG: [u8; 4] = [10, 30, 60, 100];
pub(crate) const RARE: [u8; 4] = [5, 20, 50, 100];

// === Hook signatures ===

pub type PlanFn = fn(&mut TrialState, &TrialContext<'_>, &Combo) -> VecDeque<Vec<Coord>>;
pub type ExtraBlocksFn = fn(&mut TrialState, &TrialContext<'_>, &Combo) -> Vec<Coord>;
pub type ExtraBlockEffectFn = fn(&mut TrialState, &TrialContext<'_>, &Combo, &[Coord]);
pub type ScoreFn = fn(&mut TrialState, &TrialContext<'_>, &Combo) -> f64;
pub type EffectFn = fn(&mut TrialState, &TrialContext<'_>, &Combo);

/// Extra score an ability adds on top of the basic combo score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bonus {
    None,
    /// `value × per × 50`.
    Flat(f64),
    /// `attack × value × per × 0.2 × type multiplier`.
    Scaled(f64),
}

impl Bonus {
    pub fn score(self, value: u32, attack: f64, type_multiplier: f64) -> f64 {
        match self {
            Bonus::None => 0.0,
            Bonus::Flat(per) => value as f64 * per * 50.0,
            Bonus::Scaled(per) => attack * value as f64 * per * 0.2 * type_multiplier,
        }
    }
}

/// Behaviour bundle for one ability identifier: activation odds plus the
/// optional hooks the cascade engine calls while a combo resolves.
#[derive(Debug, Clone, Copy)]
pub struct AbilityDef {
    pub id: AbilityId,
    /// Activation odds in percent, indexed by match size 3, 4, 5, 6+.
    pub odds: [u8; 4],
    /// Multi-tick alternate-form ability.
    pub persistent: bool,
    pub erasure_delay: u32,
    pub repeat_delay: u32,
    /// Cap on the running counter of a progressive ability.
    pub value_limit: u32,
    pub bonus: Bonus,
    /// How cells added beyond the matched run are erased.
    pub extra_erase_mode: EraseMode,
    pub plan: Option<PlanFn>,
    pub extra_blocks: Option<ExtraBlocksFn>,
    pub extra_block_effect: Option<ExtraBlockEffectFn>,
    pub score_multiplier: Option<ScoreFn>,
    pub side_effect: Option<EffectFn>,
    pub post_clear: Option<EffectFn>,
}

impl AbilityDef {
    pub fn new(id: AbilityId, odds: [u8; 4]) -> Self {
        AbilityDef {
            id,
            odds,
            persistent: false,
            erasure_delay: DEFAULT_ERASURE_DELAY,
            repeat_delay: DEFAULT_REPEAT_DELAY,
            value_limit: 0,
            bonus: Bonus::None,
            extra_erase_mode: EraseMode::Normal,
            plan: None,
            extra_blocks: None,
            extra_block_effect: None,
            score_multiplier: None,
            side_effect: None,
            post_clear: None,
        }
    }

    /// Alternate-form ability: always fires and may run over several ticks.
    pub fn persistent(id: AbilityId) -> Self {
        AbilityDef {
            persistent: true,
            ..AbilityDef::new(id, ALWAYS)
        }
    }

    fn score(mut self, f: ScoreFn) -> Self {
        self.score_multiplier = Some(f);
        self
    }

    fn effect(mut self, f: EffectFn) -> Self {
        self.side_effect = Some(f);
        self
    }

    fn after(mut self, f: EffectFn) -> Self {
        self.post_clear = Some(f);
        self
    }

    fn extras(mut self, f: ExtraBlocksFn, limit: u32) -> Self {
        self.extra_blocks = Some(f);
        self.value_limit = limit;
        self
    }

    fn extras_effect(mut self, f: ExtraBlockEffectFn) -> Self {
        self.extra_block_effect = Some(f);
        self
    }

    fn planned(mut self, f: PlanFn, mode: EraseMode) -> Self {
        self.plan = Some(f);
        self.value_limit = 36;
        self.extra_erase_mode = mode;
        self
    }

    fn bonus(mut self, bonus: Bonus) -> Self {
        self.bonus = bonus;
        self
    }

    fn repeat(mut self, delay: u32) -> Self {
        self.repeat_delay = delay;
        self
    }

    /// Adds cells beyond the matched run over several ticks.
    pub fn is_progressive(&self) -> bool {
        self.plan.is_some() || self.extra_blocks.is_some()
    }

    /// Odds for a match of `size`; sizes clamp to `[3, 6]`.
    pub fn odds_for(&self, size: usize) -> u8 {
        self.odds[size.clamp(3, 6) - 3]
    }
}

// === Identifiers ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum AbilityId {
    #[default]
    None,
    Air,
    Wood,
    Metal,
    Coin,

    // damage multipliers
    PowerOf4,
    PowerOf4Plus,
    PowerOf5,
    DoubleDealer,
    HyperPunch,
    SkyBlast,
    DragonTalon,
    Pummel,
    Scratch,
    HeavyHitter,
    BrutalSwing,
    Pierce,
    StepUp,
    ChainReaction,
    HittingStreak,
    RiskTaker,
    DoubleNormal,
    LastDitchEffort,
    Counterattack,
    CrowdControl,
    CrossAttack,
    SuperEffectivePlus,
    Swarm,
    Opportunist,

    // status
    Freeze,
    SleepCharm,
    Paralyze,
    Spook,
    Poison,
    Burn,
    ShockAttack,
    ExploitSleep,
    ExploitFreeze,
    ExploitParalysis,
    ExploitFear,
    ExploitBurn,
    ExploitPoison,
    Stabilize,
    Prolong,

    // disruption clearing
    RockBreak,
    RockBreakPlus,
    BlockSmash,
    BlockSmashPlus,
    BarrierBash,
    BarrierBashPlus,
    Eject,
    EjectPlus,
    CloudClear,
    Pickup,
    PickupPlus,

    // type boosts, flat bonuses, replacement, progressive
    Cheer,
    SuperCheer,
    Encourage,
    Barrage,
    DragonShriek,
    Mimic,
    Reclaim,
    SameTypeSweep,
    SameTypeSweepPlus,

    // meter
    MegaBoost,
    MegaBoostPlus,
    MegaBoostPlusPlus,

    // alternate forms
    MegaLucario,
    MegaCharizardX,
    MegaVenusaur,
    MegaSceptile,
    MegaBlaziken,
    MegaSwampert,
    MegaRayquaza,
    MegaMewtwoX,
    MegaScizor,
    MegaHeracross,
    MegaBanette,
    MegaMawile,
    MegaAbsol,
    MegaManectric,
    MegaBlastoise,
    MegaCharizardY,
    MegaAmpharos,
    MegaGengar,
    MegaGlalie,
    MegaAggron,
    MegaGardevoir,
    MegaMewtwoY,
    MegaHoundoom,
    MegaSableye,
    MegaSteelix,
    MegaKangaskhan,
    MegaAudino,
    MegaAltaria,
}

impl AbilityId {
    pub fn all() -> &'static [AbilityId] {
        use AbilityId::*;
        &[
            None, Air, Wood, Metal, Coin, PowerOf4, PowerOf4Plus, PowerOf5, DoubleDealer,
            HyperPunch, SkyBlast, DragonTalon, Pummel, Scratch, HeavyHitter, BrutalSwing, Pierce,
            StepUp, ChainReaction, HittingStreak, RiskTaker, DoubleNormal, LastDitchEffort,
            Counterattack, CrowdControl, CrossAttack, SuperEffectivePlus, Swarm, Opportunist,
            Freeze, SleepCharm, Paralyze, Spook, Poison, Burn, ShockAttack, ExploitSleep,
            ExploitFreeze, ExploitParalysis, ExploitFear, ExploitBurn, ExploitPoison, Stabilize,
            Prolong, RockBreak, RockBreakPlus, BlockSmash, BlockSmashPlus, BarrierBash,
            BarrierBashPlus, Eject, EjectPlus, CloudClear, Pickup, PickupPlus, Cheer, SuperCheer,
            Encourage, Barrage, DragonShriek, Mimic, Reclaim, SameTypeSweep, SameTypeSweepPlus,
            MegaBoost, MegaBoostPlus, MegaBoostPlusPlus, MegaLucario, MegaCharizardX,
            MegaVenusaur, MegaSceptile, MegaBlaziken, MegaSwampert, MegaRayquaza, MegaMewtwoX,
            MegaScizor, MegaHeracross, MegaBanette, MegaMawile, MegaAbsol, MegaManectric,
            MegaBlastoise, MegaCharizardY, MegaAmpharos, MegaGengar, MegaGlalie, MegaAggron,
            MegaGardevoir, MegaMewtwoY, MegaHoundoom, MegaSableye, MegaSteelix, MegaKangaskhan,
            MegaAudino, MegaAltaria,
        ]
    }

    /// Sentinel identifiers carried by structural species and "no ability".
    pub fn is_sentinel(self) -> bool {
        matches!(
            self,
            AbilityId::None | AbilityId::Air | AbilityId::Wood | AbilityId::Metal | AbilityId::Coin
        )
    }

    /// The dispatch entry for this identifier.
    pub fn def(self) -> AbilityDef {
        use AbilityId as A;
        use EraseMode::{Disruptions, Force, Normal};
        let def = AbilityDef::new;
        let mega = AbilityDef::persistent;
        match self {
            A::None | A::Air | A::Wood | A::Metal => def(self, NEVER),
            A::Coin => def(self, ALWAYS),

            A::PowerOf4 => def(self, [0, 100, 0, 0]).score(attack::power_of_four),
            A::PowerOf4Plus => def(self, [0, 100, 0, 0]).score(attack::power_of_four_plus),
            A::PowerOf5 => def(self, [0, 0, 100, 0]).score(attack::power_of_five),
            A::DoubleDealer => def(self, [50, 0, 0, 0]).score(attack::double),
            A::HyperPunch | A::SkyBlast | A::DragonTalon => def(self, STRONG).score(attack::double),
            A::Pummel | A::Scratch => def(self, COMMON).score(attack::one_and_half),
            A::HeavyHitter | A::BrutalSwing => def(self, RARE).score(attack::triple),
            A::Pierce => def(self, COMMON).score(attack::pierce),
            A::StepUp => def(self, COMMON).score(attack::step_up),
            A::ChainReaction => def(self, COMMON).score(attack::chain_reaction),
            A::HittingStreak => def(self, COMMON).score(attack::hitting_streak),
            A::RiskTaker => def(self, COMMON).score(attack::risk_taker),
            A::DoubleNormal => def(self, COMMON).score(attack::double_normal),
            A::LastDitchEffort => def(self, STRONG).score(attack::last_ditch_effort),
            A::Counterattack => def(self, COMMON).score(attack::counterattack),
            A::CrowdControl => def(self, COMMON).score(attack::crowd_control),
            A::CrossAttack => def(self, ALWAYS).score(attack::cross_attack),
            A::SuperEffectivePlus => def(self, COMMON).score(attack::super_effective_plus),
            A::Swarm => def(self, COMMON).score(attack::swarm),
            A::Opportunist => def(self, COMMON).score(attack::opportunist),

            A::Freeze => def(self, COMMON).effect(effects::inflict_freeze),
            A::SleepCharm => def(self, COMMON).effect(effects::inflict_sleep),
            A::Paralyze => def(self, COMMON).effect(effects::inflict_paralysis),
            A::Spook => def(self, COMMON).effect(effects::inflict_fear),
            A::Poison => def(self, COMMON).effect(effects::inflict_poison),
            A::Burn => def(self, COMMON).effect(effects::inflict_burn),
            A::ShockAttack => def(self, STRONG)
                .score(attack::one_and_half)
                .effect(effects::inflict_paralysis),
            A::ExploitSleep => def(self, COMMON).score(attack::exploit_sleep),
            A::ExploitFreeze => def(self, COMMON).score(attack::exploit_freeze),
            A::ExploitParalysis => def(self, COMMON).score(attack::exploit_paralysis),
            A::ExploitFear => def(self, COMMON).score(attack::exploit_fear),
            A::ExploitBurn => def(self, COMMON).score(attack::exploit_burn),
            A::ExploitPoison => def(self, COMMON).score(attack::exploit_poison),
            A::Stabilize => def(self, COMMON).effect(effects::stabilize),
            A::Prolong => def(self, COMMON).after(effects::prolong),

            A::RockBreak => def(self, COMMON).effect(effects::rock_break),
            A::RockBreakPlus => def(self, COMMON).effect(effects::rock_break_plus),
            A::BlockSmash => def(self, COMMON).effect(effects::block_smash),
            A::BlockSmashPlus => def(self, COMMON).effect(effects::block_smash_plus),
            A::BarrierBash => def(self, COMMON).effect(effects::barrier_bash),
            A::BarrierBashPlus => def(self, COMMON).effect(effects::barrier_bash_plus),
            A::Eject => def(self, STRONG).effect(effects::eject),
            A::EjectPlus => def(self, STRONG).effect(effects::eject_plus),
            A::CloudClear => def(self, COMMON).effect(effects::cloud_clear),
            A::Pickup => def(self, COMMON).effect(effects::pickup),
            A::PickupPlus => def(self, COMMON).effect(effects::pickup_plus),

            A::Cheer => def(self, COMMON).effect(effects::cheer),
            A::SuperCheer => def(self, STRONG).effect(effects::super_cheer),
            A::Encourage => def(self, COMMON).effect(effects::encourage),
            A::Barrage => def(self, COMMON).bonus(Bonus::Flat(1.0)),
            A::DragonShriek => def(self, STRONG).bonus(Bonus::Scaled(1.0)),
            A::Mimic => def(self, COMMON).effect(effects::mimic),
            A::Reclaim => def(self, COMMON).effect(effects::reclaim),
            A::SameTypeSweep => def(self, STRONG)
                .extras(effects::same_type_tile, 3)
                .bonus(Bonus::Flat(1.0)),
            A::SameTypeSweepPlus => def(self, STRONG)
                .extras(effects::same_type_tile, 5)
                .bonus(Bonus::Flat(1.0)),

            A::MegaBoost => def(self, COMMON).after(effects::mega_boost),
            A::MegaBoostPlus => def(self, COMMON).after(effects::mega_boost_plus),
            A::MegaBoostPlusPlus => def(self, STRONG).after(effects::mega_boost_plus_plus),

            A::MegaLucario | A::MegaVenusaur | A::MegaSwampert => mega(self)
                .extras(mega::same_species_one, 2)
                .bonus(Bonus::Scaled(1.0)),
            A::MegaCharizardX | A::MegaBlaziken | A::MegaScizor => mega(self)
                .extras(mega::same_species_one, 3)
                .bonus(Bonus::Scaled(1.0)),
            A::MegaMewtwoX => mega(self)
                .extras(mega::same_species_one, 4)
                .bonus(Bonus::Scaled(1.0)),
            A::MegaSceptile | A::MegaHeracross => mega(self)
                .extras(mega::same_species_two, 4)
                .bonus(Bonus::Scaled(1.0)),
            A::MegaRayquaza => mega(self)
                .extras(mega::same_type_two, 6)
                .bonus(Bonus::Scaled(1.0))
                .repeat(6),
            A::MegaBanette | A::MegaManectric => mega(self)
                .extras(mega::other_species_one, 2)
                .extras_effect(mega::convert_to_own_species),
            A::MegaMawile => mega(self)
                .extras(mega::other_species_one, 3)
                .extras_effect(mega::convert_to_own_species),
            A::MegaAbsol => mega(self)
                .extras(mega::other_species_one, 4)
                .extras_effect(mega::convert_to_own_species),
            A::MegaBlastoise => mega(self).planned(mega::plan_cross, Normal),
            A::MegaCharizardY => mega(self).planned(mega::plan_diamond, Normal),
            A::MegaAmpharos => mega(self).planned(mega::plan_rows, Disruptions),
            A::MegaGengar => mega(self).planned(mega::plan_disruption_waves, Disruptions),
            A::MegaGlalie => mega(self).planned(mega::plan_frozen, Disruptions),
            A::MegaAggron => mega(self).planned(mega::plan_metal, Disruptions),
            A::MegaGardevoir => mega(self).planned(mega::plan_everything_disrupted, Disruptions),
            A::MegaMewtwoY => mega(self).planned(mega::plan_diagonals, Normal),
            A::MegaHoundoom => mega(self).planned(mega::plan_columns, Normal),
            A::MegaSableye => mega(self).planned(mega::plan_obstructions, Force),
            A::MegaSteelix => mega(self).planned(mega::plan_bottom_row, Normal),
            A::MegaKangaskhan => mega(self).score(attack::double),
            A::MegaAudino => mega(self).effect(mega::soothe),
            A::MegaAltaria => mega(self).effect(mega::sky_boost),
        }
    }
}

impl std::fmt::Display for AbilityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::str::FromStr for AbilityId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AbilityId::all()
            .iter()
            .copied()
            .find(|id| id.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown ability '{}'", s))
    }
}

// === Lookup ===

/// Ability a species exhibits right now: the alternate form's ability only while
/// the meter is at or above the threshold and the species holds the evolution slot.
pub fn resolve(species: SpeciesId, board: &Board, ctx: &TrialContext<'_>) -> AbilityDef {
    let def = ctx.catalog.get(species);
    let evolved = ctx.team.is_mega_slot(species) && board.meter() >= ctx.team.mega_threshold;
    match def.mega_ability {
        Some(mega) if evolved => mega.def(),
        _ => def.ability.def(),
    }
}

/// Percent odds of `id` firing on a match of `size`.
pub fn activation_probability(id: AbilityId, size: usize) -> u8 {
    id.def().odds_for(size)
}
