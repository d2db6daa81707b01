pub mod abilities;
pub mod context;
pub mod effective;
pub mod engine;
pub mod fleet;
pub mod formation;
pub mod modifier;
pub mod resolution;
pub mod stacking;
pub mod status;
pub mod time;

pub use abilities::{AbilityActivation, AbilityBook, ActivationOutcome};
pub use context::{CombatContext, GroupHit, GroupVolley};
pub use effective::{
    build_stack, effective_stats, fleet_attack_interval_secs, fleet_speed, stat_breakdown,
    EffectiveStats,
};
pub use engine::{
    crit_interval, effective_shield, evasion_multiplier, is_critical, is_first_strike, mitigate,
    DEFAULT_SHIELD_SCALING, EPSILON,
};
pub use fleet::{BattleCounters, Fleet, HpBucket, ShipGroup, ShipTypeId};
pub use formation::{
    attack_direction, AttackDirection, DirectionWeights, FormationState, FormationType, Position,
    PositionWeights,
};
pub use modifier::{combine_all, DamageChannel, StatModifier};
pub use resolution::{BattleSummary, CombatEngine, CombatRoundResult, PhaseReport, Side};
pub use stacking::{
    CombatCondition, FormationCondition, LayerSummary, ModifierLayer, ModifierStack,
    ResolveContext, SourceKind,
};
pub use status::{
    EffectSpec, InboundEffect, NodeId, NodePayloads, NodeScope, NodeStage, Polarity,
    StatusMachine, StatusNode,
};
pub use time::{after_secs, saturating_add, secs, seconds_between, Timestamp};
