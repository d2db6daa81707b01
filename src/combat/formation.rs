//! Formations: named slots ships occupy, the direction an attack comes from,
//! and how incoming damage is split across occupied slots.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::combat::fleet::ShipTypeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormationType {
    Line,
    Wedge,
    Echelon,
    Crescent,
    Sphere,
}

impl FormationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Line => "line",
            Self::Wedge => "wedge",
            Self::Echelon => "echelon",
            Self::Crescent => "crescent",
            Self::Sphere => "sphere",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    Front,
    Flank,
    Back,
    Support,
}

impl Position {
    pub const ALL: [Position; 4] = [
        Position::Front,
        Position::Flank,
        Position::Back,
        Position::Support,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Front => "front",
            Self::Flank => "flank",
            Self::Back => "back",
            Self::Support => "support",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackDirection {
    Frontal,
    Flanking,
    Envelopment,
}

/// Fixed lookup from the two formation types. A sphere has no exposed flank,
/// so it is always hit head-on.
pub fn attack_direction(
    attacker: Option<FormationType>,
    defender: Option<FormationType>,
) -> AttackDirection {
    use FormationType::*;

    match (attacker, defender) {
        (_, Some(Sphere)) => AttackDirection::Frontal,
        (Some(Crescent), Some(_)) => AttackDirection::Envelopment,
        (Some(Echelon), Some(Line)) | (Some(Echelon), Some(Wedge)) => AttackDirection::Flanking,
        (Some(Wedge), Some(Crescent)) => AttackDirection::Flanking,
        _ => AttackDirection::Frontal,
    }
}

/// Share of incoming damage per position for one attack direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionWeights {
    pub front: f64,
    pub flank: f64,
    pub back: f64,
    pub support: f64,
}

impl PositionWeights {
    pub fn get(&self, position: Position) -> f64 {
        match position {
            Position::Front => self.front,
            Position::Flank => self.flank,
            Position::Back => self.back,
            Position::Support => self.support,
        }
    }

    pub fn total(&self) -> f64 {
        self.front + self.flank + self.back + self.support
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectionWeights {
    pub frontal: PositionWeights,
    pub flanking: PositionWeights,
    pub envelopment: PositionWeights,
}

impl Default for DirectionWeights {
    fn default() -> Self {
        Self {
            frontal: PositionWeights {
                front: 0.5,
                flank: 0.25,
                back: 0.15,
                support: 0.10,
            },
            flanking: PositionWeights {
                front: 0.25,
                flank: 0.45,
                back: 0.20,
                support: 0.10,
            },
            envelopment: PositionWeights {
                front: 0.20,
                flank: 0.30,
                back: 0.35,
                support: 0.15,
            },
        }
    }
}

impl DirectionWeights {
    pub fn for_direction(&self, direction: AttackDirection) -> &PositionWeights {
        match direction {
            AttackDirection::Frontal => &self.frontal,
            AttackDirection::Flanking => &self.flanking,
            AttackDirection::Envelopment => &self.envelopment,
        }
    }
}

/// Formation a fleet has adopted, with explicit slot picks and the cached
/// HP assignment that damage distribution reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormationState {
    pub formation_type: FormationType,
    /// Explicit slot per ship type. Unlisted types use their catalog default.
    #[serde(default)]
    pub slots: BTreeMap<ShipTypeId, Position>,
    #[serde(default)]
    pub assignments: BTreeMap<Position, Vec<Assignment>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub ship_type: ShipTypeId,
    pub hp: f64,
}

impl FormationState {
    pub fn new(formation_type: FormationType) -> Self {
        Self {
            formation_type,
            slots: BTreeMap::new(),
            assignments: BTreeMap::new(),
        }
    }

    pub fn with_slot(mut self, ship_type: impl Into<ShipTypeId>, position: Position) -> Self {
        self.slots.insert(ship_type.into(), position);
        self
    }

    /// Slot for a ship type, falling back to `default`.
    pub fn position_of(&self, ship_type: &str, default: Position) -> Position {
        self.slots.get(ship_type).copied().unwrap_or(default)
    }

    /// Rebuilds the HP assignment from `(ship type, position, total hp)`
    /// triples. Dead groups are left out.
    pub fn reassign<'a, I>(&mut self, groups: I)
    where
        I: IntoIterator<Item = (&'a str, Position, f64)>,
    {
        self.assignments.clear();
        for (ship_type, position, hp) in groups {
            if hp <= 0.0 {
                continue;
            }
            self.assignments.entry(position).or_default().push(Assignment {
                ship_type: ship_type.to_string(),
                hp,
            });
        }
    }

    pub fn occupied(&self) -> impl Iterator<Item = Position> + '_ {
        self.assignments
            .iter()
            .filter(|(_, entries)| entries.iter().any(|a| a.hp > 0.0))
            .map(|(position, _)| *position)
    }

    /// Splits `total` across the ship types in this formation: first by
    /// direction weight over occupied positions (renormalized so nothing is
    /// lost on empty slots), then by assigned HP within each position.
    pub fn distribute(&self, total: f64, weights: &PositionWeights) -> BTreeMap<ShipTypeId, f64> {
        let mut out: BTreeMap<ShipTypeId, f64> = BTreeMap::new();
        if total <= 0.0 {
            return out;
        }
        let occupied: Vec<Position> = self.occupied().collect();
        let weight_sum: f64 = occupied.iter().map(|p| weights.get(*p).max(0.0)).sum();
        for position in occupied {
            let share = if weight_sum > 0.0 {
                weights.get(position).max(0.0) / weight_sum
            } else {
                // all weights zero: split evenly over occupied slots
                1.0 / self.occupied().count() as f64
            };
            let entries = &self.assignments[&position];
            let position_hp: f64 = entries.iter().map(|a| a.hp.max(0.0)).sum();
            if position_hp <= 0.0 {
                continue;
            }
            for entry in entries {
                *out.entry(entry.ship_type.clone()).or_default() +=
                    total * share * (entry.hp.max(0.0) / position_hp);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "expected {b}, got {a}");
    }

    #[test]
    fn direction_lookup() {
        use FormationType::*;
        assert_eq!(attack_direction(Some(Crescent), Some(Line)), AttackDirection::Envelopment);
        assert_eq!(attack_direction(Some(Crescent), Some(Sphere)), AttackDirection::Frontal);
        assert_eq!(attack_direction(Some(Echelon), Some(Wedge)), AttackDirection::Flanking);
        assert_eq!(attack_direction(None, Some(Line)), AttackDirection::Frontal);
        assert_eq!(attack_direction(Some(Crescent), None), AttackDirection::Frontal);
    }

    #[test]
    fn default_weights_sum_to_one() {
        let weights = DirectionWeights::default();
        for direction in [
            AttackDirection::Frontal,
            AttackDirection::Flanking,
            AttackDirection::Envelopment,
        ] {
            approx(weights.for_direction(direction).total(), 1.0);
        }
        assert!(weights.frontal.front > weights.frontal.flank);
        assert!(weights.flanking.flank > weights.flanking.front);
        assert!(weights.envelopment.back > weights.envelopment.front);
    }

    #[test]
    fn distribute_renormalizes_over_occupied_positions() {
        let mut formation = FormationState::new(FormationType::Line);
        formation.reassign([
            ("cruiser", Position::Front, 300.0),
            ("frigate", Position::Front, 100.0),
            ("carrier", Position::Back, 500.0),
        ]);
        let weights = DirectionWeights::default().frontal;
        let split = formation.distribute(130.0, &weights);

        // front 0.5 and back 0.15 renormalize to 100 / 30
        approx(split["cruiser"], 75.0);
        approx(split["frigate"], 25.0);
        approx(split["carrier"], 30.0);
        approx(split.values().sum::<f64>(), 130.0);
    }

    #[test]
    fn distribute_zero_damage_is_empty() {
        let mut formation = FormationState::new(FormationType::Wedge);
        formation.reassign([("cruiser", Position::Front, 300.0)]);
        assert!(formation
            .distribute(0.0, &DirectionWeights::default().frontal)
            .is_empty());
    }

    #[test]
    fn reassign_drops_dead_groups() {
        let mut formation = FormationState::new(FormationType::Line);
        formation.reassign([("cruiser", Position::Front, 0.0), ("frigate", Position::Flank, 10.0)]);
        let occupied: Vec<Position> = formation.occupied().collect();
        assert_eq!(occupied, vec![Position::Flank]);
    }
}
