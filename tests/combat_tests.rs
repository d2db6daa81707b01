use chrono::{DateTime, TimeZone, Utc};
use fleetcore::combat::{
    ActivationOutcome, CombatEngine, DamageChannel, EffectSpec, Fleet, FormationState,
    FormationType, HpBucket, NodeScope, Position, StatModifier, StatusMachine, StatusNode,
    Timestamp,
};
use fleetcore::data::{AbilityDef, Catalog, ShipSpec};

fn approx_eq(a: f64, b: f64, tol: f64) {
    assert!((a - b).abs() <= tol, "expected {b}, got {a}");
}

fn at(secs: i64) -> Timestamp {
    Utc.timestamp_opt(1_800_000_000 + secs, 0).unwrap()
}

fn laser_shield(v: i64) -> StatModifier {
    StatModifier {
        laser_shield: v,
        ..StatModifier::ZERO
    }
}

fn base_catalog() -> Catalog {
    Catalog::new()
        .with_ship(ShipSpec::new("cruiser", DamageChannel::Laser, 20.0, 100.0))
        .with_ship(
            ShipSpec::new("bastion", DamageChannel::Kinetic, 1.0, 1_000.0)
                .with_shield(DamageChannel::Laser, 10.0),
        )
        .with_counter(FormationType::Wedge, FormationType::Line, 1.3)
}

fn wedge_attacker(catalog: &Catalog) -> Fleet {
    Fleet::new("attacker")
        .with_ships(catalog, "cruiser", 10)
        .with_formation(catalog, FormationState::new(FormationType::Wedge))
}

fn line_defender(catalog: &Catalog) -> Fleet {
    Fleet::new("defender")
        .with_ships(catalog, "bastion", 5)
        .with_formation(catalog, FormationState::new(FormationType::Line))
}

#[test]
fn counter_and_shield_reference_round() {
    let catalog = base_catalog();
    let mut attacker = wedge_attacker(&catalog);
    let mut defender = line_defender(&catalog);
    let engine = CombatEngine::with_catalog(catalog);

    let result = engine.execute_round(&mut attacker, &mut defender, at(0));

    approx_eq(result.formation_multiplier, 1.3, 1e-12);
    let attack = result.attack.as_ref().expect("attack phase");
    approx_eq(attack.raw_damage, 260.0, 1e-9);
    approx_eq(result.attacker_damage_dealt, 104.0, 1e-9);
    assert!(result.defender_units_lost.is_empty());

    let bastions = &defender.groups["bastion"];
    assert_eq!(bastions.units(), 5);
    approx_eq(bastions.total_hp(), 5_000.0 - 104.0, 1e-9);
    assert!(bastions
        .buckets
        .contains(&HpBucket { hp_per_unit: 1_000.0, count: 4 }));

    // line vs wedge has no counter entry
    let reply = result.return_fire.as_ref().expect("defender survived");
    approx_eq(reply.counter_multiplier, 1.0, 1e-12);
    approx_eq(result.defender_damage_dealt, 5.0, 1e-9);
}

#[test]
fn partial_damage_renormalizes_buckets() {
    let catalog = Catalog::new()
        .with_ship(ShipSpec::new("striker", DamageChannel::Missile, 250.0, 100.0))
        .with_ship(ShipSpec::new("corvette", DamageChannel::Laser, 0.0, 100.0));
    let mut attacker = Fleet::new("a").with_ships(&catalog, "striker", 1);
    let mut defender = Fleet::new("d").with_ships(&catalog, "corvette", 5);
    let engine = CombatEngine::with_catalog(catalog);

    let result = engine.execute_round(&mut attacker, &mut defender, at(0));

    assert_eq!(result.defender_units_lost["corvette"], 2);
    let group = &defender.groups["corvette"];
    assert_eq!(group.units(), 3);
    assert!(group.buckets.contains(&HpBucket { hp_per_unit: 100.0, count: 2 }));
    assert!(group.buckets.contains(&HpBucket { hp_per_unit: 50.0, count: 1 }));
}

#[test]
fn first_strike_and_deterministic_crits() {
    let mut striker = ShipSpec::new("striker", DamageChannel::Plasma, 10.0, 100.0);
    striker.first_strike = 0.2;
    striker.crit_chance = 0.5;
    striker.crit_multiplier = 2.0;
    let catalog = Catalog::new()
        .with_ship(striker)
        .with_ship(ShipSpec::new("target", DamageChannel::Laser, 0.0, 1_000_000.0));
    let mut attacker = Fleet::new("a").with_ships(&catalog, "striker", 1);
    let mut defender = Fleet::new("d").with_ships(&catalog, "target", 1);
    let engine = CombatEngine::with_catalog(catalog);

    let raw: Vec<(f64, bool, bool)> = (0..4)
        .map(|round| {
            let result = engine.execute_round(&mut attacker, &mut defender, at(round * 2));
            let attack = result.attack.expect("attack phase");
            (attack.raw_damage, attack.first_strike, attack.critical)
        })
        .collect();

    assert_eq!(
        raw,
        vec![
            (12.0, true, false),
            (20.0, false, true),
            (10.0, false, false),
            (20.0, false, true),
        ]
    );
}

#[test]
fn evasion_removes_at_most_three_quarters() {
    let mut ghost = ShipSpec::new("ghost", DamageChannel::Laser, 0.0, 10_000.0);
    ghost.evasion = 0.95;
    let catalog = Catalog::new()
        .with_ship(ShipSpec::new("cruiser", DamageChannel::Laser, 20.0, 100.0))
        .with_ship(ghost);
    let mut attacker = Fleet::new("a").with_ships(&catalog, "cruiser", 10);
    let mut defender = Fleet::new("d").with_ships(&catalog, "ghost", 1);
    let engine = CombatEngine::with_catalog(catalog);

    let result = engine.execute_round(&mut attacker, &mut defender, at(0));
    approx_eq(result.attacker_damage_dealt, 50.0, 1e-9);
}

#[test]
fn evasion_lock_cancels_evasion() {
    let mut ghost = ShipSpec::new("ghost", DamageChannel::Laser, 0.0, 10_000.0);
    ghost.evasion = 0.5;
    let catalog = Catalog::new()
        .with_ship(ShipSpec::new("cruiser", DamageChannel::Laser, 20.0, 100.0))
        .with_ship(ghost);
    let mut attacker = Fleet::new("a").with_ships(&catalog, "cruiser", 10);
    let machine = StatusMachine::new().with_node(StatusNode::passive(
        "tracking_beacon",
        NodeScope::All,
        StatModifier {
            evasion_lock: true,
            ..StatModifier::ZERO
        },
    ));
    let mut defender = Fleet::new("d")
        .with_ships(&catalog, "ghost", 1)
        .with_status(machine);
    let engine = CombatEngine::with_catalog(catalog);

    let result = engine.execute_round(&mut attacker, &mut defender, at(0));
    approx_eq(result.attacker_damage_dealt, 200.0, 1e-9);
}

#[test]
fn destroyed_defender_never_returns_fire() {
    let catalog = base_catalog();
    let mut attacker = Fleet::new("a").with_ships(&catalog, "cruiser", 10);
    let mut defender = Fleet::new("d").with_ships(&catalog, "cruiser", 1);
    let engine = CombatEngine::with_catalog(catalog);

    let result = engine.execute_round(&mut attacker, &mut defender, at(0));
    assert!(!defender.is_alive());
    assert!(result.return_fire.is_none());
    assert_eq!(result.defender_damage_dealt, 0.0);
    assert_eq!(attacker.total_units(), 10);
}

#[test]
fn debuffs_land_after_the_round_that_produced_them() {
    let catalog = base_catalog();
    let sunder = EffectSpec::debuff("sunder", laser_shield(-10), 10.0);
    let machine = StatusMachine::new().with_node(
        StatusNode::passive("sunder_aura", NodeScope::All, StatModifier::ZERO).with_outgoing(sunder),
    );
    let mut attacker = wedge_attacker(&catalog).with_status(machine);
    let mut defender = line_defender(&catalog);
    let engine = CombatEngine::with_catalog(catalog);

    let first = engine.execute_round(&mut attacker, &mut defender, at(0));
    approx_eq(first.attacker_damage_dealt, 104.0, 1e-9);
    assert_eq!(
        first.effects_exchanged,
        vec![("attacker".to_string(), "sunder".to_string())]
    );
    let inbound = defender
        .status
        .as_ref()
        .and_then(|m| m.inbound_effect("sunder"))
        .expect("debuff queued on defender");
    assert_eq!(inbound.expires_at, at(10));

    // shield 10 - 10 = 0: full 260 lands
    let second = engine.execute_round(&mut attacker, &mut defender, at(2));
    approx_eq(second.attacker_damage_dealt, 260.0, 1e-9);

    // debuff lapses if the aura stops refreshing it
    attacker.status = None;
    let third = engine.execute_round(&mut attacker, &mut defender, at(2 + 10));
    approx_eq(third.attacker_damage_dealt, 104.0, 1e-9);
}

#[test]
fn ability_boost_only_lasts_its_duration() {
    let catalog = base_catalog().with_ability(AbilityDef {
        id: "overcharge".to_string(),
        name: Some("Overcharge".to_string()),
        ship_type: Some("cruiser".to_string()),
        duration_secs: 4.0,
        cooldown_secs: 20.0,
        modifier: StatModifier {
            damage_pct: 0.5,
            ..StatModifier::ZERO
        },
        combat_only: true,
    });
    let mut attacker = Fleet::new("a").with_ships(&catalog, "cruiser", 10);
    let mut defender = Fleet::new("d").with_ships(&catalog, "bastion", 5);
    assert!(matches!(
        attacker.activate_ability(&catalog, "overcharge", at(0)),
        ActivationOutcome::Activated { .. }
    ));
    let engine = CombatEngine::with_catalog(catalog);

    let boosted = engine.execute_round(&mut attacker, &mut defender, at(0));
    approx_eq(boosted.attack.expect("attack").raw_damage, 300.0, 1e-9);

    let plain = engine.execute_round(&mut attacker, &mut defender, at(4));
    approx_eq(plain.attack.expect("attack").raw_damage, 200.0, 1e-9);
}

#[test]
fn formation_weights_route_damage_to_exposed_positions() {
    let catalog = Catalog::new()
        .with_ship(ShipSpec::new("cruiser", DamageChannel::Laser, 20.0, 100.0))
        .with_ship(ShipSpec::new("hauler", DamageChannel::Kinetic, 0.0, 1_000.0))
        .with_ship(
            ShipSpec::new("carrier", DamageChannel::Missile, 0.0, 1_000.0)
                .with_position(Position::Back),
        );
    let mut attacker = Fleet::new("a")
        .with_ships(&catalog, "cruiser", 10)
        .with_formation(&catalog, FormationState::new(FormationType::Crescent));
    let mut defender = Fleet::new("d")
        .with_ships(&catalog, "hauler", 1)
        .with_ships(&catalog, "carrier", 1)
        .with_formation(&catalog, FormationState::new(FormationType::Line));
    let engine = CombatEngine::with_catalog(catalog);

    let result = engine.execute_round(&mut attacker, &mut defender, at(0));
    let attack = result.attack.expect("attack phase");
    assert_eq!(attack.direction, fleetcore::combat::AttackDirection::Envelopment);

    // envelopment: front 0.20, back 0.35, renormalized over the two slots
    let hauler = attack.hits.iter().find(|h| h.ship_type == "hauler").unwrap();
    let carrier = attack.hits.iter().find(|h| h.ship_type == "carrier").unwrap();
    approx_eq(hauler.damage, 200.0 * 0.20 / 0.55, 1e-9);
    approx_eq(carrier.damage, 200.0 * 0.35 / 0.55, 1e-9);
}

#[test]
fn battle_reaches_a_winner_and_serializes() {
    let catalog = base_catalog();
    let mut attacker = Fleet::new("a").with_ships(&catalog, "cruiser", 10);
    let mut defender = Fleet::new("d").with_ships(&catalog, "cruiser", 6);
    let engine = CombatEngine::with_catalog(catalog);

    let summary = engine.simulate_battle(&mut attacker, &mut defender, at(0), 100);
    assert_eq!(summary.winner, Some(fleetcore::combat::Side::Attacker));
    assert!(summary.rounds.len() > 1);

    let payload = serde_json::to_value(&summary).expect("summary serializes");
    assert_eq!(payload["winner"], "attacker");
    assert!(payload["rounds"][0]["attacker_damage_dealt"].is_number());
}

#[test]
fn composite_tick_counts_in_the_round_it_was_triggered() {
    let catalog = base_catalog();
    let volley = StatusNode::composite(
        "volley",
        NodeScope::All,
        StatModifier::ZERO,
        StatModifier {
            damage_pct: 1.0,
            ..StatModifier::ZERO
        },
        5.0,
        12.0,
        30.0,
    );
    let mut attacker = Fleet::new("a")
        .with_ships(&catalog, "cruiser", 10)
        .with_status(StatusMachine::new().with_node(volley));
    let mut defender = Fleet::new("d").with_ships(&catalog, "bastion", 5);
    assert_eq!(attacker.status_mut().on_ability_activated("volley", None, at(0)), 1);
    let engine = CombatEngine::with_catalog(catalog);

    let first = engine.execute_round(&mut attacker, &mut defender, at(0));
    approx_eq(first.attack.expect("attack").raw_damage, 400.0, 1e-9);

    // still inside the first tick window
    let held = engine.execute_round(&mut attacker, &mut defender, at(3));
    approx_eq(held.attack.expect("attack").raw_damage, 400.0, 1e-9);

    let cooled = engine.execute_round(&mut attacker, &mut defender, at(12));
    approx_eq(cooled.attack.expect("attack").raw_damage, 200.0, 1e-9);
}

#[test]
fn huge_durations_saturate_instead_of_overflowing() {
    let catalog = base_catalog().with_ability(AbilityDef {
        id: "eternal".to_string(),
        name: None,
        ship_type: Some("cruiser".to_string()),
        duration_secs: 1e15,
        cooldown_secs: 1e15,
        modifier: StatModifier {
            damage_pct: 0.5,
            ..StatModifier::ZERO
        },
        combat_only: false,
    });
    let forever = EffectSpec::debuff("forever", laser_shield(-10), 1e15);
    let machine = StatusMachine::new().with_node(
        StatusNode::passive("aura", NodeScope::All, StatModifier::ZERO).with_outgoing(forever),
    );
    let mut attacker = Fleet::new("a")
        .with_ships(&catalog, "cruiser", 10)
        .with_status(machine);
    let mut defender = Fleet::new("d").with_ships(&catalog, "bastion", 5);

    match attacker.activate_ability(&catalog, "eternal", at(0)) {
        ActivationOutcome::Activated { ends_at, .. } => {
            assert_eq!(ends_at, DateTime::<Utc>::MAX_UTC)
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    let engine = CombatEngine::with_catalog(catalog);

    engine.execute_round(&mut attacker, &mut defender, at(0));
    let debuff = defender
        .status
        .as_ref()
        .and_then(|m| m.inbound_effect("forever"))
        .expect("debuff queued");
    assert_eq!(debuff.expires_at, DateTime::<Utc>::MAX_UTC);

    // boosted and unshielded: 10 x 20 x 1.5
    let second = engine.execute_round(&mut attacker, &mut defender, at(1_000_000));
    approx_eq(second.attacker_damage_dealt, 300.0, 1e-9);
}

#[test]
fn battle_clock_stops_at_the_last_representable_instant() {
    let mut sloth = ShipSpec::new("sloth", DamageChannel::Laser, 1.0, 100.0);
    sloth.attack_interval_secs = 1e300;
    let catalog = base_catalog().with_ship(sloth);
    let mut attacker = Fleet::new("a").with_ships(&catalog, "sloth", 1);
    let mut defender = Fleet::new("d").with_ships(&catalog, "bastion", 5);
    let engine = CombatEngine::with_catalog(catalog);

    let summary = engine.simulate_battle(&mut attacker, &mut defender, at(0), 3);
    assert_eq!(summary.rounds.len(), 3);
    assert_eq!(summary.rounds[1].at, DateTime::<Utc>::MAX_UTC);
    assert_eq!(summary.finished_at, DateTime::<Utc>::MAX_UTC);
    assert_eq!(summary.winner, None);
}
