use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hexclash_core::action::ActionEntry;
use hexclash_core::hex::Hex;
use hexclash_core::resolver::ResolveInput;
use hexclash_core::roster::{Character, Roster};
use hexclash_core::timeline::Timeline;
use hexclash_core::Engine;

fn duel(engine: &Engine, alice: Hex, bob: Hex, alice_set: &[ActionEntry], bob_set: &[ActionEntry]) -> ResolveInput {
    let roster = Roster::new(vec![Character::new("alice", alice, 180), Character::new("bob", bob, 0)]);
    let board = engine.config().board();
    let mut timeline = Timeline::seed(&roster, &board, 1);
    timeline.apply_action_set(&roster, &board, "alice", alice_set);
    timeline.apply_action_set(&roster, &board, "bob", bob_set);
    ResolveInput::new(roster, timeline)
}

fn bench_resolve_duel(c: &mut Criterion) {
    let engine = Engine::standard().expect("embedded catalog loads");
    let alice_set = engine.build("step", "fumikomi", "0").expect("step builds");
    let bob_set = engine.build("hip-throw", "step", "0").expect("hip-throw builds");
    let input = duel(&engine, Hex::new(-1, 0), Hex::new(1, 0), &alice_set, &bob_set);

    c.bench_function("resolve_duel", |b| b.iter(|| black_box(engine.resolve(black_box(input.clone())))));
}

fn bench_resolve_batch(c: &mut Criterion) {
    // Every movement/ability pairing played against itself
    let engine = Engine::standard().expect("embedded catalog loads");
    let catalog = engine.catalog();
    let mut inputs = Vec::new();
    for movement in catalog.movement_ids() {
        for ability in catalog.ability_ids() {
            let rotation = catalog
                .get(ability)
                .and_then(|card| card.rotations.allowed_labels().first().copied())
                .unwrap_or("0");
            if let Ok(set) = engine.build(ability, movement, rotation) {
                inputs.push(duel(&engine, Hex::new(-1, 0), Hex::new(1, 0), &set, &set));
            }
        }
    }

    c.bench_function("resolve_batch", |b| {
        b.iter(|| black_box(engine.resolve_batch(black_box(inputs.clone()))))
    });
}

criterion_group!(benches, bench_resolve_duel, bench_resolve_batch);
criterion_main!(benches);
