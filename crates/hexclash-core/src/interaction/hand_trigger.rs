//! Hand triggers: cards in hand that react to events during resolution.
//!
//! Several triggers can be offered at once. They are answered one at a time:
//! [`rank_hand_triggers`] assigns each pending offer an order, and
//! [`active_hand_trigger`] picks the offer to answer next.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Interaction, InteractionDetail, InteractionKind};
use crate::card::CardType;
use crate::hex::{Board, Hex};

/// The event a trigger reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HandTriggerKind {
    /// The owner's attack hit.
    AttackHit,
    /// The owner's arrow hit.
    ProjectileHit,
    /// The owner was knocked from land into the abyss.
    KnockbackAbyss,
    /// The owner was hit.
    Hit,
}

/// A card that can be used from hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandTriggerDefinition {
    /// The trigger card.
    pub card_id: &'static str,
    /// Where the card must be held.
    pub card_type: CardType,
    /// The event it reacts to.
    pub trigger: HandTriggerKind,
    /// Cards discarded to use it, the trigger card included.
    pub discard_count: u32,
}

/// Every hand-trigger card.
pub const HAND_TRIGGERS: [HandTriggerDefinition; 4] = [
    HandTriggerDefinition {
        card_id: "burning-strike",
        card_type: CardType::Ability,
        trigger: HandTriggerKind::AttackHit,
        discard_count: 1,
    },
    HandTriggerDefinition {
        card_id: "sinking-shot",
        card_type: CardType::Ability,
        trigger: HandTriggerKind::ProjectileHit,
        discard_count: 1,
    },
    HandTriggerDefinition {
        card_id: "vengeance",
        card_type: CardType::Ability,
        trigger: HandTriggerKind::KnockbackAbyss,
        discard_count: 1,
    },
    HandTriggerDefinition {
        card_id: "iron-will",
        card_type: CardType::Ability,
        trigger: HandTriggerKind::Hit,
        discard_count: 1,
    },
];

impl HandTriggerDefinition {
    /// Looks up the definition for a card id.
    #[must_use]
    pub fn for_card(card_id: &str) -> Option<&'static Self> {
        HAND_TRIGGERS.iter().find(|definition| definition.card_id == card_id)
    }
}

/// What the ranking needs to know about a triggering actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TriggerStanding {
    /// Accumulated damage at the trigger beat.
    pub damage: i32,
    /// Cards in hand, movement and ability together.
    pub hand_size: usize,
    /// Location at the trigger beat.
    pub location: Option<Hex>,
}

/// Java-style string hash over UTF-16 units, used as the last tie-break.
fn id_hash(id: &str) -> u32 {
    id.encode_utf16()
        .fold(0u32, |hash, unit| hash.wrapping_mul(31).wrapping_add(u32::from(unit)))
}

#[allow(clippy::cast_precision_loss)]
fn land_center(board: &Board) -> (f64, f64) {
    let land = board.land();
    if land.is_empty() {
        return (0.0, 0.0);
    }
    let count = land.len() as f64;
    let q = land.iter().map(|hex| f64::from(hex.q())).sum::<f64>() / count;
    let r = land.iter().map(|hex| f64::from(hex.r())).sum::<f64>() / count;
    (q, r)
}

fn distance_from(center: (f64, f64), hex: Hex) -> f64 {
    let dq = f64::from(hex.q()) - center.0;
    let dr = f64::from(hex.r()) - center.1;
    (dq.abs() + dr.abs() + (dq + dr).abs()) / 2.0
}

/// Assigns an order to every pending hand trigger.
///
/// Ranking: more damage first, then the smaller hand, then the greater
/// distance from the land centre, then the id hash. Orders start at 1.
pub fn rank_hand_triggers(
    interactions: &mut [Interaction],
    standings: &BTreeMap<String, TriggerStanding>,
    board: &Board,
) {
    let center = land_center(board);
    let mut ranked: Vec<(usize, i32, usize, f64, u32)> = interactions
        .iter()
        .enumerate()
        .filter(|(_, interaction)| interaction.kind() == InteractionKind::HandTrigger && interaction.is_pending())
        .map(|(index, interaction)| {
            let standing = standings.get(&interaction.actor).copied().unwrap_or_default();
            let distance = standing
                .location
                .map_or(f64::INFINITY, |location| distance_from(center, location));
            (index, standing.damage, standing.hand_size, distance, id_hash(&interaction.id))
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.1.cmp(&a.1)
            .then(a.2.cmp(&b.2))
            .then(b.3.partial_cmp(&a.3).unwrap_or(Ordering::Equal))
            .then(a.4.cmp(&b.4))
    });
    for (rank, (index, ..)) in ranked.into_iter().enumerate() {
        if let InteractionDetail::HandTrigger { order, .. } = &mut interactions[index].detail {
            *order = u32::try_from(rank + 1).ok();
        }
    }
}

/// The pending hand trigger to answer next.
///
/// Ordered offers come before unordered ones; then the earlier beat; then
/// the actor id.
#[must_use]
pub fn active_hand_trigger(interactions: &[Interaction]) -> Option<&Interaction> {
    let order_of = |interaction: &Interaction| match interaction.detail {
        InteractionDetail::HandTrigger { order, .. } => order,
        _ => None,
    };
    interactions
        .iter()
        .filter(|interaction| interaction.kind() == InteractionKind::HandTrigger && interaction.is_pending())
        .min_by(|a, b| {
            let by_order = match (order_of(a), order_of(b)) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            by_order
                .then(a.beat_index.cmp(&b.beat_index))
                .then(a.actor.cmp(&b.actor))
        })
}
