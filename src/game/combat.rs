//! Attack target selection and local hit feedback

use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use crate::ws::protocol::{ClientMsg, RemoteEntity, Vec3};

use super::{AttackIntent, AGGRO_RADIUS, EFFECT_LIFETIME, MAX_EFFECTS};

/// Short-lived local swing effect
#[derive(Debug, Clone, PartialEq)]
pub struct VisualEffect {
    pub id: Uuid,
    pub position: Vec3,
    pub spawned_at: Instant,
}

impl VisualEffect {
    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.spawned_at) >= EFFECT_LIFETIME
    }
}

/// Resolves attack intents against the remote roster
pub struct CombatResolver {
    effects: VecDeque<VisualEffect>,
    radius: f32,
}

impl CombatResolver {
    pub fn new() -> Self {
        Self::with_radius(AGGRO_RADIUS)
    }

    pub fn with_radius(radius: f32) -> Self {
        Self {
            effects: VecDeque::with_capacity(MAX_EFFECTS),
            radius,
        }
    }

    /// Nearest alive entity strictly inside the aggro radius.
    /// Equal distances resolve to the lower id so the choice is stable.
    pub fn select_target<'a, I>(&self, from: &Vec3, entities: I) -> Option<&'a RemoteEntity>
    where
        I: IntoIterator<Item = &'a RemoteEntity>,
    {
        entities
            .into_iter()
            .filter(|entity| entity.alive)
            .map(|entity| (from.distance(&entity.position), entity))
            .filter(|(distance, _)| *distance < self.radius)
            .min_by(|(da, a), (db, b)| {
                da.partial_cmp(db)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.id.cmp(&b.id))
            })
            .map(|(_, entity)| entity)
    }

    /// Handle an intent: always spawn a local effect, and return the attack
    /// command when something is in range. A miss sends nothing.
    pub fn resolve(
        &mut self,
        intent: &AttackIntent,
        entities: &HashMap<String, RemoteEntity>,
        now: Instant,
    ) -> Option<ClientMsg> {
        let command = self
            .select_target(&intent.position, entities.values())
            .map(|target| ClientMsg::PlayerAttack {
                target_id: target.id.clone(),
            });

        match &command {
            Some(ClientMsg::PlayerAttack { target_id }) => {
                debug!(actor = %intent.actor_id, target = %target_id, "Attack hit");
            }
            _ => debug!(actor = %intent.actor_id, "Attack whiffed"),
        }

        self.spawn_effect(intent.position, now);
        command
    }

    /// Keep the newest effects only, leaving room for the new one
    fn spawn_effect(&mut self, position: Vec3, now: Instant) {
        while self.effects.len() >= MAX_EFFECTS {
            self.effects.pop_front();
        }
        self.effects.push_back(VisualEffect {
            id: Uuid::new_v4(),
            position,
            spawned_at: now,
        });
    }

    /// Per-tick removal of expired effects. Returns how many were removed.
    pub fn sweep(&mut self, now: Instant) -> usize {
        let before = self.effects.len();
        self.effects.retain(|effect| !effect.is_expired(now));
        before - self.effects.len()
    }

    /// Live effects, oldest first
    pub fn effects(&self) -> &VecDeque<VisualEffect> {
        &self.effects
    }

    pub fn clear(&mut self) {
        self.effects.clear();
    }
}

impl Default for CombatResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn intent_at(x: f32, z: f32) -> AttackIntent {
        AttackIntent {
            actor_id: "me".to_string(),
            position: Vec3::new(x, 0.0, z),
            rotation: 0.0,
            timestamp: 0,
        }
    }

    fn roster(entities: &[(&str, f32, bool)]) -> HashMap<String, RemoteEntity> {
        entities
            .iter()
            .map(|(id, x, alive)| {
                let mut entity = RemoteEntity::new(*id, Vec3::new(*x, 0.0, 0.0));
                entity.alive = *alive;
                (id.to_string(), entity)
            })
            .collect()
    }

    #[test]
    fn picks_nearest_alive_target_in_range() {
        let mut resolver = CombatResolver::new();
        let entities = roster(&[("far", 4.5, true), ("near", 2.0, true), ("dead", 0.5, false)]);

        let command = resolver.resolve(&intent_at(0.0, 0.0), &entities, Instant::now());
        assert_eq!(
            command,
            Some(ClientMsg::PlayerAttack {
                target_id: "near".to_string()
            })
        );
    }

    #[test]
    fn radius_is_exclusive() {
        let resolver = CombatResolver::new();
        let entities = roster(&[("edge", AGGRO_RADIUS, true)]);
        assert!(resolver
            .select_target(&Vec3::ZERO, entities.values())
            .is_none());
    }

    #[test]
    fn whiff_sends_nothing_but_still_plays_effect() {
        let mut resolver = CombatResolver::new();
        let entities = roster(&[("far", 50.0, true)]);

        let command = resolver.resolve(&intent_at(0.0, 0.0), &entities, Instant::now());
        assert!(command.is_none());
        assert_eq!(resolver.effects().len(), 1);
    }

    #[test]
    fn ties_resolve_to_lowest_id() {
        let resolver = CombatResolver::new();
        let entities = roster(&[("b", 1.0, true), ("a", -1.0, true)]);
        let target = resolver.select_target(&Vec3::ZERO, entities.values()).unwrap();
        assert_eq!(target.id, "a");
    }

    #[test]
    fn effect_list_never_exceeds_cap_and_keeps_newest() {
        let mut resolver = CombatResolver::new();
        let entities = HashMap::new();
        let now = Instant::now();

        for i in 0..35 {
            resolver.resolve(&intent_at(i as f32, 0.0), &entities, now);
            assert!(resolver.effects().len() <= MAX_EFFECTS);
        }

        assert_eq!(resolver.effects().len(), MAX_EFFECTS);
        assert_eq!(resolver.effects().front().unwrap().position.x, 15.0);
        assert_eq!(resolver.effects().back().unwrap().position.x, 34.0);
    }

    #[test]
    fn sweep_removes_effects_at_lifetime() {
        let mut resolver = CombatResolver::new();
        let entities = HashMap::new();
        let start = Instant::now();

        resolver.resolve(&intent_at(0.0, 0.0), &entities, start);
        resolver.resolve(&intent_at(1.0, 0.0), &entities, start + Duration::from_millis(100));

        assert_eq!(resolver.sweep(start + Duration::from_millis(299)), 0);
        assert_eq!(resolver.sweep(start + EFFECT_LIFETIME), 1);
        assert_eq!(resolver.effects().len(), 1);
        assert_eq!(resolver.sweep(start + Duration::from_millis(400)), 1);
        assert!(resolver.effects().is_empty());
    }
}
