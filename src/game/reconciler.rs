//! Merging authority broadcasts into local display state

use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::ws::protocol::RemoteEntity;

use super::{LocalPlayerState, MAX_HEALTH};

/// Ids that appeared or vanished in one broadcast
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub joined: Vec<String>,
    pub left: Vec<String>,
    /// Whether the broadcast listed the local player
    pub local_updated: bool,
}

/// Remote entities as last reported by the authority
#[derive(Debug, Default)]
pub struct RemoteStateReconciler {
    entities: HashMap<String, RemoteEntity>,
}

impl RemoteStateReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entities(&self) -> &HashMap<String, RemoteEntity> {
        &self.entities
    }

    pub fn get(&self, id: &str) -> Option<&RemoteEntity> {
        self.entities.get(id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Apply one `players_update`.
    ///
    /// The local entry only contributes vitals; its position and facing stay
    /// client-predicted. Every other entry replaces what was stored, and ids
    /// missing from the broadcast are dropped.
    pub fn apply(&mut self, players: Vec<RemoteEntity>, local: &mut LocalPlayerState) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let mut next = HashMap::with_capacity(players.len());

        for entity in players {
            if entity.id == local.id {
                adopt_vitals(local, &entity);
                report.local_updated = true;
                continue;
            }

            if !self.entities.contains_key(&entity.id) && !next.contains_key(&entity.id) {
                report.joined.push(entity.id.clone());
            }
            next.insert(entity.id.clone(), entity);
        }

        let listed: HashSet<&String> = next.keys().collect();
        report.left = self
            .entities
            .keys()
            .filter(|id| !listed.contains(id))
            .cloned()
            .collect();

        self.entities = next;

        if !report.joined.is_empty() || !report.left.is_empty() {
            debug!(
                joined = ?report.joined,
                left = ?report.left,
                remote_count = self.entities.len(),
                "Remote roster changed"
            );
        }

        report
    }

    /// Remove the entry now known to be the local player, taking its
    /// vitals. Returns whether one was stored.
    pub fn claim_local(&mut self, local: &mut LocalPlayerState) -> bool {
        match self.forget(&local.id) {
            Some(entity) => {
                adopt_vitals(local, &entity);
                debug!(id = %local.id, "Local player removed from remote roster");
                true
            }
            None => false,
        }
    }

    pub fn forget(&mut self, id: &str) -> Option<RemoteEntity> {
        self.entities.remove(id)
    }

    /// Forget everything, e.g. after the channel drops
    pub fn clear(&mut self) {
        self.entities.clear();
    }
}

fn adopt_vitals(local: &mut LocalPlayerState, entity: &RemoteEntity) {
    local.health = entity.health.clamp(0.0, MAX_HEALTH);
    local.kills = entity.kills;
    local.deaths = entity.deaths;
}
