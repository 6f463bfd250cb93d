//! Client-side game state: local prediction, reconciliation, combat feedback

pub mod combat;
pub mod controller;
pub mod reconciler;

pub use combat::{CombatResolver, VisualEffect};
pub use controller::{Direction, Key, LocalPlayerController};
pub use reconciler::{ReconcileReport, RemoteStateReconciler};

use std::time::Duration;

use crate::ws::protocol::{ClientMsg, Vec3};

/// Id held until the authority assigns one
pub const UNREGISTERED_ID: &str = "local";

/// Half-extent of the square play area on both horizontal axes
pub const WORLD_BOUND: f32 = 150.0;

/// Minimum spacing between two attack intents from one controller
pub const ATTACK_DEBOUNCE: Duration = Duration::from_millis(500);

/// Targets must be strictly closer than this to be hit
pub const AGGRO_RADIUS: f32 = 5.0;

/// Lifetime of a local attack effect
pub const EFFECT_LIFETIME: Duration = Duration::from_millis(300);

/// Maximum number of attack effects kept at once
pub const MAX_EFFECTS: usize = 20;

pub const MAX_HEALTH: f32 = 100.0;

/// The locally controlled player.
///
/// Locomotion is owned by the client; vitals are owned by the authority.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalPlayerState {
    pub id: String,
    pub position: Vec3,
    /// Yaw in radians, z-forward
    pub facing: f32,
    pub moving: bool,
    /// Health (0-100)
    pub health: f32,
    pub kills: u32,
    pub deaths: u32,
}

impl LocalPlayerState {
    pub fn new() -> Self {
        Self {
            id: UNREGISTERED_ID.to_string(),
            position: Vec3::ZERO,
            facing: 0.0,
            moving: false,
            health: MAX_HEALTH,
            kills: 0,
            deaths: 0,
        }
    }

    /// True once the authority has assigned an identity
    pub fn is_registered(&self) -> bool {
        self.id != UNREGISTERED_ID
    }

    /// Current pose as an outbound move message
    pub fn move_msg(&self) -> ClientMsg {
        ClientMsg::PlayerMove {
            position: self.position,
            rotation: Vec3::yaw(self.facing),
        }
    }
}

impl Default for LocalPlayerState {
    fn default() -> Self {
        Self::new()
    }
}

/// A local request to attack, produced at most once per debounce window
#[derive(Debug, Clone, PartialEq)]
pub struct AttackIntent {
    pub actor_id: String,
    pub position: Vec3,
    pub rotation: f32,
    /// Unix milliseconds
    pub timestamp: u64,
}
