//! Local movement prediction and attack input

use std::collections::HashMap;
use tokio::time::Instant;
use tracing::trace;

use crate::util::time::unix_millis;

use super::{AttackIntent, LocalPlayerState, ATTACK_DEBOUNCE, WORLD_BOUND};

/// Logical movement direction; several physical keys map to each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Forward,
    Back,
    Left,
    Right,
}

/// Input the controller cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Move(Direction),
    Attack,
}

impl Key {
    /// Map a `KeyboardEvent.code` style token. WASD and arrows are aliases.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "KeyW" | "ArrowUp" => Some(Key::Move(Direction::Forward)),
            "KeyS" | "ArrowDown" => Some(Key::Move(Direction::Back)),
            "KeyA" | "ArrowLeft" => Some(Key::Move(Direction::Left)),
            "KeyD" | "ArrowRight" => Some(Key::Move(Direction::Right)),
            "Space" => Some(Key::Attack),
            _ => None,
        }
    }
}

/// Turns held keys into predicted movement every tick
pub struct LocalPlayerController {
    /// Held physical keys and the direction each one drives
    held: HashMap<String, Direction>,
    /// Distance per tick along each held axis
    speed: f32,
    last_attack: Option<Instant>,
}

impl LocalPlayerController {
    pub fn new(speed: f32) -> Self {
        Self {
            held: HashMap::new(),
            speed,
            last_attack: None,
        }
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Handle a key press. Returns an attack intent when the attack key is
    /// pressed outside the debounce window.
    pub fn key_down(&mut self, code: &str, now: Instant, player: &LocalPlayerState) -> Option<AttackIntent> {
        match Key::from_code(code)? {
            Key::Move(direction) => {
                self.held.insert(code.to_string(), direction);
                None
            }
            Key::Attack => self.try_attack(now, player),
        }
    }

    pub fn key_up(&mut self, code: &str) {
        self.held.remove(code);
    }

    /// Forget every held key, e.g. when the window loses focus
    pub fn release_all(&mut self) {
        self.held.clear();
    }

    pub fn is_held(&self, direction: Direction) -> bool {
        self.held.values().any(|held| *held == direction)
    }

    /// Produce an intent unless one was produced less than the debounce
    /// window ago. Suppressed presses are dropped, not deferred.
    pub fn try_attack(&mut self, now: Instant, player: &LocalPlayerState) -> Option<AttackIntent> {
        if let Some(last) = self.last_attack {
            if now.saturating_duration_since(last) < ATTACK_DEBOUNCE {
                trace!("Attack suppressed by debounce");
                return None;
            }
        }

        self.last_attack = Some(now);
        Some(AttackIntent {
            actor_id: player.id.clone(),
            position: player.position,
            rotation: player.facing,
            timestamp: unix_millis(),
        })
    }

    /// Displacement `(dx, dz)` the held keys ask for this tick
    pub fn displacement(&self) -> (f32, f32) {
        let mut dx = 0.0;
        let mut dz = 0.0;

        if self.is_held(Direction::Forward) {
            dz -= self.speed;
        }
        if self.is_held(Direction::Back) {
            dz += self.speed;
        }
        if self.is_held(Direction::Left) {
            dx -= self.speed;
        }
        if self.is_held(Direction::Right) {
            dx += self.speed;
        }

        (dx, dz)
    }

    /// Advance the local pose by one tick.
    ///
    /// `moving` reflects only this tick's input, so it drops the moment keys
    /// are released. Returns whether the pose changed.
    pub fn tick(&self, player: &mut LocalPlayerState) -> bool {
        let (dx, dz) = self.displacement();
        player.moving = dx != 0.0 || dz != 0.0;

        if !player.moving {
            return false;
        }

        let before = (player.position, player.facing);

        player.facing = dx.atan2(dz);
        player.position.x = (player.position.x + dx).clamp(-WORLD_BOUND, WORLD_BOUND);
        player.position.z = (player.position.z + dz).clamp(-WORLD_BOUND, WORLD_BOUND);

        before != (player.position, player.facing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, PI};
    use std::time::Duration;

    const SPEED: f32 = 0.15;
    const DIRECTION_CODES: [&str; 4] = ["KeyW", "KeyS", "KeyA", "KeyD"];

    #[test]
    fn arrows_alias_wasd() {
        assert_eq!(Key::from_code("ArrowUp"), Key::from_code("KeyW"));
        assert_eq!(Key::from_code("ArrowDown"), Key::from_code("KeyS"));
        assert_eq!(Key::from_code("ArrowLeft"), Key::from_code("KeyA"));
        assert_eq!(Key::from_code("ArrowRight"), Key::from_code("KeyD"));
        assert_eq!(Key::from_code("Space"), Some(Key::Attack));
        assert_eq!(Key::from_code("KeyQ"), None);
    }

    #[test]
    fn displacement_is_bounded_for_every_key_combination() {
        let now = Instant::now();
        let player = LocalPlayerState::new();

        for mask in 0u8..16 {
            let mut controller = LocalPlayerController::new(SPEED);
            for (bit, code) in DIRECTION_CODES.iter().enumerate() {
                if mask & (1 << bit) != 0 {
                    controller.key_down(code, now, &player);
                }
            }

            let (dx, dz) = controller.displacement();
            let magnitude = (dx * dx + dz * dz).sqrt();
            assert!(magnitude <= SPEED * 2f32.sqrt() + f32::EPSILON, "mask {mask:#06b}");
        }
    }

    #[test]
    fn position_stays_in_world_bounds() {
        let now = Instant::now();
        let mut player = LocalPlayerState::new();
        let mut controller = LocalPlayerController::new(10.0);
        controller.key_down("KeyW", now, &player);
        controller.key_down("KeyD", now, &player);

        for _ in 0..100 {
            controller.tick(&mut player);
            assert!(player.position.x.abs() <= WORLD_BOUND);
            assert!(player.position.z.abs() <= WORLD_BOUND);
        }
        assert_eq!(player.position.x, WORLD_BOUND);
        assert_eq!(player.position.z, -WORLD_BOUND);
    }

    #[test]
    fn facing_uses_z_forward_convention() {
        let now = Instant::now();
        let mut player = LocalPlayerState::new();
        let mut controller = LocalPlayerController::new(SPEED);

        controller.key_down("KeyS", now, &player);
        controller.tick(&mut player);
        assert_eq!(player.facing, 0.0);

        controller.release_all();
        controller.key_down("KeyD", now, &player);
        controller.tick(&mut player);
        assert!((player.facing - FRAC_PI_2).abs() < 1e-6);

        controller.release_all();
        controller.key_down("ArrowUp", now, &player);
        controller.tick(&mut player);
        assert!((player.facing.abs() - PI).abs() < 1e-6);
    }

    #[test]
    fn moving_drops_as_soon_as_input_stops() {
        let now = Instant::now();
        let mut player = LocalPlayerState::new();
        let mut controller = LocalPlayerController::new(SPEED);

        controller.key_down("KeyA", now, &player);
        assert!(controller.tick(&mut player));
        assert!(player.moving);
        let facing = player.facing;
        let position = player.position;

        controller.key_up("KeyA");
        assert!(!controller.tick(&mut player));
        assert!(!player.moving);
        assert_eq!(player.facing, facing);
        assert_eq!(player.position, position);
    }

    #[test]
    fn opposing_keys_cancel() {
        let now = Instant::now();
        let mut player = LocalPlayerState::new();
        let mut controller = LocalPlayerController::new(SPEED);
        controller.key_down("KeyA", now, &player);
        controller.key_down("KeyD", now, &player);

        assert!(!controller.tick(&mut player));
        assert!(!player.moving);
    }

    #[test]
    fn releasing_one_alias_keeps_direction_held() {
        let now = Instant::now();
        let player = LocalPlayerState::new();
        let mut controller = LocalPlayerController::new(SPEED);
        controller.key_down("KeyW", now, &player);
        controller.key_down("ArrowUp", now, &player);

        controller.key_up("ArrowUp");
        assert!(controller.is_held(Direction::Forward));
        controller.key_up("KeyW");
        assert!(!controller.is_held(Direction::Forward));
    }

    #[test]
    fn attack_intents_are_at_least_debounce_apart() {
        let start = Instant::now();
        let player = LocalPlayerState::new();
        let mut controller = LocalPlayerController::new(SPEED);
        let mut fired = Vec::new();

        // Press every 70ms for three seconds
        for step in 0..43u64 {
            let now = start + Duration::from_millis(step * 70);
            if controller.key_down("Space", now, &player).is_some() {
                fired.push(now);
            }
        }

        assert!(fired.len() > 1);
        for pair in fired.windows(2) {
            assert!(pair[1] - pair[0] >= ATTACK_DEBOUNCE);
        }
    }

    #[test]
    fn attack_intent_carries_current_pose() {
        let now = Instant::now();
        let mut player = LocalPlayerState::new();
        player.id = "p1".to_string();
        player.position.x = 4.0;
        player.facing = 0.25;
        let mut controller = LocalPlayerController::new(SPEED);

        let intent = controller.try_attack(now, &player).unwrap();
        assert_eq!(intent.actor_id, "p1");
        assert_eq!(intent.position.x, 4.0);
        assert_eq!(intent.rotation, 0.25);

        assert!(controller
            .try_attack(now + Duration::from_millis(499), &player)
            .is_none());
        assert!(controller
            .try_attack(now + Duration::from_millis(500), &player)
            .is_some());
    }
}
