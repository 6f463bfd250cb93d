//! WebSocket protocol message definitions
//! These are the wire types for client-authority communication

use serde::{Deserialize, Deserializer, Serialize};

/// Position or euler rotation in world space
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to `other`
    pub fn distance(&self, other: &Vec3) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Euler rotation carrying only a yaw around the vertical axis
    pub const fn yaw(angle: f32) -> Self {
        Self::new(0.0, angle, 0.0)
    }
}

/// Messages sent from client to authority
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Locally predicted pose; facing travels in `rotation.y`
    PlayerMove { position: Vec3, rotation: Vec3 },

    /// Melee attack on a specific remote entity
    PlayerAttack {
        #[serde(rename = "targetId")]
        target_id: String,
    },
}

/// Messages sent from authority to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Identity assignment after the channel opens
    PlayerId {
        #[serde(rename = "playerId", deserialize_with = "id_from_string_or_number")]
        player_id: String,
    },

    /// Full list of entities the authority currently tracks
    PlayersUpdate {
        #[serde(default)]
        players: Vec<RemoteEntity>,
    },

    /// Any message type this client does not understand
    #[serde(other)]
    Unknown,
}

/// Authority view of one player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteEntity {
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub id: String,
    #[serde(default)]
    pub position: Vec3,
    /// Yaw in radians
    #[serde(default, deserialize_with = "yaw_from_number_or_euler")]
    pub rotation: f32,
    /// Health (0-100)
    #[serde(default = "full_health")]
    pub health: f32,
    #[serde(default = "alive_by_default")]
    pub alive: bool,
    #[serde(default)]
    pub kills: u32,
    #[serde(default)]
    pub deaths: u32,
}

impl RemoteEntity {
    pub fn new(id: impl Into<String>, position: Vec3) -> Self {
        Self {
            id: id.into(),
            position,
            rotation: 0.0,
            health: full_health(),
            alive: true,
            kills: 0,
            deaths: 0,
        }
    }
}

fn full_health() -> f32 {
    100.0
}

fn alive_by_default() -> bool {
    true
}

/// Authorities in the wild send ids both as strings and as integers
fn id_from_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}

/// Rotation may be a bare yaw or a full `{x,y,z}` euler; keep the yaw
fn yaw_from_number_or_euler<'de, D>(deserializer: D) -> Result<f32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawRotation {
        Yaw(f32),
        Euler(Vec3),
    }

    Ok(match RawRotation::deserialize(deserializer)? {
        RawRotation::Yaw(yaw) => yaw,
        RawRotation::Euler(euler) => euler.y,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn outbound_messages_use_authority_field_names() {
        let attack = ClientMsg::PlayerAttack {
            target_id: "p7".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&attack).unwrap(),
            json!({"type": "player_attack", "targetId": "p7"})
        );

        let mv = ClientMsg::PlayerMove {
            position: Vec3::new(1.0, 0.0, -2.0),
            rotation: Vec3::yaw(0.5),
        };
        assert_eq!(
            serde_json::to_value(&mv).unwrap(),
            json!({
                "type": "player_move",
                "position": {"x": 1.0, "y": 0.0, "z": -2.0},
                "rotation": {"x": 0.0, "y": 0.5, "z": 0.0}
            })
        );
    }

    #[test]
    fn player_id_accepts_numbers() {
        let msg: ServerMsg = serde_json::from_str(r#"{"type":"player_id","playerId":42}"#).unwrap();
        assert_eq!(
            msg,
            ServerMsg::PlayerId {
                player_id: "42".to_string()
            }
        );
    }

    #[test]
    fn players_update_fills_defaults_and_reads_euler_rotation() {
        let raw = r#"{
            "type": "players_update",
            "players": [
                {"id": "a", "position": {"x": 1, "y": 0, "z": 2}, "rotation": {"x": 0, "y": 1.25, "z": 0}, "health": 40, "alive": true, "kills": 2, "deaths": 1},
                {"id": "b", "rotation": 0.5}
            ]
        }"#;

        let ServerMsg::PlayersUpdate { players } = serde_json::from_str(raw).unwrap() else {
            panic!("expected players_update");
        };

        assert_eq!(players.len(), 2);
        assert_eq!(players[0].rotation, 1.25);
        assert_eq!(players[0].health, 40.0);
        assert_eq!(players[0].kills, 2);
        assert_eq!(players[1].rotation, 0.5);
        assert_eq!(players[1].health, 100.0);
        assert!(players[1].alive);
        assert_eq!(players[1].position, Vec3::ZERO);
    }

    #[test]
    fn unknown_types_do_not_fail_parsing() {
        let msg: ServerMsg = serde_json::from_str(r#"{"type":"chat","text":"hi"}"#).unwrap();
        assert_eq!(msg, ServerMsg::Unknown);
    }

    #[test]
    fn distance_is_euclidean() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(3.0, 0.0, 4.0);
        assert_eq!(a.distance(&b), 5.0);
    }
}
