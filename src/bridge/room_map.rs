use std::collections::HashMap;

use crate::config::ConfigError;

/// Static two-way lookup between IRC channels and Matrix rooms.
///
/// Channel names are compared case-insensitively, room ids exactly.
#[derive(Debug, Clone, Default)]
pub struct RoomMap {
    channel_to_room: HashMap<String, String>,
    room_to_channel: HashMap<String, String>,
}

impl RoomMap {
    pub fn from_pairs(pairs: &[(String, String)]) -> Result<Self, ConfigError> {
        let mut map = Self::default();

        for (channel, room) in pairs {
            let channel = channel.trim();
            let room = room.trim();
            if channel.is_empty() || room.is_empty() {
                return Err(ConfigError::InvalidConfig(
                    "room mapping entries must name both a channel and a room".to_string(),
                ));
            }

            let channel_key = channel_key(channel);
            if map.channel_to_room.contains_key(&channel_key) {
                return Err(ConfigError::DuplicateMapping(channel.to_string()));
            }
            if map.room_to_channel.contains_key(room) {
                return Err(ConfigError::DuplicateMapping(room.to_string()));
            }

            map.channel_to_room.insert(channel_key, room.to_string());
            map.room_to_channel
                .insert(room.to_string(), channel.to_string());
        }

        Ok(map)
    }

    pub fn irc_to_matrix(&self, channel: &str) -> Option<&str> {
        self.channel_to_room
            .get(&channel_key(channel))
            .map(String::as_str)
    }

    pub fn matrix_to_irc(&self, room_id: &str) -> Option<&str> {
        self.room_to_channel.get(room_id).map(String::as_str)
    }

    pub fn channels(&self) -> impl Iterator<Item = &str> {
        self.room_to_channel.values().map(String::as_str)
    }

    pub fn rooms(&self) -> impl Iterator<Item = &str> {
        self.room_to_channel.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.room_to_channel.len()
    }
}

fn channel_key(channel: &str) -> String {
    channel.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::RoomMap;
    use crate::config::ConfigError;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(c, r)| (c.to_string(), r.to_string()))
            .collect()
    }

    #[test]
    fn lookups_are_inverse_for_every_pair() {
        let configured = pairs(&[
            ("#rust", "!rust:example.org"),
            ("#tokio", "!tokio:example.org"),
            ("#serde", "!serde:example.org"),
        ]);
        let map = RoomMap::from_pairs(&configured).expect("valid mapping");

        for (channel, room) in &configured {
            assert_eq!(map.irc_to_matrix(channel), Some(room.as_str()));
            assert_eq!(map.matrix_to_irc(room), Some(channel.as_str()));
        }
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn unmapped_ids_are_absent_in_both_directions() {
        let map = RoomMap::from_pairs(&pairs(&[("#rust", "!rust:example.org")]))
            .expect("valid mapping");

        assert_eq!(map.irc_to_matrix("#python"), None);
        assert_eq!(map.matrix_to_irc("!python:example.org"), None);
        assert_eq!(map.matrix_to_irc("#rust"), None);
    }

    #[test]
    fn channel_lookup_ignores_case() {
        let map = RoomMap::from_pairs(&pairs(&[("#Rust", "!rust:example.org")]))
            .expect("valid mapping");

        assert_eq!(map.irc_to_matrix("#rust"), Some("!rust:example.org"));
        assert_eq!(map.matrix_to_irc("!rust:example.org"), Some("#Rust"));
    }

    #[test]
    fn duplicate_channel_is_a_config_error() {
        let err = RoomMap::from_pairs(&pairs(&[
            ("#rust", "!a:example.org"),
            ("#RUST", "!b:example.org"),
        ]))
        .expect_err("duplicate channel");
        assert!(matches!(err, ConfigError::DuplicateMapping(ref id) if id == "#RUST"));
    }

    #[test]
    fn duplicate_room_is_a_config_error() {
        let err = RoomMap::from_pairs(&pairs(&[
            ("#rust", "!a:example.org"),
            ("#tokio", "!a:example.org"),
        ]))
        .expect_err("duplicate room");
        assert!(matches!(err, ConfigError::DuplicateMapping(ref id) if id == "!a:example.org"));
    }

    #[test]
    fn empty_identifiers_are_rejected() {
        let err = RoomMap::from_pairs(&pairs(&[("#rust", "  ")])).expect_err("empty room");
        assert!(matches!(err, ConfigError::InvalidConfig(_)));
    }
}
