use crate::net::message::Message;
use crate::world::tile::Tile;

/// Tiles along each axis the client map view spans by default.
pub const DEFAULT_MAP_SIZE: i32 = 0;

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerData {
    /// Persistent account-level id, stable across logins.
    pub uid: u64,
    pub username: String,
    pub run_enabled: bool,
    pub map_size: i32,
    pub force_map_refresh: bool,
    /// Bottom-left tile of the area the client currently has loaded.
    pub last_known_region_base: Option<Tile>,
    outbox: Vec<Message>,
    frames: Vec<Vec<u8>>,
}

impl PlayerData {
    pub fn new(uid: u64, username: &str) -> Self {
        Self {
            uid,
            username: username.to_string(),
            run_enabled: false,
            map_size: DEFAULT_MAP_SIZE,
            force_map_refresh: false,
            last_known_region_base: None,
            outbox: Vec::new(),
            frames: Vec::new(),
        }
    }

    pub fn write(&mut self, message: Message) {
        self.outbox.push(message);
    }

    /// Messages written this tick that have not been encoded yet.
    pub fn pending_messages(&self) -> &[Message] {
        &self.outbox
    }

    pub(crate) fn take_outbox(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.outbox)
    }

    pub(crate) fn push_frame(&mut self, frame: Vec<u8>) {
        self.frames.push(frame);
    }

    /// Encoded frames waiting for the transport.
    pub fn take_frames(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.frames)
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::message::GameMessage;

    #[test]
    fn outbox_drains_once() {
        let mut player = PlayerData::new(7, "alice");
        player.write(Message::Game(GameMessage::new("hello")));
        assert_eq!(player.pending_messages().len(), 1);
        assert_eq!(player.take_outbox().len(), 1);
        assert!(player.take_outbox().is_empty());
    }

    #[test]
    fn frames_are_handed_out_in_order() {
        let mut player = PlayerData::new(7, "alice");
        player.push_frame(vec![1]);
        player.push_frame(vec![2]);
        assert_eq!(player.take_frames(), vec![vec![1], vec![2]]);
        assert_eq!(player.frame_count(), 0);
    }
}
