use crate::entities::attributes::EntityKind;
use crate::entities::pawn::NORMAL_VIEW_DISTANCE;
use crate::net::codec::EncodeError;
use crate::net::message::{Message, PawnUpdate, PlayerUpdateMessage};
use crate::telemetry::logging;
use crate::world::state::World;

impl World {
    /// Hands every player the changed blocks of the pawns around it, then
    /// encodes each player's queued messages into frames. An encoding error
    /// stops the tick.
    pub(crate) fn synchronize(&mut self) -> Result<(), EncodeError> {
        let updates: Vec<(PawnUpdate, bool)> = self
            .players
            .iter()
            .chain(self.npcs.iter())
            .filter(|pawn| pawn.blocks.is_dirty())
            .filter_map(|pawn| {
                let index = u16::try_from(pawn.index()?).ok()?;
                Some((
                    PawnUpdate {
                        kind: pawn.entity_kind(),
                        index,
                        tile: pawn.tile,
                        blocks: pawn.blocks.clone(),
                    },
                    pawn.invisible,
                ))
            })
            .collect();

        for player in self.players.refs() {
            let Some(viewer) = self.players.resolve_mut(player) else {
                continue;
            };
            let tile = viewer.tile;
            let entries: Vec<PawnUpdate> = updates
                .iter()
                .filter(|(update, invisible)| {
                    let own = update.kind == EntityKind::Player && usize::from(update.index) == player.index;
                    own || (!invisible && update.tile.is_within_radius(tile, NORMAL_VIEW_DISTANCE))
                })
                .map(|(update, _)| update.clone())
                .collect();
            let (messages, oversized) = PlayerUpdateMessage::pack(entries);
            for entry in oversized {
                logging::log_error(&format!(
                    "dropped {:?} {} update for player {}: {} bytes",
                    entry.kind,
                    entry.index,
                    player.index,
                    entry.encoded_len()
                ));
            }
            for message in messages {
                viewer.write(Message::PlayerUpdate(message));
            }

            let Some(data) = viewer.as_player_mut() else {
                continue;
            };
            for message in data.take_outbox() {
                let frame = message.encode(&self.layouts).map_err(|err| {
                    logging::log_error(&format!("player {}: {}", data.username, err));
                    err
                })?;
                data.push_frame(frame);
            }
        }
        Ok(())
    }

    pub(crate) fn post_synchronize(&mut self) {
        for pawn in self.players.iter_mut().chain(self.npcs.iter_mut()) {
            pawn.post_sync();
        }
    }
}
