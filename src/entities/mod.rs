pub mod attributes;
pub mod movement;
pub mod npc;
pub mod pawn;
pub mod pawn_list;
pub mod player;
pub mod timers;
