pub mod chunk;
pub mod collision;
pub mod hooks;
pub mod instance;
pub mod state;
pub mod tile;
pub mod time;
pub mod xtea;
