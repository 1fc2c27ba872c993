pub mod block;
pub mod pre_sync;
pub mod region;
pub mod update;
