pub mod codec;
pub mod layout;
pub mod message;
pub mod packet;
