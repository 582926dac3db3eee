pub mod messages;
pub mod opcodes;
pub mod packet;
pub mod payloads;
pub mod session;
