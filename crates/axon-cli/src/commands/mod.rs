pub mod backend;
pub mod chat;
pub mod gate;
