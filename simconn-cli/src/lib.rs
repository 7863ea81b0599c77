pub mod client;
pub mod command;
pub mod connector;
pub mod routine;
pub mod seat;
