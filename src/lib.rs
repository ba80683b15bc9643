pub mod chunks;
pub mod cli;
pub mod client;
pub mod exbuf;
pub mod protocol;
pub mod server;
pub mod transport;
