pub mod handler;
pub mod room;

pub use handler::websocket_handler;
pub use room::{RelayFrame, RoomRegistry};
