pub mod participant;
pub mod messages;
pub mod cursor;
pub mod health;
pub mod ready;
pub mod diagnostics;
pub mod error;

pub use participant::*;
pub use messages::*;
pub use cursor::*;
pub use health::*;
pub use ready::*;
pub use diagnostics::*;
pub use error::*;
