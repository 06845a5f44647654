mod error;
mod key;
mod logging;
mod network;
mod notify;
mod prompt;

pub use error::*;
pub use key::*;
pub use logging::*;
pub use network::*;
pub use notify::*;
pub use prompt::*;
