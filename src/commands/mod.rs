pub mod config;
pub mod dialog;
pub mod init;

pub use config::*;
pub use dialog::*;
pub use init::*;
