mod batch;
mod diff;
mod init;
mod worker;

pub use self::batch::{BatchDirs, batch};
pub use self::diff::diff;
pub use self::init::init;
pub use self::worker::worker;
