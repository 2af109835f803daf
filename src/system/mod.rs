pub mod collector;
pub mod delta;
pub mod error;
pub mod history;
pub mod host;
pub mod platform;
pub mod process;
pub mod procfs;
pub mod scheduler;
pub mod sensors;
pub mod snapshot;
