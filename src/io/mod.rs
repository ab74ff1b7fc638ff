pub mod cache;
pub mod config_io;
pub mod file_backend;
pub mod handle_store;
pub mod host;
pub mod lock;
pub mod poller;
pub mod recovery;
