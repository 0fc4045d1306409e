pub mod config_io;
pub mod image;
pub mod item_io;
pub mod storage;
