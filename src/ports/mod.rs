pub mod browser;
pub mod spotify;
pub mod storage;
pub mod view;
