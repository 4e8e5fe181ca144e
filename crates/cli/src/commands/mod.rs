pub mod account;
pub mod cluster;
pub mod device;
pub mod storage;
