pub mod bluetooth;
pub mod logging;
pub mod messaging;
pub mod platform;
pub mod storage;
