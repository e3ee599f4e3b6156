pub mod dispatch;
pub mod engine;
pub mod handler;
pub mod reply;
pub mod traits;
pub mod worker;
