//! Chat-triggered text-to-image relay - Library exports for testing

pub mod api;
pub mod core;
pub mod infrastructure;

use crate::core::handler::IncomingRequest;
use tokio::sync::OnceCell;
use tokio::sync::mpsc;

pub static TASK_SENDER: OnceCell<mpsc::Sender<IncomingRequest>> = OnceCell::const_new();
