//! HTTP ingress for platform callbacks.

pub mod callbacks;
