//! Bridge between a BLE body-composition scale and a pub/sub broker.
//!
//! Each wake cycle either reconfigures the scale or reads one fresh,
//! stabilised measurement and delivers it with an acknowledged publish.
//! See [`node::Node::run`].

pub mod domain;
pub mod infrastructure;
pub mod node;

#[cfg(test)]
pub(crate) mod testing;
