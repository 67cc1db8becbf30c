//! Shared types for the jellypanel daemon and its consumers: the catalog and
//! session model, the reconciled view state, the wire protocol, the render
//! model, configuration and platform paths.

pub mod config;
pub mod model;
pub mod platform;
pub mod protocol;
pub mod state;
pub mod view;
