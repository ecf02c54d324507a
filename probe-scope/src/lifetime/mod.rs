//! Object lifetime reconstruction and trace entry annotation

pub mod config;
pub mod tracker;

pub use config::{builtin_kinds, descriptors, ObjectKind, Role, RoleBinding};
pub use tracker::{Lifetime, LifetimeTracker, ObjectTracker};
