//! Domain Layer
//!
//! Types, errors, ports, and pure services. No I/O lives here.

pub mod entities;
pub mod error;
pub mod ports;
pub mod services;
pub mod value_objects;
