//! Game server protocol implementations.

pub mod battleye;
