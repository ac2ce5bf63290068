//! Utility functions for Arrow access, file IO and logging

pub mod arrow;
pub mod io;
pub mod logging;
