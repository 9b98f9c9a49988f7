//! Key material and the sign/verify primitive every call path shares.

pub mod key;
pub mod primitive;

pub use key::*;
pub use primitive::*;
