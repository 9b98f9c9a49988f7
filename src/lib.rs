//! Ed25519 document signing served as unary, batch, and bidirectional-stream RPC operations,
//! with every call admitted through an authentication + rate-limit gate first.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod admission;
pub mod config;
pub mod error;
pub mod gateway;
pub mod handler;
pub mod obs;
pub mod service;
pub mod session;
pub mod signing;
pub mod wire;

mod _prelude {
	pub use std::{
		collections::{BTreeMap, BTreeSet},
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
		time::Duration,
	};

	pub use parking_lot::Mutex;
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;

	pub use crate::error::{Error, Result};
}

pub use ed25519_dalek;
#[cfg(test)] use color_eyre as _;
