// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Redacting wrapper for credential material.
//!
//! Site publishing passwords and control-plane tokens travel through the pool
//! alongside ordinary resource data that is logged freely. Wrapping them in
//! [`Secret`] keeps `Debug`, `Display` and `Serialize` output redacted and
//! zeroes the buffer on drop. Reading the value requires [`Secret::expose`].
//!
//! ```
//! use trysite_common_config::Secret;
//!
//! let password = Secret::new("p@ss".to_string());
//! assert_eq!(format!("{password}"), "[REDACTED]");
//! assert_eq!(password.expose(), "p@ss");
//! ```

use std::fmt;

use zeroize::Zeroize;

/// Placeholder printed instead of any secret value.
pub const REDACTED: &str = "[REDACTED]";

#[derive(Zeroize)]
#[zeroize(drop)]
pub struct Secret<T: Zeroize> {
	inner: T,
}

pub type SecretString = Secret<String>;

impl<T: Zeroize> Secret<T> {
	pub fn new(inner: T) -> Self {
		Self { inner }
	}

	/// Borrow the wrapped value. Every call site that needs the plaintext
	/// goes through here.
	pub fn expose(&self) -> &T {
		&self.inner
	}
}

impl<T: Zeroize + Clone> Clone for Secret<T> {
	fn clone(&self) -> Self {
		Self::new(self.inner.clone())
	}
}

impl<T: Zeroize + Default> Default for Secret<T> {
	fn default() -> Self {
		Self::new(T::default())
	}
}

impl<T: Zeroize> fmt::Debug for Secret<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Secret").field(&REDACTED).finish()
	}
}

impl<T: Zeroize> fmt::Display for Secret<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

impl<T: Zeroize + PartialEq> PartialEq for Secret<T> {
	fn eq(&self, other: &Self) -> bool {
		self.inner == other.inner
	}
}

impl<T: Zeroize + Eq> Eq for Secret<T> {}

impl From<String> for Secret<String> {
	fn from(value: String) -> Self {
		Self::new(value)
	}
}

impl From<&str> for Secret<String> {
	fn from(value: &str) -> Self {
		Self::new(value.to_string())
	}
}

#[cfg(feature = "serde")]
mod serde_impl {
	use serde::{Deserialize, Deserializer, Serialize, Serializer};
	use zeroize::Zeroize;

	use super::{Secret, REDACTED};

	impl<T: Zeroize> Serialize for Secret<T> {
		fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
			serializer.serialize_str(REDACTED)
		}
	}

	impl<'de, T: Deserialize<'de> + Zeroize> Deserialize<'de> for Secret<T> {
		fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
			T::deserialize(deserializer).map(Secret::new)
		}
	}
}
