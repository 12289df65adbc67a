//! Content verification primitives for downloaded game files.
//!
//! Provides incremental hashing so a transfer can be verified in the same pass
//! that writes it to disk, plus a file digest used to decide whether an
//! existing local copy can be reused without touching the network.
//!
//! # Key Features
//!
//! - **Incremental**: Computes digests as data streams through
//! - **Algorithm by shape**: [`ContentHash`] infers SHA-1 or SHA-256 from the hex length
//! - **Extensible**: Minimal `Hasher` trait allows custom implementations
//!
//! # Example
//!
//! ```
//! use harbor_verify::{ContentHash, Hasher};
//!
//! let expected: ContentHash = "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed".parse().unwrap();
//!
//! let mut hasher = expected.hasher();
//! hasher.update(b"hello ");
//! hasher.update(b"world");
//!
//! expected.verify(&hasher.finalize()).unwrap();
//! ```

pub use self::error::{Result, VerifyError};
pub use self::file::{digest_file, file_matches};
pub use self::hash::{Algorithm, ContentHash};
pub use self::hasher::{AnyHasher, Hasher, Sha1Hasher, Sha256Hasher};

mod error;
mod file;
mod hash;
mod hasher;
