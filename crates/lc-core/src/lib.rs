#![deny(missing_docs)]
#![doc = "Core error, seeding, hashing, and provenance primitives shared by the lcurve crates."]

pub mod errors;
pub mod hash;
pub mod provenance;
pub mod rng;
pub mod serde;

pub use errors::{ErrorInfo, LcError};
pub use hash::stable_hash_string;
pub use provenance::{RunProvenance, SchemaVersion};
pub use rng::{derive_substream_seed, RngHandle};
pub use crate::serde::{from_json_slice, to_canonical_json_bytes};
