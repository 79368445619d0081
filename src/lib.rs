//! GPU-offloaded RSA over fixed-width decimal big numbers.
//!
//! The host represents the message and key material as fixed-capacity
//! decimal [`BigNumber`]s, marshals them into OpenCL device buffers, and
//! drives a precompiled modular-exponentiation program through two named
//! kernel entry points: `encrypt` and `decrypt`. Each invocation is a
//! blocking round trip over a single work item; the kernel arithmetic itself
//! is an external artifact whose boundary contract is defined in
//! [`gpu::opencl`].
//!
//! [`BigNumber`]: bignum::BigNumber

pub mod bignum;
pub mod config;
pub mod error;
pub mod gpu;
pub mod keys;

pub use bignum::{BigNumber, Sign, MAXDIGITS};
pub use config::RunConfig;
pub use error::{Result, RsaClError};
pub use gpu::{DeviceStage, OpenClBackend};
pub use keys::KeyMaterial;
