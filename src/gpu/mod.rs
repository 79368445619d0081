/// GPU backend for the RSA modular-exponentiation kernels.
///
/// The host side of the pipeline lives here: marshaling [`BigNumber`]
/// operands into device buffers, locating the named kernel entry points in
/// the compiled program, dispatching a single work item, blocking on
/// completion, and reading the result back. The kernel bodies themselves are
/// an external artifact; this module only owns the contract at their
/// boundary.
///
/// The real backend is OpenCL via the `opencl3` crate, gated behind the
/// `opencl` cargo feature. Without the feature a stub backend reports
/// [`crate::error::RsaClError::BackendUnavailable`] so the rest of the crate
/// builds and tests on machines with no OpenCL runtime.
///
/// [`BigNumber`]: crate::bignum::BigNumber

pub mod opencl;

pub use opencl::OpenClBackend;

use std::fmt;

/// The device-side stage at which an invocation failed. Each backend call is
/// checked individually so a failure report always names its stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStage {
    BufferAlloc,
    KernelLookup,
    ArgumentBind,
    Dispatch,
    Readback,
}

impl fmt::Display for DeviceStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceStage::BufferAlloc => "buffer allocation",
            DeviceStage::KernelLookup => "kernel lookup",
            DeviceStage::ArgumentBind => "argument binding",
            DeviceStage::Dispatch => "dispatch",
            DeviceStage::Readback => "readback",
        };
        write!(f, "{name}")
    }
}

/// Name of the encryption kernel entry point in the device program.
pub const ENCRYPT_KERNEL_NAME: &str = "encrypt";

/// Name of the decryption kernel entry point in the device program.
pub const DECRYPT_KERNEL_NAME: &str = "decrypt";

/// Header prepended to the kernel source before compilation, pinning the
/// digit capacity and sign encoding the host was built with.
pub fn kernel_source_prelude() -> String {
    format!(
        "#pragma OPENCL EXTENSION cl_khr_byte_addressable_store : enable\n\
         #define PLUS 1\n\
         #define MINUS -1\n\
         #define MAXDIGITS {}\n",
        crate::bignum::MAXDIGITS
    )
}
