/// OpenCL backend: device selection, program compilation, and the two
/// kernel invocations.
///
/// The backend owns the process-wide OpenCL objects (context, command queue,
/// compiled program). They are created once, shared read-only by the
/// encryption and decryption calls, and released by `Drop` when the backend
/// goes out of scope. Per-invocation resources (the three input buffers, the
/// result buffer, and the kernel handle) are owned by the invoking function
/// and dropped before it returns, on success and failure alike, so no device
/// resource ever outlives its invocation.
///
/// Every backend call is checked and mapped to an error variant naming the
/// failing stage; nothing is retried.

use crate::error::{Result, RsaClError};

#[cfg(feature = "opencl")]
use crate::bignum::{BigNumber, MAXDIGITS};
#[cfg(feature = "opencl")]
use crate::gpu::DeviceStage;
#[cfg(feature = "opencl")]
use crate::gpu::{kernel_source_prelude, DECRYPT_KERNEL_NAME, ENCRYPT_KERNEL_NAME};
#[cfg(feature = "opencl")]
use log::info;
#[cfg(feature = "opencl")]
use opencl3::{
    command_queue::CommandQueue,
    context::Context,
    device::{get_all_devices, Device, CL_DEVICE_TYPE_GPU},
    kernel::Kernel,
    memory::{Buffer, CL_MEM_READ_ONLY, CL_MEM_WRITE_ONLY},
    platform::get_platforms,
    program::Program,
    types::{cl_uint, CL_BLOCKING},
};

#[cfg(not(feature = "opencl"))]
use crate::bignum::BigNumber;

/// OpenCL host context for the RSA kernels.
#[cfg(feature = "opencl")]
pub struct OpenClBackend {
    context: Context,
    queue: CommandQueue,
    program: Program,
    device: Device,
}

#[cfg(feature = "opencl")]
impl OpenClBackend {
    /// Locates a GPU device, creates the context and command queue, and
    /// compiles the kernel program from source.
    ///
    /// The source is prefixed with the host's digit-capacity and sign
    /// definitions before compilation so both sides agree on the buffer
    /// layout. Compiler diagnostics are surfaced verbatim on build failure.
    pub fn new(kernel_source: &str, device_index: usize) -> Result<Self> {
        let platforms = get_platforms().map_err(|e| {
            RsaClError::BackendUnavailable(format!("failed to query OpenCL platforms: {:?}", e))
        })?;
        if platforms.is_empty() {
            return Err(RsaClError::BackendUnavailable(
                "no OpenCL platforms found".to_string(),
            ));
        }

        let devices = get_all_devices(CL_DEVICE_TYPE_GPU).map_err(|e| {
            RsaClError::BackendUnavailable(format!("failed to query GPU devices: {:?}", e))
        })?;
        if devices.is_empty() {
            return Err(RsaClError::BackendUnavailable(
                "no OpenCL GPU devices found".to_string(),
            ));
        }
        if device_index >= devices.len() {
            return Err(RsaClError::BackendUnavailable(format!(
                "device index {} out of range (0-{})",
                device_index,
                devices.len() - 1
            )));
        }
        let device = Device::new(devices[device_index]);

        let context = Context::from_device(&device).map_err(|e| {
            RsaClError::ContextSetupFailed(format!("failed to create OpenCL context: {:?}", e))
        })?;

        let queue = CommandQueue::create_default(&context, 0).map_err(|e| {
            RsaClError::ContextSetupFailed(format!("failed to create command queue: {:?}", e))
        })?;

        let source = format!("{}{}", kernel_source_prelude(), kernel_source);
        let program = Program::create_and_build_from_source(&context, &source, "")
            .map_err(|e| RsaClError::ProgramCompileFailed(format!("{e}")))?;

        let backend = Self {
            context,
            queue,
            program,
            device,
        };
        info!("using OpenCL device: {}", backend.device_info());
        Ok(backend)
    }

    /// Human-readable description of the selected device.
    pub fn device_info(&self) -> String {
        let name = self
            .device
            .name()
            .unwrap_or_else(|_| "<unknown device>".to_string());
        match self.device.max_compute_units() {
            Ok(units) => format!("{name} ({units} compute units)"),
            Err(_) => name,
        }
    }

    /// Encrypts `message` with the public exponent: dispatches the
    /// `encrypt` kernel over `p`, `q` and the message, and returns the
    /// ciphertext read back from the device.
    pub fn run_encryption(
        &self,
        p: &BigNumber,
        q: &BigNumber,
        message: &BigNumber,
        public_exponent: u32,
    ) -> Result<BigNumber> {
        self.invoke(ENCRYPT_KERNEL_NAME, p, q, message, public_exponent)
    }

    /// Decrypts `ciphertext` with the private exponent via the `decrypt`
    /// kernel. Symmetric to [`Self::run_encryption`].
    pub fn run_decryption(
        &self,
        p: &BigNumber,
        q: &BigNumber,
        ciphertext: &BigNumber,
        private_exponent: u32,
    ) -> Result<BigNumber> {
        self.invoke(DECRYPT_KERNEL_NAME, p, q, ciphertext, private_exponent)
    }

    /// Shared invocation protocol for both kernels.
    ///
    /// Marshals the three big-number operands into read-only device buffers,
    /// allocates a write-only result buffer, binds the five arguments in the
    /// fixed order (p, q, operand, result, exponent), dispatches a single
    /// work item, blocks until the device signals completion, and reads the
    /// result back. All buffers and the kernel handle are function-local and
    /// released on every return path.
    fn invoke(
        &self,
        kernel_name: &str,
        p: &BigNumber,
        q: &BigNumber,
        operand: &BigNumber,
        exponent: u32,
    ) -> Result<BigNumber> {
        let p_buffer = self.marshal_input(p)?;
        let q_buffer = self.marshal_input(q)?;
        let operand_buffer = self.marshal_input(operand)?;
        let result_buffer = Buffer::<BigNumber>::create(
            &self.context,
            CL_MEM_WRITE_ONLY,
            1,
            std::ptr::null_mut(),
        )
        .map_err(|e| device_error(DeviceStage::BufferAlloc, &e))?;

        let kernel = Kernel::create(&self.program, kernel_name)
            .map_err(|e| device_error(DeviceStage::KernelLookup, &e))?;

        kernel
            .set_arg(0, &p_buffer)
            .and_then(|_| kernel.set_arg(1, &q_buffer))
            .and_then(|_| kernel.set_arg(2, &operand_buffer))
            .and_then(|_| kernel.set_arg(3, &result_buffer))
            .and_then(|_| kernel.set_arg(4, &(exponent as cl_uint)))
            .map_err(|e| device_error(DeviceStage::ArgumentBind, &e))?;

        // One message per run: a single work item, no batching.
        let global_work_size: [usize; 1] = [1];
        let local_work_size: [usize; 1] = [1];
        let kernel_event = self
            .queue
            .enqueue_nd_range_kernel(
                kernel.get(),
                1,
                std::ptr::null(),
                global_work_size.as_ptr(),
                local_work_size.as_ptr(),
                &[],
            )
            .map_err(|e| device_error(DeviceStage::Dispatch, &e))?;
        kernel_event
            .wait()
            .map_err(|e| device_error(DeviceStage::Dispatch, &e))?;

        let mut result = [BigNumber::unset()];
        self.queue
            .enqueue_read_buffer(&result_buffer, CL_BLOCKING, 0, &mut result, &[])
            .map_err(|e| device_error(DeviceStage::Readback, &e))?;

        let result = result[0];
        if result.last_digit() >= MAXDIGITS {
            return Err(RsaClError::DeviceOperationFailed {
                stage: DeviceStage::Readback,
                detail: format!(
                    "kernel {kernel_name:?} wrote a result with digit index {} past capacity {}",
                    result.last_digit(),
                    MAXDIGITS
                ),
            });
        }
        Ok(result)
    }

    /// Allocates a read-only device buffer sized for one big number and
    /// copies the value's full memory image into it, blocking until the
    /// transfer completes.
    fn marshal_input(&self, value: &BigNumber) -> Result<Buffer<BigNumber>> {
        let mut buffer =
            Buffer::<BigNumber>::create(&self.context, CL_MEM_READ_ONLY, 1, std::ptr::null_mut())
                .map_err(|e| device_error(DeviceStage::BufferAlloc, &e))?;
        self.queue
            .enqueue_write_buffer(&mut buffer, CL_BLOCKING, 0, std::slice::from_ref(value), &[])
            .map_err(|e| device_error(DeviceStage::BufferAlloc, &e))?;
        Ok(buffer)
    }
}

#[cfg(feature = "opencl")]
fn device_error(stage: DeviceStage, err: &dyn std::fmt::Debug) -> RsaClError {
    RsaClError::DeviceOperationFailed {
        stage,
        detail: format!("{:?}", err),
    }
}

/// Stub backend when OpenCL support is not compiled in.
#[cfg(not(feature = "opencl"))]
pub struct OpenClBackend;

#[cfg(not(feature = "opencl"))]
impl OpenClBackend {
    pub fn new(_kernel_source: &str, _device_index: usize) -> Result<Self> {
        Err(RsaClError::BackendUnavailable(
            "OpenCL support not compiled in".to_string(),
        ))
    }

    pub fn device_info(&self) -> String {
        "<no device>".to_string()
    }

    pub fn run_encryption(
        &self,
        _p: &BigNumber,
        _q: &BigNumber,
        _message: &BigNumber,
        _public_exponent: u32,
    ) -> Result<BigNumber> {
        Err(RsaClError::BackendUnavailable(
            "OpenCL support not compiled in".to_string(),
        ))
    }

    pub fn run_decryption(
        &self,
        _p: &BigNumber,
        _q: &BigNumber,
        _ciphertext: &BigNumber,
        _private_exponent: u32,
    ) -> Result<BigNumber> {
        Err(RsaClError::BackendUnavailable(
            "OpenCL support not compiled in".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Native-width modular exponentiation kernels used as a test fixture.
    /// The production kernel artifact is external; this one only has to be
    /// correct for operands that fit a ulong, which covers the textbook
    /// vectors exercised here.
    #[cfg(feature = "opencl")]
    const TEST_KERNEL_SOURCE: &str = r#"
typedef struct {
    uchar digits[MAXDIGITS];
    int sign;
    int last_digit;
} bignum_t;

ulong bn_to_ulong(__global const bignum_t* x) {
    ulong value = 0;
    for (int i = x->last_digit; i >= 0; i--) {
        value = value * 10 + x->digits[i];
    }
    return value;
}

void ulong_to_bn(ulong value, __global bignum_t* out) {
    out->sign = PLUS;
    if (value == 0) {
        out->digits[0] = 0;
        out->last_digit = 0;
        return;
    }
    int last = -1;
    while (value > 0) {
        last++;
        out->digits[last] = value % 10;
        value /= 10;
    }
    out->last_digit = last;
}

ulong mod_exp(ulong base, uint exponent, ulong modulus) {
    ulong result = 1 % modulus;
    base %= modulus;
    while (exponent > 0) {
        if (exponent & 1) {
            result = (result * base) % modulus;
        }
        base = (base * base) % modulus;
        exponent >>= 1;
    }
    return result;
}

__kernel void encrypt(__global const bignum_t* p, __global const bignum_t* q,
                      __global const bignum_t* message, __global bignum_t* result,
                      uint e) {
    ulong n = bn_to_ulong(p) * bn_to_ulong(q);
    ulong_to_bn(mod_exp(bn_to_ulong(message), e, n), result);
}

__kernel void decrypt(__global const bignum_t* p, __global const bignum_t* q,
                      __global const bignum_t* ciphertext, __global bignum_t* result,
                      uint d) {
    ulong n = bn_to_ulong(p) * bn_to_ulong(q);
    ulong_to_bn(mod_exp(bn_to_ulong(ciphertext), d, n), result);
}
"#;

    #[test]
    #[cfg(feature = "opencl")]
    fn test_textbook_round_trip_on_device() {
        let backend = match OpenClBackend::new(TEST_KERNEL_SOURCE, 0) {
            Ok(backend) => backend,
            Err(e) => {
                println!("skipping device test (no usable OpenCL GPU): {}", e);
                return;
            }
        };
        println!("device: {}", backend.device_info());

        let p = BigNumber::from_int(61);
        let q = BigNumber::from_int(53);
        let message = BigNumber::from_int(65);

        let ciphertext = backend.run_encryption(&p, &q, &message, 17).unwrap();
        assert_eq!(ciphertext.to_string(), "2790"); // 65^17 mod 3233

        let plaintext = backend.run_decryption(&p, &q, &ciphertext, 2753).unwrap();
        assert_eq!(plaintext, message);
    }

    #[test]
    #[cfg(feature = "opencl")]
    fn test_missing_entry_point_fails_kernel_lookup() {
        let backend = match OpenClBackend::new("__kernel void unrelated() {}", 0) {
            Ok(backend) => backend,
            Err(e) => {
                println!("skipping device test (no usable OpenCL GPU): {}", e);
                return;
            }
        };

        let p = BigNumber::from_int(61);
        let q = BigNumber::from_int(53);
        let message = BigNumber::from_int(65);
        match backend.run_encryption(&p, &q, &message, 17) {
            Err(RsaClError::DeviceOperationFailed {
                stage: DeviceStage::KernelLookup,
                ..
            }) => {}
            other => panic!("expected KernelLookup failure, got {:?}", other),
        }
    }

    #[test]
    #[cfg(feature = "opencl")]
    fn test_compile_diagnostics_surface() {
        match OpenClBackend::new("__kernel void broken(", 0) {
            Err(RsaClError::ProgramCompileFailed(_)) => {}
            Err(e) => println!("skipping device test (no usable OpenCL GPU): {}", e),
            Ok(_) => panic!("expected compile failure"),
        }
    }

    #[test]
    #[cfg(not(feature = "opencl"))]
    fn test_stub_backend_reports_unavailable() {
        match OpenClBackend::new("", 0) {
            Err(RsaClError::BackendUnavailable(_)) => {}
            other => panic!("expected BackendUnavailable, got {:?}", other.map(|_| ())),
        }
    }
}
