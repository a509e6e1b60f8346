//! Fixed names and versions of the packaged library and its build inputs.

pub const APP_NAME: &str = "litepack";

/// Released TensorFlow version whose Lite runtime is packaged.
pub const LIBRARY_VERSION: &str = "1.14.0";

pub const PACKAGE_NAME: &str = "tensorflow-lite";

/// TensorFlow 1.14.0 requires Bazel 0.24.1.
pub const BAZEL_VERSION: &str = "0.24.1";

/// Canonical directory name of the extracted source tree.
pub const SOURCE_DIR: &str = "source_subfolder";

/// Directory produced by extracting the triSYCL master archive.
pub const SYCL_DIR: &str = "triSYCL-master";

/// Highest NDK API level that also allows GPU acceleration.
pub const NDK_API_LEVEL: &str = "18";

/// Generated bazelrc written by `configure.py`.
pub const CONFIGURE_BAZELRC: &str = ".tf_configure.bazelrc";

pub const PRIMARY_LIB: &str = "tensorflowlite";
pub const GPU_LIB: &str = "tensorflowlite_gpu_gl";

pub const PRIMARY_TARGET: &str = "//tensorflow/lite:libtensorflowlite.so";
pub const GPU_TARGET: &str = "//tensorflow/lite/delegates/gpu:libtensorflowlite_gpu_gl.so";
