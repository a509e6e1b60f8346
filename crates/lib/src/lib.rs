//! litepack-lib: recipe logic for packaging TensorFlow Lite
//!
//! The crate is split along the recipe's lifecycle:
//! - `provision`: fetch the Bazel installer, triSYCL and the source tree once
//! - `options`: derive `configure.py` environment and Bazel flags from a `Platform`
//! - `build`: patch, configure, repair and build through an injectable `ToolRunner`
//! - `package`: copy libraries and headers into a `lib/` + `include/` layout
//! - `recipe`: the `source`/`build`/`package`/`package_info` hooks tying it together

pub mod build;
pub mod config;
pub mod consts;
pub mod diagnostic;
pub mod options;
pub mod package;
pub mod patch;
pub mod platform;
pub mod provision;
pub mod recipe;
pub mod repair;
pub mod tool;
pub mod toolchain;
pub mod util;
