//! Error types and error handling for the code generator.
//!
//! This module defines the single error surface used throughout the
//! lowering pass. It includes:
//!
//! - The public `CodegenError` wrapper whose message carries the fixed
//!   `Codegen error: ` prefix
//! - Specific error variants for every semantic violation the lowering
//!   pass can detect
//! - Conversion from LLVM builder failures

pub mod errors;
