// Chassis - a modular backend kernel for Rust
//
// This library provides module composition with import/export visibility,
// constructor dependency injection with lifetime scopes, and an onion-model
// request pipeline of guards, pipes, and interceptors.

// Re-export the kernel
pub use chassis_core::*;

// Re-export logging configuration
pub use chassis_log;
