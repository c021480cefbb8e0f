//! Async synchronization primitives
//!
//! Command execution is serialized through a single fair lock so that
//! concurrent requests never touch the same working directory at once.

pub mod mutex;


pub use mutex::{FifoMutex, FifoMutexGuard, LockError, LockTicket};
