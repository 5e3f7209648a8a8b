pub mod semaphore;

pub use semaphore::BinarySemaphore;
