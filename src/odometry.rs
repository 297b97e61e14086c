/// Provides the time source used to timestamp samples
pub mod clock;

/// Provides the locked per-channel sample queues
pub mod sample_buffer;

/// Provides the producer that samples the module position signals
pub mod sampler;
