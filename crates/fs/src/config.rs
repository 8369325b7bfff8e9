/// Paths per batch sent from walker threads to the consumer.
pub const BATCH_SIZE: usize = 64;
