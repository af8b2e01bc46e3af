pub mod atomic_counter;
pub mod clock;
pub mod random;
