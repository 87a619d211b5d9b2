pub mod clock;
pub mod fs;
pub mod hash;
pub mod rng;
