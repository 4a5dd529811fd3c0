pub mod interrupt;
pub mod progress;
pub mod validation;
