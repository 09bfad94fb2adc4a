pub mod validation;

pub use validation::validation_middleware;
