pub mod complex;
pub mod double_double;
pub mod error;
pub mod fractal;
pub mod mandelbrot;
pub mod viewport;

// Re-export primary types for convenience.
pub use complex::Complex;
pub use double_double::DoubleDouble;
pub use error::CoreError;
pub use fractal::{evaluate, Fractal};
pub use mandelbrot::Mandelbrot;
pub use viewport::{Frame, Viewport};

/// Convenience result type for the core crate.
pub type Result<T> = std::result::Result<T, CoreError>;
