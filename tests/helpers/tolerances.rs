//! Tolerance constants for audio testing.

/// Floating point rounding errors (for passthrough, exact copies).
pub const FLOAT_EPSILON: f32 = 1e-6;

/// 16-bit quantization step size.
/// Use when comparing against audio that went through a WAV file.
pub const INT16_EPSILON: f32 = 1.0 / 32768.0;

/// Relative error allowed on a measured pitch.
/// Zero-crossing counting over a few thousand cycles.
pub const PITCH_RATIO_TOLERANCE: f64 = 0.03;
