//! Stipple Core
//!
//! Renderer-independent value types shared by the Stipple backends:
//!
//! - **Colors**: straight-alpha RGBA with premultiplication
//! - **Transforms**: 2x3 affine matrices in the nanovg element order
//! - **Paints**: solid, linear/radial/box gradients and image patterns
//! - **Scissors**: transformed clip rectangles, with a "no scissor" sentinel
//! - **Compositing**: blend factors and Porter-Duff presets
//! - **Geometry**: interleaved vertices and per-path fill/stroke slices
//!
//! # Example
//!
//! ```rust
//! use stipple_core::{Color, Paint, Scissor};
//!
//! let paint = Paint::linear_gradient(0.0, 0.0, 0.0, 100.0, Color::WHITE, Color::BLACK);
//! assert_eq!(paint.feather, 100.0);
//! assert!(Scissor::NONE.is_disabled());
//! ```

pub mod color;
pub mod composite;
pub mod geometry;
pub mod image;
pub mod paint;
pub mod scissor;
pub mod transform;

pub use color::Color;
pub use composite::{BlendFactor, CompositeOperation, CompositeOperationState};
pub use geometry::{bounds_quad, Bounds, Path, Vertex};
pub use image::{ImageFlags, ImageId, TextureKind};
pub use paint::Paint;
pub use scissor::Scissor;
pub use transform::Transform;
