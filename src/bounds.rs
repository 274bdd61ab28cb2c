//! Affine transforms that move existing pixel-space geometry onto new bounds.
//!
//! When the render rectangle or the axis value range changes, already computed
//! vertices can be rescaled with a single `(multiply, add)` pair instead of
//! being regenerated from sample values.

use serde::{Deserialize, Serialize};

/// `x' = x * multiply + add`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AffineTransform {
    pub multiply: f32,
    pub add: f32,
}

impl AffineTransform {
    pub const IDENTITY: Self = Self { multiply: 1.0, add: 0.0 };

    pub fn new(multiply: f32, add: f32) -> Self {
        Self { multiply, add }
    }

    /// Bit-exact identity check; a transform that is only numerically close to
    /// the identity still counts as a change.
    pub fn is_identity(&self) -> bool {
        self.multiply.to_bits() == 1.0f32.to_bits() && self.add.to_bits() == 0.0f32.to_bits()
    }

    pub fn is_finite(&self) -> bool {
        self.multiply.is_finite() && self.add.is_finite()
    }

    #[inline]
    pub fn apply(&self, value: f32) -> f32 {
        value * self.multiply + self.add
    }
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Render-space rectangle the graph is drawn into.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderBounds {
    pub x_min: f32,
    pub x_max: f32,
    pub y_min: f32,
    pub y_max: f32,
}

impl RenderBounds {
    pub fn new(x_min: f32, x_max: f32, y_min: f32, y_max: f32) -> Self {
        Self { x_min, x_max, y_min, y_max }
    }

    /// Rectangle anchored at the origin.
    pub fn from_size(width: f32, height: f32) -> Self {
        Self::new(0.0, width, 0.0, height)
    }

    pub fn width(&self) -> f32 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f32 {
        self.y_max - self.y_min
    }

    pub fn same_horizontal(&self, other: &RenderBounds) -> bool {
        self.x_min == other.x_min && self.x_max == other.x_max
    }
}

/// Value range mapped onto the vertical extent of the render rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AxisBounds {
    pub min: f32,
    pub max: f32,
}

impl AxisBounds {
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn range(&self) -> f32 {
        self.max - self.min
    }
}

impl Default for AxisBounds {
    fn default() -> Self {
        Self::new(0.0, 1.0)
    }
}

/// Derives rescale transforms between consecutive bounds.
#[derive(Clone, Debug)]
pub struct BoundsTransformer {
    render: RenderBounds,
    axis: AxisBounds,
}

impl BoundsTransformer {
    pub fn new(render: RenderBounds, axis: AxisBounds) -> Self {
        Self { render, axis }
    }

    pub fn render_bounds(&self) -> RenderBounds {
        self.render
    }

    pub fn axis_bounds(&self) -> AxisBounds {
        self.axis
    }

    /// Transforms mapping geometry computed for the previous bounds onto the new
    /// ones, as `(x, y)`.
    ///
    /// Both are exactly [`AffineTransform::IDENTITY`] when no bound changed, and
    /// state is only updated when something did. The horizontal transform is
    /// always the identity: scrolling by `points_to_advance` is applied by the
    /// renderers' shift, and horizontal bound changes make them rebuild.
    pub fn compute_transforms_for_new_bounds(
        &mut self,
        render: RenderBounds,
        axis: AxisBounds,
        points_to_advance: usize,
    ) -> (AffineTransform, AffineTransform) {
        if render == self.render && axis == self.axis {
            return (AffineTransform::IDENTITY, AffineTransform::IDENTITY);
        }

        let y = if render.y_min == self.render.y_min
            && render.y_max == self.render.y_max
            && axis == self.axis
        {
            AffineTransform::IDENTITY
        } else {
            Self::vertical_transform(&self.render, &self.axis, &render, &axis)
        };
        log::trace!(
            "Bounds changed ({} points advanced): {:?}/{:?} -> {:?}/{:?}, y = {:?}",
            points_to_advance,
            self.render,
            self.axis,
            render,
            axis,
            y
        );

        self.render = render;
        self.axis = axis;
        (AffineTransform::IDENTITY, y)
    }

    /// Compose old pixel -> old value -> new value -> new pixel.
    fn vertical_transform(
        old_render: &RenderBounds,
        old_axis: &AxisBounds,
        new_render: &RenderBounds,
        new_axis: &AxisBounds,
    ) -> AffineTransform {
        // Work in f64 so a round trip through both scales stays accurate.
        let old_values_per_pixel = old_axis.range() as f64 / old_render.height() as f64;
        let new_pixels_per_value = new_render.height() as f64 / new_axis.range() as f64;

        let multiply = old_values_per_pixel * new_pixels_per_value;
        let value_at_zero_pixel = old_axis.min as f64 - old_render.y_min as f64 * old_values_per_pixel;
        let add = new_render.y_min as f64 + (value_at_zero_pixel - new_axis.min as f64) * new_pixels_per_value;

        AffineTransform::new(multiply as f32, add as f32)
    }
}
