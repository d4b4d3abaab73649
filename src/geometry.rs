//! Plain value types shared by the transform, renderer and backend layers

/// A point in any of the three coordinate spaces.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn approx_eq(self, other: Self, epsilon: f32) -> bool {
        (self.x - other.x).abs() <= epsilon && (self.y - other.y).abs() <= epsilon
    }
}

/// A width/height pair.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    #[must_use]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    #[must_use]
    pub fn scale(self, factor: f32) -> Self {
        Self::new(self.width * factor, self.height * factor)
    }

    /// Swap the axes, as a quarter-turn rotation does.
    #[must_use]
    pub fn transposed(self) -> Self {
        Self::new(self.height, self.width)
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Axis-aligned rectangle stored as two corners (x0,y0) top-left, (x1,y1) bottom-right.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect {
    #[must_use]
    pub const fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    #[must_use]
    pub fn from_origin_size(origin: Point, size: Size) -> Self {
        Self::new(
            origin.x,
            origin.y,
            origin.x + size.width,
            origin.y + size.height,
        )
    }

    #[must_use]
    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    #[must_use]
    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    #[must_use]
    pub fn size(&self) -> Size {
        Size::new(self.width(), self.height())
    }

    #[must_use]
    pub fn origin(&self) -> Point {
        Point::new(self.x0, self.y0)
    }

    #[must_use]
    pub fn center(&self) -> Point {
        Point::new((self.x0 + self.x1) / 2.0, (self.y0 + self.y1) / 2.0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }

    /// Grow every side by `margin`.
    #[must_use]
    pub fn expand(&self, margin: f32) -> Self {
        Self::new(
            self.x0 - margin,
            self.y0 - margin,
            self.x1 + margin,
            self.y1 + margin,
        )
    }

    /// Clamp both corners into `[0, bounds.width] x [0, bounds.height]`.
    #[must_use]
    pub fn clamp_to(&self, bounds: Size) -> Self {
        let clamp_x = |v: f32| v.clamp(0.0, bounds.width.max(0.0));
        let clamp_y = |v: f32| v.clamp(0.0, bounds.height.max(0.0));
        Self::new(
            clamp_x(self.x0),
            clamp_y(self.y0),
            clamp_x(self.x1),
            clamp_y(self.y1),
        )
    }

    /// True when the rectangle lies entirely inside `[0, w] x [0, h]`.
    #[must_use]
    pub fn within(&self, bounds: Size) -> bool {
        self.x0 >= 0.0
            && self.y0 >= 0.0
            && self.x1 <= bounds.width
            && self.y1 <= bounds.height
            && self.x0 <= self.x1
            && self.y0 <= self.y1
    }

    #[must_use]
    pub fn scale(&self, factor: f32) -> Self {
        Self::new(
            self.x0 * factor,
            self.y0 * factor,
            self.x1 * factor,
            self.y1 * factor,
        )
    }
}
