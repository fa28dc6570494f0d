//! Screen-space value types shared by the driver, capture, and engine seams.

use serde::{Deserialize, Serialize};

/// A point in page coordinates (pixels). Coordinates can be negative when
/// the page is scrolled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    /// X coordinate
    pub x: i32,
    /// Y coordinate
    pub y: i32,
}

impl Point {
    /// Create a new point
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A width/height pair in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RectSize {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl RectSize {
    /// Create a new size
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// A rectangle in screenshot coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// Distance from the top edge
    pub top: i32,
    /// Distance from the left edge
    pub left: i32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Region {
    /// Create a new region
    pub const fn new(top: i32, left: i32, width: u32, height: u32) -> Self {
        Self {
            top,
            left,
            width,
            height,
        }
    }

    /// Build the region occupied by an element from its location and size
    pub const fn from_location_and_size(location: Point, size: RectSize) -> Self {
        Self {
            top: location.y,
            left: location.x,
            width: size.width,
            height: size.height,
        }
    }

    /// Size of this region
    pub const fn size(&self) -> RectSize {
        RectSize::new(self.width, self.height)
    }
}
