//! Annotation layout around each staff
//!
//! [`RectTable`] does the collision-free stacking, [`align`] squeezes
//! aligned sets, and [`marks`] measures every annotation and drives both in
//! the configured [`StackOrder`].

pub mod align;
pub mod marks;
pub mod order;
pub mod rectab;

pub use align::{squeeze, AlignedItem, Squeeze};
pub use marks::{place_staff, StaffExtents};
pub use order::StackOrder;
pub use rectab::{Rect, RectTable, Span};
