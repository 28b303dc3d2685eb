use super::pass::LayoutPass;
use super::types::{Point, Rect};

/// Positioning policy consulted by the layout pass.
///
/// Every method works on data the pass has already settled: the node's own
/// extent and the previous visible sibling's local bounds. A strategy never
/// reads geometry of nodes that come later in the pass.
pub trait LayoutStrategy {
    /// Anchor used by leaf kinds that declare no `origin`.
    fn default_origin(&self) -> Point;

    /// Position of a child stacked along the main axis, `spacing` after its
    /// previous sibling (or at the frame origin when it is the first one).
    fn stacked_position(&self, prev: Option<Rect>, extent: Rect, spacing: f32) -> Point;

    /// Position of a child placed side by side with its siblings along the
    /// cross axis, `spacing_pre` into the main axis.
    fn inline_position(&self, prev: Option<Rect>, extent: Rect, spacing_pre: f32, gap: f32)
    -> Point;

    /// Offset applied to an inline row so it is centred on the parent axis.
    fn children_offset(&self, row: Rect) -> Point;

    /// Grows `extent` by `amount` along the main axis.
    fn extend_main(&self, extent: Rect, amount: f32) -> Rect;

    fn input_point(&self, bounds: Rect) -> Point;

    fn output_point(&self, bounds: Rect) -> Point;

    fn update(&self, pass: &mut LayoutPass<'_>) {
        pass.run(self);
    }
}
