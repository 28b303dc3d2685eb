use super::strategy::LayoutStrategy;
use super::types::{Point, Rect};

pub const VERTICAL: &str = "vertical";
pub const HORIZONTAL: &str = "horizontal";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    TopDown,
    LeftRight,
}

impl Direction {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            VERTICAL | "TD" | "TB" => Some(Self::TopDown),
            HORIZONTAL | "LR" => Some(Self::LeftRight),
            _ => None,
        }
    }
}

/// Flow layout along one fixed main axis.
#[derive(Debug, Clone, Copy)]
pub struct FixedLayout {
    pub direction: Direction,
}

impl FixedLayout {
    pub fn new(direction: Direction) -> Self {
        Self { direction }
    }

    pub fn vertical() -> Self {
        Self::new(Direction::TopDown)
    }

    pub fn horizontal() -> Self {
        Self::new(Direction::LeftRight)
    }

    fn main_span(&self, rect: Rect) -> (f32, f32) {
        match self.direction {
            Direction::TopDown => (rect.y, rect.bottom()),
            Direction::LeftRight => (rect.x, rect.right()),
        }
    }

    fn cross_span(&self, rect: Rect) -> (f32, f32) {
        match self.direction {
            Direction::TopDown => (rect.x, rect.right()),
            Direction::LeftRight => (rect.y, rect.bottom()),
        }
    }

    fn point(&self, main: f32, cross: f32) -> Point {
        match self.direction {
            Direction::TopDown => Point::new(cross, main),
            Direction::LeftRight => Point::new(main, cross),
        }
    }
}

impl LayoutStrategy for FixedLayout {
    fn default_origin(&self) -> Point {
        match self.direction {
            Direction::TopDown => Point::new(0.5, 0.0),
            Direction::LeftRight => Point::new(0.0, 0.5),
        }
    }

    fn stacked_position(&self, prev: Option<Rect>, extent: Rect, spacing: f32) -> Point {
        let start = prev
            .map(|prev| self.main_span(prev).1 + spacing)
            .unwrap_or(0.0);
        self.point(start - self.main_span(extent).0, 0.0)
    }

    fn inline_position(
        &self,
        prev: Option<Rect>,
        extent: Rect,
        spacing_pre: f32,
        gap: f32,
    ) -> Point {
        let cross = prev
            .map(|prev| self.cross_span(prev).1 + gap)
            .unwrap_or(0.0);
        self.point(
            spacing_pre - self.main_span(extent).0,
            cross - self.cross_span(extent).0,
        )
    }

    fn children_offset(&self, row: Rect) -> Point {
        let (start, end) = self.cross_span(row);
        self.point(0.0, -(start + end) / 2.0)
    }

    fn extend_main(&self, extent: Rect, amount: f32) -> Rect {
        match self.direction {
            Direction::TopDown => Rect::new(extent.x, extent.y, extent.width, extent.height + amount),
            Direction::LeftRight => {
                Rect::new(extent.x, extent.y, extent.width + amount, extent.height)
            }
        }
    }

    fn input_point(&self, bounds: Rect) -> Point {
        let center = bounds.center();
        match self.direction {
            Direction::TopDown => Point::new(center.x, bounds.y),
            Direction::LeftRight => Point::new(bounds.x, center.y),
        }
    }

    fn output_point(&self, bounds: Rect) -> Point {
        let center = bounds.center();
        match self.direction {
            Direction::TopDown => Point::new(center.x, bounds.bottom()),
            Direction::LeftRight => Point::new(bounds.right(), center.y),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stacks_along_the_main_axis() {
        let layout = FixedLayout::vertical();
        let extent = Rect::new(-140.0, 0.0, 280.0, 60.0);
        assert_eq!(layout.stacked_position(None, extent, 32.0), Point::new(0.0, 0.0));
        let prev = Rect::new(-140.0, 0.0, 280.0, 60.0);
        assert_eq!(layout.stacked_position(Some(prev), extent, 32.0), Point::new(0.0, 92.0));

        let layout = FixedLayout::horizontal();
        let extent = Rect::new(0.0, -30.0, 280.0, 60.0);
        assert_eq!(
            layout.stacked_position(Some(extent), extent, 32.0),
            Point::new(312.0, 0.0)
        );
    }

    #[test]
    fn inline_rows_advance_across_and_centre() {
        let layout = FixedLayout::vertical();
        let extent = Rect::new(-20.0, 0.0, 40.0, 0.0);
        let first = layout.inline_position(None, extent, 40.0, 20.0);
        assert_eq!(first, Point::new(20.0, 40.0));
        let prev = extent.translate(first);
        assert_eq!(
            layout.inline_position(Some(prev), extent, 40.0, 20.0),
            Point::new(80.0, 40.0)
        );
        let row = Rect::new(0.0, 40.0, 100.0, 0.0);
        assert_eq!(layout.children_offset(row), Point::new(-50.0, 0.0));
    }

    #[test]
    fn anchors_sit_on_leading_and_trailing_edges() {
        let bounds = Rect::new(-140.0, 0.0, 280.0, 60.0);
        let layout = FixedLayout::vertical();
        assert_eq!(layout.input_point(bounds), Point::new(0.0, 0.0));
        assert_eq!(layout.output_point(bounds), Point::new(0.0, 60.0));
        let layout = FixedLayout::horizontal();
        let bounds = Rect::new(0.0, -30.0, 280.0, 60.0);
        assert_eq!(layout.input_point(bounds), Point::new(0.0, 0.0));
        assert_eq!(layout.output_point(bounds), Point::new(280.0, 0.0));
        assert_eq!(Direction::from_token("LR"), Some(Direction::LeftRight));
        assert_eq!(Direction::from_token("diagonal"), None);
    }
}
