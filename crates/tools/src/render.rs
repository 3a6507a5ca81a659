use std::collections::BTreeSet;

use shardlife_common::{Point, Quadkey, Region};
use shardlife_kernel::World;
use shardlife_stream::WorldRange;

const OWNED: char = '•';
const FORMERLY_OWNED: char = '∙';
const NEIGHBOR: char = '◦';

/// Text map of a partition, one glyph per chunk.
///
/// Remembers every chunk it has seen owned, so successive renders across
/// membership changes show where ownership has been.
#[derive(Debug, Default)]
pub struct RangeRenderer {
    history: BTreeSet<Quadkey>,
}

impl RangeRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render `range` row by row. `•` owned, `∙` owned in an earlier render,
    /// `◦` neighbour, blank otherwise.
    pub fn render(&mut self, range: &WorldRange) -> String {
        let size = range.size();
        let chunk = range.chunk_size();
        let mut out = String::new();
        for y in (0..size.y).step_by(chunk.y as usize) {
            for x in (0..size.x).step_by(chunk.x as usize) {
                let key = Quadkey::encode(&Region::new(Point::new(x, y), chunk), size);
                out.push(self.glyph(range, key));
                out.push(' ');
            }
            out.push('\n');
        }
        out
    }

    fn glyph(&mut self, range: &WorldRange, key: Quadkey) -> char {
        if range.owns(&key) {
            self.history.insert(key);
            OWNED
        } else if self.history.contains(&key) {
            FORMERLY_OWNED
        } else if range.neighborhood().contains_key(&key) {
            NEIGHBOR
        } else {
            ' '
        }
    }

    /// Chunks seen owned so far.
    pub fn history(&self) -> &BTreeSet<Quadkey> {
        &self.history
    }
}

/// Text picture of the cells of `region`, `•` for live cells.
pub fn render_cells(world: &World, region: Region) -> String {
    let mut out = String::new();
    for y in 0..region.size.y {
        for x in 0..region.size.x {
            let alive = world.get(region.position + Point::new(x, y)) != 0;
            out.push_str(if alive { "• " } else { "  " });
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use shardlife_kernel::Void;

    use super::*;

    #[test]
    fn half_range_map() {
        let mut range = WorldRange::new(Point::splat(4), Point::splat(2)).unwrap();
        range.update_membership(0, 2, 1).unwrap();
        let mut renderer = RangeRenderer::new();
        assert_eq!(renderer.render(&range), "• ◦ \n• ◦ \n");
        assert_eq!(renderer.history().len(), 2);
    }

    #[test]
    fn history_marks_former_ownership() {
        let mut range = WorldRange::new(Point::splat(4), Point::splat(2)).unwrap();
        let mut renderer = RangeRenderer::new();
        range.update_membership(0, 2, 1).unwrap();
        renderer.render(&range);
        range.update_membership(1, 2, 1).unwrap();
        assert_eq!(renderer.render(&range), "∙ • \n∙ • \n");
    }

    #[test]
    fn cells_picture() {
        let mut world = World::new(Point::splat(4), Point::splat(2), Arc::new(Void)).unwrap();
        world.set(Point::new(1, 0), true);
        let text = render_cells(&world, Region::new(Point::ZERO, Point::new(2, 2)));
        assert_eq!(text, "  • \n    \n");
    }
}
