//! Cell sources for coordinates no chunk covers, and for seeding fresh chunks.

use shardlife_common::Point;

/// Something that can say whether a cell is alive without storing it.
pub trait Backdrop: std::fmt::Debug + Send + Sync {
    /// `1` for a live cell, `0` for a dead one.
    fn sample(&self, point: Point) -> u8;
}

/// Everything is dead.
#[derive(Debug, Clone, Copy, Default)]
pub struct Void;

impl Backdrop for Void {
    fn sample(&self, _point: Point) -> u8 {
        0
    }
}

/// A deterministic random field: the same seed gives the same cells on
/// every node.
#[derive(Debug, Clone, Copy)]
pub struct Soup {
    seed: u64,
    threshold: u64,
}

impl Soup {
    /// `density` is the fraction of live cells, clamped to `0.0..=1.0`.
    pub fn new(seed: u64, density: f64) -> Self {
        Self {
            seed,
            threshold: (density.clamp(0.0, 1.0) * u64::MAX as f64) as u64,
        }
    }
}

impl Backdrop for Soup {
    fn sample(&self, point: Point) -> u8 {
        let cell = (point.x as u32 as u64) << 32 | point.y as u32 as u64;
        u8::from(splitmix64(self.seed ^ splitmix64(cell)) < self.threshold)
    }
}

/// Splitmix64 finaliser, used as a stateless hash of a cell coordinate.
fn splitmix64(mut state: u64) -> u64 {
    state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn void_is_dead() {
        assert_eq!(Void.sample(Point::new(-3, 7)), 0);
    }

    #[test]
    fn soup_is_deterministic() {
        let a = Soup::new(42, 0.3);
        let b = Soup::new(42, 0.3);
        for y in -8..8 {
            for x in -8..8 {
                assert_eq!(a.sample(Point::new(x, y)), b.sample(Point::new(x, y)));
            }
        }
    }

    #[test]
    fn soup_density_is_roughly_right() {
        let soup = Soup::new(7, 0.25);
        let live: u32 = (0..64)
            .flat_map(|y| (0..64).map(move |x| Point::new(x, y)))
            .map(|p| u32::from(soup.sample(p)))
            .sum();
        let fraction = live as f64 / 4096.0;
        assert!((0.2..0.3).contains(&fraction), "fraction {fraction}");
        assert_eq!(Soup::new(7, 0.0).sample(Point::ZERO), 0);
    }
}
