//! Quadkeys: base-4 paths naming square regions of a power-of-two world.
//!
//! Digit `0` is the north-west quadrant, `1` north-east, `2` south-west and
//! `3` south-east. The first digit picks a quadrant of the whole world, each
//! further digit a quadrant of the previous one. The empty key is the world.

use serde::{Deserialize, Serialize};

use crate::{Point, QuadkeyError, Region};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Quadkey(String);

impl Quadkey {
    /// The key of the whole world.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a key received from elsewhere, rejecting digits outside `0..=3`.
    pub fn parse(path: &str) -> Result<Self, QuadkeyError> {
        if let Some((position, digit)) = path
            .chars()
            .enumerate()
            .find(|(_, c)| !matches!(c, '0'..='3'))
        {
            return Err(QuadkeyError::InvalidDigit { digit, position });
        }
        Ok(Self(path.to_owned()))
    }

    /// Name `region` within a world of `world_size`.
    ///
    /// The region must be aligned to its own size; bits of the position below
    /// the region size are ignored.
    pub fn encode(region: &Region, world_size: Point) -> Self {
        let mut digits = Vec::new();
        let mut size = region.size.x;
        while size < world_size.x {
            let x = (region.position.x & size != 0) as u8;
            let y = (region.position.y & size != 0) as u8;
            digits.push(b'0' + (y << 1 | x));
            size *= 2;
        }
        digits.reverse();
        // Only ASCII digits were pushed.
        Self(digits.into_iter().map(char::from).collect())
    }

    /// The region this key names within a world of `world_size`.
    pub fn decode(&self, world_size: Point) -> Region {
        let mut region = Region::at_origin(world_size);
        for digit in self.0.bytes() {
            let quadrant = (digit - b'0') as i32;
            region.size /= 2;
            region.position.x += (quadrant & 1) * region.size.x;
            region.position.y += (quadrant >> 1) * region.size.y;
        }
        region
    }

    /// Number of subdivisions below the world.
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Quadkey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Quadkey {
    type Error = QuadkeyError;

    fn try_from(path: String) -> Result<Self, Self::Error> {
        Self::parse(&path)
    }
}

impl From<Quadkey> for String {
    fn from(key: Quadkey) -> Self {
        key.0
    }
}

impl std::str::FromStr for Quadkey {
    type Err = QuadkeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
