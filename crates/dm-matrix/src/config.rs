use std::fmt;
use std::str::FromStr;

use crate::backend::MultiplyStrategy;
use crate::cpu::{Naive, Tiled};
use crate::error::{MatrixError, Result};
use crate::gemm::Fast;

/// Tile edge used when a tiled strategy is requested without a size.
///
/// Three 32x32 `f64` tiles take 24 KiB, under a 32 KiB L1 data cache.
pub const DEFAULT_TILE_SIZE: usize = 32;

/// Which multiplication strategy to run.
///
/// Parsed from the strings `naive`, `tile`, `tile:<size>` and `fast`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    Naive,
    Tiled { tile_size: usize },
    Fast,
}

impl StrategyKind {
    /// Instantiate the strategy.
    pub fn build(&self) -> Box<dyn MultiplyStrategy> {
        match *self {
            StrategyKind::Naive => Box::new(Naive::new()),
            StrategyKind::Tiled { tile_size } => Box::new(Tiled::new(tile_size)),
            StrategyKind::Fast => Box::new(Fast::new()),
        }
    }

    /// All strategies, with the default tile size.
    pub fn all() -> [StrategyKind; 3] {
        [
            StrategyKind::Naive,
            StrategyKind::Tiled {
                tile_size: DEFAULT_TILE_SIZE,
            },
            StrategyKind::Fast,
        ]
    }
}

impl FromStr for StrategyKind {
    type Err = MatrixError;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim().to_ascii_lowercase();
        match name.as_str() {
            "naive" => Ok(StrategyKind::Naive),
            "tile" | "tiled" => Ok(StrategyKind::Tiled {
                tile_size: DEFAULT_TILE_SIZE,
            }),
            "fast" | "gemm" => Ok(StrategyKind::Fast),
            other => other
                .strip_prefix("tile:")
                .or_else(|| other.strip_prefix("tiled:"))
                .and_then(|n| n.parse::<usize>().ok())
                .map(|tile_size| StrategyKind::Tiled { tile_size })
                .ok_or_else(|| MatrixError::UnknownStrategy(s.trim().to_string())),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::Naive => write!(f, "naive"),
            StrategyKind::Tiled { tile_size } => write!(f, "tile:{}", tile_size),
            StrategyKind::Fast => write!(f, "fast"),
        }
    }
}
