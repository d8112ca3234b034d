//! Hydrologic model grid extents and their split across processes.

use serde::{Deserialize, Serialize};

use crate::error::{ForcingError, Result};
use crate::product::NUM_FORCING_VARIABLES;

/// Position of this process in the domain decomposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainDecomposition {
    pub rank: usize,
    pub size: usize,
}

impl DomainDecomposition {
    /// A single process owning the whole grid.
    pub fn serial() -> Self {
        Self { rank: 0, size: 1 }
    }

    pub fn is_root(&self) -> bool {
        self.rank == 0
    }
}

impl Default for DomainDecomposition {
    fn default() -> Self {
        Self::serial()
    }
}

/// Global and local extents of the model grid.
///
/// Bounds are half-open index ranges into the global grid. They are fixed
/// when the metadata is built and every forcing buffer is sized from them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridMetadata {
    pub nx_global: usize,
    pub ny_global: usize,
    pub nx_local: usize,
    pub ny_local: usize,
    pub x_lower_bound: usize,
    pub x_upper_bound: usize,
    pub y_lower_bound: usize,
    pub y_upper_bound: usize,
}

impl GridMetadata {
    /// Metadata for a process that owns the full grid.
    pub fn serial(nx_global: usize, ny_global: usize) -> Self {
        Self {
            nx_global,
            ny_global,
            nx_local: nx_global,
            ny_local: ny_global,
            x_lower_bound: 0,
            x_upper_bound: nx_global,
            y_lower_bound: 0,
            y_upper_bound: ny_global,
        }
    }

    /// Split the global grid into contiguous row slabs and return the slab
    /// owned by `decomposition.rank`.
    ///
    /// Leftover rows go to the lowest ranks, so slab heights differ by at
    /// most one.
    pub fn decompose(
        nx_global: usize,
        ny_global: usize,
        decomposition: DomainDecomposition,
    ) -> Result<Self> {
        let DomainDecomposition { rank, size } = decomposition;

        if nx_global == 0 || ny_global == 0 {
            return Err(ForcingError::invalid_config(format!(
                "grid must be non-empty, got {}x{}",
                nx_global, ny_global
            )));
        }
        if size == 0 || rank >= size {
            return Err(ForcingError::invalid_config(format!(
                "rank {} is not valid for {} processes",
                rank, size
            )));
        }
        if size > ny_global {
            return Err(ForcingError::invalid_config(format!(
                "cannot split {} rows across {} processes",
                ny_global, size
            )));
        }

        let base = ny_global / size;
        let remainder = ny_global % size;
        let rows = base + usize::from(rank < remainder);
        let y_lower = rank * base + rank.min(remainder);

        Ok(Self {
            nx_global,
            ny_global,
            nx_local: nx_global,
            ny_local: rows,
            x_lower_bound: 0,
            x_upper_bound: nx_global,
            y_lower_bound: y_lower,
            y_upper_bound: y_lower + rows,
        })
    }

    /// Local `(ny, nx)`.
    pub fn local_shape(&self) -> (usize, usize) {
        (self.ny_local, self.nx_local)
    }

    /// Shape of every forcing buffer: `[8, ny_local, nx_local]`.
    pub fn forcing_shape(&self) -> [usize; 3] {
        [NUM_FORCING_VARIABLES, self.ny_local, self.nx_local]
    }
}
