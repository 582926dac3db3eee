use crate::world::position::Position;

pub const DEFAULT_CELL_SIZE: f64 = 300.0;

/// Added to every axis before packing so negative cell indices stay positive.
pub const CELL_BIAS: i64 = 1 << 20;
const AXIS_BITS: u32 = 21;
const AXIS_MASK: u64 = (1 << AXIS_BITS) - 1;

/// Cell indices outside `[-CELL_BIAS, CELL_BIAS)` alias other cells once packed.
pub const MIN_CELL_INDEX: i32 = -(CELL_BIAS as i32);
pub const MAX_CELL_INDEX: i32 = (CELL_BIAS as i32) - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey(pub u64);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialGrid {
    cell_size: f64,
}

impl SpatialGrid {
    pub fn new(cell_size: f64) -> Self {
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 {
            cell_size
        } else {
            DEFAULT_CELL_SIZE
        };
        Self { cell_size }
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn cell_of(&self, position: Position) -> CellCoord {
        CellCoord {
            x: axis_index(position.x, self.cell_size),
            y: axis_index(position.y, self.cell_size),
            z: axis_index(position.z, self.cell_size),
        }
    }

    pub fn key_of(&self, position: Position) -> CellKey {
        pack_cell(self.cell_of(position))
    }
}

impl Default for SpatialGrid {
    fn default() -> Self {
        Self::new(DEFAULT_CELL_SIZE)
    }
}

fn axis_index(value: f64, cell_size: f64) -> i32 {
    (value / cell_size).floor() as i32
}

pub fn pack_cell(cell: CellCoord) -> CellKey {
    let ux = biased(cell.x);
    let uy = biased(cell.y);
    let uz = biased(cell.z);
    CellKey((ux << (2 * AXIS_BITS)) | (uy << AXIS_BITS) | uz)
}

fn biased(index: i32) -> u64 {
    ((i64::from(index) + CELL_BIAS) as u64) & AXIS_MASK
}

impl CellCoord {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn key(self) -> CellKey {
        pack_cell(self)
    }

    /// The 3x3x3 block of cells centred on `self`, including `self`.
    pub fn neighborhood(self) -> impl Iterator<Item = CellCoord> {
        (-1..=1).flat_map(move |dx| {
            (-1..=1).flat_map(move |dy| {
                (-1..=1).map(move |dz| CellCoord {
                    x: self.x.saturating_add(dx),
                    y: self.y.saturating_add(dy),
                    z: self.z.saturating_add(dz),
                })
            })
        })
    }
}
