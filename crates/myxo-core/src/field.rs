//! 2D grid scalar field.
//! Each cell holds a value in [0, 1]; storage is row-major (`index = y * width + x`).

use serde::{Deserialize, Serialize};

/// The five fields owned by a simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    Pickup,
    Delivery,
    Repulsion,
    Vein,
    Obstacles,
}

impl FieldKind {
    pub const ALL: [FieldKind; 5] = [
        FieldKind::Pickup,
        FieldKind::Delivery,
        FieldKind::Repulsion,
        FieldKind::Vein,
        FieldKind::Obstacles,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FieldKind::Pickup => "pickup",
            FieldKind::Delivery => "delivery",
            FieldKind::Repulsion => "repulsion",
            FieldKind::Vein => "vein",
            FieldKind::Obstacles => "obstacles",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

#[derive(Clone, Debug)]
pub struct GridField {
    width: usize,
    height: usize,
    data: Vec<f32>,
    // Reused target buffer for the diffusion stencil.
    scratch: Vec<f32>,
}

impl GridField {
    pub const MIN_VALUE: f32 = 0.0;
    pub const MAX_VALUE: f32 = 1.0;
    /// Cells at or above this value count as occupied in an obstacle mask.
    pub const OCCUPIED: f32 = 0.5;

    pub fn new(size: usize) -> Self {
        assert!(size > 0, "field size must be positive");
        Self {
            width: size,
            height: size,
            data: vec![0.0; size * size],
            scratch: Vec::new(),
        }
    }

    /// Build a field from raw cell values, clamping each into [0, 1].
    pub fn from_values(size: usize, values: Vec<f32>) -> Self {
        assert_eq!(values.len(), size * size, "value count must equal size * size");
        let mut field = Self {
            width: size,
            height: size,
            data: values,
            scratch: Vec::new(),
        };
        for v in &mut field.data {
            *v = clamp_value(*v);
        }
        field
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }

    pub fn index(&self, cx: usize, cy: usize) -> usize {
        cy * self.width + cx
    }

    /// Value at an integer cell; `None` outside the grid.
    pub fn get_cell(&self, cx: isize, cy: isize) -> Option<f32> {
        if cx < 0 || cy < 0 || cx as usize >= self.width || cy as usize >= self.height {
            return None;
        }
        Some(self.data[cy as usize * self.width + cx as usize])
    }

    pub fn set_cell(&mut self, cx: usize, cy: usize, value: f32) {
        let idx = self.index(cx, cy);
        self.data[idx] = clamp_value(value);
    }

    /// Cell containing a continuous position, clamped into the grid.
    pub fn cell_of(&self, x: f64, y: f64) -> (usize, usize) {
        let clamp_axis = |v: f64, len: usize| -> usize {
            if !v.is_finite() || v <= 0.0 {
                0
            } else {
                (v.floor() as usize).min(len - 1)
            }
        };
        (clamp_axis(x, self.width), clamp_axis(y, self.height))
    }

    /// Sample the field at a continuous position. Positions outside the grid are
    /// clamped to the nearest edge cell; non-finite values read as zero.
    pub fn sample(&self, x: f64, y: f64) -> f32 {
        let (cx, cy) = self.cell_of(x, y);
        let v = self.data[cy * self.width + cx];
        if v.is_finite() {
            v
        } else {
            0.0
        }
    }

    pub fn is_occupied(&self, x: f64, y: f64) -> bool {
        self.sample(x, y) >= Self::OCCUPIED
    }

    /// Add `amount` to the cell nearest (x, y), saturating at the ceiling.
    pub fn deposit(&mut self, x: f64, y: f64, amount: f32) {
        let (cx, cy) = self.cell_of(x, y);
        let idx = cy * self.width + cx;
        self.data[idx] = clamp_value(self.data[idx] + amount);
    }

    pub fn total(&self) -> f64 {
        self.data.iter().map(|&v| v as f64).sum()
    }

    /// One explicit diffusion step followed by proportional decay.
    ///
    /// Each cell becomes `((1 - c) * v + c * mean4) * (1 - decay)` where `mean4`
    /// is the mean of the four orthogonal neighbours. Out-of-grid neighbours
    /// reflect the cell's own value, so with `decay == 0` total mass is conserved.
    /// The update is a convex combination, so it is stable and bounded for any
    /// `c` in [0, 1].
    pub fn diffuse_and_decay(&mut self, coefficient: f32, decay_rate: f32) {
        let c = clamp_value(coefficient);
        let keep = 1.0 - clamp_value(decay_rate);
        let (w, h) = (self.width, self.height);
        self.scratch.resize(self.data.len(), 0.0);

        let src = &self.data;
        for y in 0..h {
            let row = y * w;
            for x in 0..w {
                let i = row + x;
                let v = src[i];
                let left = if x > 0 { src[i - 1] } else { v };
                let right = if x + 1 < w { src[i + 1] } else { v };
                let up = if y > 0 { src[i - w] } else { v };
                let down = if y + 1 < h { src[i + w] } else { v };
                let mean = 0.25 * (left + right + up + down);
                let blended = ((1.0 - c) * v + c * mean) * keep;
                self.scratch[i] = if blended.is_finite() {
                    clamp_value(blended)
                } else {
                    0.0
                };
            }
        }
        std::mem::swap(&mut self.data, &mut self.scratch);
    }
}

fn clamp_value(v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(GridField::MIN_VALUE, GridField::MAX_VALUE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn impulse(size: usize) -> GridField {
        let mut field = GridField::new(size);
        field.set_cell(size / 2, size / 2, 1.0);
        field
    }

    #[test]
    fn pure_diffusion_conserves_mass() {
        let mut field = impulse(16);
        field.diffuse_and_decay(0.15, 0.0);
        assert!((field.total() - 1.0).abs() < 1e-5);
        // Mass spread to the neighbours.
        assert!(field.get_cell(7, 8).unwrap() > 0.0);
        assert!(field.get_cell(8, 8).unwrap() < 1.0);
    }

    #[test]
    fn reflecting_boundary_conserves_mass_at_corner() {
        let mut field = GridField::new(8);
        field.set_cell(0, 0, 1.0);
        for _ in 0..10 {
            field.diffuse_and_decay(0.25, 0.0);
        }
        assert!((field.total() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn decay_strictly_reduces_mass() {
        let mut field = impulse(16);
        let before = field.total();
        field.diffuse_and_decay(0.15, 0.05);
        let after = field.total();
        assert!(after < before);
        assert!((after - 0.95).abs() < 1e-5);
    }

    #[test]
    fn values_stay_in_unit_interval() {
        let mut field = GridField::from_values(4, vec![1.0; 16]);
        field.deposit(1.0, 1.0, 5.0);
        field.diffuse_and_decay(0.3, 0.0);
        assert!(field.data().iter().all(|&v| (0.0..=1.0).contains(&v)));
        field.deposit(2.0, 2.0, -5.0);
        assert!(field.data().iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn from_values_clamps_and_zeroes_nan() {
        let field = GridField::from_values(2, vec![-1.0, 2.0, f32::NAN, 0.5]);
        assert_eq!(field.data(), &[0.0, 1.0, 0.0, 0.5]);
    }

    #[test]
    fn sample_clamps_out_of_range_positions() {
        let mut field = GridField::new(4);
        field.set_cell(3, 3, 0.7);
        field.set_cell(0, 0, 0.2);
        assert!((field.sample(100.0, 100.0) - 0.7).abs() < f32::EPSILON);
        assert!((field.sample(-3.0, -0.5) - 0.2).abs() < f32::EPSILON);
        assert!((field.sample(f64::NAN, f64::NAN) - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn deposit_targets_nearest_cell() {
        let mut field = GridField::new(4);
        field.deposit(2.7, 1.2, 0.25);
        assert!((field.get_cell(2, 1).unwrap() - 0.25).abs() < f32::EPSILON);
        assert_eq!(field.get_cell(4, 1), None);
    }

    #[test]
    fn field_kind_names_round_trip() {
        for kind in FieldKind::ALL {
            assert_eq!(FieldKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(FieldKind::from_name("nope"), None);
    }
}
