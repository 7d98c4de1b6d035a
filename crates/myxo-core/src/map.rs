//! Random obstacle layouts and pickup/delivery demand fields.
//!
//! A layout is a perimeter wall plus rectangular blocks. Demand hotspots are
//! carved free of obstacles and each demand field decays exponentially with the
//! obstacle-aware walking distance to its nearest hotspot, so following the
//! gradient always leads around blocks rather than into them.

use crate::config::SimConfig;
use crate::field::GridField;
use rand::Rng;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};

/// Chamfer weights for 8-connected walking distance (orthogonal, diagonal).
const ORTHO_COST: u32 = 10;
const DIAG_COST: u32 = 14;
const UNREACHABLE: u32 = u32::MAX;

const MAX_LAYOUT_ATTEMPTS: usize = 16;
const MAX_SITE_PICKS: usize = 256;

#[derive(Clone, Debug)]
pub struct MapLayout {
    pub obstacles: GridField,
    pub pickup: GridField,
    pub delivery: GridField,
    pub pickup_sites: Vec<(usize, usize)>,
    pub delivery_sites: Vec<(usize, usize)>,
    /// Row-major indices of free cells connected to the hotspots.
    open_cells: Vec<u32>,
    reachable: Vec<bool>,
    /// True when every randomized attempt enclosed a hotspot and blocks were dropped.
    pub used_fallback: bool,
}

impl MapLayout {
    pub fn generate<R: Rng + ?Sized>(config: &SimConfig, rng: &mut R) -> Self {
        let size = config.grid_size;
        for attempt in 0..MAX_LAYOUT_ATTEMPTS {
            let with_blocks = attempt + 1 < MAX_LAYOUT_ATTEMPTS;
            if let Some(layout) = Self::try_generate(config, rng, with_blocks) {
                if !with_blocks {
                    tracing::warn!(size, "map generation fell back to a block-free layout");
                }
                return layout;
            }
            tracing::debug!(attempt, "rejected layout with enclosed hotspot");
        }
        unreachable!("block-free layouts always connect their hotspots")
    }

    fn try_generate<R: Rng + ?Sized>(
        config: &SimConfig,
        rng: &mut R,
        with_blocks: bool,
    ) -> Option<Self> {
        let size = config.grid_size;
        let mut occupied = vec![false; size * size];

        for i in 0..size {
            occupied[i] = true;
            occupied[(size - 1) * size + i] = true;
            occupied[i * size] = true;
            occupied[i * size + size - 1] = true;
        }
        if with_blocks {
            scatter_blocks(config, rng, &mut occupied);
        }

        let pickup_sites = place_sites(config, rng, &mut occupied, config.pickup_hotspots, &[]);
        let delivery_sites = place_sites(
            config,
            rng,
            &mut occupied,
            config.delivery_hotspots,
            &pickup_sites,
        );

        let pickup_dist = walking_distance(size, &occupied, &pickup_sites);
        if delivery_sites
            .iter()
            .any(|&(x, y)| pickup_dist[y * size + x] == UNREACHABLE)
        {
            return None;
        }
        let delivery_dist = walking_distance(size, &occupied, &delivery_sites);

        let reachable: Vec<bool> = pickup_dist.iter().map(|&d| d != UNREACHABLE).collect();
        let open_cells = reachable
            .iter()
            .enumerate()
            .filter_map(|(i, &r)| r.then_some(i as u32))
            .collect();

        Some(Self {
            obstacles: GridField::from_values(
                size,
                occupied.iter().map(|&o| if o { 1.0 } else { 0.0 }).collect(),
            ),
            pickup: demand_field(size, &pickup_dist, config.hotspot_falloff),
            delivery: demand_field(size, &delivery_dist, config.hotspot_falloff),
            pickup_sites,
            delivery_sites,
            open_cells,
            reachable,
            used_fallback: !with_blocks,
        })
    }

    pub fn size(&self) -> usize {
        self.obstacles.width()
    }

    /// Whether the cell is free and connected to the hotspots.
    pub fn is_open(&self, cx: usize, cy: usize) -> bool {
        let size = self.size();
        cx < size && cy < size && self.reachable[cy * size + cx]
    }

    pub fn open_cell_count(&self) -> usize {
        self.open_cells.len()
    }

    /// Uniformly random position inside an open cell, away from the cell edges.
    pub fn random_open_position<R: Rng + ?Sized>(&self, rng: &mut R) -> (f64, f64) {
        let size = self.size();
        let idx = self.open_cells[rng.random_range(0..self.open_cells.len())] as usize;
        let (cx, cy) = (idx % size, idx / size);
        (
            cx as f64 + rng.random_range(0.2..0.8),
            cy as f64 + rng.random_range(0.2..0.8),
        )
    }

    /// Nearest open cell to (cx, cy) by breadth-first search over the whole grid.
    pub fn nearest_open_cell(&self, cx: usize, cy: usize) -> (usize, usize) {
        let size = self.size();
        let (cx, cy) = (cx.min(size - 1), cy.min(size - 1));
        if self.is_open(cx, cy) {
            return (cx, cy);
        }
        let mut seen = vec![false; size * size];
        let mut queue = VecDeque::new();
        seen[cy * size + cx] = true;
        queue.push_back((cx, cy));
        while let Some((x, y)) = queue.pop_front() {
            for (nx, ny) in orthogonal_neighbours(size, x, y) {
                let i = ny * size + nx;
                if seen[i] {
                    continue;
                }
                if self.reachable[i] {
                    return (nx, ny);
                }
                seen[i] = true;
                queue.push_back((nx, ny));
            }
        }
        let first = self.open_cells[0] as usize;
        (first % size, first / size)
    }
}

fn scatter_blocks<R: Rng + ?Sized>(config: &SimConfig, rng: &mut R, occupied: &mut [bool]) {
    let size = config.grid_size;
    let margin = size / 6;
    let hi = size.saturating_sub(margin + config.block_size_max);
    if hi <= margin {
        return;
    }
    let count = rng.random_range(config.obstacle_blocks_min..config.obstacle_blocks_max);
    for _ in 0..count {
        let bx = rng.random_range(margin..hi);
        let by = rng.random_range(margin..hi);
        let bw = rng.random_range(config.block_size_min..config.block_size_max);
        let bh = rng.random_range(config.block_size_min..config.block_size_max);
        for y in by..(by + bh).min(size - 1) {
            for x in bx..(bx + bw).min(size - 1) {
                occupied[y * size + x] = true;
            }
        }
    }
}

/// Pick hotspot centres, preferring free cells far from `avoid`, and carve a
/// clearance disc around each one.
fn place_sites<R: Rng + ?Sized>(
    config: &SimConfig,
    rng: &mut R,
    occupied: &mut [bool],
    count: usize,
    avoid: &[(usize, usize)],
) -> Vec<(usize, usize)> {
    let size = config.grid_size;
    let clearance = config.hotspot_clearance.min(size / 4);
    let lo = clearance + 1;
    let hi = size - clearance - 1;
    let min_separation = (size / 3) as f64;

    let mut sites = Vec::with_capacity(count);
    for _ in 0..count {
        let mut best = (rng.random_range(lo..hi), rng.random_range(lo..hi));
        for _ in 0..MAX_SITE_PICKS {
            let candidate = (rng.random_range(lo..hi), rng.random_range(lo..hi));
            let free = !occupied[candidate.1 * size + candidate.0];
            let separated = avoid.iter().all(|&(ax, ay)| {
                let dx = candidate.0 as f64 - ax as f64;
                let dy = candidate.1 as f64 - ay as f64;
                (dx * dx + dy * dy).sqrt() >= min_separation
            });
            best = candidate;
            if free && separated {
                break;
            }
        }
        carve_disc(size, occupied, best, clearance);
        sites.push(best);
    }
    sites
}

fn carve_disc(size: usize, occupied: &mut [bool], (cx, cy): (usize, usize), radius: usize) {
    let r = radius as isize;
    for dy in -r..=r {
        for dx in -r..=r {
            if dx * dx + dy * dy > r * r {
                continue;
            }
            let x = cx as isize + dx;
            let y = cy as isize + dy;
            // Never open the perimeter wall.
            if x < 1 || y < 1 || x >= size as isize - 1 || y >= size as isize - 1 {
                continue;
            }
            occupied[y as usize * size + x as usize] = false;
        }
    }
}

fn orthogonal_neighbours(
    size: usize,
    x: usize,
    y: usize,
) -> impl Iterator<Item = (usize, usize)> {
    let (x, y) = (x as isize, y as isize);
    [(-1, 0), (1, 0), (0, -1), (0, 1)]
        .into_iter()
        .map(move |(dx, dy)| (x + dx, y + dy))
        .filter(move |&(nx, ny)| nx >= 0 && ny >= 0 && nx < size as isize && ny < size as isize)
        .map(|(nx, ny)| (nx as usize, ny as usize))
}

/// Multi-source Dijkstra over free cells with 8-connectivity. Diagonal steps
/// may not cut the corner of an obstacle.
fn walking_distance(size: usize, occupied: &[bool], sources: &[(usize, usize)]) -> Vec<u32> {
    let mut dist = vec![UNREACHABLE; size * size];
    let mut heap = BinaryHeap::new();
    for &(x, y) in sources {
        let i = y * size + x;
        if !occupied[i] {
            dist[i] = 0;
            heap.push(Reverse((0u32, i)));
        }
    }

    const STEPS: [(isize, isize, u32); 8] = [
        (-1, 0, ORTHO_COST),
        (1, 0, ORTHO_COST),
        (0, -1, ORTHO_COST),
        (0, 1, ORTHO_COST),
        (-1, -1, DIAG_COST),
        (1, -1, DIAG_COST),
        (-1, 1, DIAG_COST),
        (1, 1, DIAG_COST),
    ];

    while let Some(Reverse((d, i))) = heap.pop() {
        if d > dist[i] {
            continue;
        }
        let (x, y) = ((i % size) as isize, (i / size) as isize);
        for (dx, dy, cost) in STEPS {
            let (nx, ny) = (x + dx, y + dy);
            if nx < 0 || ny < 0 || nx >= size as isize || ny >= size as isize {
                continue;
            }
            let ni = ny as usize * size + nx as usize;
            if occupied[ni] {
                continue;
            }
            if dx != 0
                && dy != 0
                && (occupied[y as usize * size + nx as usize]
                    || occupied[ny as usize * size + x as usize])
            {
                continue;
            }
            let nd = d + cost;
            if nd < dist[ni] {
                dist[ni] = nd;
                heap.push(Reverse((nd, ni)));
            }
        }
    }
    dist
}

fn demand_field(size: usize, dist: &[u32], falloff: f32) -> GridField {
    let values = dist
        .iter()
        .map(|&d| {
            if d == UNREACHABLE {
                0.0
            } else {
                let cells = d as f32 / ORTHO_COST as f32;
                (-cells / falloff).exp()
            }
        })
        .collect();
    GridField::from_values(size, values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha12Rng;

    fn layout(seed: u64) -> MapLayout {
        let mut rng = ChaCha12Rng::seed_from_u64(seed);
        MapLayout::generate(&SimConfig::default(), &mut rng)
    }

    #[test]
    fn perimeter_is_walled() {
        let map = layout(1);
        let size = map.size();
        for i in 0..size {
            assert!(map.obstacles.get_cell(i as isize, 0).unwrap() >= GridField::OCCUPIED);
            assert!(
                map.obstacles
                    .get_cell(0, i as isize)
                    .unwrap()
                    >= GridField::OCCUPIED
            );
            assert!(
                map.obstacles
                    .get_cell(i as isize, size as isize - 1)
                    .unwrap()
                    >= GridField::OCCUPIED
            );
        }
    }

    #[test]
    fn obstacle_mask_is_binary() {
        let map = layout(2);
        assert!(map.obstacles.data().iter().all(|&v| v == 0.0 || v == 1.0));
    }

    #[test]
    fn hotspots_are_free_and_peak_demand() {
        for seed in 0..8 {
            let map = layout(seed);
            for &(x, y) in &map.pickup_sites {
                assert!(map.is_open(x, y));
                assert!((map.pickup.get_cell(x as isize, y as isize).unwrap() - 1.0).abs() < 1e-6);
            }
            for &(x, y) in &map.delivery_sites {
                assert!(map.is_open(x, y));
                assert!(
                    (map.delivery.get_cell(x as isize, y as isize).unwrap() - 1.0).abs() < 1e-6
                );
            }
        }
    }

    #[test]
    fn delivery_reachable_from_pickup() {
        for seed in 0..8 {
            let map = layout(seed);
            for &(x, y) in &map.delivery_sites {
                assert!(map.pickup.get_cell(x as isize, y as isize).unwrap() > 0.0);
            }
        }
    }

    #[test]
    fn demand_is_zero_on_obstacles() {
        let map = layout(3);
        for ((&o, &p), &d) in map
            .obstacles
            .data()
            .iter()
            .zip(map.pickup.data())
            .zip(map.delivery.data())
        {
            if o >= GridField::OCCUPIED {
                assert_eq!(p, 0.0);
                assert_eq!(d, 0.0);
            }
        }
    }

    #[test]
    fn random_positions_land_in_open_cells() {
        let map = layout(4);
        let mut rng = ChaCha12Rng::seed_from_u64(99);
        for _ in 0..500 {
            let (x, y) = map.random_open_position(&mut rng);
            assert!(map.is_open(x.floor() as usize, y.floor() as usize));
        }
    }

    #[test]
    fn nearest_open_cell_escapes_walls() {
        let map = layout(5);
        let (x, y) = map.nearest_open_cell(0, 0);
        assert!(map.is_open(x, y));
        assert!(x <= 3 && y <= 3);
    }

    #[test]
    fn walking_distance_goes_around_walls() {
        // 5x5 grid with a wall in column 2 except the bottom row.
        let size = 5;
        let mut occupied = vec![false; size * size];
        for y in 0..4 {
            occupied[y * size + 2] = true;
        }
        let dist = walking_distance(size, &occupied, &[(0, 0)]);
        assert_eq!(dist[2], UNREACHABLE);
        assert!(dist[4] > 4 * ORTHO_COST);
        assert_ne!(dist[4 * size + 4], UNREACHABLE);
    }
}
