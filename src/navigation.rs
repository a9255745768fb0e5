//! Grid navigation: flood-filled distance maps, downhill path walking and
//! line-of-sight ray casting.

use std::collections::VecDeque;

use dungeon::{Grid, TileMap};

use crate::ecs::Position;
use crate::spatial::SpatialIndex;

/// Distance value of tiles no source can reach.
pub const UNREACHABLE: u32 = u32::MAX;

/// Combined blocking test: walls from the tile map, bodies from the index.
#[derive(Clone, Copy)]
pub struct BlockingView<'a> {
    pub map: &'a TileMap,
    pub spatial: &'a SpatialIndex,
}

impl<'a> BlockingView<'a> {
    pub fn new(map: &'a TileMap, spatial: &'a SpatialIndex) -> Self {
        Self { map, spatial }
    }

    /// Wall or blocking entity. Everything off the map is blocked.
    pub fn is_blocked(&self, pos: Position) -> bool {
        self.map.is_wall(pos) || self.spatial.is_occupied(pos)
    }

    pub fn blocks_sight(&self, pos: Position) -> bool {
        self.map.blocks_sight(pos)
    }
}

/// Breadth-first distance field over the level grid.
///
/// Each reachable tile holds its step count to the nearest source; the
/// sources hold 0 and everything else holds [`UNREACHABLE`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistanceMap {
    distances: Grid<u32>,
}

impl DistanceMap {
    /// Floods the whole `width` x `height` grid from `sources`.
    ///
    /// Neighbours expand in North, East, South, West order and the first
    /// visit to a tile fixes its distance. Sources are seeded even when
    /// `blocked` says otherwise, so an entity's own tile can be a source.
    /// Off-grid sources are ignored.
    pub fn compute(
        width: i32,
        height: i32,
        sources: &[Position],
        blocked: impl Fn(Position) -> bool,
    ) -> Self {
        Self::flood(width, height, sources, blocked, |_| true)
    }

    /// Like [`compute`](Self::compute) but only tiles within `radius`
    /// (Chebyshev) of `center` are expanded into.
    pub fn compute_bounded(
        width: i32,
        height: i32,
        sources: &[Position],
        blocked: impl Fn(Position) -> bool,
        center: Position,
        radius: u32,
    ) -> Self {
        Self::flood(width, height, sources, blocked, |p| {
            p.chebyshev(center) <= radius
        })
    }

    fn flood(
        width: i32,
        height: i32,
        sources: &[Position],
        blocked: impl Fn(Position) -> bool,
        in_region: impl Fn(Position) -> bool,
    ) -> Self {
        let mut distances = Grid::new(width, height, UNREACHABLE);
        let mut frontier = VecDeque::new();

        for &source in sources {
            if distances.get(source) == Some(&UNREACHABLE) {
                distances.set(source, 0);
                frontier.push_back(source);
            }
        }

        while let Some(current) = frontier.pop_front() {
            let next = distances
                .get(current)
                .map_or(UNREACHABLE, |d| d.saturating_add(1));
            for neighbor in current.neighbors() {
                if distances.get(neighbor) != Some(&UNREACHABLE)
                    || !in_region(neighbor)
                    || blocked(neighbor)
                {
                    continue;
                }
                distances.set(neighbor, next);
                frontier.push_back(neighbor);
            }
        }

        Self { distances }
    }

    pub fn width(&self) -> i32 {
        self.distances.width()
    }

    pub fn height(&self) -> i32 {
        self.distances.height()
    }

    /// Raw value at `pos`; `None` off the grid, [`UNREACHABLE`] if no source
    /// reaches it.
    pub fn get(&self, pos: Position) -> Option<u32> {
        self.distances.get(pos).copied()
    }

    /// Step count to the nearest source, `None` if off-grid or unreachable.
    pub fn distance(&self, pos: Position) -> Option<u32> {
        self.get(pos).filter(|d| *d != UNREACHABLE)
    }

    pub fn is_reachable(&self, pos: Position) -> bool {
        self.distance(pos).is_some()
    }

    /// Walks downhill from `start` to a source.
    ///
    /// The path excludes `start` and ends on a source tile. Empty when
    /// `start` is unreachable, off the grid or already a source. Among equal
    /// downhill neighbours the first in North, East, South, West order wins.
    pub fn path_from(&self, start: Position) -> Vec<Position> {
        let Some(mut remaining) = self.distance(start) else {
            return Vec::new();
        };
        let mut path = Vec::with_capacity(remaining as usize);
        let mut current = start;
        while remaining > 0 {
            let Some(step) = self.downhill_step(current, remaining) else {
                break;
            };
            path.push(step);
            current = step;
            remaining -= 1;
        }
        path
    }

    /// First tile of [`path_from`](Self::path_from) without building the rest.
    pub fn next_step(&self, start: Position) -> Option<Position> {
        let d = self.distance(start)?;
        if d == 0 {
            return None;
        }
        self.downhill_step(start, d)
    }

    /// Neighbours of `from` that are strictly closer, best first, ties in
    /// North, East, South, West order. Used by movers that must route around
    /// tiles the map itself does not know are occupied.
    pub fn downhill_neighbors(&self, from: Position) -> Vec<Position> {
        let Some(d) = self.distance(from) else {
            return Vec::new();
        };
        let mut closer: Vec<(u32, usize, Position)> = from
            .neighbors()
            .into_iter()
            .enumerate()
            .filter_map(|(order, n)| {
                self.distance(n)
                    .filter(|nd| *nd < d)
                    .map(|nd| (nd, order, n))
            })
            .collect();
        closer.sort();
        closer.into_iter().map(|(_, _, n)| n).collect()
    }

    fn downhill_step(&self, from: Position, distance: u32) -> Option<Position> {
        from.neighbors()
            .into_iter()
            .find(|n| self.distance(*n) == Some(distance - 1))
    }
}

/// Verdict of a line-of-sight visitor on one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sight {
    /// Tile seen, ray continues
    Clear,
    /// Tile seen, ray stops here
    Blocked,
}

/// Tiles of the Bresenham line from `from` to `to`, both included.
pub fn line(from: Position, to: Position) -> Vec<Position> {
    let dx = (to.x - from.x).abs();
    let dy = (to.y - from.y).abs();
    let sx = if from.x < to.x { 1 } else { -1 };
    let sy = if from.y < to.y { 1 } else { -1 };
    let mut err = dx - dy;
    let (mut x, mut y) = (from.x, from.y);
    let mut points = Vec::with_capacity((dx.max(dy) + 1) as usize);

    loop {
        points.push(Position::new(x, y));
        if x == to.x && y == to.y {
            return points;
        }
        let e2 = 2 * err;
        if e2 > -dy {
            err -= dy;
            x += sx;
        }
        if e2 < dx {
            err += dx;
            y += sy;
        }
    }
}

/// Casts rays from `origin` to every tile on the border of the square of
/// half-width `range` and reports each crossed tile to `visit`.
///
/// `origin` is visited first and exactly once. A ray stops after a tile for
/// which `visit` answers [`Sight::Blocked`] or once it leaves the circle of
/// radius `range`. Tiles shared by several rays are visited once per ray.
pub fn traverse_line_of_sight(
    origin: Position,
    range: u32,
    mut visit: impl FnMut(Position) -> Sight,
) {
    visit(origin);
    if range == 0 {
        return;
    }
    let r = range as i32;
    let range_sq = (range as i64) * (range as i64);

    let perimeter = (-r..=r)
        .flat_map(|d| {
            [
                Position::new(origin.x + d, origin.y - r),
                Position::new(origin.x + d, origin.y + r),
                Position::new(origin.x - r, origin.y + d),
                Position::new(origin.x + r, origin.y + d),
            ]
        });

    for edge in perimeter {
        for tile in line(origin, edge).into_iter().skip(1) {
            if tile.distance_squared(origin) > range_sq {
                break;
            }
            if visit(tile) == Sight::Blocked {
                break;
            }
        }
    }
}

/// Whether `target` is visible from `origin`: within `range` and no
/// sight-blocking tile strictly between them.
pub fn can_see(
    origin: Position,
    target: Position,
    range: u32,
    blocks_sight: impl Fn(Position) -> bool,
) -> bool {
    let range_sq = (range as i64) * (range as i64);
    if origin.distance_squared(target) > range_sq {
        return false;
    }
    let points = line(origin, target);
    points
        .iter()
        .skip(1)
        .take(points.len().saturating_sub(2))
        .all(|p| !blocks_sight(*p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    fn open(_: Position) -> bool {
        false
    }

    #[test]
    fn test_single_source_distances() {
        let map = DistanceMap::compute(5, 5, &[Position::new(2, 2)], open);
        assert_eq!(map.get(Position::new(2, 2)), Some(0));
        assert_eq!(map.get(Position::new(0, 0)), Some(4));
        assert_eq!(map.get(Position::new(4, 2)), Some(2));
        assert_eq!(map.get(Position::new(9, 9)), None);
    }

    #[test]
    fn test_walls_make_tiles_unreachable() {
        // Column x == 2 is a wall
        let wall = |p: Position| p.x == 2;
        let map = DistanceMap::compute(5, 3, &[Position::new(0, 1)], wall);
        assert_eq!(map.get(Position::new(4, 1)), Some(UNREACHABLE));
        assert!(!map.is_reachable(Position::new(3, 0)));
        assert!(map.path_from(Position::new(4, 1)).is_empty());
    }

    #[test]
    fn test_multiple_sources_take_nearest() {
        let sources = [Position::new(0, 0), Position::new(6, 0)];
        let map = DistanceMap::compute(7, 1, &sources, open);
        assert_eq!(map.get(Position::new(2, 0)), Some(2));
        assert_eq!(map.get(Position::new(5, 0)), Some(1));
        assert_eq!(map.get(Position::new(3, 0)), Some(3));
    }

    #[test]
    fn test_blocked_source_still_seeds() {
        let source = Position::new(1, 1);
        let map = DistanceMap::compute(3, 3, &[source], |p| p == source);
        assert_eq!(map.get(source), Some(0));
        assert_eq!(map.get(Position::new(1, 0)), Some(1));
    }

    #[test]
    fn test_path_from_ties_prefer_north_then_east() {
        let map = DistanceMap::compute(3, 3, &[Position::new(2, 0)], open);
        // From (0, 2) both North and East are downhill; North wins
        assert_eq!(
            map.path_from(Position::new(0, 2)),
            vec![
                Position::new(0, 1),
                Position::new(0, 0),
                Position::new(1, 0),
                Position::new(2, 0),
            ]
        );
        assert_eq!(map.next_step(Position::new(0, 2)), Some(Position::new(0, 1)));
        assert!(map.path_from(Position::new(2, 0)).is_empty());
        assert!(map.path_from(Position::new(-1, 0)).is_empty());
    }

    #[test]
    fn test_downhill_neighbors_sorted() {
        let map = DistanceMap::compute(3, 3, &[Position::new(2, 0)], open);
        assert_eq!(
            map.downhill_neighbors(Position::new(1, 1)),
            vec![Position::new(1, 0), Position::new(2, 1)]
        );
    }

    #[test]
    fn test_bounded_map_stays_in_region() {
        let map = DistanceMap::compute_bounded(
            20,
            1,
            &[Position::new(0, 0)],
            open,
            Position::new(0, 0),
            3,
        );
        assert_eq!(map.distance(Position::new(3, 0)), Some(3));
        assert_eq!(map.distance(Position::new(4, 0)), None);
    }

    #[test]
    fn test_line_endpoints() {
        let pts = line(Position::new(0, 0), Position::new(3, 1));
        assert_eq!(pts.first(), Some(&Position::new(0, 0)));
        assert_eq!(pts.last(), Some(&Position::new(3, 1)));
        assert_eq!(pts.len(), 4);
        assert_eq!(line(Position::new(2, 2), Position::new(2, 2)).len(), 1);
    }

    #[test]
    fn test_traverse_open_field_covers_circle() {
        let origin = Position::new(10, 10);
        let mut seen = HashSet::new();
        traverse_line_of_sight(origin, 3, |p| {
            seen.insert(p);
            Sight::Clear
        });
        assert!(seen.contains(&origin));
        assert!(seen.contains(&Position::new(13, 10)));
        assert!(seen.contains(&Position::new(12, 12)));
        // Corner of the square lies outside the circle
        assert!(!seen.contains(&Position::new(13, 13)));
        assert!(seen.iter().all(|p| p.distance_squared(origin) <= 9));
    }

    #[test]
    fn test_traverse_stops_at_blocking_tile() {
        let origin = Position::new(0, 0);
        let wall = Position::new(2, 0);
        let mut seen = HashSet::new();
        traverse_line_of_sight(origin, 5, |p| {
            seen.insert(p);
            if p == wall { Sight::Blocked } else { Sight::Clear }
        });
        assert!(seen.contains(&wall));
        assert!(!seen.contains(&Position::new(3, 0)));
    }

    #[test]
    fn test_can_see() {
        let wall = |p: Position| p == Position::new(2, 0);
        let o = Position::new(0, 0);
        assert!(can_see(o, Position::new(1, 0), 5, wall));
        // The wall itself is visible, what lies behind it is not
        assert!(can_see(o, Position::new(2, 0), 5, wall));
        assert!(!can_see(o, Position::new(4, 0), 5, wall));
        assert!(can_see(o, Position::new(0, 4), 5, wall));
        assert!(!can_see(o, Position::new(0, 6), 5, wall));
        assert!(can_see(o, o, 0, wall));
    }

    #[test]
    fn test_can_see_ignores_both_endpoints() {
        // Endpoints that block sight never hide each other
        let solid = |p: Position| p == Position::new(0, 0) || p == Position::new(1, 0);
        let o = Position::new(0, 0);
        assert!(can_see(o, o, 3, solid));
        assert!(can_see(o, Position::new(1, 0), 3, solid));
        assert!(!can_see(o, Position::new(2, 0), 3, solid));
    }
}
