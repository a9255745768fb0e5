// src/dungeon/src/loader.rs
//! Hand-authored level loading.
//!
//! A level is drawn as text, one character per tile. The [`Legend`] decides
//! what each character means. The result is a [`LevelBlueprint`]: the layered
//! tile map plus the spawn markers the simulation turns into entities.

use std::collections::HashMap;

use error::SimError;

use crate::grid::Position;
use crate::map::TileMap;
use crate::tiles::{Tile, TileColor, TileLayer};

/// What a map character stands for.
#[derive(Debug, Clone, PartialEq)]
pub enum Glyph {
    /// Nothing at all (outside the dungeon)
    Void,
    /// Tiles stacked on this cell
    Terrain(Vec<(TileLayer, Tile)>),
    /// Up stairs, where arrivals from above are placed
    Start,
    /// Down stairs
    End,
    /// An entity spawn marker standing on floor
    Spawn,
}

#[derive(Debug, Clone)]
pub struct Legend {
    glyphs: HashMap<char, Glyph>,
}

impl Legend {
    pub fn empty() -> Self {
        Self {
            glyphs: HashMap::new(),
        }
    }

    /// Walls `#`, mossy walls `%`, floor `.`, grass `,`, void ` `,
    /// stairs `<` and `>`; letters, `@` and `+` are spawn markers.
    pub fn default_legend() -> Self {
        let floor = (TileLayer::Ground, Tile::floor());
        let mut legend = Self::empty()
            .with(' ', Glyph::Void)
            .with('.', Glyph::Terrain(vec![floor]))
            .with(
                ',',
                Glyph::Terrain(vec![
                    floor,
                    (TileLayer::GroundDecoration, Tile::new(',', TileColor::Green)),
                ]),
            )
            .with('#', Glyph::Terrain(vec![floor, (TileLayer::Walls, Tile::wall())]))
            .with(
                '%',
                Glyph::Terrain(vec![
                    floor,
                    (TileLayer::Walls, Tile::wall()),
                    (TileLayer::WallDecoration, Tile::new('%', TileColor::Green)),
                ]),
            )
            .with('<', Glyph::Start)
            .with('>', Glyph::End)
            .with('@', Glyph::Spawn)
            .with('+', Glyph::Spawn);
        for c in ('a'..='z').chain('A'..='Z') {
            legend.glyphs.insert(c, Glyph::Spawn);
        }
        legend
    }

    pub fn with(mut self, c: char, glyph: Glyph) -> Self {
        self.glyphs.insert(c, glyph);
        self
    }

    pub fn get(&self, c: char) -> Option<&Glyph> {
        self.glyphs.get(&c)
    }
}

impl Default for Legend {
    fn default() -> Self {
        Self::default_legend()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnPoint {
    pub marker: char,
    pub position: Position,
}

/// A parsed level ready to be populated.
#[derive(Debug, Clone)]
pub struct LevelBlueprint {
    pub map: TileMap,
    pub start: Position,
    pub end: Position,
    pub spawns: Vec<SpawnPoint>,
}

impl LevelBlueprint {
    /// Parses `text` with `legend`.
    ///
    /// The map must be rectangular and hold exactly one start and one end
    /// marker. Blank lines before and after the drawing are ignored.
    pub fn parse(text: &str, legend: &Legend) -> Result<Self, SimError> {
        let rows: Vec<&str> = text
            .lines()
            .map(|l| l.trim_end_matches('\r'))
            .skip_while(|l| l.trim().is_empty())
            .collect();
        let rows: Vec<&str> = match rows.iter().rposition(|l| !l.trim().is_empty()) {
            Some(last) => rows[..=last].to_vec(),
            None => return Err(SimError::EmptyMap),
        };

        let width = rows[0].chars().count();
        for (row, line) in rows.iter().enumerate() {
            let found = line.chars().count();
            if found != width {
                return Err(SimError::RaggedMap {
                    row,
                    expected: width,
                    found,
                });
            }
        }

        let mut map = TileMap::new(width as i32, rows.len() as i32);
        let mut start = None;
        let mut end = None;
        let mut spawns = Vec::new();

        for (y, line) in rows.iter().enumerate() {
            for (x, c) in line.chars().enumerate() {
                let pos = Position::new(x as i32, y as i32);
                let glyph = legend.get(c).ok_or(SimError::UnknownGlyph {
                    glyph: c,
                    x: pos.x,
                    y: pos.y,
                })?;
                match glyph {
                    Glyph::Void => {}
                    Glyph::Terrain(stack) => {
                        for (layer, tile) in stack {
                            map.set(*layer, pos, *tile);
                        }
                    }
                    Glyph::Start => {
                        place_marker(&mut start, "start", pos)?;
                        map.set(TileLayer::Ground, pos, Tile::floor());
                        map.set(TileLayer::Objects, pos, Tile::new('<', TileColor::Yellow));
                    }
                    Glyph::End => {
                        place_marker(&mut end, "end", pos)?;
                        map.set(TileLayer::Ground, pos, Tile::floor());
                        map.set(TileLayer::Objects, pos, Tile::new('>', TileColor::Yellow));
                    }
                    Glyph::Spawn => {
                        map.set(TileLayer::Ground, pos, Tile::floor());
                        map.set(TileLayer::EntitySpawn, pos, Tile::plain(c));
                        spawns.push(SpawnPoint {
                            marker: c,
                            position: pos,
                        });
                    }
                }
            }
        }

        Ok(Self {
            map,
            start: start.ok_or(SimError::MissingMarker("start"))?,
            end: end.ok_or(SimError::MissingMarker("end"))?,
            spawns,
        })
    }
}

fn place_marker(
    slot: &mut Option<Position>,
    marker: &'static str,
    pos: Position,
) -> Result<(), SimError> {
    if slot.is_some() {
        return Err(SimError::DuplicateMarker {
            marker,
            x: pos.x,
            y: pos.y,
        });
    }
    *slot = Some(pos);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ROOM: &str = "
#######
#<.r.>#
#,.@..#
#######
";

    #[test]
    fn test_parse_room() {
        let bp = LevelBlueprint::parse(ROOM, &Legend::default()).unwrap();
        assert_eq!(bp.map.width(), 7);
        assert_eq!(bp.map.height(), 4);
        assert_eq!(bp.start, Position::new(1, 1));
        assert_eq!(bp.end, Position::new(5, 1));
        assert_eq!(
            bp.spawns,
            vec![
                SpawnPoint { marker: 'r', position: Position::new(3, 1) },
                SpawnPoint { marker: '@', position: Position::new(3, 2) },
            ]
        );
        assert!(bp.map.is_wall(Position::new(0, 0)));
        assert!(!bp.map.is_wall(Position::new(3, 1)));
        assert_eq!(
            bp.map.tile(TileLayer::GroundDecoration, Position::new(1, 2)).map(|t| t.glyph),
            Some(',')
        );
        assert_eq!(
            bp.map.tile(TileLayer::EntitySpawn, Position::new(3, 1)).map(|t| t.glyph),
            Some('r')
        );
    }

    #[test]
    fn test_missing_end_marker() {
        let err = LevelBlueprint::parse("#<.#", &Legend::default()).unwrap_err();
        assert!(matches!(err, SimError::MissingMarker("end")));
    }

    #[test]
    fn test_duplicate_start_marker() {
        let err = LevelBlueprint::parse("<<>", &Legend::default()).unwrap_err();
        assert!(matches!(
            err,
            SimError::DuplicateMarker { marker: "start", x: 1, y: 0 }
        ));
    }

    #[test]
    fn test_unknown_glyph_and_ragged_rows() {
        let err = LevelBlueprint::parse("<.?>", &Legend::default()).unwrap_err();
        assert!(matches!(err, SimError::UnknownGlyph { glyph: '?', x: 2, y: 0 }));

        let err = LevelBlueprint::parse("<..\n>.", &Legend::default()).unwrap_err();
        assert!(matches!(err, SimError::RaggedMap { row: 1, expected: 3, found: 2 }));

        assert!(matches!(
            LevelBlueprint::parse("\n  \n", &Legend::default()),
            Err(SimError::EmptyMap)
        ));
    }

    #[test]
    fn test_custom_legend_entry() {
        let legend = Legend::default_legend().with(
            '~',
            Glyph::Terrain(vec![(TileLayer::Ground, Tile::new('~', TileColor::Blue))]),
        );
        let bp = LevelBlueprint::parse("<~>", &legend).unwrap();
        assert_eq!(
            bp.map.visible_tile(Position::new(1, 0)).map(|t| t.glyph),
            Some('~')
        );
    }
}
