//! System-font discovery.
//!
//! A thin convenience over `fontdb` for callers that want to render with an
//! installed font instead of shipping one: resolve a family/weight/style
//! query to a concrete face and hand its bytes to the cache.
//!
//! Resolution strategy:
//! - Try each named family in order with the requested weight/style; generic
//!   names (`serif`, `sans-serif`, `monospace`) map to fontdb's generic
//!   families.
//! - Fall back to `serif`, then to the first face in the database.
//!
//! Only file-backed faces are supported; the returned byte buffer is read
//! once and shared from then on.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use fontdb::{Database, Family, Query, Source, Stretch, Style, Weight};
use log::debug;

use crate::font::FontError;

/// Simplified font face selection.
#[derive(Debug, Clone)]
pub struct FontQuery {
    /// Preferred family names, in priority order. Generic names like
    /// `"serif"` are understood.
    pub families: Vec<String>,
    /// CSS-style weight (100..900); 400 = regular, 700 = bold.
    pub weight: u16,
    pub italic: bool,
}

impl Default for FontQuery {
    fn default() -> Self {
        Self {
            families: vec!["sans-serif".to_string()],
            weight: 400,
            italic: false,
        }
    }
}

/// A face resolved from the system database: font file bytes plus the face
/// index within the file (for collections).
#[derive(Clone)]
pub struct ResolvedFace {
    pub bytes: Arc<[u8]>,
    pub index: u32,
}

/// Wrapper around the system font database.
pub struct FontDatabase {
    db: Database,
}

impl FontDatabase {
    /// Load system fonts. Fails when the machine has none.
    pub fn new() -> Result<Self, FontError> {
        let mut db = Database::new();
        db.load_system_fonts();
        if db.faces().next().is_none() {
            return Err(FontError::NoFontsAvailable);
        }
        debug!("font database loaded {} faces", db.len());
        Ok(Self { db })
    }

    /// Resolve a query to a concrete face and read its bytes.
    pub fn resolve(&self, query: &FontQuery) -> Result<ResolvedFace, FontError> {
        let style = if query.italic {
            Style::Italic
        } else {
            Style::Normal
        };
        let weight = Weight(query.weight.clamp(1, 1000));

        let mut families: Vec<Family<'_>> = Vec::new();
        for name in &query.families {
            let name = name.trim();
            if name.eq_ignore_ascii_case("serif") {
                families.push(Family::Serif);
            } else if name.eq_ignore_ascii_case("sans-serif") || name.eq_ignore_ascii_case("sans") {
                families.push(Family::SansSerif);
            } else if name.eq_ignore_ascii_case("monospace") || name.eq_ignore_ascii_case("mono") {
                families.push(Family::Monospace);
            } else if !name.is_empty() {
                families.push(Family::Name(name));
            }
        }

        let id = self
            .db
            .query(&Query {
                families: &families,
                weight,
                style,
                stretch: Stretch::Normal,
            })
            .or_else(|| {
                self.db.query(&Query {
                    families: &[Family::Serif],
                    weight,
                    style,
                    stretch: Stretch::Normal,
                })
            })
            .or_else(|| self.db.faces().next().map(|face| face.id))
            .ok_or_else(|| FontError::ResolveFailed(query.families.clone()))?;

        let face = self
            .db
            .face(id)
            .ok_or_else(|| FontError::ResolveFailed(query.families.clone()))?;

        match &face.source {
            Source::File(path) => Ok(ResolvedFace {
                bytes: read_font_bytes(path)?,
                index: face.index,
            }),
            _ => Err(FontError::NonFileBackedSource),
        }
    }
}

fn read_font_bytes(path: &Path) -> Result<Arc<[u8]>, FontError> {
    let data = fs::read(path).map_err(|_| FontError::ReadFailed(path.display().to_string()))?;
    Ok(Arc::from(data))
}
