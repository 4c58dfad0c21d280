//! Font module root.
//!
//! Fonts enter the cache as raw file bytes (or through the [`db`] discovery
//! helper) and are registered into a [`FontStore`]:
//! - Each registration pairs an outline backend with a nominal pixel size and
//!   the unit scale derived from it; the same byte buffer may back several
//!   registrations at different sizes.
//! - Registrations are addressed by [`FontId`]; ids are small indices into a
//!   free-slot vector and are reused after removal.
//!
//! Outline access goes through the [`outline::OutlineFont`] trait so the rest
//! of the crate never touches a concrete parser.

pub mod db;
pub mod outline;
pub mod tessellate;
pub mod text;

use std::fmt;

use log::debug;

use self::outline::OutlineFont;

/// Identifier of a registered font. Stable until the font is removed; removed
/// ids are recycled by later registrations.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct FontId(pub u32);

impl fmt::Display for FontId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "font#{}", self.0)
    }
}

/// Errors produced by the font subsystem.
#[derive(thiserror::Error, Debug)]
pub enum FontError {
    #[error("failed to parse font data as a font face")]
    ParseFailed,

    #[error("{0} is not a registered font")]
    InvalidFontId(FontId),

    #[error("no fonts found on this system")]
    NoFontsAvailable,

    #[error("failed to resolve a font face for families {0:?}")]
    ResolveFailed(Vec<String>),

    #[error("font face has no file-backed source")]
    NonFileBackedSource,

    #[error("failed to read font file from disk: {0}")]
    ReadFailed(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A registered font: outline backend plus the size it was registered at.
///
/// `size` follows the stb convention: positive means "map one em to this
/// many pixels", negative means "map ascent-to-descent to this many pixels".
pub(crate) struct FontEntry {
    pub font: Box<dyn OutlineFont>,
    pub size: f32,
    pub size_scale: f32,
}

/// Free-slot registry of loaded fonts.
pub(crate) struct FontStore {
    entries: Vec<Option<FontEntry>>,
}

impl FontStore {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::with_capacity(8),
        }
    }

    /// Register an outline backend at a nominal pixel size, reusing the
    /// lowest free id.
    pub(crate) fn insert(&mut self, font: Box<dyn OutlineFont>, size_px: f32) -> FontId {
        let size_scale = if size_px < 0.0 {
            font.scale_for_pixel_height(-size_px)
        } else {
            font.scale_for_em(size_px)
        };
        let entry = FontEntry {
            font,
            size: size_px,
            size_scale,
        };

        let slot = self.entries.iter().position(Option::is_none);
        let id = match slot {
            Some(idx) => {
                self.entries[idx] = Some(entry);
                FontId(idx as u32)
            }
            None => {
                self.entries.push(Some(entry));
                FontId(self.entries.len() as u32 - 1)
            }
        };
        debug!("registered {id} at {size_px}px (scale {size_scale})");
        id
    }

    /// Remove a registration, freeing its id for reuse. Removing an unknown
    /// id is a no-op.
    pub(crate) fn remove(&mut self, id: FontId) {
        if let Some(slot) = self.entries.get_mut(id.0 as usize) {
            if slot.take().is_some() {
                debug!("removed {id}");
            }
        }
    }

    pub(crate) fn get(&self, id: FontId) -> Result<&FontEntry, FontError> {
        self.entries
            .get(id.0 as usize)
            .and_then(Option::as_ref)
            .ok_or(FontError::InvalidFontId(id))
    }
}
