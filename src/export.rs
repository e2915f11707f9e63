//! Rasterize or print rendered diagrams.

use std::path::Path;
use std::sync::Arc;

use log::debug;
use resvg::usvg;
use tiny_skia::{Pixmap, Transform};

use crate::error::FlowsvgError;

/// Fonts shipped next to the binary are picked up from here when present.
const LOCAL_FONTS: &str = "fonts";

/// Output formats chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Svg,
    Png,
    Pdf,
}

impl ExportFormat {
    pub fn from_path(path: &Path) -> Result<Self, FlowsvgError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| FlowsvgError::usage("Output file has no extension"))?
            .to_ascii_lowercase();

        match ext.as_str() {
            "svg" => Ok(Self::Svg),
            "png" => Ok(Self::Png),
            "pdf" => Ok(Self::Pdf),
            other => Err(FlowsvgError::usage(format!(
                "Unsupported output format: .{other} (use .svg, .png or .pdf)"
            ))),
        }
    }
}

/// Render an SVG document into the bytes of `format`.
pub fn export(svg: &str, format: ExportFormat, png_scale: f32) -> Result<Vec<u8>, FlowsvgError> {
    match format {
        ExportFormat::Svg => Ok(svg.as_bytes().to_vec()),
        ExportFormat::Png => svg_to_png(svg, png_scale),
        ExportFormat::Pdf => svg_to_pdf(svg),
    }
}

pub fn svg_to_png(svg: &str, scale: f32) -> Result<Vec<u8>, FlowsvgError> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(FlowsvgError::usage(format!("Invalid --png-scale value: {scale}")));
    }

    let mut opts = usvg::Options::default();
    {
        let fontdb = opts.fontdb_mut();
        fontdb.load_system_fonts();
        let local_fonts = Path::new(LOCAL_FONTS);
        if local_fonts.is_dir() {
            fontdb.load_fonts_dir(local_fonts);
        }

        let fallbacks = FontFallbacks::pick(fontdb.faces().flat_map(|f| f.families.iter().map(|(n, _)| n.as_str())));
        if let Some(family) = fallbacks.sans() {
            fontdb.set_sans_serif_family(family);
            fontdb.set_serif_family(family);
        }
        if let Some(family) = fallbacks.mono() {
            fontdb.set_monospace_family(family);
        }
    }

    let tree = usvg::Tree::from_str(svg, &opts)
        .map_err(|e| FlowsvgError::export(format!("Failed to parse SVG: {e}")))?;

    let width = (tree.size().width() * scale).ceil() as u32;
    let height = (tree.size().height() * scale).ceil() as u32;
    debug!(width = width, height = height; "Rasterizing diagram");

    let mut pixmap = Pixmap::new(width, height)
        .ok_or_else(|| FlowsvgError::export("Failed to create pixmap"))?;
    resvg::render(&tree, Transform::from_scale(scale, scale), &mut pixmap.as_mut());

    pixmap
        .encode_png()
        .map_err(|e| FlowsvgError::export(format!("Failed to encode PNG: {e}")))
}

pub fn svg_to_pdf(svg: &str) -> Result<Vec<u8>, FlowsvgError> {
    use svg2pdf::usvg::fontdb;

    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    let local_fonts = Path::new(LOCAL_FONTS);
    if local_fonts.is_dir() {
        db.load_fonts_dir(local_fonts);
    }

    // svg2pdf pins its own usvg, so its database is a distinct type
    let fallbacks = FontFallbacks::pick(db.faces().flat_map(|f| f.families.iter().map(|(n, _)| n.as_str())));
    if let Some(family) = fallbacks.sans() {
        db.set_sans_serif_family(family);
        db.set_serif_family(family);
    }
    if let Some(family) = fallbacks.mono() {
        db.set_monospace_family(family);
    }

    let opts = svg2pdf::usvg::Options {
        fontdb: Arc::new(db),
        ..Default::default()
    };
    let tree = svg2pdf::usvg::Tree::from_str(svg, &opts)
        .map_err(|e| FlowsvgError::export(format!("Failed to parse SVG: {e}")))?;

    let options = svg2pdf::ConversionOptions {
        embed_text: false,
        ..Default::default()
    };
    svg2pdf::to_pdf(&tree, options, svg2pdf::PageOptions::default())
        .map_err(|e| FlowsvgError::export(format!("Failed to convert SVG to PDF: {e}")))
}

/// Generic families resolved to installed ones.
#[derive(Debug, Default, PartialEq)]
struct FontFallbacks {
    first: Option<String>,
    sans: Option<String>,
    mono: Option<String>,
}

impl FontFallbacks {
    fn pick<'a>(families: impl IntoIterator<Item = &'a str>) -> Self {
        let mut picked = Self::default();
        for family in families {
            if picked.first.is_none() {
                picked.first = Some(family.to_string());
            }
            let lower = family.to_ascii_lowercase();
            if picked.sans.is_none() && lower.contains("sans") {
                picked.sans = Some(family.to_string());
            }
            if picked.mono.is_none() && (lower.contains("mono") || lower.contains("code")) {
                picked.mono = Some(family.to_string());
            }
        }
        picked
    }

    fn sans(&self) -> Option<&str> {
        self.sans.as_deref().or(self.first.as_deref())
    }

    fn mono(&self) -> Option<&str> {
        self.mono.as_deref().or_else(|| self.sans())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_follows_extension() {
        assert_eq!(ExportFormat::from_path(Path::new("a.SVG")).unwrap(), ExportFormat::Svg);
        assert_eq!(ExportFormat::from_path(Path::new("a.png")).unwrap(), ExportFormat::Png);
        assert_eq!(ExportFormat::from_path(Path::new("a.pdf")).unwrap(), ExportFormat::Pdf);
        assert!(matches!(
            ExportFormat::from_path(Path::new("a.gif")),
            Err(FlowsvgError::Usage(_))
        ));
        assert!(ExportFormat::from_path(Path::new("noext")).is_err());
    }

    #[test]
    fn invalid_png_scale_is_rejected() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10"/>"#;
        assert!(svg_to_png(svg, 0.0).is_err());
        assert!(svg_to_png(svg, f32::NAN).is_err());
    }

    #[test]
    fn svg_export_is_passthrough() {
        let bytes = export("<svg/>", ExportFormat::Svg, 1.0).unwrap();
        assert_eq!(bytes, b"<svg/>");
    }

    #[test]
    fn font_fallbacks_prefer_sans_and_mono() {
        let picked = FontFallbacks::pick(["Serif Display", "Noto Sans", "Fira Code"]);
        assert_eq!(picked.sans(), Some("Noto Sans"));
        assert_eq!(picked.mono(), Some("Fira Code"));

        let picked = FontFallbacks::pick(["Only Serif"]);
        assert_eq!(picked.sans(), Some("Only Serif"));
        assert_eq!(picked.mono(), Some("Only Serif"));

        assert_eq!(FontFallbacks::pick(std::iter::empty()).sans(), None);
    }
}
