//! KML 2.2 overlay document writer.
//!
//! The document is assembled as a feature tree and rendered to XML in one
//! pass. One shared line style applies to every shape; the
//! `polygons_to_lines` toggle renders every boundary shape as an
//! outline-only `LineString` instead of a `Polygon`.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use geo_types::Polygon;

use crate::models::BoundaryGeometry;

use super::ExportError;

/// Shared visual style for all exported shapes.
#[derive(Debug, Clone)]
pub struct KmlStyle {
    pub line_width: u32,
    /// `#rrggbb` as produced by the config loader.
    pub line_color: String,
}

impl KmlStyle {
    /// KML colors are `aabbggrr`. Full opacity, channels reversed.
    fn kml_color(&self) -> String {
        let hex = self.line_color.trim_start_matches('#');
        // The slicing below is byte-indexed, so the guard must also reject
        // six-byte multibyte strings, not just wrong lengths.
        if hex.len() != 6 || !hex.is_ascii() {
            return "ff0000ff".to_string();
        }
        format!("ff{}{}{}", &hex[4..6], &hex[2..4], &hex[0..2])
    }
}

#[derive(Debug, Clone)]
enum KmlFeature {
    Folder(KmlFolder),
    /// A boundary shape; rendered as Polygon or LineString depending on
    /// the document's `polygons_to_lines` setting.
    Shape {
        name: String,
        coords: Vec<(f64, f64)>,
    },
    Point {
        name: String,
        lon: f64,
        lat: f64,
    },
}

/// A named group of features.
#[derive(Debug, Clone, Default)]
pub struct KmlFolder {
    name: Option<String>,
    features: Vec<KmlFeature>,
}

impl KmlFolder {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            features: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn add_folder(&mut self, folder: KmlFolder) {
        self.features.push(KmlFeature::Folder(folder));
    }

    /// Move this folder's features into `parent`, discarding the folder
    /// level itself.
    pub fn merge_into(self, parent: &mut KmlFolder) {
        parent.features.extend(self.features);
    }

    pub fn add_shape(&mut self, name: impl Into<String>, coords: Vec<(f64, f64)>) {
        self.features.push(KmlFeature::Shape {
            name: name.into(),
            coords,
        });
    }

    pub fn add_point(&mut self, name: impl Into<String>, lon: f64, lat: f64) {
        self.features.push(KmlFeature::Point {
            name: name.into(),
            lon,
            lat,
        });
    }

    /// Add a region boundary. A single polygon becomes one shape named
    /// `name`; a multi-polygon becomes a folder named `name` holding one
    /// shape per ring, numbered `name_1..name_N`.
    pub fn add_boundary(&mut self, name: &str, geometry: &BoundaryGeometry) {
        match geometry {
            BoundaryGeometry::Single(polygon) => {
                self.add_shape(name, exterior_coords(polygon));
            }
            BoundaryGeometry::Multi(multi) => {
                let mut group = KmlFolder::named(name);
                for (i, polygon) in multi.0.iter().enumerate() {
                    group.add_shape(format!("{}_{}", name, i + 1), exterior_coords(polygon));
                }
                self.add_folder(group);
            }
        }
    }
}

fn exterior_coords(polygon: &Polygon<f64>) -> Vec<(f64, f64)> {
    polygon.exterior().0.iter().map(|c| (c.x, c.y)).collect()
}

/// A complete overlay document.
#[derive(Debug, Clone)]
pub struct KmlDocument {
    style: KmlStyle,
    polygons_to_lines: bool,
    pub root: KmlFolder,
}

impl KmlDocument {
    pub fn new(style: KmlStyle, polygons_to_lines: bool) -> Self {
        Self {
            style,
            polygons_to_lines,
            root: KmlFolder::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Render the document to XML.
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        out.push_str("<kml xmlns=\"http://www.opengis.net/kml/2.2\">\n<Document>\n");
        let _ = write!(
            out,
            "<Style id=\"line\"><LineStyle><color>{}</color><width>{}</width></LineStyle>\
             <PolyStyle><fill>0</fill></PolyStyle></Style>\n",
            self.style.kml_color(),
            self.style.line_width
        );
        for feature in &self.root.features {
            self.render_feature(&mut out, feature);
        }
        out.push_str("</Document>\n</kml>\n");
        out
    }

    pub fn save(&self, path: &Path) -> Result<(), ExportError> {
        fs::write(path, self.to_xml())?;
        Ok(())
    }

    fn render_feature(&self, out: &mut String, feature: &KmlFeature) {
        match feature {
            KmlFeature::Folder(folder) => {
                out.push_str("<Folder>\n");
                if let Some(name) = &folder.name {
                    let _ = write!(out, "<name>{}</name>\n", xml_escape(name));
                }
                for child in &folder.features {
                    self.render_feature(out, child);
                }
                out.push_str("</Folder>\n");
            }
            KmlFeature::Shape { name, coords } => {
                let _ = write!(
                    out,
                    "<Placemark><name>{}</name><styleUrl>#line</styleUrl>",
                    xml_escape(name)
                );
                if self.polygons_to_lines {
                    let _ = write!(
                        out,
                        "<LineString><coordinates>{}</coordinates></LineString>",
                        coordinate_list(coords)
                    );
                } else {
                    let _ = write!(
                        out,
                        "<Polygon><outerBoundaryIs><LinearRing><coordinates>{}</coordinates>\
                         </LinearRing></outerBoundaryIs></Polygon>",
                        coordinate_list(coords)
                    );
                }
                out.push_str("</Placemark>\n");
            }
            KmlFeature::Point { name, lon, lat } => {
                let _ = write!(
                    out,
                    "<Placemark><name>{}</name>\
                     <Point><coordinates>{lon},{lat}</coordinates></Point></Placemark>\n",
                    xml_escape(name)
                );
            }
        }
    }
}

fn coordinate_list(coords: &[(f64, f64)]) -> String {
    coords
        .iter()
        .map(|(lon, lat)| format!("{lon},{lat}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
