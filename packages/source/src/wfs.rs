//! WFS row source and GML geometry extraction.
//!
//! Issues a single `GetFeature` request — WFS pagination is unreliable
//! across server implementations, so the whole document is fetched and
//! parsed in one go. Feature nodes are the first element child of each
//! direct child of the collection root (the member wrappers).

use geo::{Coord, Geometry, LineString, Point, Polygon};

use crate::parser_def::{FetcherConfig, ParserDefinition};
use crate::retry::{self, RetryPolicy};
use crate::xml::{self, XmlElement};
use crate::{RawRow, SourceError};

/// GML geometry tags, tried in order; first match wins.
const GML_GEOMETRY_TAGS: &[&str] = &["Point", "LineString", "Polygon"];

/// Fetches one WFS `GetFeature` document and yields its feature nodes.
pub struct WfsSource {
    client: reqwest::Client,
    policy: RetryPolicy,
    url: String,
    query: Vec<(String, String)>,
    label: String,
    exhausted: bool,
}

impl WfsSource {
    /// Builds the source from a WFS parser definition.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Config`] if called on a non-WFS definition.
    pub fn open(def: &ParserDefinition, policy: RetryPolicy) -> Result<Self, SourceError> {
        let FetcherConfig::Wfs { layer, version } = &def.fetcher else {
            return Err(SourceError::Config(format!(
                "parser '{}' is not a WFS source",
                def.name
            )));
        };

        let mut query: Vec<(String, String)> = def
            .api_filters
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        query.push(("service".to_string(), "WFS".to_string()));
        query.push(("version".to_string(), version.clone()));
        query.push(("request".to_string(), "GetFeature".to_string()));
        query.push(("TYPENAME".to_string(), layer.clone()));

        if def.limit > 0 {
            // the cap parameter was renamed between protocol generations
            let count_param = if version.starts_with("2.0") {
                "count"
            } else {
                "maxFeatures"
            };
            query.push((count_param.to_string(), def.limit.to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            policy,
            url: def.url.clone(),
            query,
            label: def.name.clone(),
            exhausted: false,
        })
    }

    /// Fetches and parses the document on the first call; returns `None`
    /// afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] on fetch failure or malformed XML.
    pub async fn next_batch(&mut self) -> Result<Option<Vec<RawRow>>, SourceError> {
        if self.exhausted {
            return Ok(None);
        }
        self.exhausted = true;

        let body = retry::fetch_text(&self.client, &self.url, &self.query, &self.policy).await?;
        let root = xml::parse_document(&body)?;
        let features = feature_nodes(root);

        log::info!("[{}] fetched {} feature(s)", self.label, features.len());

        Ok(Some(features.into_iter().map(RawRow::Xml).collect()))
    }
}

/// Unwraps the feature elements of a `GetFeature` response: each direct
/// child of the root is a member wrapper whose first element child is
/// the feature itself. Empty wrappers are skipped with a diagnostic.
#[must_use]
pub fn feature_nodes(root: XmlElement) -> Vec<XmlElement> {
    let mut features = Vec::with_capacity(root.children.len());
    for member in root.children {
        let mut children = member.children;
        if children.is_empty() {
            log::warn!("skipping empty member element <{}>", member.name);
        } else {
            features.push(children.swap_remove(0));
        }
    }
    features
}

/// Extracts a GML geometry from a feature node.
///
/// `container_tag` is the mapped locator of the element holding the GML;
/// under it, `Point`, `LineString`, and `Polygon` are tried in order.
/// Returns `None` (with a diagnostic) when nothing is found — the record
/// proceeds without geometry-derived columns.
#[must_use]
pub fn extract_gml_geometry(feature: &XmlElement, container_tag: &str) -> Option<Geometry<f64>> {
    let Some(container) = feature.find(container_tag) else {
        log::warn!("geometry container tag <{container_tag}> not found in feature");
        return None;
    };

    for tag in GML_GEOMETRY_TAGS {
        if let Some(geometry_tag) = container.find(tag) {
            let parsed = match *tag {
                "Point" => parse_gml_point(geometry_tag),
                "LineString" => parse_gml_line_string(geometry_tag),
                _ => parse_gml_polygon(geometry_tag),
            };
            if parsed.is_none() {
                log::warn!("malformed GML <{tag}> element in feature");
            }
            return parsed;
        }
    }

    log::warn!("no GML geometry tag found under <{container_tag}>");
    None
}

fn parse_gml_point(tag: &XmlElement) -> Option<Geometry<f64>> {
    let coords = coordinate_list(tag)?;
    coords
        .first()
        .map(|&coord| Geometry::Point(Point::from(coord)))
}

fn parse_gml_line_string(tag: &XmlElement) -> Option<Geometry<f64>> {
    let coords = coordinate_list(tag)?;
    if coords.len() < 2 {
        return None;
    }
    Some(Geometry::LineString(LineString::from(coords)))
}

fn parse_gml_polygon(tag: &XmlElement) -> Option<Geometry<f64>> {
    let exterior = tag.find("exterior").or_else(|| tag.find("outerBoundaryIs"))?;
    let shell = LineString::from(coordinate_list(exterior)?);

    let mut holes = Vec::new();
    for interior in tag
        .find_all("interior")
        .into_iter()
        .chain(tag.find_all("innerBoundaryIs"))
    {
        if let Some(ring) = coordinate_list(interior) {
            holes.push(LineString::from(ring));
        }
    }

    Some(Geometry::Polygon(Polygon::new(shell, holes)))
}

/// Reads the coordinate list under a GML element, handling both the
/// space-separated `pos`/`posList` encoding and the comma-pair
/// `coordinates` encoding. Axis order is taken as (x, y).
fn coordinate_list(tag: &XmlElement) -> Option<Vec<Coord<f64>>> {
    if let Some(pos) = tag.find("posList").or_else(|| tag.find("pos")) {
        return parse_pos_text(pos.trimmed_text());
    }
    if let Some(coordinates) = tag.find("coordinates") {
        return parse_coordinates_text(coordinates.trimmed_text());
    }
    None
}

/// `pos`/`posList`: whitespace-separated scalars, two per coordinate.
fn parse_pos_text(text: &str) -> Option<Vec<Coord<f64>>> {
    let scalars: Vec<f64> = text
        .split_whitespace()
        .map(str::parse)
        .collect::<Result<_, _>>()
        .ok()?;
    if scalars.is_empty() || scalars.len() % 2 != 0 {
        return None;
    }
    Some(
        scalars
            .chunks_exact(2)
            .map(|pair| Coord {
                x: pair[0],
                y: pair[1],
            })
            .collect(),
    )
}

/// `coordinates`: whitespace-separated `x,y` pairs.
fn parse_coordinates_text(text: &str) -> Option<Vec<Coord<f64>>> {
    let mut coords = Vec::new();
    for pair in text.split_whitespace() {
        let (x, y) = pair.split_once(',')?;
        coords.push(Coord {
            x: x.parse().ok()?,
            y: y.parse().ok()?,
        });
    }
    if coords.is_empty() { None } else { Some(coords) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parse_document;

    const COLLECTION: &str = r#"
        <wfs:FeatureCollection xmlns:wfs="http://www.opengis.net/wfs">
            <gml:featureMember>
                <ms:obs>
                    <ms:cd_nom>61153</ms:cd_nom>
                    <ms:geom>
                        <gml:Point><gml:pos>931954.2 6535293.8</gml:pos></gml:Point>
                    </ms:geom>
                </ms:obs>
            </gml:featureMember>
            <gml:featureMember>
                <ms:obs>
                    <ms:cd_nom>60630</ms:cd_nom>
                    <ms:geom>
                        <gml:Polygon>
                            <gml:exterior><gml:LinearRing>
                                <gml:posList>0 0 4 0 4 4 0 4 0 0</gml:posList>
                            </gml:LinearRing></gml:exterior>
                        </gml:Polygon>
                    </ms:geom>
                </ms:obs>
            </gml:featureMember>
            <gml:featureMember/>
        </wfs:FeatureCollection>"#;

    #[test]
    fn unwraps_member_elements_and_skips_empty_ones() {
        let root = parse_document(COLLECTION).unwrap();
        let features = feature_nodes(root);
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].name, "obs");
        assert_eq!(features[0].find("cd_nom").unwrap().trimmed_text(), "61153");
    }

    #[test]
    fn extracts_point_geometry() {
        let root = parse_document(COLLECTION).unwrap();
        let features = feature_nodes(root);
        let geom = extract_gml_geometry(&features[0], "geom").unwrap();
        let Geometry::Point(point) = geom else {
            panic!("expected a point, got {geom:?}");
        };
        assert!((point.x() - 931_954.2).abs() < f64::EPSILON);
        assert!((point.y() - 6_535_293.8).abs() < f64::EPSILON);
    }

    #[test]
    fn extracts_polygon_geometry() {
        let root = parse_document(COLLECTION).unwrap();
        let features = feature_nodes(root);
        let geom = extract_gml_geometry(&features[1], "geom").unwrap();
        let Geometry::Polygon(polygon) = geom else {
            panic!("expected a polygon, got {geom:?}");
        };
        assert_eq!(polygon.exterior().0.len(), 5);
        assert!(polygon.interiors().is_empty());
    }

    #[test]
    fn extracts_line_string_from_coordinates_encoding() {
        let doc = r"<f><trace><gml:LineString>
            <gml:coordinates>1.0,2.0 3.0,4.0 5.0,6.0</gml:coordinates>
        </gml:LineString></trace></f>";
        let feature = parse_document(doc).unwrap();
        let geom = extract_gml_geometry(&feature, "trace").unwrap();
        let Geometry::LineString(line) = geom else {
            panic!("expected a line string, got {geom:?}");
        };
        assert_eq!(line.0.len(), 3);
        assert!((line.0[2].x - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_container_yields_none() {
        let feature = parse_document("<f><other/></f>").unwrap();
        assert!(extract_gml_geometry(&feature, "geom").is_none());
    }

    #[test]
    fn container_without_gml_yields_none() {
        let feature = parse_document("<f><geom><note>no geometry</note></geom></f>").unwrap();
        assert!(extract_gml_geometry(&feature, "geom").is_none());
    }

    #[test]
    fn point_wins_over_later_tags() {
        let doc = r"<f><geom>
            <gml:Point><gml:pos>1 2</gml:pos></gml:Point>
            <gml:Polygon><gml:exterior><gml:LinearRing>
                <gml:posList>0 0 1 0 1 1 0 0</gml:posList>
            </gml:LinearRing></gml:exterior></gml:Polygon>
        </geom></f>";
        let feature = parse_document(doc).unwrap();
        let geom = extract_gml_geometry(&feature, "geom").unwrap();
        assert!(matches!(geom, Geometry::Point(_)));
    }

    #[test]
    fn odd_scalar_count_is_rejected() {
        assert!(parse_pos_text("1 2 3").is_none());
        assert!(parse_pos_text("").is_none());
    }
}
