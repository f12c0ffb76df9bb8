use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use glam::Mat4;

use crate::dataset::Dataset;
use crate::morphology::MorphologyId;
use crate::neuron::{FunctionalType, MorphologicalType, Neuron};
use crate::swc::{load_swc, SwcError};

#[derive(Debug)]
pub enum SceneXmlError {
    Read { path: String, message: String },
    Malformed { message: String },
    MissingAttribute { tag: String, attribute: String },
    DuplicateMorphologyId { id: u32 },
    UnknownMorphology { gid: u32, morphology: u32 },
    DuplicateGid { gid: u32 },
    Swc { path: String, error: SwcError },
}

impl SceneXmlError {
    pub fn message(&self) -> String {
        match self {
            SceneXmlError::Read { path, message } => format!("Cannot read {path}: {message}"),
            SceneXmlError::Malformed { message } => format!("Scene file: {message}"),
            SceneXmlError::MissingAttribute { tag, attribute } => {
                format!("Scene file: <{tag}> is missing the {attribute} attribute")
            }
            SceneXmlError::DuplicateMorphologyId { id } => {
                format!("Scene file: duplicate morphology id {id}")
            }
            SceneXmlError::UnknownMorphology { gid, morphology } => {
                format!("Scene file: neuron {gid} references unknown morphology {morphology}")
            }
            SceneXmlError::DuplicateGid { gid } => {
                format!("Scene file: duplicate neuron gid {gid}")
            }
            SceneXmlError::Swc { path, error } => format!("{path}: {}", error.message()),
        }
    }
}

#[derive(Debug, Clone)]
enum Token {
    Open {
        name: String,
        attrs: Vec<(String, String)>,
        self_closing: bool,
    },
    Close {
        name: String,
    },
    Text(String),
}

/// Cursor over the XML subset the scene format uses: tags with quoted
/// attributes, text content, comments, and processing instructions.
struct Scanner<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn next_token(&mut self) -> Result<Option<Token>, SceneXmlError> {
        loop {
            let rest = &self.text[self.pos..];
            if rest.is_empty() {
                return Ok(None);
            }

            if let Some(stripped) = rest.strip_prefix("<!--") {
                let end = stripped.find("-->").ok_or_else(|| malformed("unterminated comment"))?;
                self.pos += 4 + end + 3;
                continue;
            }
            if rest.starts_with("<?") {
                let end = rest.find("?>").ok_or_else(|| malformed("unterminated declaration"))?;
                self.pos += end + 2;
                continue;
            }
            if let Some(stripped) = rest.strip_prefix("</") {
                let end = stripped.find('>').ok_or_else(|| malformed("unterminated close tag"))?;
                let name = stripped[..end].trim().to_string();
                self.pos += 2 + end + 1;
                return Ok(Some(Token::Close { name }));
            }
            if rest.starts_with('<') {
                let end = rest.find('>').ok_or_else(|| malformed("unterminated tag"))?;
                let inner = &rest[1..end];
                self.pos += end + 1;
                let (inner, self_closing) = match inner.strip_suffix('/') {
                    Some(stripped) => (stripped, true),
                    None => (inner, false),
                };
                let (name, attrs) = parse_tag(inner)?;
                return Ok(Some(Token::Open {
                    name,
                    attrs,
                    self_closing,
                }));
            }

            let end = rest.find('<').unwrap_or(rest.len());
            let text = rest[..end].trim();
            self.pos += end;
            if !text.is_empty() {
                return Ok(Some(Token::Text(text.to_string())));
            }
        }
    }
}

fn malformed(message: &str) -> SceneXmlError {
    SceneXmlError::Malformed {
        message: message.to_string(),
    }
}

fn parse_tag(inner: &str) -> Result<(String, Vec<(String, String)>), SceneXmlError> {
    let inner = inner.trim();
    let name_end = inner
        .find(|c: char| c.is_whitespace())
        .unwrap_or(inner.len());
    let name = inner[..name_end].to_string();
    if name.is_empty() {
        return Err(malformed("empty tag name"));
    }

    let mut attrs = Vec::new();
    let mut rest = inner[name_end..].trim_start();
    while !rest.is_empty() {
        let eq = rest
            .find('=')
            .ok_or_else(|| malformed("attribute without value"))?;
        let key = rest[..eq].trim().to_string();
        rest = rest[eq + 1..].trim_start();
        let quote = rest
            .chars()
            .next()
            .filter(|c| *c == '"' || *c == '\'')
            .ok_or_else(|| malformed("attribute value is not quoted"))?;
        let inner_rest = &rest[1..];
        let close = inner_rest
            .find(quote)
            .ok_or_else(|| malformed("unterminated attribute value"))?;
        attrs.push((key, inner_rest[..close].to_string()));
        rest = inner_rest[close + 1..].trim_start();
    }
    Ok((name, attrs))
}

fn attr<'t>(attrs: &'t [(String, String)], key: &str) -> Option<&'t str> {
    attrs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn require_attr<'t>(
    attrs: &'t [(String, String)],
    tag: &str,
    key: &str,
) -> Result<&'t str, SceneXmlError> {
    attr(attrs, key).ok_or_else(|| SceneXmlError::MissingAttribute {
        tag: tag.to_string(),
        attribute: key.to_string(),
    })
}

fn skip_subtree(scanner: &mut Scanner<'_>, name: &str) -> Result<(), SceneXmlError> {
    let mut depth = 1usize;
    while depth > 0 {
        match scanner.next_token()? {
            Some(Token::Open { self_closing, .. }) => {
                if !self_closing {
                    depth += 1;
                }
            }
            Some(Token::Close { .. }) => depth -= 1,
            Some(Token::Text(_)) => {}
            None => return Err(malformed(&format!("unterminated <{name}> element"))),
        }
    }
    Ok(())
}

struct NeuronEntry {
    gid: u32,
    morphology: u32,
    layer: u8,
    morphological_type: MorphologicalType,
    functional_type: FunctionalType,
    transform: Mat4,
}

/// Parse the XML scene: morphology definitions (id → SWC path, resolved
/// against `base_dir`) plus placed neuron instances.
pub fn parse_xml_scene(source: &str, base_dir: &Path) -> Result<Dataset, SceneXmlError> {
    let mut scanner = Scanner::new(source);

    let root = loop {
        match scanner.next_token()? {
            Some(Token::Open { name, .. }) if name == "scene" => break name,
            Some(Token::Text(_)) => continue,
            Some(_) => return Err(malformed("expected <scene> as the root element")),
            None => return Err(malformed("empty scene file")),
        }
    };

    let mut swc_paths: BTreeMap<u32, String> = BTreeMap::new();
    let mut entries: Vec<NeuronEntry> = Vec::new();

    loop {
        match scanner.next_token()? {
            Some(Token::Open {
                name,
                self_closing,
                ..
            }) if name == "morphologies" => {
                if !self_closing {
                    parse_morphologies(&mut scanner, &mut swc_paths)?;
                }
            }
            Some(Token::Open {
                name,
                self_closing,
                ..
            }) if name == "neurons" => {
                if !self_closing {
                    parse_neurons(&mut scanner, &mut entries)?;
                }
            }
            Some(Token::Open {
                name,
                self_closing,
                ..
            }) => {
                tracing::warn!(tag = %name, "Skipping unknown scene element");
                if !self_closing {
                    skip_subtree(&mut scanner, &name)?;
                }
            }
            Some(Token::Close { name }) if name == root => break,
            Some(Token::Close { name }) => {
                return Err(malformed(&format!("unexpected </{name}>")))
            }
            Some(Token::Text(_)) => {}
            None => return Err(malformed("missing </scene>")),
        }
    }

    // Morphologies load in ascending definition-id order; every neuron
    // referencing the same definition shares one Arc.
    let mut dataset = Dataset::new();
    let mut loaded: BTreeMap<u32, usize> = BTreeMap::new();
    for (index, (&def_id, swc)) in swc_paths.iter().enumerate() {
        let path = base_dir.join(swc);
        let morphology =
            load_swc(&path, MorphologyId(index as u32)).map_err(|error| SceneXmlError::Swc {
                path: path.display().to_string(),
                error,
            })?;
        dataset.morphologies.push(Arc::new(morphology));
        loaded.insert(def_id, index);
    }

    for entry in entries {
        let Some(&index) = loaded.get(&entry.morphology) else {
            return Err(SceneXmlError::UnknownMorphology {
                gid: entry.gid,
                morphology: entry.morphology,
            });
        };
        let neuron = Neuron {
            gid: entry.gid,
            layer: entry.layer,
            morphological_type: entry.morphological_type,
            functional_type: entry.functional_type,
            transform: entry.transform,
            morphology: dataset.morphologies[index].clone(),
        };
        if dataset.add_neuron(neuron).is_err() {
            return Err(SceneXmlError::DuplicateGid { gid: entry.gid });
        }
    }

    Ok(dataset)
}

fn parse_morphologies(
    scanner: &mut Scanner<'_>,
    swc_paths: &mut BTreeMap<u32, String>,
) -> Result<(), SceneXmlError> {
    loop {
        match scanner.next_token()? {
            Some(Token::Open {
                name,
                attrs,
                self_closing,
            }) if name == "morphology" => {
                let id = parse_u32(require_attr(&attrs, "morphology", "id")?)?;
                let swc = require_attr(&attrs, "morphology", "swc")?.to_string();
                if swc_paths.insert(id, swc).is_some() {
                    return Err(SceneXmlError::DuplicateMorphologyId { id });
                }
                if !self_closing {
                    skip_subtree(scanner, "morphology")?;
                }
            }
            Some(Token::Close { name }) if name == "morphologies" => return Ok(()),
            Some(Token::Text(_)) => {}
            Some(_) => return Err(malformed("unexpected content in <morphologies>")),
            None => return Err(malformed("unterminated <morphologies>")),
        }
    }
}

fn parse_neurons(
    scanner: &mut Scanner<'_>,
    entries: &mut Vec<NeuronEntry>,
) -> Result<(), SceneXmlError> {
    loop {
        match scanner.next_token()? {
            Some(Token::Open {
                name,
                attrs,
                self_closing,
            }) if name == "neuron" => {
                let gid = parse_u32(require_attr(&attrs, "neuron", "gid")?)?;
                let morphology = parse_u32(require_attr(&attrs, "neuron", "morphology")?)?;
                let layer = match attr(&attrs, "layer") {
                    Some(text) => match text.trim().parse::<u8>() {
                        Ok(layer @ 1..=6) => layer,
                        _ => {
                            tracing::warn!(gid, layer = %text, "Ignoring invalid layer");
                            0
                        }
                    },
                    None => 0,
                };
                let morphological_type = match attr(&attrs, "type") {
                    Some(text) => MorphologicalType::parse(text).unwrap_or_else(|| {
                        tracing::warn!(gid, kind = %text, "Ignoring unknown morphological type");
                        MorphologicalType::Undefined
                    }),
                    None => MorphologicalType::Undefined,
                };
                let functional_type = match attr(&attrs, "function") {
                    Some(text) => FunctionalType::parse(text).unwrap_or_else(|| {
                        tracing::warn!(gid, kind = %text, "Ignoring unknown functional type");
                        FunctionalType::Undefined
                    }),
                    None => FunctionalType::Undefined,
                };

                let transform = if self_closing {
                    Mat4::IDENTITY
                } else {
                    parse_neuron_body(scanner)?
                };

                entries.push(NeuronEntry {
                    gid,
                    morphology,
                    layer,
                    morphological_type,
                    functional_type,
                    transform,
                });
            }
            Some(Token::Close { name }) if name == "neurons" => return Ok(()),
            Some(Token::Text(_)) => {}
            Some(_) => return Err(malformed("unexpected content in <neurons>")),
            None => return Err(malformed("unterminated <neurons>")),
        }
    }
}

fn parse_neuron_body(scanner: &mut Scanner<'_>) -> Result<Mat4, SceneXmlError> {
    let mut transform = Mat4::IDENTITY;
    loop {
        match scanner.next_token()? {
            Some(Token::Open {
                name, self_closing, ..
            }) if name == "transform" => {
                if self_closing {
                    continue;
                }
                let text = match scanner.next_token()? {
                    Some(Token::Text(text)) => text,
                    Some(Token::Close { name }) if name == "transform" => continue,
                    _ => return Err(malformed("expected text inside <transform>")),
                };
                transform = parse_transform(&text)?;
                match scanner.next_token()? {
                    Some(Token::Close { name }) if name == "transform" => {}
                    _ => return Err(malformed("missing </transform>")),
                }
            }
            Some(Token::Open {
                name, self_closing, ..
            }) => {
                tracing::warn!(tag = %name, "Skipping unknown neuron element");
                if !self_closing {
                    skip_subtree(scanner, &name)?;
                }
            }
            Some(Token::Close { name }) if name == "neuron" => return Ok(transform),
            Some(Token::Text(_)) => {}
            Some(Token::Close { name }) => {
                return Err(malformed(&format!("unexpected </{name}> in <neuron>")))
            }
            None => return Err(malformed("unterminated <neuron>")),
        }
    }
}

/// 16 comma-separated floats, column-major.
fn parse_transform(text: &str) -> Result<Mat4, SceneXmlError> {
    let mut values = [0.0f32; 16];
    let mut count = 0usize;
    for field in text.split(',') {
        let value = field.trim().parse::<f32>().map_err(|_| {
            malformed(&format!("cannot parse transform component {field:?}"))
        })?;
        if count >= 16 {
            return Err(malformed("transform has more than 16 components"));
        }
        values[count] = value;
        count += 1;
    }
    if count != 16 {
        return Err(malformed(&format!(
            "transform has {count} components, expected 16"
        )));
    }
    Ok(Mat4::from_cols_array(&values))
}

fn parse_u32(text: &str) -> Result<u32, SceneXmlError> {
    text.trim()
        .parse::<u32>()
        .map_err(|_| malformed(&format!("cannot parse integer from {text:?}")))
}

pub fn load_xml_scene(path: &Path) -> Result<Dataset, SceneXmlError> {
    let source = std::fs::read_to_string(path).map_err(|err| SceneXmlError::Read {
        path: path.display().to_string(),
        message: err.to_string(),
    })?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut dataset = parse_xml_scene(&source, base_dir)?;
    dataset.source = Some(path.to_path_buf());
    tracing::info!(
        path = %path.display(),
        neurons = dataset.len(),
        morphologies = dataset.morphologies.len(),
        "Loaded XML scene"
    );
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    const CELL: &str = "1 1 0 0 0 2.0 -1\n2 3 0 4 0 1.0 1\n";

    fn write_scene(dir_name: &str, scene: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(dir_name);
        std::fs::create_dir_all(&dir).expect("temp dir");
        std::fs::write(dir.join("cell.swc"), CELL).expect("write swc");
        let path = dir.join("scene.xml");
        std::fs::write(&path, scene).expect("write scene");
        path
    }

    #[test]
    fn two_instances_share_one_morphology() {
        let path = write_scene(
            "morpho_xml_share_test",
            r#"<?xml version="1.0"?>
<scene version="0.1">
  <!-- one definition, two placements -->
  <morphologies>
    <morphology id="0" swc="cell.swc"/>
  </morphologies>
  <neurons>
    <neuron gid="1" morphology="0" layer="2" type="PYRAMIDAL" function="EXCITATORY">
      <transform>1,0,0,0, 0,1,0,0, 0,0,1,0, 10,0,0,1</transform>
    </neuron>
    <neuron gid="2" morphology="0"/>
  </neurons>
</scene>
"#,
        );

        let dataset = load_xml_scene(&path).expect("load");
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.morphologies.len(), 1);

        let first = &dataset.neurons[&1];
        let second = &dataset.neurons[&2];
        assert!(Arc::ptr_eq(&first.morphology, &second.morphology));
        assert_eq!(first.layer, 2);
        assert_eq!(first.morphological_type, MorphologicalType::Pyramidal);
        assert_eq!(first.functional_type, FunctionalType::Excitatory);
        assert_eq!(
            first.transform.transform_point3(Vec3::ZERO),
            Vec3::new(10.0, 0.0, 0.0)
        );
        assert_eq!(second.transform, Mat4::IDENTITY);
        assert_eq!(second.layer, 0);
    }

    #[test]
    fn unknown_morphology_reference_fails() {
        let path = write_scene(
            "morpho_xml_unknown_test",
            r#"<scene>
  <morphologies><morphology id="0" swc="cell.swc"/></morphologies>
  <neurons><neuron gid="1" morphology="3"/></neurons>
</scene>"#,
        );
        let err = load_xml_scene(&path).unwrap_err();
        assert!(matches!(
            err,
            SceneXmlError::UnknownMorphology {
                gid: 1,
                morphology: 3
            }
        ));
    }

    #[test]
    fn duplicate_gid_fails() {
        let path = write_scene(
            "morpho_xml_dup_test",
            r#"<scene>
  <morphologies><morphology id="0" swc="cell.swc"/></morphologies>
  <neurons>
    <neuron gid="1" morphology="0"/>
    <neuron gid="1" morphology="0"/>
  </neurons>
</scene>"#,
        );
        let err = load_xml_scene(&path).unwrap_err();
        assert!(matches!(err, SceneXmlError::DuplicateGid { gid: 1 }));
    }

    #[test]
    fn short_transform_fails() {
        let path = write_scene(
            "morpho_xml_transform_test",
            r#"<scene>
  <morphologies><morphology id="0" swc="cell.swc"/></morphologies>
  <neurons>
    <neuron gid="1" morphology="0"><transform>1,2,3</transform></neuron>
  </neurons>
</scene>"#,
        );
        let err = load_xml_scene(&path).unwrap_err();
        match err {
            SceneXmlError::Malformed { message } => assert!(message.contains("expected 16")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn missing_swc_reports_swc_error() {
        let path = write_scene(
            "morpho_xml_missing_swc_test",
            r#"<scene>
  <morphologies><morphology id="0" swc="absent.swc"/></morphologies>
  <neurons><neuron gid="1" morphology="0"/></neurons>
</scene>"#,
        );
        let err = load_xml_scene(&path).unwrap_err();
        match err {
            SceneXmlError::Swc { path, .. } => assert!(path.contains("absent.swc")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn missing_required_attribute_fails() {
        let err = parse_xml_scene(
            r#"<scene><morphologies><morphology swc="cell.swc"/></morphologies></scene>"#,
            Path::new("."),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SceneXmlError::MissingAttribute { .. }
        ));
    }

    #[test]
    fn unknown_elements_are_skipped() {
        let dataset = parse_xml_scene(
            r#"<scene><circuit><projection target="x"/></circuit></scene>"#,
            Path::new("."),
        )
        .expect("parse");
        assert!(dataset.is_empty());
    }

    #[test]
    fn unterminated_tag_fails() {
        let err = parse_xml_scene("<scene><neurons>", Path::new(".")).unwrap_err();
        assert!(matches!(err, SceneXmlError::Malformed { .. }));
    }
}
