use thiserror::Error;
use xmltree::{Element, XMLNode};

pub const WFS_NAMESPACE: &str = "http://www.opengis.net/wfs/2.0";
const ROOT_ELEMENT: &str = "FeatureCollection";
const MEMBER_ELEMENT: &str = "member";
const RECORD_ELEMENT: &str = "BsWfsElement";

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("payload is not well-formed XML: {0}")]
    Xml(#[from] xmltree::ParseError),

    #[error("unexpected root element {found}, expected wfs:FeatureCollection")]
    UnexpectedRoot { found: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureCollection {
    /// Server-side generation time; informational only.
    pub time_stamp: Option<String>,
    pub members: Vec<ObservationRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservationRecord {
    pub time: String,
    pub parameter_name: String,
    pub parameter_value: String,
}

pub fn decode(payload: &[u8]) -> Result<FeatureCollection, EnvelopeError> {
    let root = Element::parse(payload)?;

    if root.name != ROOT_ELEMENT || root.namespace.as_deref() != Some(WFS_NAMESPACE) {
        let found = match &root.namespace {
            Some(ns) => format!("{{{ns}}}{}", root.name),
            None => root.name.clone(),
        };
        return Err(EnvelopeError::UnexpectedRoot { found });
    }

    let members = root
        .children
        .iter()
        .filter_map(XMLNode::as_element)
        .filter(|el| el.name == MEMBER_ELEMENT)
        .flat_map(|member| member.children.iter().filter_map(XMLNode::as_element))
        .filter(|el| el.name == RECORD_ELEMENT)
        .map(|el| ObservationRecord {
            time: child_text(el, "Time"),
            parameter_name: child_text(el, "ParameterName"),
            parameter_value: child_text(el, "ParameterValue"),
        })
        .collect();

    Ok(FeatureCollection {
        time_stamp: root.attributes.get("timeStamp").cloned(),
        members,
    })
}

fn child_text(el: &Element, name: &str) -> String {
    el.get_child(name)
        .and_then(|c| c.get_text())
        .map(|t| t.into_owned())
        .unwrap_or_default()
}
