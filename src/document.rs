use html5ever::serialize::{serialize, SerializeOpts};
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::{parse_document, Attribute, LocalName, Namespace, ParseOpts, QualName};
use markup5ever_rcdom::{Handle, NodeData, RcDom, SerializableHandle};

use crate::error::MirrorError;

/// Stable index of an element in [`HtmlDocument`]'s node table.
pub type NodeId = usize;

/// A parsed document plus a flat table of its element nodes in document
/// order. Extraction hands out [`NodeId`]s; rewriting looks them up and
/// mutates attributes in place, so nothing is mutated while the tree is
/// being walked.
pub struct HtmlDocument {
    dom: RcDom,
    elements: Vec<Handle>,
}

impl HtmlDocument {
    pub fn parse(html: &str) -> Self {
        let dom = parse_document(RcDom::default(), ParseOpts::default()).one(html);

        let mut elements = Vec::new();
        collect_elements(&dom.document, &mut elements);

        Self { dom, elements }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn node_ids(&self) -> std::ops::Range<NodeId> {
        0..self.elements.len()
    }

    /// Local tag name, lower-cased by the parser.
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match &self.elements.get(id)?.data {
            NodeData::Element { name, .. } => Some(&*name.local),
            _ => None,
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<String> {
        match &self.elements.get(id)?.data {
            NodeData::Element { attrs, .. } => attrs
                .borrow()
                .iter()
                .find(|a| &*a.name.local == name)
                .map(|a| a.value.to_string()),
            _ => None,
        }
    }

    /// Sets `name` on the element, appending the attribute when absent.
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        let Some(NodeData::Element { attrs, .. }) = self.elements.get(id).map(|h| &h.data) else {
            return;
        };

        let mut attrs = attrs.borrow_mut();
        if let Some(attr) = attrs.iter_mut().find(|a| &*a.name.local == name) {
            attr.value = StrTendril::from_slice(value);
        } else {
            attrs.push(Attribute {
                name: QualName::new(None, Namespace::from(""), LocalName::from(name)),
                value: StrTendril::from_slice(value),
            });
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> bool {
        let Some(NodeData::Element { attrs, .. }) = self.elements.get(id).map(|h| &h.data) else {
            return false;
        };

        let mut attrs = attrs.borrow_mut();
        let before = attrs.len();
        attrs.retain(|a| &*a.name.local != name);
        attrs.len() != before
    }

    pub fn to_html(&self) -> Result<String, MirrorError> {
        let document: SerializableHandle = self.dom.document.clone().into();
        let mut out = Vec::new();
        serialize(&mut out, &document, SerializeOpts::default()).map_err(MirrorError::Serialize)?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}

fn collect_elements(node: &Handle, out: &mut Vec<Handle>) {
    if let NodeData::Element { .. } = node.data {
        out.push(node.clone());
    }
    for child in node.children.borrow().iter() {
        collect_elements(child, out);
    }
}
