use crate::diagnostic::Diagnostic;
use crate::svg::{NodeId, NodeKind, SvgTree};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// JSON snapshot of a converted tree, for inspecting what the converter
/// made of a document.
#[derive(Debug, Serialize)]
pub struct TreeDump {
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub view_box: Option<[f64; 4]>,
    pub diagnostics: Vec<Diagnostic>,
    pub root: Option<NodeDump>,
}

#[derive(Debug, Serialize)]
pub struct NodeDump {
    pub name: String,
    pub tag: String,
    pub line: usize,
    pub kind: String,
    pub attributes: BTreeMap<String, String>,
    pub transform: [f64; 6],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_data: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub gradients: Vec<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeDump>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub affected: Vec<NodeDump>,
}

impl TreeDump {
    pub fn from_tree(tree: &SvgTree) -> Self {
        let mut diagnostics = tree.diagnostics().to_vec();
        diagnostics.sort();
        TreeDump {
            width: tree.width(),
            height: tree.height(),
            view_box: tree.view_box(),
            diagnostics,
            root: tree.root().map(|root| NodeDump::from_node(tree, root)),
        }
    }
}

impl NodeDump {
    fn from_node(tree: &SvgTree, id: NodeId) -> Self {
        let node = tree.node(id);
        let m = node.stacked_transform;
        let mut dump = NodeDump {
            name: node.name.clone(),
            tag: node.tag.clone(),
            line: node.line,
            kind: node.kind.label().to_string(),
            attributes: node.attributes.clone(),
            transform: [m.m00, m.m10, m.m01, m.m11, m.m02, m.m12],
            path_data: None,
            gradients: Vec::new(),
            children: node
                .kind
                .children()
                .iter()
                .map(|child| NodeDump::from_node(tree, *child))
                .collect(),
            affected: Vec::new(),
        };
        match &node.kind {
            NodeKind::Leaf(leaf) => {
                dump.path_data = leaf.path_data.clone();
                dump.gradients = [leaf.fill_gradient, leaf.stroke_gradient]
                    .into_iter()
                    .flatten()
                    .map(|gradient| gradient_dump(tree, gradient))
                    .collect();
            }
            NodeKind::ClipPath(clip) => {
                dump.affected = clip
                    .affected
                    .iter()
                    .map(|node| NodeDump::from_node(tree, *node))
                    .collect();
            }
            NodeKind::Group(_) | NodeKind::Gradient(_) => {}
        }
        dump
    }
}

fn gradient_dump(tree: &SvgTree, id: NodeId) -> BTreeMap<String, String> {
    let mut attributes = BTreeMap::new();
    if let NodeKind::Gradient(gradient) = &tree.node(id).kind {
        attributes.insert("usage".to_string(), format!("{:?}", gradient.usage));
        for (name, value) in &gradient.output {
            attributes.insert(name.to_string(), value.clone());
        }
        attributes.insert("stops".to_string(), gradient.stops.len().to_string());
    }
    attributes
}

pub fn write_tree_dump(path: &Path, tree: &SvgTree) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let dump = TreeDump::from_tree(tree);
    serde_json::to_writer_pretty(writer, &dump)?;
    Ok(())
}
