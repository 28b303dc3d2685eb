use crate::document::Document;
use crate::error::Result;
use crate::tree::FlowTree;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::ops::ControlFlow;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct LayoutDump {
    pub layout: String,
    pub width: f32,
    pub height: f32,
    pub nodes: Vec<NodeDump>,
}

#[derive(Debug, Serialize)]
pub struct NodeDump {
    pub id: String,
    pub kind: String,
    pub depth: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub input: [f32; 2],
    pub output: [f32; 2],
    pub collapsed: bool,
    pub synthetic: bool,
}

impl LayoutDump {
    /// Visible nodes in render order, as of the last refresh.
    pub fn from_document(document: &Document) -> Result<Self> {
        let geometry = document.geometry()?;
        let render = document.render();
        let mut nodes = Vec::new();
        let _ = render.index().traverse(render.root(), |key, depth, _| {
            let (Some(node), Some(bounds)) = (document.node_by_key(key), geometry.bounds(key)) else {
                return ControlFlow::Continue(());
            };
            let input = geometry.input_point(key).unwrap_or_default();
            let output = geometry.output_point(key).unwrap_or_default();
            nodes.push(NodeDump {
                id: node.id().to_string(),
                kind: node.kind().to_string(),
                depth,
                x: bounds.x,
                y: bounds.y,
                width: bounds.width,
                height: bounds.height,
                input: [input.x, input.y],
                output: [output.x, output.y],
                collapsed: render.is_collapsed(key),
                synthetic: node.is_synthetic(),
            });
            ControlFlow::Continue(())
        });

        let root = geometry.bounds(render.root()).unwrap_or_default();
        Ok(LayoutDump {
            layout: document.layout_key().to_string(),
            width: root.width,
            height: root.height,
            nodes,
        })
    }
}

pub fn write_layout_dump_to(writer: impl Write, document: &Document) -> anyhow::Result<()> {
    let dump = LayoutDump::from_document(document)?;
    serde_json::to_writer_pretty(writer, &dump)?;
    Ok(())
}

pub fn write_layout_dump(path: &Path, document: &Document) -> anyhow::Result<()> {
    let file = File::create(path)?;
    write_layout_dump_to(BufWriter::new(file), document)
}
