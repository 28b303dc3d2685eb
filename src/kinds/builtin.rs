//! Kinds every document starts with.
//!
//! A `split` expands into two synthetic children: an icon marker and an
//! inline container whose children are the declared branches.

use super::{CreateContext, KindMeta, KindRegistration, MetaNumber};
use crate::ir::{ChildRecord, NodeRecord};
use crate::layout::{Padding, Size};

pub const ROOT: &str = "root";
pub const START: &str = "start";
pub const END: &str = "end";
pub const BLOCK: &str = "block";
pub const ICON: &str = "icon";
pub const INLINE_BLOCKS: &str = "inlineBlocks";
pub const SPLIT: &str = "split";
pub const DYNAMIC_SPLIT: &str = "dynamicSplit";
pub const DYNAMIC_SPLIT_ICON: &str = "dynamicSplitIcon";

/// Child-registry keys understood by the split template.
pub const ICON_KEY: &str = "icon";
pub const CONTAINER_KEY: &str = "container";
pub const BRANCH_KEY: &str = "branch";

/// Kind used for records that do not name one.
pub const DEFAULT_KIND: &str = BLOCK;

pub fn synthetic_id(key: &str, owner: &str) -> String {
    format!("${key}${owner}")
}

pub fn registrations() -> Vec<KindRegistration> {
    vec![
        KindRegistration::new(ROOT).meta(KindMeta {
            addable: Some(false.into()),
            expandable: Some(false.into()),
            draggable: Some(false.into()),
            selectable: Some(false.into()),
            is_container: Some(true),
            padding: Some(Padding::ZERO),
            ..Default::default()
        }),
        KindRegistration::new(START),
        KindRegistration::new(END).meta(KindMeta {
            terminal: Some(true),
            ..Default::default()
        }),
        KindRegistration::new(BLOCK).meta(KindMeta {
            is_container: Some(true),
            padding: Some(Padding::new(0.0, 20.0, 0.0, 20.0)),
            ..Default::default()
        }),
        KindRegistration::new(ICON).meta(KindMeta {
            size: Some(Size::new(40.0, 40.0)),
            marker: Some(true),
            draggable: Some(false.into()),
            ..Default::default()
        }),
        KindRegistration::new(INLINE_BLOCKS).meta(KindMeta {
            is_container: Some(true),
            is_inline_blocks: Some(true),
            spacing: Some(MetaNumber::Value(0.0)),
            selectable: Some(false.into()),
            ..Default::default()
        }),
        KindRegistration::new(SPLIT)
            .meta(KindMeta {
                is_container: Some(true),
                spacing: Some(MetaNumber::Value(0.0)),
                ..Default::default()
            })
            .on_create(split_children)
            .on_block_child_create(branch_child),
        KindRegistration::new(DYNAMIC_SPLIT_ICON).extend(ICON),
        KindRegistration::new(DYNAMIC_SPLIT)
            .extend(SPLIT)
            .child_registry(ICON_KEY, DYNAMIC_SPLIT_ICON),
    ]
}

fn split_children(ctx: &CreateContext<'_>) -> Option<Vec<NodeRecord>> {
    let owner = ctx.id();
    let icon = NodeRecord::synthetic(synthetic_id(ICON_KEY, owner), ctx.child_kind(ICON_KEY, ICON));
    let mut container = NodeRecord::synthetic(
        synthetic_id(CONTAINER_KEY, owner),
        ctx.child_kind(CONTAINER_KEY, INLINE_BLOCKS),
    );
    container.children = ctx
        .declared_children()
        .into_iter()
        .map(ChildRecord::Node)
        .collect();
    Some(vec![icon, container])
}

fn branch_child(ctx: &CreateContext<'_>, mut record: NodeRecord) -> NodeRecord {
    if record.kind.is_none() {
        record.kind = Some(ctx.child_kind(BRANCH_KEY, BLOCK));
    }
    record
}
