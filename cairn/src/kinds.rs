//! The kinds this tool knows about. The store itself has no opinion on kinds, these only matter
//! when `strict_kinds` is on.

use cairn_core::{AssetKind, AssetType, KindRegistry, KindSchema, ValueType};

/// One frame of vertex animation.
pub struct Frame;
impl AssetType for Frame {
    const KIND: AssetKind = AssetKind::from_static("frame");
}
/// An animation. Its frames live below it.
pub struct Anim;
impl AssetType for Anim {
    const KIND: AssetKind = AssetKind::from_static("anim");
}
pub struct Mesh;
impl AssetType for Mesh {
    const KIND: AssetKind = AssetKind::from_static("mesh");
}
/// A mesh paired with an animation.
pub struct Model;
impl AssetType for Model {
    const KIND: AssetKind = AssetKind::from_static("model");
}
/// Opaque data, kept around for other tools.
pub struct Raw;
impl AssetType for Raw {
    const KIND: AssetKind = AssetKind::from_static("raw");
}

#[must_use]
pub fn registry() -> KindRegistry {
    KindRegistry::new()
        .with(
            KindSchema::new(Frame::KIND, "one frame of vertex positions")
                .field("index", ValueType::Int)
                .field("time", ValueType::Float)
                .field("vertices", ValueType::List),
        )
        .with(
            KindSchema::new(Anim::KIND, "frames, stored below it")
                .field("fps", ValueType::Float)
                .field("looping", ValueType::Bool)
                .field("frame_count", ValueType::Int),
        )
        .with(
            KindSchema::new(Mesh::KIND, "indexed triangle mesh")
                .field("name", ValueType::Text)
                .field("vertices", ValueType::List)
                .field("indices", ValueType::List)
                .field("colors", ValueType::Int),
        )
        .with(
            KindSchema::new(Model::KIND, "a mesh and the animation driving it")
                .field("name", ValueType::Text)
                .field("mesh", ValueType::Path)
                .field("anim", ValueType::Path),
        )
        .with(
            KindSchema::new(Raw::KIND, "opaque bytes")
                .field("data", ValueType::Bytes)
                .field("source", ValueType::Text),
        )
}
