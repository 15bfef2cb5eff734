//! # State
//!
//! The asset graph of a project: an ordered map from path to asset. Storage is copy-on-write, so a
//! [`Snapshot`] taken at any point stays valid and unchanged no matter what is committed afterwards.
//!
//! The graph is never written directly - changes are staged with [`Staging`] and committed as one [`Changeset`].

mod staging;

use std::collections::BTreeMap;
use std::sync::Arc;

pub use staging::{Changeset, Staging};

use crate::asset::{Asset, AssetKind, AssetView};
use crate::path::AssetPath;
use crate::registry::KindRegistry;

pub(crate) type Assets = BTreeMap<AssetPath, Arc<Asset>>;

#[derive(Clone, Default)]
pub(crate) struct AssetGraph {
    assets: Arc<Assets>,
}
impl AssetGraph {
    pub fn get(&self, path: &AssetPath) -> Option<&Arc<Asset>> {
        self.assets.get(path)
    }
    /// Begin staging changes on top of the current state.
    pub fn stage<'g>(&'g self, registry: Option<&'g KindRegistry>) -> Staging<'g> {
        Staging::new(&self.assets, registry)
    }
    /// Write the net result of a staging session. Cannot fail - everything was checked while staging.
    pub fn commit(&mut self, changeset: &Changeset) {
        // Clones the map if a snapshot is still holding the old one.
        let assets = Arc::make_mut(&mut self.assets);
        for (path, slot) in changeset.writes() {
            match slot {
                Some(asset) => {
                    assets.insert(path.clone(), asset.clone());
                }
                None => {
                    assets.remove(path);
                }
            }
        }
    }
    pub fn snapshot(&self, revision: u64) -> Snapshot {
        Snapshot {
            assets: self.assets.clone(),
            revision,
        }
    }
}

/// Iterate the entry at `root` and every entry below it, in path order.
pub(crate) fn within<'m, V>(map: &'m BTreeMap<AssetPath, V>, root: &AssetPath) -> Within<'m, V> {
    let prefix = root.descendant_prefix();
    let below = map.range::<str, _>((
        std::ops::Bound::Included(prefix.as_str()),
        std::ops::Bound::Unbounded,
    ));
    Within {
        exact: map.get_key_value(root),
        below: Some(below),
        prefix,
    }
}

/// See [`within`]. The descendants of a path are contiguous in string order,
/// so the walk ends at the first key without the prefix.
pub(crate) struct Within<'m, V> {
    exact: Option<(&'m AssetPath, &'m V)>,
    below: Option<std::collections::btree_map::Range<'m, AssetPath, V>>,
    prefix: String,
}
impl<'m, V> Iterator for Within<'m, V> {
    type Item = (&'m AssetPath, &'m V);
    fn next(&mut self) -> Option<Self::Item> {
        if let Some(exact) = self.exact.take() {
            return Some(exact);
        }
        let next = self.below.as_mut()?.next();
        match next {
            Some((path, value)) if path.as_str().starts_with(&self.prefix) => Some((path, value)),
            _ => {
                self.below = None;
                None
            }
        }
    }
}

/// The whole asset graph as it was at one revision.
#[derive(Clone)]
pub struct Snapshot {
    assets: Arc<Assets>,
    revision: u64,
}
impl Snapshot {
    /// The project revision this snapshot was taken at.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }
    #[must_use]
    pub fn get(&self, path: &AssetPath) -> Option<AssetView> {
        self.assets
            .get(path)
            .map(|asset| AssetView::new(path.clone(), asset.clone()))
    }
    #[must_use]
    pub fn contains(&self, path: &AssetPath) -> bool {
        self.assets.contains_key(path)
    }
    /// The asset at `path`, only if it is of `kind`.
    #[must_use]
    pub fn resolve(&self, path: &AssetPath, kind: &AssetKind) -> Option<AssetView> {
        self.get(path).filter(|view| view.kind() == kind)
    }
    #[must_use]
    pub fn len(&self) -> usize {
        self.assets.len()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
    /// Every asset, in path order.
    pub fn iter(&self) -> impl Iterator<Item = AssetView> + '_ {
        self.assets
            .iter()
            .map(|(path, asset)| AssetView::new(path.clone(), asset.clone()))
    }
    /// The asset at `prefix` (if any) and every asset below it, in path order.
    #[must_use]
    pub fn under(&self, prefix: &AssetPath) -> ListingIter<'_> {
        ListingIter {
            inner: within(&self.assets, prefix),
        }
    }
    /// The immediate child slots of `parent` (or the top-level slots, for `None`) that hold an asset
    /// or have one somewhere below them.
    #[must_use]
    pub fn children(&self, parent: Option<&AssetPath>) -> Vec<AssetPath> {
        let mut children = std::collections::BTreeSet::new();
        let mut note = |path: &AssetPath, depth: usize| {
            // Cut the path down to `depth` segments.
            let mut segments = path.segments().take(depth);
            let mut text = String::new();
            if let Some(first) = segments.next() {
                text.push_str(first);
            }
            for segment in segments {
                text.push(crate::path::SEPARATOR);
                text.push_str(segment);
            }
            if let Ok(child) = AssetPath::parse(&text) {
                children.insert(child);
            }
        };
        match parent {
            None => self.assets.keys().for_each(|path| note(path, 1)),
            Some(parent) => {
                let depth = parent.depth() + 1;
                within(&self.assets, parent)
                    .filter(|(path, _)| *path != parent)
                    .for_each(|(path, _)| note(path, depth));
            }
        }
        children.into_iter().collect()
    }
}
/// Compares content only, not the revision.
impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.assets, &other.assets) || self.assets == other.assets
    }
}
impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("revision", &self.revision)
            .field("assets", &self.assets.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Borrowed iteration over part of a snapshot. See [`Snapshot::under`] and [`Listing`].
pub struct ListingIter<'s> {
    inner: Within<'s, Arc<Asset>>,
}
impl Iterator for ListingIter<'_> {
    type Item = AssetView;
    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .next()
            .map(|(path, asset)| AssetView::new(path.clone(), asset.clone()))
    }
}

/// Everything at and below a prefix, as of one revision. Iterating is lazy and may be repeated;
/// later transactions are never reflected.
#[derive(Clone, Debug)]
pub struct Listing {
    snapshot: Snapshot,
    prefix: AssetPath,
}
impl Listing {
    pub(crate) fn new(snapshot: Snapshot, prefix: AssetPath) -> Self {
        Self { snapshot, prefix }
    }
    #[must_use]
    pub fn prefix(&self) -> &AssetPath {
        &self.prefix
    }
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.snapshot.revision
    }
    #[must_use]
    pub fn iter(&self) -> ListingIter<'_> {
        self.snapshot.under(&self.prefix)
    }
}
impl<'l> IntoIterator for &'l Listing {
    type Item = AssetView;
    type IntoIter = ListingIter<'l>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
