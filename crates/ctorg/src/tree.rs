//! subtree discovery
//!
//! The service only exposes pointers: every node knows the url of its parent and the urls
//! of its direct children. [build_subtree] chases the child pointers from one root and
//! collects the whole subtree in pre-order (a parent always before its children, the first
//! child's subtree before the next sibling).
//!
//! The walk is iterative. A node seen twice or a tree deeper than the limit means the remote
//! data is not the forest it claims to be and the walk stops with
//! [Error::MalformedTree].
use crate::client::ResourceClient;
use crate::error::Error;
use crate::resource::{Hierarchy, HierarchicalResource};
use indexmap::IndexMap;

/// Deepest level accepted below a root
pub const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone)]
pub struct Node {
    pub resource: HierarchicalResource,
    /// 0 for the root
    pub depth: usize,
}

/// Nodes of one subtree in discovery (pre-)order, keyed by url
#[derive(Debug, Clone, Default)]
pub struct Subtree {
    nodes: IndexMap<String, Node>,
}

impl Subtree {
    pub fn root(&self) -> Option<&HierarchicalResource> {
        self.nodes.first().map(|(_url, node)| &node.resource)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.nodes.contains_key(url)
    }

    /// Pre-order
    pub fn nodes(&self) -> impl DoubleEndedIterator<Item = &Node> {
        self.nodes.values()
    }

    /// Pre-order
    pub fn resources(&self) -> impl DoubleEndedIterator<Item = &HierarchicalResource> {
        self.nodes().map(|node| &node.resource)
    }

    /// Reverse pre-order: every node comes after all of its descendants
    pub fn deletion_order(&self) -> impl Iterator<Item = &HierarchicalResource> {
        self.resources().rev()
    }

    pub fn names(&self) -> Vec<&str> {
        self.resources().map(|r| r.name.as_str()).collect()
    }
}

/// Looks up `name` and walks its subtree
pub fn find_subtree(
    client: &(impl ResourceClient + ?Sized),
    hierarchy: Hierarchy,
    name: &str,
) -> Result<Subtree, Error> {
    let Some(root) = client.get_by_name(hierarchy, name)? else {
        return Err(Error::not_found(hierarchy.into(), name));
    };

    build_subtree(client, root)
}

pub fn build_subtree(
    client: &(impl ResourceClient + ?Sized),
    root: HierarchicalResource,
) -> Result<Subtree, Error> {
    build_subtree_with_limit(client, root, MAX_DEPTH)
}

enum Pending {
    Fetched(HierarchicalResource),
    Child { url: String, parent: String },
}

#[tracing::instrument(level = "debug", skip_all, fields(root = %root.name))]
pub fn build_subtree_with_limit(
    client: &(impl ResourceClient + ?Sized),
    root: HierarchicalResource,
    max_depth: usize,
) -> Result<Subtree, Error> {
    let hierarchy = root.hierarchy;
    let root_name = root.name.clone();
    let malformed = |reason: String| Error::MalformedTree {
        root: root_name.clone(),
        reason,
    };

    let mut subtree = Subtree::default();
    // top of the stack is visited next
    let mut stack = vec![(Pending::Fetched(root), 0)];

    while let Some((pending, depth)) = stack.pop() {
        let resource = match pending {
            Pending::Fetched(resource) => resource,
            Pending::Child { url, parent } => {
                if subtree.contains(&url) {
                    return Err(malformed(format!("{url} is reachable more than once")));
                }

                let child = client.get_by_url(hierarchy, &url)?;
                if child.parent_ref.as_deref() != Some(parent.as_str()) {
                    tracing::warn!(
                        child = %child.name,
                        %parent,
                        declared_parent = ?child.parent_ref,
                        "child does not point back to its parent"
                    );
                }
                child
            }
        };

        if subtree.contains(&resource.url) {
            return Err(malformed(format!(
                "{} is reachable more than once",
                resource.url
            )));
        }

        if !resource.is_leaf() && depth >= max_depth {
            return Err(malformed(format!(
                "{} has children below the depth limit of {max_depth}",
                resource.name
            )));
        }

        tracing::trace!(
            name = %resource.name,
            depth,
            children = resource.child_refs.len(),
            "discovered"
        );

        for url in resource.child_refs.iter().rev() {
            stack.push((
                Pending::Child {
                    url: url.clone(),
                    parent: resource.url.clone(),
                },
                depth + 1,
            ));
        }

        subtree
            .nodes
            .insert(resource.url.clone(), Node { resource, depth });
    }

    tracing::debug!(nodes = subtree.len(), "subtree complete");
    Ok(subtree)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::client::ClientError;
    use crate::memory::{Call, MemoryService};
    use pretty_assertions::assert_eq;

    /// a -> [b, c], b -> [d]
    fn abcd() -> (MemoryService, HierarchicalResource) {
        let service = MemoryService::new();
        let a = service.add_project("a", None);
        let b = service.add_project("b", Some(&a));
        service.add_project("c", Some(&a));
        service.add_project("d", Some(&b));
        let a = service.node(&a.url).unwrap();
        (service, a)
    }

    #[test]
    fn pre_order() {
        let (service, a) = abcd();
        let subtree = build_subtree(&service, a).unwrap();

        assert_eq!(subtree.names(), vec!["a", "b", "d", "c"]);
        let depths: Vec<_> = subtree.nodes().map(|node| node.depth).collect();
        assert_eq!(depths, vec![0, 1, 2, 1]);
    }

    #[test]
    fn deletion_order_is_reverse() {
        let (service, a) = abcd();
        let subtree = build_subtree(&service, a).unwrap();

        let order: Vec<_> = subtree.deletion_order().map(|r| r.name.as_str()).collect();
        assert_eq!(order, vec!["c", "d", "b", "a"]);
    }

    #[test]
    fn leaf_is_single_node() {
        let service = MemoryService::new();
        let leaf = service.add_environment("leaf", None);

        let subtree = build_subtree(&service, leaf.clone()).unwrap();
        assert_eq!(subtree.len(), 1);
        assert_eq!(subtree.root(), Some(&leaf));
        assert!(service.calls().is_empty());
    }

    #[test]
    fn one_read_per_child() {
        let (service, a) = abcd();
        build_subtree(&service, a).unwrap();

        let reads = service
            .calls()
            .iter()
            .filter(|call| matches!(call, Call::Get(_)))
            .count();
        assert_eq!(reads, 3);
    }

    #[test]
    fn cycle_is_malformed() {
        let (service, a) = abcd();
        let d = service
            .get_by_name(Hierarchy::Project, "d")
            .unwrap()
            .unwrap();
        service.set_children(&d.url, &[&a.url]);

        let error = build_subtree(&service, a).unwrap_err();
        assert!(matches!(error, Error::MalformedTree { .. }), "{error}");
    }

    #[test]
    fn shared_child_is_malformed() {
        let (service, a) = abcd();
        let b = service.get_by_name(Hierarchy::Project, "b").unwrap().unwrap();
        let c = service.get_by_name(Hierarchy::Project, "c").unwrap().unwrap();
        service.set_children(&c.url, &[&b.child_refs[0]]);

        let error = build_subtree(&service, a).unwrap_err();
        assert!(matches!(error, Error::MalformedTree { .. }), "{error}");
    }

    #[test]
    fn depth_limit() {
        let service = MemoryService::new();
        let root = service.add_project("level-0", None);
        let mut parent = root.clone();
        for level in 1..=3 {
            parent = service.add_project(&format!("level-{level}"), Some(&parent));
        }
        let root = service.node(&root.url).unwrap();

        assert_eq!(
            build_subtree_with_limit(&service, root.clone(), 3)
                .unwrap()
                .len(),
            4
        );

        let error = build_subtree_with_limit(&service, root, 2).unwrap_err();
        assert!(matches!(error, Error::MalformedTree { .. }), "{error}");
    }

    #[test]
    fn inconsistent_parent_is_still_included() {
        let service = MemoryService::new();
        let a = service.add_project("a", None);
        let stray = service.add_project("stray", None);
        service.set_children(&a.url, &[&stray.url]);
        let a = service.node(&a.url).unwrap();

        let subtree = build_subtree(&service, a).unwrap();
        assert_eq!(subtree.names(), vec!["a", "stray"]);
    }

    #[test]
    fn dangling_child_aborts() {
        let service = MemoryService::new();
        let a = service.add_project("a", None);
        service.set_children(&a.url, &["mem://projects/404/"]);
        let a = service.node(&a.url).unwrap();

        let error = build_subtree(&service, a).unwrap_err();
        assert!(matches!(error, Error::Remote(ClientError::NotFound(_))));
    }

    #[test]
    fn find_missing_root() {
        let service = MemoryService::new();
        let error = find_subtree(&service, Hierarchy::Environment, "nope").unwrap_err();
        assert!(matches!(error, Error::NotFound(_)));
    }
}
