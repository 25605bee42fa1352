use std::sync::{PoisonError, RwLock};

const DEFAULT_SCHEME: &str = "http://";

/// A neighbor node, identified by its base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    addr: String,
}

impl Node {
    fn new(addr: String) -> Node {
        Node { addr }
    }

    pub fn get_addr(&self) -> &str {
        self.addr.as_str()
    }
}

/// `path` appended to a neighbor's base URL. Bare `host:port` addresses get
/// an `http://` scheme.
pub fn endpoint(addr: &str, path: &str) -> String {
    let base = addr.trim_end_matches('/');
    if base.contains("://") {
        format!("{base}{path}")
    } else {
        format!("{DEFAULT_SCHEME}{base}{path}")
    }
}

/// The ordered neighbor list. Insertion order is the order consensus
/// visits neighbors in.
pub struct Nodes {
    inner: RwLock<Vec<Node>>,
}

impl Default for Nodes {
    fn default() -> Self {
        Self::new()
    }
}

impl Nodes {
    pub fn new() -> Nodes {
        Nodes {
            inner: RwLock::new(vec![]),
        }
    }

    pub fn from_addrs<I: IntoIterator<Item = String>>(addrs: I) -> Nodes {
        let nodes = Nodes::new();
        nodes.replace(addrs);
        nodes
    }

    /// Replaces the whole list, dropping duplicates but keeping first-seen order.
    pub fn replace<I: IntoIterator<Item = String>>(&self, addrs: I) {
        let mut fresh: Vec<Node> = vec![];
        for addr in addrs {
            if !fresh.iter().any(|x| x.get_addr() == addr) {
                fresh.push(Node::new(addr));
            }
        }
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = fresh;
    }

    pub fn clear(&self) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn get_nodes(&self) -> Vec<Node> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .to_vec()
    }

    pub fn get_addrs(&self) -> Vec<String> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|node| node.addr.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_dedups_in_first_seen_order() {
        let nodes = Nodes::from_addrs(vec![
            "http://b:5002".to_string(),
            "http://a:5001".to_string(),
            "http://b:5002".to_string(),
        ]);
        assert_eq!(nodes.get_addrs(), vec!["http://b:5002", "http://a:5001"]);
        assert_eq!(nodes.get_nodes()[1].get_addr(), "http://a:5001");

        nodes.replace(vec!["y".to_string()]);
        assert_eq!(nodes.get_addrs(), vec!["y"]);
        nodes.clear();
        assert!(nodes.is_empty());
    }

    #[test]
    fn test_endpoint_adds_scheme() {
        assert_eq!(endpoint("127.0.0.1:5001", "/chain"), "http://127.0.0.1:5001/chain");
        assert_eq!(endpoint("http://peer:5002/", "/chain"), "http://peer:5002/chain");
        assert_eq!(endpoint("https://peer", "/consensus"), "https://peer/consensus");
    }
}
