// Persistent Trie
//
// An immutable copy-on-write prefix tree with typed values. Every put or
// remove returns a new root sharing untouched subtrees with the old one;
// existing handles never observe the change. Values are type-erased and
// recovered by downcast, so a lookup with the wrong type yields None.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

type ValueRef = Arc<dyn Any + Send + Sync>;

#[derive(Default, Clone)]
struct TrieNode {
    children: HashMap<u8, Arc<TrieNode>>,
    value: Option<ValueRef>,
}

#[derive(Default, Clone)]
pub struct Trie {
    root: Option<Arc<TrieNode>>,
}

impl Trie {
    pub fn new() -> Self {
        Self { root: None }
    }

    /// Typed lookup. None when the key is missing or holds a value of a
    /// different type.
    pub fn get<T: 'static>(&self, key: &str) -> Option<&T> {
        let mut node = self.root.as_ref()?;
        for byte in key.bytes() {
            node = node.children.get(&byte)?;
        }
        node.value.as_ref()?.downcast_ref::<T>()
    }

    /// A new trie with `key` bound to `value`. The receiver is unchanged.
    pub fn put<T: Any + Send + Sync>(&self, key: &str, value: T) -> Trie {
        let value: ValueRef = Arc::new(value);
        let new_root = Self::put_rec(self.root.as_deref(), key.as_bytes(), value);
        Trie {
            root: Some(Arc::new(new_root)),
        }
    }

    /// A new trie without `key`. Nodes left with neither value nor children
    /// are pruned bottom-up.
    pub fn remove(&self, key: &str) -> Trie {
        match &self.root {
            None => Trie::new(),
            Some(root) => Trie {
                root: Self::remove_rec(root, key.as_bytes()).map(Arc::new),
            },
        }
    }

    fn put_rec(node: Option<&TrieNode>, key: &[u8], value: ValueRef) -> TrieNode {
        let mut new_node = node.cloned().unwrap_or_default();
        match key.split_first() {
            None => {
                new_node.value = Some(value);
            }
            Some((&first, rest)) => {
                let child = new_node.children.get(&first).map(|c| c.as_ref().clone());
                let new_child = Self::put_rec(child.as_ref(), rest, value);
                new_node.children.insert(first, Arc::new(new_child));
            }
        }
        new_node
    }

    fn remove_rec(node: &TrieNode, key: &[u8]) -> Option<TrieNode> {
        let mut new_node = node.clone();
        match key.split_first() {
            None => {
                new_node.value = None;
            }
            Some((&first, rest)) => {
                if let Some(child) = node.children.get(&first) {
                    match Self::remove_rec(child, rest) {
                        Some(kept) => {
                            new_node.children.insert(first, Arc::new(kept));
                        }
                        None => {
                            new_node.children.remove(&first);
                        }
                    }
                }
            }
        }
        if new_node.value.is_none() && new_node.children.is_empty() {
            None
        } else {
            Some(new_node)
        }
    }
}
