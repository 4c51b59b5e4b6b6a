use std::collections::{HashMap, HashSet};

use log::warn;
use thiserror::Error;

use crate::menu::node::QuestionNode;
use crate::menu::ROOT_ID;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("root question 'main' is not defined")]
    MissingRoot,
    #[error("question '{0}' is defined more than once")]
    DuplicateQuestion(String),
    #[error("question '{question}' declares option '{option}' more than once")]
    DuplicateOption { question: String, option: String },
    #[error("question '{question}' goes back to unknown question '{target}'")]
    UnknownBackTarget { question: String, target: String },
    #[error("option '{option}' of question '{question}' leads to unknown question '{target}'")]
    UnknownNextId {
        question: String,
        option: String,
        target: String,
    },
}

/// The full question graph: a map of question-id -> QuestionNode.
/// Immutable once built; every reference inside it resolves.
#[derive(Debug, Clone)]
pub struct Registry {
    nodes: HashMap<String, QuestionNode>,
}

impl Registry {
    pub fn new(nodes: Vec<QuestionNode>) -> Result<Self, RegistryError> {
        let mut map = HashMap::with_capacity(nodes.len());
        for node in nodes {
            if map.contains_key(&node.id) {
                return Err(RegistryError::DuplicateQuestion(node.id));
            }
            map.insert(node.id.clone(), node);
        }

        let registry = Self { nodes: map };
        registry.validate()?;
        Ok(registry)
    }

    /// Parse a JSON array of questions and validate it.
    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let nodes: Vec<QuestionNode> = serde_json::from_str(raw)?;
        Ok(Self::new(nodes)?)
    }

    fn validate(&self) -> Result<(), RegistryError> {
        if !self.nodes.contains_key(ROOT_ID) {
            return Err(RegistryError::MissingRoot);
        }

        // Sorted so the first reported problem is stable across runs.
        for id in self.ids() {
            let node = &self.nodes[id];
            if !self.contains(&node.back_target) {
                return Err(RegistryError::UnknownBackTarget {
                    question: node.id.clone(),
                    target: node.back_target.clone(),
                });
            }

            let mut seen = HashSet::new();
            for option in &node.options {
                if !seen.insert(option.id.as_str()) {
                    return Err(RegistryError::DuplicateOption {
                        question: node.id.clone(),
                        option: option.id.clone(),
                    });
                }
                if let Some(next) = &option.next_id {
                    if !self.contains(next) {
                        return Err(RegistryError::UnknownNextId {
                            question: node.id.clone(),
                            option: option.id.clone(),
                            target: next.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Every question id, in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        let mut ids: Vec<&str> = self.nodes.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids.into_iter()
    }

    pub fn root(&self) -> &QuestionNode {
        &self.nodes[ROOT_ID]
    }

    /// Look up a question. Unknown ids fall back to the root question so a
    /// stale id never strands the dialogue.
    pub fn get(&self, id: &str) -> &QuestionNode {
        match self.nodes.get(id) {
            Some(node) => node,
            None => {
                warn!("Unknown question id '{id}'. Falling back to '{ROOT_ID}'.");
                self.root()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Ids reachable from the root by following option targets and back
    /// targets, in breadth-first order.
    pub fn reachable(&self) -> Vec<&str> {
        let mut seen = HashSet::from([ROOT_ID]);
        let mut order = vec![ROOT_ID];
        let mut cursor = 0;
        while let Some(&id) = order.get(cursor) {
            cursor += 1;
            let node = self.get(id);
            let targets = node
                .options
                .iter()
                .filter_map(|o| o.next_id.as_deref())
                .chain(std::iter::once(node.back_target.as_str()));
            for target in targets {
                if seen.insert(target) {
                    order.push(target);
                }
            }
        }
        order
    }
}
