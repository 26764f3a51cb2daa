//! Structure-preserving algebra over nested parameter containers.
//!
//! A [`ParamTree`] is either a dense tensor leaf or a named collection of
//! subtrees. Every operation here preserves structure and allocates fresh
//! leaves, so trees behave as plain values: no two trees ever share a buffer.
//! Nodes are kept in a [`BTreeMap`], which fixes the leaf traversal order and
//! thereby keeps every random draw over a tree deterministic.

use ndarray::{ArrayD, Axis, IxDyn};
use rand::Rng;
use rand_distr::StandardNormal;
use std::collections::BTreeMap;

/// A nested container of `f32` tensors representing a model's parameters.
///
/// Two trees have the *same structure* when their nesting, child names, and
/// per-leaf shapes all match. Binary operations require same-structure
/// operands and panic otherwise; the sampler entry point validates structure
/// once, before any chain starts.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamTree {
    /// A dense tensor of any rank (including rank 0 for scalars).
    Leaf(ArrayD<f32>),
    /// Named subtrees with deterministic (sorted) iteration order.
    Node(BTreeMap<String, ParamTree>),
}

impl ParamTree {
    /// A rank-0 leaf holding a single value.
    pub fn scalar(value: f32) -> Self {
        ParamTree::Leaf(ArrayD::from_elem(IxDyn(&[]), value))
    }

    /// A rank-1 leaf holding the given values.
    pub fn vector(values: &[f32]) -> Self {
        let array = ArrayD::from_shape_vec(IxDyn(&[values.len()]), values.to_vec())
            .expect("vector length matches its own shape");
        ParamTree::Leaf(array)
    }

    /// A leaf wrapping an arbitrary dense tensor.
    pub fn leaf(values: ArrayD<f32>) -> Self {
        ParamTree::Leaf(values)
    }

    /// An interior node built from `(name, subtree)` pairs.
    pub fn node<K, I>(children: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, ParamTree)>,
    {
        ParamTree::Node(children.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// The leaf tensor, if this tree is a single leaf.
    pub fn as_leaf(&self) -> Option<&ArrayD<f32>> {
        match self {
            ParamTree::Leaf(a) => Some(a),
            ParamTree::Node(_) => None,
        }
    }

    /// The named subtree, if this tree is a node containing `name`.
    pub fn get(&self, name: &str) -> Option<&ParamTree> {
        match self {
            ParamTree::Leaf(_) => None,
            ParamTree::Node(children) => children.get(name),
        }
    }

    /// Total number of scalar elements across all leaves.
    pub fn len(&self) -> usize {
        match self {
            ParamTree::Leaf(a) => a.len(),
            ParamTree::Node(children) => children.values().map(ParamTree::len).sum(),
        }
    }

    /// True when the tree holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All leaf tensors in deterministic traversal order.
    pub fn leaves(&self) -> Vec<&ArrayD<f32>> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a ArrayD<f32>>) {
        match self {
            ParamTree::Leaf(a) => out.push(a),
            ParamTree::Node(children) => {
                for child in children.values() {
                    child.collect_leaves(out);
                }
            }
        }
    }

    /// All leaves paired with their dotted path names, in traversal order.
    ///
    /// The root leaf of a leaf-only tree gets an empty path.
    pub fn named_leaves(&self) -> Vec<(String, &ArrayD<f32>)> {
        let mut out = Vec::new();
        self.collect_named(String::new(), &mut out);
        out
    }

    fn collect_named<'a>(&'a self, prefix: String, out: &mut Vec<(String, &'a ArrayD<f32>)>) {
        match self {
            ParamTree::Leaf(a) => out.push((prefix, a)),
            ParamTree::Node(children) => {
                for (name, child) in children {
                    let path = if prefix.is_empty() {
                        name.clone()
                    } else {
                        format!("{prefix}.{name}")
                    };
                    child.collect_named(path, out);
                }
            }
        }
    }

    /// True when `other` has identical nesting, names, and leaf shapes.
    pub fn same_structure(&self, other: &ParamTree) -> bool {
        match (self, other) {
            (ParamTree::Leaf(a), ParamTree::Leaf(b)) => a.shape() == b.shape(),
            (ParamTree::Node(a), ParamTree::Node(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|((ka, va), (kb, vb))| ka == kb && va.same_structure(vb))
            }
            _ => false,
        }
    }

    /// Applies `f` to every element, producing a fresh same-structure tree.
    pub fn map(&self, f: impl Fn(f32) -> f32 + Copy) -> ParamTree {
        match self {
            ParamTree::Leaf(a) => ParamTree::Leaf(a.map(|&x| f(x))),
            ParamTree::Node(children) => ParamTree::Node(
                children
                    .iter()
                    .map(|(k, v)| (k.clone(), v.map(f)))
                    .collect(),
            ),
        }
    }

    /// Combines two same-structure trees elementwise.
    pub fn zip_map(&self, other: &ParamTree, f: impl Fn(f32, f32) -> f32 + Copy) -> ParamTree {
        match (self, other) {
            (ParamTree::Leaf(a), ParamTree::Leaf(b)) => {
                assert_eq!(a.shape(), b.shape(), "leaf shapes must match");
                let mut out = a.clone();
                out.zip_mut_with(b, |x, &y| *x = f(*x, y));
                ParamTree::Leaf(out)
            }
            (ParamTree::Node(a), ParamTree::Node(b)) => {
                assert_eq!(a.len(), b.len(), "node arities must match");
                ParamTree::Node(
                    a.iter()
                        .map(|(k, va)| {
                            let vb = b.get(k).expect("node names must match");
                            (k.clone(), va.zip_map(vb, f))
                        })
                        .collect(),
                )
            }
            _ => panic!("tree structures must match"),
        }
    }

    /// Elementwise sum of two trees.
    pub fn add(&self, other: &ParamTree) -> ParamTree {
        self.zip_map(other, |a, b| a + b)
    }

    /// Elementwise difference of two trees.
    pub fn sub(&self, other: &ParamTree) -> ParamTree {
        self.zip_map(other, |a, b| a - b)
    }

    /// Elementwise product of two trees.
    pub fn mul(&self, other: &ParamTree) -> ParamTree {
        self.zip_map(other, |a, b| a * b)
    }

    /// Elementwise quotient of two trees.
    pub fn div(&self, other: &ParamTree) -> ParamTree {
        self.zip_map(other, |a, b| a / b)
    }

    /// Scales every element by `alpha`.
    pub fn scale(&self, alpha: f32) -> ParamTree {
        self.map(|x| x * alpha)
    }

    /// Elementwise square root.
    pub fn sqrt(&self) -> ParamTree {
        self.map(f32::sqrt)
    }

    /// A same-structure tree of zeros.
    pub fn zeros_like(&self) -> ParamTree {
        self.map(|_| 0.0)
    }

    /// A same-structure tree of ones.
    pub fn ones_like(&self) -> ParamTree {
        self.map(|_| 1.0)
    }

    /// Sum of all elements over all leaves, accumulated in `f64`.
    pub fn sum(&self) -> f64 {
        match self {
            ParamTree::Leaf(a) => a.iter().map(|&x| x as f64).sum(),
            ParamTree::Node(children) => children.values().map(ParamTree::sum).sum(),
        }
    }

    /// Dot product: the sum of the elementwise product over all leaves.
    pub fn dot(&self, other: &ParamTree) -> f64 {
        match (self, other) {
            (ParamTree::Leaf(a), ParamTree::Leaf(b)) => {
                assert_eq!(a.shape(), b.shape(), "leaf shapes must match");
                a.iter()
                    .zip(b.iter())
                    .map(|(&x, &y)| x as f64 * y as f64)
                    .sum()
            }
            (ParamTree::Node(a), ParamTree::Node(b)) => {
                assert_eq!(a.len(), b.len(), "node arities must match");
                a.iter()
                    .map(|(k, va)| {
                        let vb = other.get(k).expect("node names must match");
                        va.dot(vb)
                    })
                    .sum()
            }
            _ => panic!("tree structures must match"),
        }
    }

    /// True when every element of every leaf is finite.
    pub fn all_finite(&self) -> bool {
        match self {
            ParamTree::Leaf(a) => a.iter().all(|x| x.is_finite()),
            ParamTree::Node(children) => children.values().all(ParamTree::all_finite),
        }
    }

    /// A same-structure tree with every element drawn from N(0, 1).
    ///
    /// Elements are drawn in deterministic leaf traversal order, so a fixed
    /// RNG state always yields the same tree.
    pub fn standard_normal_like<R: Rng + ?Sized>(&self, rng: &mut R) -> ParamTree {
        match self {
            ParamTree::Leaf(a) => ParamTree::Leaf(a.map(|_| rng.sample::<f32, _>(StandardNormal))),
            ParamTree::Node(children) => ParamTree::Node(
                children
                    .iter()
                    .map(|(k, v)| (k.clone(), v.standard_normal_like(rng)))
                    .collect(),
            ),
        }
    }

    /// Stacks same-structure trees along a new leading axis on every leaf.
    ///
    /// Stacking k trees whose leaves have shape `[d…]` yields a tree whose
    /// leaves have shape `[k, d…]`.
    pub fn stack(trees: &[ParamTree]) -> ParamTree {
        assert!(!trees.is_empty(), "stack requires at least one tree");
        let refs: Vec<&ParamTree> = trees.iter().collect();
        Self::stack_refs(&refs)
    }

    fn stack_refs(trees: &[&ParamTree]) -> ParamTree {
        match trees[0] {
            ParamTree::Leaf(_) => {
                let views: Vec<_> = trees
                    .iter()
                    .map(|t| match t {
                        ParamTree::Leaf(a) => a.view(),
                        ParamTree::Node(_) => panic!("tree structures must match"),
                    })
                    .collect();
                ParamTree::Leaf(
                    ndarray::stack(Axis(0), &views)
                        .expect("same-structure leaves stack along a new axis"),
                )
            }
            ParamTree::Node(first) => ParamTree::Node(
                first
                    .keys()
                    .map(|name| {
                        let children: Vec<&ParamTree> = trees
                            .iter()
                            .map(|t| t.get(name).expect("tree structures must match"))
                            .collect();
                        (name.clone(), Self::stack_refs(&children))
                    })
                    .collect(),
            ),
        }
    }
}
