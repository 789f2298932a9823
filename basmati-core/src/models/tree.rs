//! Depth-limited regression trees grown on squared-error gradients.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Leaf {
        value: f64,
    },
    /// Rows with `row[feature] < threshold` go left.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    pub max_depth: usize,
    /// L2 penalty on leaf weights.
    pub reg_lambda: f64,
    /// Minimum hessian sum (row count for squared error) in each child.
    pub min_child_weight: f64,
    /// Leaf weights are scaled by this factor before being stored.
    pub shrinkage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

struct Grower<'a> {
    rows: &'a [Vec<f64>],
    gradients: &'a [f64],
    features: &'a [usize],
    params: TreeParams,
    nodes: Vec<Node>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    left: Vec<usize>,
    right: Vec<usize>,
}

impl RegressionTree {
    /// Grow one tree over the rows in `sample`, considering only `features`.
    ///
    /// `gradients[i]` is `prediction − target` for row `i`; the hessian of the
    /// squared-error loss is 1 for every row.
    pub fn grow(
        rows: &[Vec<f64>],
        gradients: &[f64],
        sample: &[usize],
        features: &[usize],
        params: TreeParams,
    ) -> Self {
        let mut grower = Grower {
            rows,
            gradients,
            features,
            params,
            nodes: Vec::new(),
        };
        grower.build(sample.to_vec(), 0);
        Self {
            nodes: grower.nodes,
        }
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] < *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    /// Largest feature index referenced by any split.
    pub fn max_feature(&self) -> Option<usize> {
        self.nodes
            .iter()
            .filter_map(|n| match n {
                Node::Split { feature, .. } => Some(*feature),
                Node::Leaf { .. } => None,
            })
            .max()
    }
}

impl Grower<'_> {
    fn build(&mut self, idx: Vec<usize>, depth: usize) -> usize {
        let at = self.nodes.len();
        self.nodes.push(Node::Leaf { value: 0.0 });

        let split = if depth < self.params.max_depth {
            self.best_split(&idx)
        } else {
            None
        };

        match split {
            Some(s) => {
                let left = self.build(s.left, depth + 1);
                let right = self.build(s.right, depth + 1);
                self.nodes[at] = Node::Split {
                    feature: s.feature,
                    threshold: s.threshold,
                    left,
                    right,
                };
            }
            None => {
                let g: f64 = idx.iter().map(|&i| self.gradients[i]).sum();
                let h = idx.len() as f64;
                self.nodes[at] = Node::Leaf {
                    value: -g / (h + self.params.reg_lambda) * self.params.shrinkage,
                };
            }
        }
        at
    }

    fn score(&self, g: f64, h: f64) -> f64 {
        g * g / (h + self.params.reg_lambda)
    }

    fn best_split(&self, idx: &[usize]) -> Option<SplitCandidate> {
        let n = idx.len();
        if (n as f64) < 2.0 * self.params.min_child_weight || n < 2 {
            return None;
        }
        let g_total: f64 = idx.iter().map(|&i| self.gradients[i]).sum();
        let parent = self.score(g_total, n as f64);

        let mut best: Option<(usize, f64, f64, usize)> = None;
        let mut order = idx.to_vec();
        let mut best_order = Vec::new();

        for &feature in self.features {
            order.sort_by(|&a, &b| {
                self.rows[a][feature]
                    .total_cmp(&self.rows[b][feature])
                    .then(a.cmp(&b))
            });

            let mut g_left = 0.0;
            for k in 0..n - 1 {
                g_left += self.gradients[order[k]];
                let here = self.rows[order[k]][feature];
                let next = self.rows[order[k + 1]][feature];
                if here >= next {
                    continue;
                }
                let h_left = (k + 1) as f64;
                let h_right = (n - k - 1) as f64;
                if h_left < self.params.min_child_weight || h_right < self.params.min_child_weight {
                    continue;
                }
                let gain = 0.5
                    * (self.score(g_left, h_left) + self.score(g_total - g_left, h_right) - parent);
                if gain > 1e-12 && best.map_or(true, |(_, _, g, _)| gain > g) {
                    best = Some((feature, here + (next - here) / 2.0, gain, k + 1));
                    best_order.clone_from(&order);
                }
            }
        }

        best.map(|(feature, threshold, _, cut)| {
            let right = best_order.split_off(cut);
            SplitCandidate {
                feature,
                threshold,
                left: best_order,
                right,
            }
        })
    }
}
