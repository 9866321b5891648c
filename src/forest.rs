//! Bootstrap-aggregated CART forests.
//!
//! Both forests grow the same kind of tree: splits minimize the summed squared
//! error of the children and leaves hold the mean target. On 0/1 labels the
//! squared error of a node is half its weighted Gini impurity, so the
//! classifier picks the same splits a Gini tree would and its leaf mean is the
//! positive-class fraction.

use crate::error::{AppError, Result};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

const IMPURITY_EPSILON: f64 = 1e-12;

/// How many candidate features each split considers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxFeatures {
    All,
    Sqrt,
}

impl MaxFeatures {
    fn resolve(self, n_features: usize) -> usize {
        match self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => ((n_features as f64).sqrt() as usize).clamp(1, n_features),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub seed: u64,
    pub max_depth: Option<usize>,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            seed: 42,
            max_depth: None,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

struct GrowContext<'a> {
    x: ArrayView2<'a, f64>,
    y: ArrayView1<'a, f64>,
    max_features: usize,
    max_depth: Option<usize>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    cost: f64,
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn fit(ctx: &GrowContext<'_>, samples: &mut [usize], rng: &mut StdRng) -> Self {
        let mut tree = Tree { nodes: Vec::new() };
        tree.grow(ctx, samples, 0, rng);
        tree
    }

    fn grow(
        &mut self,
        ctx: &GrowContext<'_>,
        samples: &mut [usize],
        depth: usize,
        rng: &mut StdRng,
    ) -> usize {
        let (sum, sum_sq) = moments(ctx.y, samples);
        let n = samples.len() as f64;
        let mean = sum / n;
        let impurity = sum_sq - sum * sum / n;

        let depth_reached = ctx.max_depth.is_some_and(|max| depth >= max);
        if samples.len() < 2 || impurity <= IMPURITY_EPSILON || depth_reached {
            return self.push(Node::Leaf(mean));
        }

        let split = match best_split(ctx, samples, sum, sum_sq, rng) {
            Some(split) => split,
            None => return self.push(Node::Leaf(mean)),
        };

        let mut boundary = 0;
        for i in 0..samples.len() {
            if ctx.x[[samples[i], split.feature]] <= split.threshold {
                samples.swap(boundary, i);
                boundary += 1;
            }
        }

        let index = self.push(Node::Leaf(mean));
        let (left_samples, right_samples) = samples.split_at_mut(boundary);
        let left = self.grow(ctx, left_samples, depth + 1, rng);
        let right = self.grow(ctx, right_samples, depth + 1, rng);

        self.nodes[index] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        index
    }

    fn push(&mut self, node: Node) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn predict(&self, features: &[f64]) -> f64 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf(value) => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if features[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

fn moments(y: ArrayView1<'_, f64>, samples: &[usize]) -> (f64, f64) {
    samples.iter().fold((0.0, 0.0), |(sum, sum_sq), &s| {
        let v = y[s];
        (sum + v, sum_sq + v * v)
    })
}

/// Draws features in random order and stops once `max_features` have been
/// examined and at least one valid split was found.
fn best_split(
    ctx: &GrowContext<'_>,
    samples: &[usize],
    total_sum: f64,
    total_sq: f64,
    rng: &mut StdRng,
) -> Option<SplitCandidate> {
    let mut features: Vec<usize> = (0..ctx.x.ncols()).collect();
    features.shuffle(rng);

    let n = samples.len();
    let mut order = samples.to_vec();
    let mut best: Option<SplitCandidate> = None;

    for (visited, &feature) in features.iter().enumerate() {
        if visited >= ctx.max_features && best.is_some() {
            break;
        }

        order.sort_by(|&a, &b| ctx.x[[a, feature]].total_cmp(&ctx.x[[b, feature]]));

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        for i in 0..n - 1 {
            let y = ctx.y[order[i]];
            left_sum += y;
            left_sq += y * y;

            let value = ctx.x[[order[i], feature]];
            let next = ctx.x[[order[i + 1], feature]];
            if next <= value {
                continue;
            }

            let left_n = (i + 1) as f64;
            let right_n = (n - i - 1) as f64;
            let right_sum = total_sum - left_sum;
            let right_sq = total_sq - left_sq;
            let cost = (left_sq - left_sum * left_sum / left_n)
                + (right_sq - right_sum * right_sum / right_n);

            if best.as_ref().map_or(true, |b| cost < b.cost - IMPURITY_EPSILON) {
                let mut threshold = value / 2.0 + next / 2.0;
                if threshold >= next {
                    threshold = value;
                }
                best = Some(SplitCandidate {
                    feature,
                    threshold,
                    cost,
                });
            }
        }
    }

    best
}

fn validate(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(AppError::Training(format!(
            "Cannot fit on an empty {}x{} matrix",
            x.nrows(),
            x.ncols()
        )));
    }

    if x.nrows() != y.len() {
        return Err(AppError::Training(format!(
            "Feature rows ({}) and targets ({}) differ in length",
            x.nrows(),
            y.len()
        )));
    }

    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(AppError::Training(
            "Training data contains non-finite values".to_string(),
        ));
    }

    Ok(())
}

#[derive(Debug, Clone)]
struct Forest {
    trees: Vec<Tree>,
    n_features: usize,
}

impl Forest {
    fn fit(
        x: &Array2<f64>,
        y: &Array1<f64>,
        params: &ForestParams,
        max_features: MaxFeatures,
    ) -> Result<Self> {
        validate(x, y)?;
        if params.n_estimators == 0 {
            return Err(AppError::Training(
                "A forest needs at least one tree".to_string(),
            ));
        }

        let ctx = GrowContext {
            x: x.view(),
            y: y.view(),
            max_features: max_features.resolve(x.ncols()),
            max_depth: params.max_depth,
        };

        let n = x.nrows();
        let mut seeder = StdRng::seed_from_u64(params.seed);
        let trees = (0..params.n_estimators)
            .map(|_| {
                let mut rng = StdRng::seed_from_u64(seeder.gen());
                let mut bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                Tree::fit(&ctx, &mut bootstrap, &mut rng)
            })
            .collect();

        Ok(Self {
            trees,
            n_features: x.ncols(),
        })
    }

    fn predict(&self, features: &[f64]) -> Result<f64> {
        if features.len() != self.n_features {
            return Err(AppError::Prediction(format!(
                "Expected {} features, got {}",
                self.n_features,
                features.len()
            )));
        }
        if features.iter().any(|v| !v.is_finite()) {
            return Err(AppError::Prediction(format!(
                "Non-finite feature in {:?}",
                features
            )));
        }

        let total: f64 = self.trees.iter().map(|t| t.predict(features)).sum();
        Ok(total / self.trees.len() as f64)
    }
}

/// Mean-of-trees regressor; every split considers all features.
#[derive(Debug, Clone)]
pub struct RandomForestRegressor {
    forest: Forest,
}

impl RandomForestRegressor {
    pub fn fit(x: &Array2<f64>, y: &Array1<f64>, params: &ForestParams) -> Result<Self> {
        Ok(Self {
            forest: Forest::fit(x, y, params, MaxFeatures::All)?,
        })
    }

    pub fn predict(&self, features: &[f64]) -> Result<f64> {
        self.forest.predict(features)
    }

    pub fn n_trees(&self) -> usize {
        self.forest.trees.len()
    }
}

/// Binary classifier; splits consider `sqrt(n_features)` random features.
#[derive(Debug, Clone)]
pub struct RandomForestClassifier {
    forest: Forest,
}

impl RandomForestClassifier {
    pub fn fit(x: &Array2<f64>, labels: &[bool], params: &ForestParams) -> Result<Self> {
        let positives = labels.iter().filter(|&&l| l).count();
        if positives == 0 || positives == labels.len() {
            return Err(AppError::Training(format!(
                "Classifier needs both classes, got {} positive of {} labels",
                positives,
                labels.len()
            )));
        }

        let y: Array1<f64> = labels.iter().map(|&l| if l { 1.0 } else { 0.0 }).collect();
        Ok(Self {
            forest: Forest::fit(x, &y, params, MaxFeatures::Sqrt)?,
        })
    }

    /// Probability of the positive class.
    pub fn predict_proba(&self, features: &[f64]) -> Result<f64> {
        self.forest.predict(features)
    }

    pub fn n_trees(&self) -> usize {
        self.forest.trees.len()
    }
}
