//! 시드 기반 결정적 random forest.
//!
//! gini 불순도 기준 CART 트리의 앙상블입니다. 부트스트랩 샘플링과
//! feature 부분집합 선택에 시드 고정 `StdRng`를 사용하므로 동일한
//! 입력과 시드에 대해 항상 동일한 모델이 만들어집니다. 예측은 각
//! 트리 리프의 클래스 분포를 평균합니다.

use analytics_core::{AnalyticsError, AnalyticsResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// forest 학습 설정.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestConfig {
    /// 트리 수
    pub n_trees: usize,
    /// 트리 최대 깊이
    pub max_depth: usize,
    /// 분할을 시도하는 최소 노드 크기
    pub min_split_size: usize,
    /// RNG 시드
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 25,
            max_depth: 6,
            min_split_size: 4,
            seed: 42,
        }
    }
}

/// 트리 노드. 리프는 클래스 분포를 가집니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
enum TreeNode {
    Leaf {
        /// 클래스별 확률 분포 (합 1)
        distribution: Vec<f64>,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    fn predict<'a>(&'a self, features: &[f64]) -> &'a [f64] {
        match self {
            TreeNode::Leaf { distribution } => distribution,
            TreeNode::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if features[*feature] <= *threshold {
                    left.predict(features)
                } else {
                    right.predict(features)
                }
            }
        }
    }
}

/// 학습된 random forest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<TreeNode>,
    n_classes: usize,
    n_features: usize,
}

impl RandomForest {
    /// 샘플과 클래스 라벨로 forest 학습.
    ///
    /// `labels[i]`는 `0..n_classes` 범위의 클래스 인덱스여야 합니다.
    pub fn fit(
        samples: &[Vec<f64>],
        labels: &[usize],
        n_classes: usize,
        config: &ForestConfig,
    ) -> AnalyticsResult<Self> {
        if samples.is_empty() || samples.len() != labels.len() {
            return Err(AnalyticsError::InvalidInput(format!(
                "sample/label count mismatch: {} vs {}",
                samples.len(),
                labels.len()
            )));
        }
        if n_classes == 0 {
            return Err(AnalyticsError::EmptyTrainingSet);
        }
        if let Some(&bad) = labels.iter().find(|&&l| l >= n_classes) {
            return Err(AnalyticsError::InvalidInput(format!(
                "class label {bad} out of range (n_classes = {n_classes})"
            )));
        }

        let n_features = samples[0].len();
        if samples.iter().any(|s| s.len() != n_features) {
            return Err(AnalyticsError::InvalidInput(
                "inconsistent sample dimensions".to_string(),
            ));
        }

        // 분할마다 sqrt(n_features)개 feature 후보
        let features_per_split = ((n_features as f64).sqrt().ceil() as usize).max(1);

        let mut trees = Vec::with_capacity(config.n_trees);
        for tree_index in 0..config.n_trees {
            // 트리마다 독립적이고 재현 가능한 RNG
            let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(tree_index as u64));

            // 부트스트랩 샘플 (복원 추출)
            let indices: Vec<usize> = (0..samples.len())
                .map(|_| rng.gen_range(0..samples.len()))
                .collect();

            let tree = build_tree(
                samples,
                labels,
                &indices,
                n_classes,
                features_per_split,
                config.max_depth,
                config.min_split_size,
                &mut rng,
            );
            trees.push(tree);
        }

        Ok(Self {
            trees,
            n_classes,
            n_features,
        })
    }

    /// 클래스별 확률 분포 예측 (길이 `n_classes`, 합 1).
    pub fn predict_proba(&self, features: &[f64]) -> AnalyticsResult<Vec<f64>> {
        if features.len() != self.n_features {
            return Err(AnalyticsError::InvalidInput(format!(
                "feature length mismatch: model {}, input {}",
                self.n_features,
                features.len()
            )));
        }

        let mut probs = vec![0.0; self.n_classes];
        for tree in &self.trees {
            for (p, d) in probs.iter_mut().zip(tree.predict(features).iter()) {
                *p += d;
            }
        }
        let n = self.trees.len() as f64;
        for p in probs.iter_mut() {
            *p /= n;
        }
        Ok(probs)
    }

    /// 클래스 수 반환.
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// 입력 feature 수 반환.
    pub fn n_features(&self) -> usize {
        self.n_features
    }
}

#[allow(clippy::too_many_arguments)]
fn build_tree(
    samples: &[Vec<f64>],
    labels: &[usize],
    indices: &[usize],
    n_classes: usize,
    features_per_split: usize,
    depth_remaining: usize,
    min_split_size: usize,
    rng: &mut StdRng,
) -> TreeNode {
    let distribution = class_distribution(labels, indices, n_classes);

    // 중단 조건: 깊이 소진, 노드가 너무 작음, 순수 노드
    if depth_remaining == 0
        || indices.len() < min_split_size
        || distribution.iter().any(|&p| p == 1.0)
    {
        return TreeNode::Leaf { distribution };
    }

    let n_features = samples[0].len();

    // feature 부분집합 선택 (복원 없이, 시도 순서도 결정적)
    let mut candidates: Vec<usize> = (0..n_features).collect();
    for i in (1..candidates.len()).rev() {
        let j = rng.gen_range(0..=i);
        candidates.swap(i, j);
    }
    candidates.truncate(features_per_split);
    candidates.sort_unstable();

    let parent_gini = gini(&distribution);
    let mut best: Option<(usize, f64, f64)> = None; // (feature, threshold, gain)

    for &feature in &candidates {
        let mut values: Vec<f64> = indices.iter().map(|&i| samples[i][feature]).collect();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        values.dedup();

        for pair in values.windows(2) {
            let threshold = (pair[0] + pair[1]) / 2.0;

            let (left, right): (Vec<usize>, Vec<usize>) =
                indices.iter().partition(|&&i| samples[i][feature] <= threshold);
            if left.is_empty() || right.is_empty() {
                continue;
            }

            let left_gini = gini(&class_distribution(labels, &left, n_classes));
            let right_gini = gini(&class_distribution(labels, &right, n_classes));
            let weighted = (left.len() as f64 * left_gini + right.len() as f64 * right_gini)
                / indices.len() as f64;
            let gain = parent_gini - weighted;

            // 동률은 먼저 발견된 (낮은 feature 인덱스, 낮은 threshold) 분할 유지
            if gain > 1e-12 && best.map_or(true, |(_, _, g)| gain > g) {
                best = Some((feature, threshold, gain));
            }
        }
    }

    let Some((feature, threshold, _)) = best else {
        return TreeNode::Leaf { distribution };
    };

    let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
        .iter()
        .partition(|&&i| samples[i][feature] <= threshold);

    let left = build_tree(
        samples,
        labels,
        &left_indices,
        n_classes,
        features_per_split,
        depth_remaining - 1,
        min_split_size,
        rng,
    );
    let right = build_tree(
        samples,
        labels,
        &right_indices,
        n_classes,
        features_per_split,
        depth_remaining - 1,
        min_split_size,
        rng,
    );

    TreeNode::Split {
        feature,
        threshold,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn class_distribution(labels: &[usize], indices: &[usize], n_classes: usize) -> Vec<f64> {
    let mut counts = vec![0usize; n_classes];
    for &i in indices {
        counts[labels[i]] += 1;
    }
    let total = indices.len().max(1) as f64;
    counts.iter().map(|&c| c as f64 / total).collect()
}

fn gini(distribution: &[f64]) -> f64 {
    1.0 - distribution.iter().map(|p| p * p).sum::<f64>()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 클래스 0은 x < 0, 클래스 1은 x > 0인 선형 분리 데이터.
    fn separable_data() -> (Vec<Vec<f64>>, Vec<usize>) {
        let mut samples = Vec::new();
        let mut labels = Vec::new();
        for i in 0..30 {
            samples.push(vec![-1.0 - i as f64 * 0.1, 0.5]);
            labels.push(0);
            samples.push(vec![1.0 + i as f64 * 0.1, -0.5]);
            labels.push(1);
        }
        (samples, labels)
    }

    #[test]
    fn test_fit_and_predict() {
        let (samples, labels) = separable_data();
        let forest = RandomForest::fit(&samples, &labels, 2, &ForestConfig::default()).unwrap();

        let probs = forest.predict_proba(&[-2.0, 0.5]).unwrap();
        assert!(probs[0] > 0.8, "expected class 0, got {:?}", probs);

        let probs = forest.predict_proba(&[2.0, -0.5]).unwrap();
        assert!(probs[1] > 0.8, "expected class 1, got {:?}", probs);
    }

    #[test]
    fn test_proba_sums_to_one() {
        let (samples, labels) = separable_data();
        let forest = RandomForest::fit(&samples, &labels, 2, &ForestConfig::default()).unwrap();

        let probs = forest.predict_proba(&[0.3, 0.0]).unwrap();
        let sum: f64 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9, "probabilities sum to {}", sum);
    }

    #[test]
    fn test_deterministic_with_same_seed() {
        let (samples, labels) = separable_data();
        let config = ForestConfig::default();

        let a = RandomForest::fit(&samples, &labels, 2, &config).unwrap();
        let b = RandomForest::fit(&samples, &labels, 2, &config).unwrap();

        let pa = a.predict_proba(&[0.123, 0.456]).unwrap();
        let pb = b.predict_proba(&[0.123, 0.456]).unwrap();
        assert_eq!(pa, pb);
    }

    #[test]
    fn test_feature_length_mismatch() {
        let (samples, labels) = separable_data();
        let forest = RandomForest::fit(&samples, &labels, 2, &ForestConfig::default()).unwrap();

        let result = forest.predict_proba(&[1.0]);
        assert!(matches!(result, Err(AnalyticsError::InvalidInput(_))));
    }

    #[test]
    fn test_label_out_of_range() {
        let samples = vec![vec![1.0], vec![2.0]];
        let labels = vec![0, 5];
        let result = RandomForest::fit(&samples, &labels, 2, &ForestConfig::default());
        assert!(matches!(result, Err(AnalyticsError::InvalidInput(_))));
    }
}
