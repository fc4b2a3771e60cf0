//! 결정적 k-means 클러스터링.
//!
//! RNG 없이 farthest-point 시딩을 사용하므로 동일한 입력에 대해
//! 항상 동일한 centroid를 산출합니다. 동률은 모두 낮은 인덱스가
//! 이깁니다.

use analytics_core::{AnalyticsError, AnalyticsResult};

/// k-means 수렴 판정 허용 오차 (centroid 이동 거리 제곱).
const CONVERGENCE_EPSILON: f64 = 1e-10;

/// k-means 실행 결과.
#[derive(Debug, Clone)]
pub struct KMeansResult {
    /// 최종 centroid (k × dim)
    pub centroids: Vec<Vec<f64>>,
    /// 각 입력 점의 클러스터 할당
    pub assignments: Vec<usize>,
    /// 실행된 반복 횟수
    pub iterations: usize,
}

/// 두 점 사이 유클리드 거리.
pub fn euclidean_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// 결정적 k-means 실행.
///
/// 시딩: 첫 centroid는 데이터 평균에 가장 가까운 점, 이후 centroid는
/// 이미 선택된 centroid들로부터 최소 거리가 최대인 점. Lloyd 반복은
/// 할당이 안정되거나 `max_iterations`에 도달할 때까지 수행합니다.
pub fn run_kmeans(
    points: &[Vec<f64>],
    k: usize,
    max_iterations: usize,
) -> AnalyticsResult<KMeansResult> {
    if k < 2 {
        return Err(AnalyticsError::InvalidInput(format!(
            "k must be at least 2, got {k}"
        )));
    }
    if points.len() < k {
        return Err(AnalyticsError::InsufficientHistory {
            required: k,
            actual: points.len(),
        });
    }

    let dim = points[0].len();
    if points.iter().any(|p| p.len() != dim) {
        return Err(AnalyticsError::InvalidInput(
            "inconsistent point dimensions".to_string(),
        ));
    }

    let mut centroids = seed_centroids(points, k, dim);
    let mut assignments = vec![0usize; points.len()];
    let mut iterations = 0;

    for iter in 0..max_iterations {
        iterations = iter + 1;

        // 할당 단계. 동률은 strict `<` 비교로 낮은 인덱스 유지.
        let mut changed = false;
        for (i, point) in points.iter().enumerate() {
            let mut best = 0usize;
            let mut best_dist = euclidean_distance(point, &centroids[0]);
            for (c, centroid) in centroids.iter().enumerate().skip(1) {
                let dist = euclidean_distance(point, centroid);
                if dist < best_dist {
                    best = c;
                    best_dist = dist;
                }
            }
            if assignments[i] != best {
                assignments[i] = best;
                changed = true;
            }
        }

        if !changed && iter > 0 {
            break;
        }

        // 갱신 단계
        let mut sums = vec![vec![0.0; dim]; k];
        let mut counts = vec![0usize; k];
        for (point, &cluster) in points.iter().zip(assignments.iter()) {
            counts[cluster] += 1;
            for (s, v) in sums[cluster].iter_mut().zip(point.iter()) {
                *s += v;
            }
        }

        let mut max_shift = 0.0f64;
        for c in 0..k {
            if counts[c] == 0 {
                // 빈 클러스터: 현재 centroid에서 가장 먼 점으로 재배치
                let far = farthest_point_index(points, &centroids, &assignments);
                centroids[c] = points[far].clone();
                assignments[far] = c;
                continue;
            }
            let new_centroid: Vec<f64> = sums[c]
                .iter()
                .map(|s| s / counts[c] as f64)
                .collect();
            let shift = euclidean_distance(&centroids[c], &new_centroid);
            max_shift = max_shift.max(shift);
            centroids[c] = new_centroid;
        }

        if max_shift * max_shift < CONVERGENCE_EPSILON {
            break;
        }
    }

    Ok(KMeansResult {
        centroids,
        assignments,
        iterations,
    })
}

/// farthest-point 시딩으로 초기 centroid 선택.
fn seed_centroids(points: &[Vec<f64>], k: usize, dim: usize) -> Vec<Vec<f64>> {
    let n = points.len();

    // 전체 평균에 가장 가까운 점이 첫 centroid
    let mut mean = vec![0.0; dim];
    for point in points {
        for (m, v) in mean.iter_mut().zip(point.iter()) {
            *m += v;
        }
    }
    for m in mean.iter_mut() {
        *m /= n as f64;
    }

    let mut first = 0usize;
    let mut first_dist = euclidean_distance(&points[0], &mean);
    for (i, point) in points.iter().enumerate().skip(1) {
        let dist = euclidean_distance(point, &mean);
        if dist < first_dist {
            first = i;
            first_dist = dist;
        }
    }

    let mut centroids = vec![points[first].clone()];

    // 이후 centroid: 선택된 centroid들로부터의 최소 거리가 최대인 점
    while centroids.len() < k {
        let mut best = 0usize;
        let mut best_min_dist = -1.0f64;
        for (i, point) in points.iter().enumerate() {
            let min_dist = centroids
                .iter()
                .map(|c| euclidean_distance(point, c))
                .fold(f64::INFINITY, f64::min);
            if min_dist > best_min_dist {
                best = i;
                best_min_dist = min_dist;
            }
        }
        centroids.push(points[best].clone());
    }

    centroids
}

/// 자신의 centroid로부터 가장 먼 점의 인덱스.
fn farthest_point_index(
    points: &[Vec<f64>],
    centroids: &[Vec<f64>],
    assignments: &[usize],
) -> usize {
    let mut best = 0usize;
    let mut best_dist = -1.0f64;
    for (i, point) in points.iter().enumerate() {
        let dist = euclidean_distance(point, &centroids[assignments[i]]);
        if dist > best_dist {
            best = i;
            best_dist = dist;
        }
    }
    best
}
