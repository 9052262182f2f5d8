use std::collections::VecDeque;

/// Density based clustering (DBSCAN) over a precomputed pairwise distance.
///
/// Returns one entry per point: `Some(cluster_id)` or `None` for noise.
/// A point is a core point when at least `min_samples` points, itself
/// included, lie within `eps`. Cluster ids are dense and follow discovery
/// order, so the result is deterministic for a given input order.
pub fn dbscan<F>(n: usize, eps: f32, min_samples: usize, dist: F) -> Vec<Option<usize>>
where
    F: Fn(usize, usize) -> f32,
{
    let neighbors = (0..n)
        .map(|i| {
            (0..n)
                .filter(|&j| i == j || dist(i, j) <= eps)
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();
    let is_core = neighbors
        .iter()
        .map(|n| n.len() >= min_samples.max(1))
        .collect::<Vec<_>>();

    let mut labels = vec![None; n];
    let mut next_id = 0;

    for start in 0..n {
        if labels[start].is_some() || !is_core[start] {
            continue;
        }

        let id = next_id;
        next_id += 1;
        labels[start] = Some(id);

        let mut queue = VecDeque::from([start]);
        while let Some(point) = queue.pop_front() {
            if !is_core[point] {
                continue;
            }
            for &neighbor in &neighbors[point] {
                if labels[neighbor].is_none() {
                    labels[neighbor] = Some(id);
                    queue.push_back(neighbor);
                }
            }
        }
    }

    labels
}

/// Groups point indices by cluster id, dropping noise.
pub fn group_labels(labels: &[Option<usize>]) -> Vec<Vec<usize>> {
    let cluster_count = labels.iter().flatten().max().map_or(0, |max| max + 1);
    let mut groups = vec![Vec::new(); cluster_count];
    for (idx, label) in labels.iter().enumerate() {
        if let Some(id) = label {
            groups[*id].push(idx);
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points_1d(points: &[f32]) -> impl Fn(usize, usize) -> f32 + '_ {
        move |i, j| (points[i] - points[j]).abs()
    }

    #[test]
    fn test_dbscan_two_clusters_and_noise() {
        let points = [0.0, 0.1, 0.2, 5.0, 5.1, 5.2, 20.0];
        let labels = dbscan(points.len(), 0.15, 2, points_1d(&points));

        assert_eq!(
            labels,
            vec![Some(0), Some(0), Some(0), Some(1), Some(1), Some(1), None]
        );
        assert_eq!(group_labels(&labels), vec![vec![0, 1, 2], vec![3, 4, 5]]);
    }

    #[test]
    fn test_dbscan_min_samples_one_has_no_noise() {
        let points = [0.0, 10.0, 20.0];
        let labels = dbscan(points.len(), 0.5, 1, points_1d(&points));
        assert_eq!(labels, vec![Some(0), Some(1), Some(2)]);
    }

    #[test]
    fn test_dbscan_border_point_joins_first_cluster() {
        // point 2 is only a border point; it is reachable from the core point 1
        let points = [0.0, 1.0, 2.0, 10.0];
        let labels = dbscan(points.len(), 1.0, 3, points_1d(&points));
        assert_eq!(labels, vec![Some(0), Some(0), Some(0), None]);
    }

    #[test]
    fn test_dbscan_empty_input() {
        let labels = dbscan(0, 0.5, 2, |_, _| 0.0);
        assert!(labels.is_empty());
        assert!(group_labels(&labels).is_empty());
    }
}
