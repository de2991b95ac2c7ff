/// Fold raw structural weights into a graph-ready edge weight matrix.
///
/// Each row of `raw` is divided by its row sum (rows summing to zero come
/// out all-zero rather than NaN), then the binary adjacency is added back
/// elementwise so edge existence survives the rescaling. The result is
/// finite everywhere and strictly positive wherever `adjacency` is 1.
pub fn normalize_weights(raw: &[Vec<f64>], adjacency: &[Vec<u8>]) -> Vec<Vec<f64>> {
    raw.iter()
        .zip(adjacency.iter())
        .map(|(row, adj_row)| {
            let sum: f64 = row.iter().sum();
            row.iter()
                .zip(adj_row.iter())
                .map(|(&w, &a)| {
                    let scaled = w / sum;
                    let scaled = if scaled.is_finite() { scaled } else { 0.0 };
                    scaled + a as f64
                })
                .collect()
        })
        .collect()
}

/// Diagnostic inverse of [`normalize_weights`]: recovers the approximate
/// structural component of a combined matrix, plus a diagonal-corrected
/// variant. Not used by training.
pub fn split_combined(combined: &[Vec<f64>]) -> (Vec<Vec<f64>>, Vec<Vec<f64>>) {
    let n = combined.len();

    let mut structural = vec![vec![0.0; n]; n];
    for (i, row) in combined.iter().enumerate() {
        let shifted: Vec<f64> = row
            .iter()
            .map(|&w| if w > 0.0 { w - 1.0 } else { w })
            .collect();
        let positives = shifted.iter().filter(|&&w| w > 0.0).count() as f64;
        for (j, &w) in shifted.iter().enumerate() {
            structural[i][j] = w * positives;
        }
    }

    let mut corrected = combined.to_vec();
    for (i, row) in combined.iter().enumerate() {
        let row_sum: f64 = row.iter().sum();
        corrected[i][i] += row_sum;
    }
    for row in corrected.iter_mut() {
        for w in row.iter_mut() {
            if !w.is_finite() {
                *w = 0.0;
            }
        }
    }

    (structural, corrected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_row_normalizes_to_adjacency_only() {
        let raw = vec![vec![0.0, 0.0], vec![0.0, 0.0]];
        let adj = vec![vec![0u8, 1], vec![1, 0]];
        let combined = normalize_weights(&raw, &adj);
        assert_eq!(combined, vec![vec![0.0, 1.0], vec![1.0, 0.0]]);
    }

    #[test]
    fn output_is_finite_and_positive_on_edges() {
        let raw = vec![
            vec![0.0, 8.0, 0.0, 8.0],
            vec![8.0, 0.0, 8.0, 0.0],
            vec![0.0, 8.0, 0.0, 8.0],
            vec![8.0, 0.0, 8.0, 0.0],
        ];
        let adj = vec![
            vec![0u8, 1, 0, 1],
            vec![1, 0, 1, 0],
            vec![0, 1, 0, 1],
            vec![1, 0, 1, 0],
        ];
        let combined = normalize_weights(&raw, &adj);
        for (i, row) in combined.iter().enumerate() {
            for (j, &w) in row.iter().enumerate() {
                assert!(w.is_finite());
                if adj[i][j] == 1 {
                    assert!(w > 1.0, "edge ({}, {}) lost its weight", i, j);
                } else {
                    assert_eq!(w, 0.0);
                }
            }
        }
        // ring rows split evenly: 0.5 structural + 1 adjacency
        assert!((combined[0][1] - 1.5).abs() < 1e-12);
    }

    #[test]
    fn split_combined_round_trips_positive_count() {
        let raw = vec![vec![0.0, 4.0], vec![4.0, 0.0]];
        let adj = vec![vec![0u8, 1], vec![1, 0]];
        let combined = normalize_weights(&raw, &adj);
        let (structural, corrected) = split_combined(&combined);
        // one positive entry per row, weight 1.0 after removing adjacency
        assert!((structural[0][1] - 1.0).abs() < 1e-12);
        assert!((corrected[0][0] - 2.0).abs() < 1e-12);
        for row in &corrected {
            assert!(row.iter().all(|w| w.is_finite()));
        }
    }
}
