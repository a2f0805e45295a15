//! Heuristic ranking of clusters into primary, secondary and palette colors.
//!
//! Each non-empty cluster is represented by its closest real pixel. Saturation,
//! value and point count are normalized by their maxima over all clusters:
//!
//! ```text
//! sf = s / maxS * curve(v / maxV)
//! vf = v / maxV
//! cf = count / maxCount
//! ```
//!
//! `curve` suppresses the saturation of dark colors, so near-black pixels with a
//! high raw saturation do not win. The primary color maximizes a weighted sum of
//! the three factors. The secondary color maximizes
//!
//! ```text
//! (sf*ws + vf*wv) * (cf*wc + distanceToPrimary*wd) - primaryScore*wp
//! ```
//!
//! which favors colors that are salient on their own and far from the primary.
//! Every remaining cluster is scored relative to the secondary's winning score.

use palette::Srgb;
use serde::Serialize;

use crate::ExtractorConfig;
use crate::cone::ConePoint;
use crate::kmeans::Cluster;

/// Nonlinear correction applied to normalized value before it scales saturation.
///
/// `5.85317x⁴ − 13.254x³ + 8.6379x² − 0.237103x`, clamped to `[0, 1]` for any input.
pub fn nonlinear_curve(x: f64) -> f64 {
    let x2 = x * x;
    let y = 5.85317 * x2 * x2 - 13.254 * x2 * x + 8.6379 * x2 - 0.237103 * x;
    if y.is_nan() { 0.0 } else { y.clamp(0.0, 1.0) }
}

/// Derived record for one non-empty cluster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClusterScore {
    /// Position of the cluster in the clustering
    pub cluster: usize,
    /// Color of the member pixel closest to the centroid
    #[serde(serialize_with = "crate::output::serialize_srgb")]
    pub rgb: Srgb<u8>,
    pub hue: f64,
    pub saturation: f64,
    pub value: f64,
    pub count: usize,
    pub primary_score: f64,
    /// Zero for the primary cluster itself
    pub secondary_score: f64,
}

/// Scores of every non-empty cluster plus the selection made from them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredClusters {
    pub scores: Vec<ClusterScore>,
    /// Index into `scores`
    pub primary: usize,
    /// Index into `scores`; `None` when only one cluster is non-empty
    pub secondary: Option<usize>,
    pub primary_max_score: f64,
    pub secondary_max_score: f64,
}

impl ScoredClusters {
    pub fn primary(&self) -> &ClusterScore {
        &self.scores[self.primary]
    }

    pub fn secondary(&self) -> Option<&ClusterScore> {
        self.secondary.map(|i| &self.scores[i])
    }

    /// Clusters that are neither primary nor secondary, in cluster order.
    pub fn remainder(&self) -> impl Iterator<Item = &ClusterScore> {
        self.scores
            .iter()
            .enumerate()
            .filter(move |(i, _)| *i != self.primary && Some(*i) != self.secondary)
            .map(|(_, score)| score)
    }

    /// Secondary score scaled by the secondary's own winning score, within `[0, 1]`.
    pub fn palette_score(&self, score: &ClusterScore) -> f64 {
        normalize(score.secondary_score, self.secondary_max_score)
    }
}

/// `score / max` clamped to `[0, 1]`, zero when `max` is not positive.
pub(crate) fn normalize(score: f64, max: f64) -> f64 {
    if max > 0.0 {
        (score / max).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Maxima used to normalize the per-cluster factors.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Normalization {
    max_count: f64,
    max_saturation: f64,
    max_value: f64,
}

impl Normalization {
    fn over(summaries: &[Summary<'_>]) -> Self {
        let mut max_count = 0usize;
        let mut max_saturation = 0.0f64;
        let mut max_value = 0.0f64;
        for s in summaries {
            max_count = max_count.max(s.count);
            max_saturation = max_saturation.max(s.representative.saturation());
            max_value = max_value.max(s.representative.value());
        }

        // fully desaturated or black images
        Self {
            max_count: max_count.max(1) as f64,
            max_saturation: if max_saturation > 0.0 { max_saturation } else { 1.0 },
            max_value: if max_value > 0.0 { max_value } else { 1.0 },
        }
    }

    /// `(sf, vf, cf)` for one cluster.
    fn factors(&self, s: &Summary<'_>) -> (f64, f64, f64) {
        let vf = s.representative.value() / self.max_value;
        let sf = s.representative.saturation() / self.max_saturation * nonlinear_curve(vf);
        let cf = s.count as f64 / self.max_count;
        (sf, vf, cf)
    }
}

struct Summary<'c> {
    cluster: &'c Cluster<'c, ConePoint>,
    representative: ConePoint,
    count: usize,
}

/// Scores clusters with the weights of an [`ExtractorConfig`].
#[derive(Debug, Clone, Copy)]
pub struct ColorScorer<'c> {
    config: &'c ExtractorConfig,
}

impl<'c> ColorScorer<'c> {
    pub fn new(config: &'c ExtractorConfig) -> Self {
        Self { config }
    }

    /// Score every non-empty cluster and pick primary and secondary.
    ///
    /// Returns `None` when every cluster is empty.
    pub fn score(&self, clusters: &[Cluster<'_, ConePoint>]) -> Option<ScoredClusters> {
        let summaries: Vec<Summary<'_>> = clusters
            .iter()
            .filter_map(|cluster| {
                cluster.closest_real_point().map(|p| Summary {
                    cluster,
                    representative: *p,
                    count: cluster.count(),
                })
            })
            .collect();
        if summaries.is_empty() {
            return None;
        }

        let norm = Normalization::over(&summaries);

        let primary_scores: Vec<f64> = summaries
            .iter()
            .map(|s| self.primary_score(s, &norm))
            .collect();
        let (primary, primary_max_score) = arg_max(primary_scores.iter().copied().enumerate())?;

        let secondary_scores: Vec<f64> = summaries
            .iter()
            .zip(&primary_scores)
            .enumerate()
            .map(|(i, (s, &p))| {
                if i == primary {
                    0.0
                } else {
                    self.secondary_score(s, p, &summaries[primary], &norm)
                }
            })
            .collect();
        let secondary = arg_max(
            secondary_scores
                .iter()
                .copied()
                .enumerate()
                .filter(|&(i, _)| i != primary),
        );

        let scores = summaries
            .iter()
            .zip(primary_scores.iter().zip(&secondary_scores))
            .map(|(s, (&p, &sec))| ClusterScore {
                cluster: s.cluster.index(),
                rgb: s.representative.rgb,
                hue: s.representative.hue(),
                saturation: s.representative.saturation(),
                value: s.representative.value(),
                count: s.count,
                primary_score: p,
                secondary_score: sec,
            })
            .collect();

        let scored = ScoredClusters {
            scores,
            primary,
            secondary: secondary.map(|(i, _)| i),
            primary_max_score,
            secondary_max_score: secondary.map_or(0.0, |(_, score)| score),
        };
        tracing::debug!(
            clusters = scored.scores.len(),
            primary = scored.primary().cluster,
            secondary = ?scored.secondary().map(|s| s.cluster),
            "Scored clusters"
        );
        Some(scored)
    }

    fn primary_score(&self, s: &Summary<'_>, norm: &Normalization) -> f64 {
        let weights = &self.config.primary;
        let (sf, vf, cf) = norm.factors(s);

        let mut score =
            sf * weights.saturation_weight + vf * weights.value_weight + cf * weights.count_weight;

        if s.representative.saturation() < norm.max_saturation * self.config.saturation_low_threshold
        {
            score *= self.config.saturation_low_penalty;
        }
        if s.representative.value() < norm.max_value * self.config.value_low_threshold {
            score *= self.config.value_low_penalty;
        }
        score
    }

    fn secondary_score(
        &self,
        s: &Summary<'_>,
        primary_score: f64,
        primary: &Summary<'_>,
        norm: &Normalization,
    ) -> f64 {
        let weights = &self.config.secondary;
        let (sf, vf, cf) = norm.factors(s);
        let distance = s.cluster.distance_to(primary.cluster);

        let salience = sf * weights.saturation_weight + vf * weights.value_weight;
        let separation = cf * weights.count_weight + distance * weights.pri_distance_weight;
        let mut score = salience * separation - primary_score * weights.pri_score_difference_weight;

        // thresholds apply to the normalized factors here
        if sf < self.config.saturation_low_threshold {
            score *= self.config.saturation_low_penalty;
        }
        if vf < self.config.value_low_threshold {
            score *= self.config.value_low_penalty;
        }
        score
    }
}

/// First index holding the strictly greatest value.
fn arg_max(values: impl Iterator<Item = (usize, f64)>) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (i, v) in values {
        if best.is_none_or(|(_, best_v)| v > best_v) {
            best = Some((i, v));
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cone::to_cone_point;
    use crate::kmeans::KMeans;
    use rand::{SeedableRng, rngs::StdRng};

    fn points(colors: &[([u8; 3], usize)], config: &ExtractorConfig) -> Vec<ConePoint> {
        colors
            .iter()
            .flat_map(|&([r, g, b], n)| {
                std::iter::repeat_n(
                    to_cone_point(Srgb::new(r, g, b), config.value_distance_multiplier),
                    n,
                )
            })
            .collect()
    }

    fn score(colors: &[([u8; 3], usize)], k: usize, config: &ExtractorConfig) -> ScoredClusters {
        let pts = points(colors, config);
        let clustering = KMeans::new(k)
            .unwrap()
            .fit(&pts, &mut StdRng::seed_from_u64(42))
            .unwrap();
        ColorScorer::new(config).score(&clustering.clusters()).unwrap()
    }

    #[test]
    fn test_curve_endpoints_and_clamp() {
        assert!(nonlinear_curve(0.0).abs() < 1e-12);
        assert!((nonlinear_curve(1.0) - 1.0).abs() < 1e-3);
        assert!(nonlinear_curve(0.1) < 0.1);
        assert!(nonlinear_curve(0.8) > 0.9);

        for x in [-10.0, -1.0, -0.01, 1.01, 2.0, 50.0, f64::INFINITY, f64::NAN] {
            let y = nonlinear_curve(x);
            assert!((0.0..=1.0).contains(&y), "curve({x}) = {y}");
        }
    }

    #[test]
    fn test_curve_is_small_for_dark_values() {
        for i in 0..=20 {
            let x = i as f64 / 100.0;
            assert!(nonlinear_curve(x) < 0.3, "curve({x})");
        }
    }

    #[test]
    fn test_dominant_hue_is_primary_and_other_is_secondary() {
        let config = ExtractorConfig::default();
        let scored = score(&[([255, 0, 0], 900), ([0, 0, 255], 100)], 2, &config);

        assert_eq!(scored.primary().rgb, Srgb::new(255, 0, 0));
        assert_eq!(scored.primary().count, 900);
        assert_eq!(scored.secondary().map(|s| s.rgb), Some(Srgb::new(0, 0, 255)));
        assert_eq!(scored.primary().secondary_score, 0.0);
        assert_eq!(scored.remainder().count(), 0);
    }

    #[test]
    fn test_near_black_does_not_win_on_saturation() {
        let config = ExtractorConfig::default();
        // very dark but fully saturated red vs a muted bright color of equal area
        let scored = score(&[([20, 0, 0], 500), ([200, 180, 150], 500)], 2, &config);
        assert_eq!(scored.primary().rgb, Srgb::new(200, 180, 150));
    }

    #[test]
    fn test_single_color_has_no_secondary() {
        let config = ExtractorConfig::default();
        let scored = score(&[([30, 120, 200], 50)], 3, &config);

        assert_eq!(scored.scores.len(), 1);
        assert_eq!(scored.primary().rgb, Srgb::new(30, 120, 200));
        assert_eq!(scored.secondary, None);
        assert_eq!(scored.secondary_max_score, 0.0);

        // cf = 1, sf = curve(1), vf = 1, no penalties
        let weights = &config.primary;
        let expected =
            nonlinear_curve(1.0) * weights.saturation_weight + weights.value_weight + weights.count_weight;
        assert!((scored.primary().primary_score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_all_black_image_does_not_divide_by_zero() {
        let config = ExtractorConfig::default();
        let scored = score(&[([0, 0, 0], 10)], 2, &config);
        assert!(scored.primary().primary_score.is_finite());
        assert_eq!(scored.primary().rgb, Srgb::new(0, 0, 0));
    }

    #[test]
    fn test_grays_are_finite_and_distinct() {
        let config = ExtractorConfig::default();
        let scored = score(&[([0, 0, 0], 10), ([128, 128, 128], 10), ([255, 255, 255], 10)], 3, &config);

        assert_eq!(scored.scores.len(), 3);
        assert!(scored.scores.iter().all(|s| s.primary_score.is_finite()));
        assert!(scored.scores.iter().all(|s| s.secondary_score.is_finite()));
        let secondary = scored.secondary().unwrap();
        assert_ne!(secondary.rgb, scored.primary().rgb);
    }

    #[test]
    fn test_primary_penalties_apply_below_thresholds() {
        let config = ExtractorConfig {
            primary: crate::config::PrimaryWeights {
                saturation_weight: 0.0,
                value_weight: 0.0,
                count_weight: 1.0,
            },
            ..Default::default()
        };
        // equal counts: a saturated bright color vs a gray that is also dark
        let scored = score(&[([0, 200, 0], 10), ([40, 40, 40], 10)], 2, &config);

        let gray = scored.scores.iter().find(|s| s.rgb == Srgb::new(40, 40, 40)).unwrap();
        let green = scored.scores.iter().find(|s| s.rgb == Srgb::new(0, 200, 0)).unwrap();
        assert!((green.primary_score - 1.0).abs() < 1e-12);
        let expected = config.saturation_low_penalty * config.value_low_penalty;
        assert!((gray.primary_score - expected).abs() < 1e-12);
    }

    #[test]
    fn test_palette_score_is_relative_to_secondary() {
        let config = ExtractorConfig::default();
        let scored = score(
            &[
                ([255, 0, 0], 400),
                ([0, 0, 255], 200),
                ([0, 200, 0], 150),
                ([230, 230, 0], 100),
            ],
            4,
            &config,
        );

        let secondary = scored.secondary().unwrap();
        assert_eq!(scored.palette_score(secondary), 1.0);
        for rest in scored.remainder() {
            let s = scored.palette_score(rest);
            assert!((0.0..=1.0).contains(&s));
        }
        assert_eq!(scored.remainder().count(), 2);
    }

    #[test]
    fn test_secondary_scores_and_normalized_penalties() {
        let config = ExtractorConfig::default();
        let scored = score(
            &[([255, 0, 0], 700), ([0, 0, 255], 200), ([30, 30, 30], 100)],
            3,
            &config,
        );
        let find = |rgb: Srgb<u8>| scored.scores.iter().find(|s| s.rgb == rgb).unwrap();

        assert_eq!(scored.primary().rgb, Srgb::new(255, 0, 0));
        let blue = find(Srgb::new(0, 0, 255));
        let gray = find(Srgb::new(30, 30, 30));
        assert_eq!(scored.secondary(), Some(blue));

        // (sf + 0.6 vf) * (0.5 cf + distance) - 0.25 p, with sf = curve(1), distance = √3
        let curve = nonlinear_curve(1.0);
        let p_blue = curve + 0.6 + 2.0 / 7.0 * 1.4;
        let expected_blue = (curve + 0.6) * (1.0 / 7.0 + 3f64.sqrt()) - 0.25 * p_blue;
        assert!((blue.secondary_score - expected_blue).abs() < 1e-9);
        assert!((blue.secondary_score - 2.49980).abs() < 1e-5);

        // gray has sf = 0 and vf = 30/255, both below the thresholds: 0.6 * 0.5
        let v: f64 = 30.0 / 255.0;
        let p_gray = (0.6 * v + 1.4 / 7.0) * 0.3;
        let distance = (1.0 + (0.6 - 0.6 * v).powi(2)).sqrt();
        let expected_gray = (0.6 * v * (0.5 / 7.0 + distance) - 0.25 * p_gray) * 0.3;
        assert!((gray.primary_score - p_gray).abs() < 1e-9);
        assert!((gray.secondary_score - expected_gray).abs() < 1e-9);
        assert!((gray.secondary_score - 0.0193854).abs() < 1e-6);

        assert_eq!(scored.remainder().collect::<Vec<_>>(), vec![gray]);
        assert!((scored.palette_score(gray) - 0.0077548).abs() < 1e-6);
    }

    #[test]
    fn test_arg_max_keeps_first_on_ties() {
        let values = [(0, 1.0), (1, 3.0), (2, 3.0), (3, -1.0)];
        assert_eq!(arg_max(values.into_iter()), Some((1, 3.0)));
        assert_eq!(arg_max(std::iter::empty()), None);
        assert_eq!(arg_max([(4, -2.0)].into_iter()), Some((4, -2.0)));
    }

    #[test]
    fn test_normalize_guards_denominator() {
        assert_eq!(normalize(2.0, 4.0), 0.5);
        assert_eq!(normalize(-1.0, 4.0), 0.0);
        assert_eq!(normalize(1.0, 0.0), 0.0);
        assert_eq!(normalize(1.0, -3.0), 0.0);
    }
}
