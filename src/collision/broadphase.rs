//! Broad phase collision detection algorithms
//! are responsible for detecting pairs of possibly intersecting objects
//! for further, more accurate narrow phase inspection.
//!
//! Objects are represented by their axis-aligned bounds quantized to integer intervals.
//! Quantization only ever grows a box, so the broad phase never misses a pair
//! whose real bounds overlap.

use itertools::Itertools;
use rand::{rngs::SmallRng, Rng, SeedableRng};

use super::shape::AABB;

/// Half-open integer interval `[lo, hi)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Interval {
    pub lo: i64,
    pub hi: i64,
}

impl Interval {
    /// The interval covering every representable value.
    pub const ALL: Interval = Interval {
        lo: i64::MIN,
        hi: i64::MAX,
    };

    #[inline]
    pub fn new(lo: i64, hi: i64) -> Self {
        Interval { lo, hi }
    }

    /// The smallest interval containing the closed real range `[min, max]`.
    /// Values beyond the range of `i64` saturate.
    #[inline]
    pub fn from_bounds(min: f64, max: f64) -> Self {
        Interval {
            lo: min.floor() as i64,
            hi: (max.floor() as i64).saturating_add(1),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lo >= self.hi
    }

    #[inline]
    pub fn intersects(&self, other: &Interval) -> bool {
        self.lo < other.hi && other.lo < self.hi
    }
}

/// A quantized bounding box tagged with the id of the object it bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IntervalBox<K> {
    pub id: K,
    /// Extents along x and y.
    pub dims: [Interval; 2],
}

impl<K: Copy + Ord> IntervalBox<K> {
    pub fn new(id: K, x: Interval, y: Interval) -> Self {
        IntervalBox { id, dims: [x, y] }
    }

    pub fn from_aabb(id: K, aabb: &AABB) -> Self {
        Self::new(
            id,
            Interval::from_bounds(aabb.min.x, aabb.max.x),
            Interval::from_bounds(aabb.min.y, aabb.max.y),
        )
    }

    #[inline]
    pub fn intersects(&self, other: &IntervalBox<K>) -> bool {
        self.dims
            .iter()
            .zip(&other.dims)
            .all(|(a, b)| a.intersects(b))
    }

    #[inline]
    fn lo(&self, d: usize) -> i64 {
        self.dims[d].lo
    }

    #[inline]
    fn hi(&self, d: usize) -> i64 {
        self.dims[d].hi
    }

    /// Sort key along dimension `d`. Ties between equal starts are broken by id
    /// so that every pair of distinct boxes has a strict order.
    #[inline]
    fn key(&self, d: usize) -> (i64, K) {
        (self.lo(d), self.id)
    }

    /// Whether this box, as an interval, contains the start of `point` along dimension `d`.
    #[inline]
    fn contains_start(&self, point: &IntervalBox<K>, d: usize) -> bool {
        self.key(d) < point.key(d) && point.lo(d) < self.hi(d)
    }
}

/// Parameters for the hybrid broad phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde-types", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde-types", serde(default))]
pub struct BroadPhaseParams {
    /// Below this many boxes on either side, the recursion stops subdividing
    /// and falls back to a sweep over the remaining boxes.
    pub cutoff: usize,
    /// Seed for the random sampling used to pick split points.
    /// The same input with the same seed always produces the same output order.
    pub seed: u64,
}

impl Default for BroadPhaseParams {
    fn default() -> Self {
        Self {
            cutoff: 1000,
            seed: 0x5eed,
        }
    }
}

impl BroadPhaseParams {
    pub fn with_cutoff(mut self, cutoff: usize) -> Self {
        self.cutoff = cutoff;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// A broad phase algorithm.
pub trait BroadPhase {
    /// Pairs of intersecting boxes with one box from each set, as `[left_id, right_id]`.
    /// Boxes with equal ids never pair up.
    fn pairs_between<K: Copy + Ord>(
        &self,
        left: &[IntervalBox<K>],
        right: &[IntervalBox<K>],
    ) -> Vec<[K; 2]>;

    /// Every pair of intersecting boxes within one set,
    /// reported once each with the smaller id first.
    fn pairs_within<K: Copy + Ord>(&self, boxes: &[IntervalBox<K>]) -> Vec<[K; 2]>;
}

/// The simplest possible broad phase algorithm,
/// which tests every box against every other box.
/// Very inefficient, but useful as a reference and for tiny sets.
#[derive(Clone, Copy, Debug, Default)]
pub struct BruteForce;

impl BroadPhase for BruteForce {
    fn pairs_between<K: Copy + Ord>(
        &self,
        left: &[IntervalBox<K>],
        right: &[IntervalBox<K>],
    ) -> Vec<[K; 2]> {
        left.iter()
            .cartesian_product(right)
            .filter(|(l, r)| l.id != r.id && l.intersects(r))
            .map(|(l, r)| [l.id, r.id])
            .collect()
    }

    fn pairs_within<K: Copy + Ord>(&self, boxes: &[IntervalBox<K>]) -> Vec<[K; 2]> {
        boxes
            .iter()
            .tuple_combinations()
            .filter(|(a, b)| a.id != b.id && a.intersects(b))
            .map(|(a, b)| ordered(a.id, b.id))
            .collect()
    }
}

/// The hybrid streamed segment tree of Zomorodian and Edelsbrunner
/// ("Fast software for box intersections", 2002).
///
/// Recursively splits space along y around approximate medians,
/// resolving boxes that span a whole slab with a sweep along x,
/// until the sets are small enough to sweep directly.
/// Expected running time is O(n log² n + k) for k reported pairs.
#[derive(Clone, Copy, Debug, Default)]
pub struct HybridBoxIntersection {
    pub params: BroadPhaseParams,
}

impl HybridBoxIntersection {
    pub fn new(params: BroadPhaseParams) -> Self {
        Self { params }
    }

    fn scan<K>(&self) -> Scan<K> {
        Scan {
            cutoff: self.params.cutoff.max(1),
            rng: SmallRng::seed_from_u64(self.params.seed),
            pairs: Vec::new(),
        }
    }
}

const TOP_DIM: usize = 1;

impl BroadPhase for HybridBoxIntersection {
    fn pairs_between<K: Copy + Ord>(
        &self,
        left: &[IntervalBox<K>],
        right: &[IntervalBox<K>],
    ) -> Vec<[K; 2]> {
        let _span = crate::tracy_span!("broad phase", "pairs_between");

        let mut scan = self.scan();
        let mut left = left.to_vec();
        let mut right = right.to_vec();
        scan.hybrid(&mut left, &mut right, Interval::ALL, TOP_DIM, false);
        scan.hybrid(&mut right, &mut left, Interval::ALL, TOP_DIM, true);
        scan.pairs
    }

    fn pairs_within<K: Copy + Ord>(&self, boxes: &[IntervalBox<K>]) -> Vec<[K; 2]> {
        let _span = crate::tracy_span!("broad phase", "pairs_within");

        // one pass over two copies of the set finds each unordered pair once,
        // the other orientation is rejected by the tie-breaking order
        let mut scan = self.scan();
        let mut intervals = boxes.to_vec();
        let mut points = boxes.to_vec();
        scan.hybrid(&mut intervals, &mut points, Interval::ALL, TOP_DIM, false);
        scan.pairs
            .into_iter()
            .map(|[a, b]| ordered(a, b))
            .collect()
    }
}

#[inline]
fn ordered<K: Ord>(a: K, b: K) -> [K; 2] {
    if a <= b {
        [a, b]
    } else {
        [b, a]
    }
}

/// State of one broad phase run.
struct Scan<K> {
    cutoff: usize,
    rng: SmallRng,
    pairs: Vec<[K; 2]>,
}

impl<K: Copy + Ord> Scan<K> {
    #[inline]
    fn report(&mut self, interval: &IntervalBox<K>, point: &IntervalBox<K>, swapped: bool) {
        if interval.id == point.id {
            return;
        }
        if swapped {
            self.pairs.push([point.id, interval.id]);
        } else {
            self.pairs.push([interval.id, point.id]);
        }
    }

    /// Report every pair where `interval` contains the start of `point` along dimension `d`
    /// and the two overlap in all dimensions below `d`.
    /// Only points starting inside `window` along `d` are considered.
    fn hybrid(
        &mut self,
        intervals: &mut [IntervalBox<K>],
        points: &mut [IntervalBox<K>],
        window: Interval,
        d: usize,
        swapped: bool,
    ) {
        if intervals.is_empty() || points.is_empty() || window.is_empty() {
            return;
        }
        if d == 0 {
            self.one_way_scan(intervals, points, swapped);
            return;
        }
        if intervals.len() < self.cutoff || points.len() < self.cutoff {
            self.modified_two_way_scan(intervals, points, d, swapped);
            return;
        }

        // intervals covering the whole window contain every point in it,
        // so the rest of their pairs are found one dimension down
        let span_count = partition(intervals, |i| {
            i.lo(d) < window.lo && i.hi(d) >= window.hi
        });
        let (spanning, intervals) = intervals.split_at_mut(span_count);
        if !spanning.is_empty() {
            self.hybrid(spanning, points, Interval::ALL, d - 1, swapped);
            self.hybrid(points, spanning, Interval::ALL, d - 1, !swapped);
        }
        if intervals.is_empty() {
            return;
        }

        let mid = approx_median(points, d, &mut self.rng);
        let low_count = partition(points, |p| p.lo(d) < mid);
        if low_count == 0 || low_count == points.len() {
            // every start in the window is equal to the split point,
            // narrowing further can't separate anything
            self.modified_two_way_scan(intervals, points, d, swapped);
            return;
        }
        let (low_points, high_points) = points.split_at_mut(low_count);

        let low_window = Interval::new(window.lo, mid);
        let low_count = partition(intervals, |i| i.lo(d) < mid);
        self.hybrid(&mut intervals[..low_count], low_points, low_window, d, swapped);

        let high_window = Interval::new(mid, window.hi);
        let high_count = partition(intervals, |i| i.hi(d) > mid);
        self.hybrid(&mut intervals[..high_count], high_points, high_window, d, swapped);
    }

    /// Sweep along x reporting every interval-point pair where
    /// the interval contains the start of the point.
    fn one_way_scan(
        &mut self,
        intervals: &mut [IntervalBox<K>],
        points: &mut [IntervalBox<K>],
        swapped: bool,
    ) {
        intervals.sort_unstable_by_key(|b| b.key(0));
        points.sort_unstable_by_key(|b| b.key(0));

        let mut first_point = 0;
        for interval in intervals.iter() {
            while first_point < points.len() && points[first_point].key(0) <= interval.key(0) {
                first_point += 1;
            }
            for point in &points[first_point..] {
                if point.lo(0) >= interval.hi(0) {
                    break;
                }
                self.report(interval, point, swapped);
            }
        }
    }

    /// Sweep along x visiting every interval-point pair that overlaps along x once,
    /// from whichever of the two starts first.
    /// Pairs are reported if the interval also contains the start of the point along `d`.
    fn modified_two_way_scan(
        &mut self,
        intervals: &mut [IntervalBox<K>],
        points: &mut [IntervalBox<K>],
        d: usize,
        swapped: bool,
    ) {
        intervals.sort_unstable_by_key(|b| b.key(0));
        points.sort_unstable_by_key(|b| b.key(0));

        let (mut i_idx, mut p_idx) = (0, 0);
        while i_idx < intervals.len() && p_idx < points.len() {
            let interval = intervals[i_idx];
            let point = points[p_idx];
            if interval.key(0) < point.key(0) {
                for point in &points[p_idx..] {
                    if point.lo(0) >= interval.hi(0) {
                        break;
                    }
                    if interval.contains_start(point, d) {
                        self.report(&interval, point, swapped);
                    }
                }
                i_idx += 1;
            } else {
                for interval in &intervals[i_idx..] {
                    if interval.lo(0) >= point.hi(0) {
                        break;
                    }
                    if interval.contains_start(&point, d) {
                        self.report(interval, &point, swapped);
                    }
                }
                p_idx += 1;
            }
        }
    }
}

/// Pick a split value close to the median of the point starts along `d`
/// by taking the median of a random sample of about 10·log₂(n) starts.
fn approx_median<K>(points: &[IntervalBox<K>], d: usize, rng: &mut SmallRng) -> i64 {
    let n = points.len();
    let sample_size = ((10.0 * (n as f64).log2()).ceil() as usize).max(1);
    let mut sample: Vec<i64> = if sample_size >= n {
        points.iter().map(|p| p.dims[d].lo).collect()
    } else {
        (0..sample_size)
            .map(|_| points[rng.gen_range(0..n)].dims[d].lo)
            .collect()
    };
    sample.sort_unstable();
    sample[sample.len() / 2]
}

/// Reorder `items` so that those matching `pred` come first,
/// returning how many matched.
fn partition<T>(items: &mut [T], pred: impl Fn(&T) -> bool) -> usize {
    let mut matched = 0;
    for idx in 0..items.len() {
        if pred(&items[idx]) {
            items.swap(matched, idx);
            matched += 1;
        }
    }
    matched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec2;
    use proptest::prelude::*;
    use rand::rngs::StdRng;

    fn unit_box(id: u32, x: i64, y: i64) -> IntervalBox<u32> {
        IntervalBox::new(id, Interval::new(x, x + 1), Interval::new(y, y + 1))
    }

    fn sorted(mut pairs: Vec<[u32; 2]>) -> Vec<[u32; 2]> {
        pairs.sort_unstable();
        pairs
    }

    fn random_boxes(rng: &mut StdRng, count: u32, extent: i64, max_size: i64) -> Vec<IntervalBox<u32>> {
        (0..count)
            .map(|id| {
                let x = rng.gen_range(-extent..extent);
                let y = rng.gen_range(-extent..extent);
                let w = rng.gen_range(1..=max_size);
                let h = rng.gen_range(1..=max_size);
                IntervalBox::new(id, Interval::new(x, x + w), Interval::new(y, y + h))
            })
            .collect()
    }

    #[test]
    fn quantization_is_conservative() {
        assert_eq!(Interval::from_bounds(0.2, 0.7), Interval::new(0, 1));
        assert_eq!(Interval::from_bounds(-1.5, 1.0), Interval::new(-2, 2));
        // touching real bounds still overlap after quantization
        let a = Interval::from_bounds(0.0, 1.0);
        let b = Interval::from_bounds(1.0, 2.0);
        assert!(a.intersects(&b));
        assert_eq!(
            Interval::from_bounds(f64::NEG_INFINITY, f64::INFINITY),
            Interval::new(i64::MIN, i64::MAX)
        );
    }

    #[test]
    fn partition_moves_matches_first() {
        let mut items = [5, 2, 8, 1, 9, 3];
        let count = partition(&mut items, |x| *x < 4);
        assert_eq!(count, 3);
        assert!(items[..count].iter().all(|x| *x < 4));
        assert!(items[count..].iter().all(|x| *x >= 4));
    }

    #[test]
    fn empty_and_self_inputs_give_no_pairs() {
        let hybrid = HybridBoxIntersection::default();
        let boxes = vec![unit_box(0, 0, 0)];
        assert!(hybrid.pairs_within(&boxes).is_empty());
        assert!(hybrid.pairs_between(&boxes, &boxes).is_empty());
        assert!(hybrid.pairs_between(&boxes, &[]).is_empty());
        assert!(hybrid.pairs_within::<u32>(&[]).is_empty());
    }

    #[test]
    fn separated_grid_has_no_pairs() {
        let boxes: Vec<_> = (0..1000)
            .map(|id| unit_box(id, (id % 40) as i64 * 10, (id / 40) as i64 * 10))
            .collect();
        let hybrid = HybridBoxIntersection::new(BroadPhaseParams::default().with_cutoff(16));
        assert!(hybrid.pairs_within(&boxes).is_empty());
    }

    #[test]
    fn identical_boxes_all_pair_up() {
        let n = 60;
        let boxes: Vec<_> = (0..n).map(|id| unit_box(id, 3, 3)).collect();
        let hybrid = HybridBoxIntersection::new(BroadPhaseParams::default().with_cutoff(4));
        let pairs = hybrid.pairs_within(&boxes);
        assert_eq!(pairs.len() as u32, n * (n - 1) / 2);
        assert!(pairs.iter().all(|[a, b]| a < b));
        assert_eq!(sorted(pairs), sorted(BruteForce.pairs_within(&boxes)));
    }

    #[test]
    fn between_sets_keeps_sides() {
        let left = vec![unit_box(0, 0, 0), unit_box(1, 5, 5)];
        let right = vec![unit_box(10, 0, 0), unit_box(11, 20, 20)];
        let hybrid = HybridBoxIntersection::default();
        assert_eq!(hybrid.pairs_between(&left, &right), vec![[0, 10]]);
        assert_eq!(hybrid.pairs_between(&right, &left), vec![[10, 0]]);

        // a box shared by both sides under one id, with different extents
        let left = vec![IntervalBox::new(0, Interval::new(0, 2), Interval::new(0, 2))];
        let right = vec![IntervalBox::new(0, Interval::new(1, 3), Interval::new(1, 3))];
        assert!(hybrid.pairs_between(&left, &right).is_empty());
        assert!(hybrid.pairs_between(&right, &left).is_empty());
        assert!(BruteForce.pairs_between(&left, &right).is_empty());
    }

    #[test]
    fn same_seed_gives_same_order() {
        let mut rng = StdRng::seed_from_u64(7);
        let boxes = random_boxes(&mut rng, 400, 100, 12);
        let hybrid = HybridBoxIntersection::new(BroadPhaseParams::default().with_cutoff(8));
        assert_eq!(hybrid.pairs_within(&boxes), hybrid.pairs_within(&boxes));
    }

    #[test]
    fn recursion_matches_brute_force() {
        let mut rng = StdRng::seed_from_u64(1234);
        for &cutoff in &[1, 3, 20, 1000] {
            let hybrid = HybridBoxIntersection::new(BroadPhaseParams::default().with_cutoff(cutoff));
            let boxes = random_boxes(&mut rng, 300, 50, 15);
            let pairs = hybrid.pairs_within(&boxes);
            assert_eq!(pairs.iter().unique().count(), pairs.len());
            assert_eq!(sorted(pairs), sorted(BruteForce.pairs_within(&boxes)));

            let others: Vec<_> = random_boxes(&mut rng, 200, 50, 15)
                .into_iter()
                .map(|b| IntervalBox { id: b.id + 1000, ..b })
                .collect();
            assert_eq!(
                sorted(hybrid.pairs_between(&boxes, &others)),
                sorted(BruteForce.pairs_between(&boxes, &others))
            );
        }
    }

    #[test]
    fn aabbs_quantize_into_boxes() {
        let aabb = AABB {
            min: Vec2::new(-0.5, 2.0),
            max: Vec2::new(0.5, 2.9),
        };
        let b = IntervalBox::from_aabb(3u32, &aabb);
        assert_eq!(b.dims, [Interval::new(-1, 1), Interval::new(2, 3)]);
    }

    #[cfg(feature = "serde-types")]
    #[test]
    fn params_from_ron() {
        let params: BroadPhaseParams = ron::from_str("(cutoff: 64)").expect("valid params");
        assert_eq!(params.cutoff, 64);
        assert_eq!(params.seed, BroadPhaseParams::default().seed);
    }

    proptest! {
        #[test]
        fn never_misses_overlapping_bounds(
            raw in prop::collection::vec(
                (-30.0..30.0f64, -30.0..30.0f64, 0.0..6.0f64, 0.0..6.0f64),
                0..120,
            ),
            cutoff in 1usize..12,
        ) {
            let aabbs: Vec<AABB> = raw
                .iter()
                .map(|&(x, y, w, h)| AABB {
                    min: Vec2::new(x, y),
                    max: Vec2::new(x + w, y + h),
                })
                .collect();
            let boxes: Vec<_> = aabbs
                .iter()
                .enumerate()
                .map(|(id, aabb)| IntervalBox::from_aabb(id as u32, aabb))
                .collect();
            let hybrid = HybridBoxIntersection::new(BroadPhaseParams::default().with_cutoff(cutoff));
            let pairs = hybrid.pairs_within(&boxes);

            for (a, b) in (0..aabbs.len()).tuple_combinations() {
                let found = pairs.contains(&[a as u32, b as u32]);
                if aabbs[a].intersects(&aabbs[b]) {
                    prop_assert!(found);
                }
                prop_assert_eq!(found, boxes[a].intersects(&boxes[b]));
            }
        }
    }
}
