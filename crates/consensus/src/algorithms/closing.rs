use std::collections::HashSet;

use tracing::debug;

use crate::{
    error::{ConsensusError, Result},
    traits::ContourCloser,
    types::{Annotation, ClosedContour, Point},
};

/// Which end of a stroke a half-edge sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum End {
    First,
    Last,
}

/// A stroke endpoint, the unit matched when closing contours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HalfEdge {
    pub stroke: usize,
    pub end: End,
}

impl HalfEdge {
    pub fn new(stroke: usize, end: End) -> Self {
        Self { stroke, end }
    }

    /// The other end of the same stroke
    pub fn opposite(self) -> Self {
        let end = match self.end {
            End::First => End::Last,
            End::Last => End::First,
        };
        Self { stroke: self.stroke, end }
    }

    fn index(self) -> usize {
        2 * self.stroke + if self.end == End::First { 0 } else { 1 }
    }

    fn point(self, annotation: &Annotation) -> Option<Point> {
        let stroke = annotation.strokes.get(self.stroke)?;
        match self.end {
            End::First => stroke.first(),
            End::Last => stroke.last(),
        }
    }
}

/// Two half-edges joined by the matching, with the gap between them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EndpointPair {
    pub a: HalfEdge,
    pub b: HalfEdge,
    pub distance: f64,
}

fn distance(p: Point, q: Point) -> f64 {
    let dx = p[0] as f64 - q[0] as f64;
    let dy = p[1] as f64 - q[1] as f64;
    (dx * dx + dy * dy).sqrt()
}

/// Greedily pair every half-edge with its nearest free partner.
///
/// Candidate pairs are all unordered pairs of distinct half-edges, the two
/// ends of one stroke included. They are enumerated in half-edge order and
/// stably sorted by distance, so equal distances keep encounter order. A
/// pair is accepted when neither half-edge has been consumed by a shorter
/// accepted pair. The result is in acceptance order.
pub fn match_half_edges(annotation: &Annotation) -> Result<Vec<EndpointPair>> {
    if let Some(index) = annotation.strokes.iter().position(|stroke| stroke.is_empty()) {
        return Err(ConsensusError::MalformedAnnotation(format!(
            "stroke {index} has no points"
        )));
    }

    let mut half_edges = Vec::with_capacity(annotation.len() * 2);
    for stroke in 0..annotation.len() {
        for end in [End::First, End::Last] {
            let half_edge = HalfEdge::new(stroke, end);
            if let Some(point) = half_edge.point(annotation) {
                half_edges.push((half_edge, point));
            }
        }
    }

    if half_edges.len() % 2 != 0 {
        return Err(ConsensusError::MalformedAnnotation(format!(
            "odd number of stroke endpoints ({})",
            half_edges.len()
        )));
    }

    let mut candidates = Vec::with_capacity(half_edges.len() * half_edges.len().saturating_sub(1) / 2);
    for (i, &(a, p)) in half_edges.iter().enumerate() {
        for &(b, q) in &half_edges[i + 1..] {
            candidates.push(EndpointPair { a, b, distance: distance(p, q) });
        }
    }
    // sort_by is stable
    candidates.sort_by(|x, y| x.distance.total_cmp(&y.distance));

    let mut consumed: HashSet<HalfEdge> = HashSet::with_capacity(half_edges.len());
    let mut accepted = Vec::with_capacity(half_edges.len() / 2);
    for pair in candidates {
        if consumed.len() == half_edges.len() {
            break;
        }
        if consumed.contains(&pair.a) || consumed.contains(&pair.b) {
            continue;
        }
        consumed.insert(pair.a);
        consumed.insert(pair.b);
        accepted.push(pair);
    }

    if consumed.len() != half_edges.len() {
        return Err(ConsensusError::MalformedAnnotation(format!(
            "{} stroke endpoints left unmatched",
            half_edges.len() - consumed.len()
        )));
    }

    Ok(accepted)
}

/// Walk the stroke graph defined by a perfect matching and emit one closed
/// contour per cycle.
///
/// Each walk enters a stroke through one half-edge, appends its points
/// (reversed when entering through the last point), leaves through the
/// opposite end, and follows that end's partner to the next stroke. A walk
/// ends when it returns to a stroke it already appended.
pub fn reconstruct_loops(annotation: &Annotation, pairs: &[EndpointPair]) -> Result<Vec<ClosedContour>> {
    let mut partner: Vec<Option<HalfEdge>> = vec![None; annotation.len() * 2];
    for pair in pairs {
        for (from, to) in [(pair.a, pair.b), (pair.b, pair.a)] {
            let slot = partner.get_mut(from.index()).ok_or_else(|| {
                ConsensusError::MalformedAnnotation(format!("pair refers to missing stroke {}", from.stroke))
            })?;
            *slot = Some(to);
        }
    }

    let mut visited = vec![false; annotation.len()];
    let mut contours = Vec::new();

    for pair in pairs {
        if visited[pair.a.stroke] {
            continue;
        }

        let mut points = Vec::new();
        let mut entry = pair.a;
        while !visited[entry.stroke] {
            visited[entry.stroke] = true;
            let stroke = &annotation.strokes[entry.stroke];
            match entry.end {
                End::First => points.extend(stroke.points.iter().copied()),
                End::Last => points.extend(stroke.points.iter().rev().copied()),
            }

            let exit = entry.opposite();
            entry = partner[exit.index()].ok_or_else(|| {
                ConsensusError::MalformedAnnotation(format!(
                    "stroke {} has an unmatched endpoint",
                    exit.stroke
                ))
            })?;
        }

        contours.push(ClosedContour::new(points));
    }

    Ok(contours)
}

/// Nearest-endpoint contour closing: greedy half-edge matching followed by
/// cycle reconstruction.
#[derive(Debug, Clone, Default)]
pub struct NearestEndpointCloser;

impl ContourCloser for NearestEndpointCloser {
    fn close(&self, annotation: &Annotation) -> Result<Vec<ClosedContour>> {
        if annotation.is_empty() {
            return Ok(Vec::new());
        }

        let pairs = match_half_edges(annotation)?;
        let contours = reconstruct_loops(annotation, &pairs)?;
        debug!(
            strokes = annotation.len(),
            pairs = pairs.len(),
            contours = contours.len(),
            "closed annotation"
        );
        Ok(contours)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Stroke;

    fn close(lists: Vec<Vec<Point>>) -> Result<Vec<ClosedContour>> {
        NearestEndpointCloser.close(&Annotation::from_point_lists(lists))
    }

    fn is_rotation(a: &[Point], b: &[Point]) -> bool {
        a.len() == b.len() && (0..a.len()).any(|k| (0..a.len()).all(|i| a[(i + k) % a.len()] == b[i]))
    }

    #[test]
    fn test_empty_annotation_yields_no_contours() {
        let contours = close(vec![]).expect("Should close");
        assert!(contours.is_empty());
    }

    #[test]
    fn test_already_closed_stroke() {
        let stroke = vec![[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0], [0.0, 0.5]];
        let contours = close(vec![stroke.clone()]).expect("Should close");
        assert_eq!(contours.len(), 1);
        assert!(is_rotation(&contours[0].points, &stroke));
    }

    #[test]
    fn test_two_strokes_form_one_loop() {
        let contours = close(vec![
            vec![[0.0, 0.0], [1.0, 0.0]],
            vec![[1.0, 0.01], [0.0, 1.0]],
        ])
        .expect("Should close");

        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].len(), 4);
    }

    #[test]
    fn test_matching_prefers_nearest_endpoints() {
        let annotation = Annotation::from_point_lists(vec![
            vec![[0.0, 0.0], [1.0, 0.0]],
            vec![[1.0, 0.01], [0.0, 1.0]],
        ]);
        let pairs = match_half_edges(&annotation).expect("Should match");

        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].a, HalfEdge::new(0, End::Last));
        assert_eq!(pairs[0].b, HalfEdge::new(1, End::First));
        assert_eq!(pairs[1].a, HalfEdge::new(0, End::First));
        assert_eq!(pairs[1].b, HalfEdge::new(1, End::Last));
    }

    #[test]
    fn test_disjoint_shapes_yield_separate_contours() {
        let contours = close(vec![
            vec![[0.0, 0.0], [5.0, 0.0], [5.0, 5.0], [0.0, 5.0], [0.0, 0.2]],
            vec![[50.0, 50.0], [60.0, 50.0], [60.0, 60.0]],
            vec![[59.8, 60.2], [50.0, 60.0], [50.0, 50.3]],
        ])
        .expect("Should close");

        assert_eq!(contours.len(), 2);
        let lengths: Vec<usize> = contours.iter().map(ClosedContour::len).collect();
        assert!(lengths.contains(&5));
        assert!(lengths.contains(&6));
    }

    #[test]
    fn test_reversed_stroke_keeps_point_order_continuous() {
        // second stroke is drawn in the opposite direction
        let contours = close(vec![
            vec![[0.0, 0.0], [10.0, 0.0], [10.0, 10.0]],
            vec![[0.1, 0.1], [0.0, 10.0], [9.9, 10.1]],
        ])
        .expect("Should close");

        assert_eq!(contours.len(), 1);
        let points = &contours[0].points;
        for window in points.windows(2) {
            assert!(distance(window[0], window[1]) <= 10.0 + 1e-3);
        }
    }

    #[test]
    fn test_single_point_strokes() {
        let contours = close(vec![vec![[3.0, 4.0]]]).expect("Should close");
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].points, vec![[3.0, 4.0]]);
    }

    #[test]
    fn test_empty_stroke_is_malformed() {
        let annotation = Annotation::new(vec![Stroke::new(vec![[0.0, 0.0], [1.0, 1.0]]), Stroke::new(vec![])]);
        let result = NearestEndpointCloser.close(&annotation);
        assert!(matches!(result, Err(ConsensusError::MalformedAnnotation(_))));
    }

    #[test]
    fn test_matching_is_deterministic() {
        // equidistant endpoints make every tie-break visible
        let lists = vec![
            vec![[0.0, 0.0], [1.0, 0.0]],
            vec![[2.0, 0.0], [3.0, 0.0]],
            vec![[4.0, 0.0], [5.0, 0.0]],
            vec![[6.0, 0.0], [7.0, 0.0]],
        ];
        let first = close(lists.clone()).expect("Should close");
        for _ in 0..10 {
            assert_eq!(close(lists.clone()).expect("Should close"), first);
        }
    }
}
