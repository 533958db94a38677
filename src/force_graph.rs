//! Force-directed layout for node/link graphs.
//!
//! The simulation follows the d3-force defaults: link, many-body, center
//! and x/y positioning forces, an alpha that decays from 1 to 0.001 over
//! roughly 300 ticks, and velocity damping of 0.4 per tick.

use crate::error::{Result, SpliceError};
use log::debug;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    f64::consts::PI,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    #[serde(default)]
    pub group: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphLink {
    pub source: String,
    pub target: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphData {
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub links: Vec<GraphLink>,
}

impl Default for GraphData {
    /// Three-node demo graph shown when no data is given.
    fn default() -> Self {
        let node = |id: &str, group: &str| GraphNode {
            id: id.to_string(),
            group: group.to_string(),
        };
        let link = |source: &str, target: &str| GraphLink {
            source: source.to_string(),
            target: target.to_string(),
        };
        Self {
            nodes: vec![node("a", "x"), node("b", "y"), node("c", "x")],
            links: vec![link("a", "b"), link("a", "c"), link("b", "c")],
        }
    }
}

impl GraphData {
    pub fn load_from_path(path: &str) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Distinct node groups in first-seen order.
    pub fn groups(&self) -> Vec<&str> {
        let mut ret: Vec<&str> = vec![];
        for node in &self.nodes {
            if !ret.contains(&node.group.as_str()) {
                ret.push(&node.group);
            }
        }
        ret
    }
}

/// Cloneable stop signal for a running simulation. Fires when cancelled
/// explicitly or once its deadline has passed.
#[derive(Clone, Debug, Default)]
pub struct Invalidation {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Invalidation {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(3000);

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancelled: Arc::default(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_invalidated(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst) || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SimNode {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
}

#[derive(Clone, Copy, Debug)]
struct SimLink {
    source: usize,
    target: usize,
    strength: f64,
    bias: f64,
}

/// d3's linear congruential generator, used for the tiny jiggle that
/// separates coincident nodes.
#[derive(Clone, Copy, Debug)]
struct Lcg(u64);

impl Lcg {
    fn next_f64(&mut self) -> f64 {
        const A: u64 = 1_664_525;
        const C: u64 = 1_013_904_223;
        const M: u64 = 4_294_967_296;
        self.0 = (A * self.0 + C) % M;
        self.0 as f64 / M as f64
    }

    fn jiggle(&mut self) -> f64 {
        (self.next_f64() - 0.5) * 1e-6
    }
}

const INITIAL_RADIUS: f64 = 10.0;

pub struct ForceSimulation {
    nodes: Vec<SimNode>,
    links: Vec<SimLink>,
    alpha: f64,
    alpha_min: f64,
    alpha_decay: f64,
    alpha_target: f64,
    velocity_decay: f64,
    link_distance: f64,
    charge_strength: f64,
    /// Squared minimum distance of the many-body force.
    charge_distance_min2: f64,
    position_strength: f64,
    random: Lcg,
}

impl ForceSimulation {
    pub fn new(data: &GraphData) -> Result<Self> {
        let index: HashMap<&str, usize> = data
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.as_str(), i))
            .collect();
        let resolve = |id: &str| {
            index
                .get(id)
                .copied()
                .ok_or_else(|| SpliceError::UnknownNode(id.to_string()))
        };
        let pairs = data
            .links
            .iter()
            .map(|l| Ok((resolve(&l.source)?, resolve(&l.target)?)))
            .collect::<Result<Vec<_>>>()?;

        let mut count = vec![0usize; data.nodes.len()];
        for (s, t) in &pairs {
            count[*s] += 1;
            count[*t] += 1;
        }
        let links = pairs
            .into_iter()
            .map(|(source, target)| SimLink {
                source,
                target,
                strength: 1.0 / count[source].min(count[target]) as f64,
                bias: count[source] as f64 / (count[source] + count[target]) as f64,
            })
            .collect();

        let initial_angle = PI * (3.0 - 5f64.sqrt());
        let nodes = (0..data.nodes.len())
            .map(|i| {
                let radius = INITIAL_RADIUS * (0.5 + i as f64).sqrt();
                let angle = i as f64 * initial_angle;
                SimNode {
                    x: radius * angle.cos(),
                    y: radius * angle.sin(),
                    ..Default::default()
                }
            })
            .collect();

        let alpha_min = 0.001;
        Ok(Self {
            nodes,
            links,
            alpha: 1.0,
            alpha_min,
            alpha_decay: 1.0 - alpha_min.powf(1.0 / 300.0),
            alpha_target: 0.0,
            velocity_decay: 0.6,
            link_distance: 30.0,
            charge_strength: -30.0,
            charge_distance_min2: 1.0,
            position_strength: 0.1,
            random: Lcg(1),
        })
    }

    pub fn nodes(&self) -> &[SimNode] {
        &self.nodes
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn is_settled(&self) -> bool {
        self.alpha < self.alpha_min
    }

    /// Advances the layout by one step.
    pub fn tick(&mut self) {
        self.alpha += (self.alpha_target - self.alpha) * self.alpha_decay;
        let alpha = self.alpha;
        self.apply_links(alpha);
        self.apply_charge(alpha);
        self.apply_center();
        self.apply_position(alpha);
        for node in &mut self.nodes {
            node.vx *= self.velocity_decay;
            node.vy *= self.velocity_decay;
            node.x += node.vx;
            node.y += node.vy;
        }
    }

    /// Ticks until the layout settles, `max_ticks` is reached or
    /// `invalidation` fires; returns the number of ticks run.
    pub fn run<F>(&mut self, invalidation: &Invalidation, max_ticks: usize, mut on_tick: F) -> usize
    where
        F: FnMut(&[SimNode]),
    {
        let mut ticks = 0;
        while ticks < max_ticks && !self.is_settled() {
            if invalidation.is_invalidated() {
                debug!("Layout invalidated after {ticks} ticks");
                break;
            }
            self.tick();
            ticks += 1;
            on_tick(&self.nodes);
        }
        ticks
    }

    fn apply_links(&mut self, alpha: f64) {
        for link in &self.links {
            let (s, t) = (self.nodes[link.source], self.nodes[link.target]);
            let mut x = t.x + t.vx - s.x - s.vx;
            if x == 0.0 {
                x = self.random.jiggle();
            }
            let mut y = t.y + t.vy - s.y - s.vy;
            if y == 0.0 {
                y = self.random.jiggle();
            }
            let l = (x * x + y * y).sqrt();
            let l = (l - self.link_distance) / l * alpha * link.strength;
            let (x, y) = (x * l, y * l);
            let target = &mut self.nodes[link.target];
            target.vx -= x * link.bias;
            target.vy -= y * link.bias;
            let source = &mut self.nodes[link.source];
            source.vx += x * (1.0 - link.bias);
            source.vy += y * (1.0 - link.bias);
        }
    }

    fn apply_charge(&mut self, alpha: f64) {
        let n = self.nodes.len();
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                let mut x = self.nodes[j].x - self.nodes[i].x;
                let mut y = self.nodes[j].y - self.nodes[i].y;
                let mut l = x * x + y * y;
                if x == 0.0 {
                    x = self.random.jiggle();
                    l += x * x;
                }
                if y == 0.0 {
                    y = self.random.jiggle();
                    l += y * y;
                }
                if l < self.charge_distance_min2 {
                    l = (self.charge_distance_min2 * l).sqrt();
                }
                let w = self.charge_strength * alpha / l;
                self.nodes[i].vx += x * w;
                self.nodes[i].vy += y * w;
            }
        }
    }

    fn apply_center(&mut self) {
        if self.nodes.is_empty() {
            return;
        }
        let n = self.nodes.len() as f64;
        let sx = self.nodes.iter().map(|p| p.x).sum::<f64>() / n;
        let sy = self.nodes.iter().map(|p| p.y).sum::<f64>() / n;
        for node in &mut self.nodes {
            node.x -= sx;
            node.y -= sy;
        }
    }

    fn apply_position(&mut self, alpha: f64) {
        let k = self.position_strength * alpha;
        for node in &mut self.nodes {
            node.vx -= node.x * k;
            node.vy -= node.y * k;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn distance(a: &SimNode, b: &SimNode) -> f64 {
        ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()
    }

    #[test]
    fn demo_graph_settles_around_origin() {
        let mut sim = ForceSimulation::new(&GraphData::default()).unwrap();
        let ticks = sim.run(&Invalidation::new(), 1000, |_| {});
        assert!(sim.is_settled());
        assert!((290..=310).contains(&ticks));
        let nodes = sim.nodes();
        for (a, b) in [(0, 1), (0, 2), (1, 2)] {
            let d = distance(&nodes[a], &nodes[b]);
            assert!(d > 20.0 && d < 80.0, "distance {d}");
        }
        let mean_x = nodes.iter().map(|n| n.x).sum::<f64>() / 3.0;
        let mean_y = nodes.iter().map(|n| n.y).sum::<f64>() / 3.0;
        assert!(mean_x.abs() < 1.0 && mean_y.abs() < 1.0);
    }

    #[test]
    fn cancellation_stops_the_loop() {
        let mut sim = ForceSimulation::new(&GraphData::default()).unwrap();
        let invalidation = Invalidation::new();
        let handle = invalidation.clone();
        let mut seen = 0;
        let ticks = sim.run(&invalidation, 1000, |_| {
            seen += 1;
            if seen == 5 {
                handle.cancel();
            }
        });
        assert_eq!(ticks, 5);
        assert!(!sim.is_settled());
    }

    #[test]
    fn expired_deadline_runs_no_ticks() {
        let mut sim = ForceSimulation::new(&GraphData::default()).unwrap();
        let invalidation = Invalidation::with_timeout(Duration::ZERO);
        assert!(invalidation.is_invalidated());
        assert_eq!(sim.run(&invalidation, 1000, |_| {}), 0);
        assert_eq!(sim.alpha(), 1.0);
    }

    #[test]
    fn unknown_link_endpoint_is_an_error() {
        let mut data = GraphData::default();
        data.links.push(GraphLink {
            source: "a".to_string(),
            target: "zz".to_string(),
        });
        assert!(matches!(
            ForceSimulation::new(&data),
            Err(SpliceError::UnknownNode(id)) if id == "zz"
        ));
    }

    #[test]
    fn groups_in_first_seen_order() {
        assert_eq!(GraphData::default().groups(), vec!["x", "y"]);
        let data: GraphData = serde_json::from_str(r#"{"nodes":[{"id":"n"}]}"#).unwrap();
        assert!(data.links.is_empty());
        assert_eq!(data.groups(), vec![""]);
    }
}
