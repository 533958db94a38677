//! Genomic position to pixel mapping.

use crate::canvas::ViewBox;
use crate::locus::{Locus, Strand};

/// Linear map from a genomic domain onto a pixel range, as used by every
/// drawn feature of a gene plot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinearScale {
    domain: (f64, f64),
    range: (f32, f32),
}

impl LinearScale {
    pub fn new(domain: (f64, f64), range: (f32, f32)) -> Self {
        Self { domain, range }
    }

    /// Scale over the locus span; the range runs right to left for loci on
    /// the reverse strand.
    pub fn for_locus(locus: &Locus, x0: f32, x1: f32) -> Self {
        let range = match locus.strand() {
            Strand::Forward => (x0, x1),
            Strand::Reverse => (x1, x0),
        };
        Self::new((locus.start() as f64, locus.end() as f64), range)
    }

    pub fn domain(&self) -> (f64, f64) {
        self.domain
    }

    pub fn range(&self) -> (f32, f32) {
        self.range
    }

    pub fn is_reversed(&self) -> bool {
        (self.range.1 < self.range.0) != (self.domain.1 < self.domain.0)
    }

    pub fn apply(&self, value: f64) -> f32 {
        let (d0, d1) = self.domain;
        let (r0, r1) = self.range;
        let t = if d1 == d0 { 0.5 } else { (value - d0) / (d1 - d0) };
        r0 + (r1 - r0) * t as f32
    }

    pub fn at(&self, position: i64) -> f32 {
        self.apply(position as f64)
    }

    /// Inverse mapping from a pixel back to a (fractional) genomic position.
    pub fn invert(&self, x: f32) -> f64 {
        let (d0, d1) = self.domain;
        let (r0, r1) = self.range;
        if r1 == r0 {
            return (d0 + d1) / 2.0;
        }
        d0 + (d1 - d0) * ((x - r0) / (r1 - r0)) as f64
    }

    pub fn ticks(&self, count: usize) -> Vec<f64> {
        ticks(self.domain.0, self.domain.1, count)
    }
}

/// Pixel rectangle of one feature.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FeatureBox {
    pub x: f32,
    pub width: f32,
    pub y: f32,
    pub height: f32,
}

impl FeatureBox {
    /// Places `locus` horizontally with `scale` and vertically in `view`.
    /// The left edge is taken from the end of the locus when the scale is
    /// reversed, so the width is never negative.
    pub fn map(locus: &Locus, scale: &LinearScale, view: &ViewBox) -> Self {
        let (left, right) = if scale.is_reversed() {
            (locus.end(), locus.start())
        } else {
            (locus.start(), locus.end())
        };
        let x0 = scale.at(left);
        let x1 = scale.at(right);
        Self {
            x: x0,
            width: (x1 - x0).max(0.0),
            y: view.y0(),
            height: view.height(),
        }
    }
}

fn tick_spec(start: f64, stop: f64, count: f64) -> (f64, f64, f64) {
    let e10 = 50f64.sqrt();
    let e5 = 10f64.sqrt();
    let e2 = 2f64.sqrt();
    let step = (stop - start) / count.max(0.0);
    let power = step.log10().floor();
    let error = step / 10f64.powf(power);
    let factor = if error >= e10 {
        10.0
    } else if error >= e5 {
        5.0
    } else if error >= e2 {
        2.0
    } else {
        1.0
    };
    let (mut i1, mut i2, inc);
    if power < 0.0 {
        let k = 10f64.powf(-power) / factor;
        i1 = (start * k).round();
        i2 = (stop * k).round();
        if i1 / k < start {
            i1 += 1.0;
        }
        if i2 / k > stop {
            i2 -= 1.0;
        }
        inc = -k;
    } else {
        let k = 10f64.powf(power) * factor;
        i1 = (start / k).round();
        i2 = (stop / k).round();
        if i1 * k < start {
            i1 += 1.0;
        }
        if i2 * k > stop {
            i2 -= 1.0;
        }
        inc = k;
    }
    if i2 < i1 && (0.5..2.0).contains(&count) {
        return tick_spec(start, stop, count * 2.0);
    }
    (i1, i2, inc)
}

/// Roughly `count` evenly spaced round values (1, 2 or 5 times a power of
/// ten) covering `[start, stop]`, in ascending order.
pub fn ticks(start: f64, stop: f64, count: usize) -> Vec<f64> {
    if count == 0 || !start.is_finite() || !stop.is_finite() {
        return vec![];
    }
    if start == stop {
        return vec![start];
    }
    let (lo, hi) = if stop < start { (stop, start) } else { (start, stop) };
    let (i1, i2, inc) = tick_spec(lo, hi, count as f64);
    if i2 < i1 {
        return vec![];
    }
    let n = (i2 - i1 + 1.0) as usize;
    (0..n)
        .map(|i| {
            let i = i1 + i as f64;
            if inc < 0.0 { i / -inc } else { i * inc }
        })
        .collect()
}

/// Formats a position with thousands separators, e.g. `1,234,567`.
pub fn format_position(value: f64) -> String {
    if value.fract() != 0.0 {
        return format!("{value}");
    }
    let digits = (value.abs() as i64).to_string();
    let mut ret = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0.0 {
        ret.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            ret.push(',');
        }
        ret.push(c);
    }
    ret
}

/// Converts a horizontal pointer offset over the gene header back into a
/// genomic position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ruler {
    pub origin: i64,
    pub direction: i64,
    pub bp_per_px: f64,
    pub margin: f32,
    pub box_width: f32,
}

impl Ruler {
    pub const MARGIN: f32 = 2.0;

    pub fn new(gene: &Locus, box_width: f32) -> Self {
        let margin = Self::MARGIN;
        let (origin, direction) = match gene.strand() {
            Strand::Forward => (gene.start(), 1),
            Strand::Reverse => (gene.end(), -1),
        };
        Self {
            origin,
            direction,
            bp_per_px: gene.size() as f64 / (box_width + 2.0 * margin) as f64,
            margin,
            box_width,
        }
    }

    /// Width of the hit rectangle, the box plus a margin on both sides.
    pub fn width(&self) -> f32 {
        self.box_width + 2.0 * self.margin
    }

    pub fn position_at(&self, offset_x: f32) -> i64 {
        let offset = (offset_x - 3.0 * self.margin) as f64;
        (self.origin as f64 + offset * self.bp_per_px * self.direction as f64).floor() as i64
    }

    pub fn label_anchor(&self, offset_x: f32) -> &'static str {
        if offset_x > self.box_width / 2.0 { "end" } else { "start" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locus(start: i64, end: i64, strand: Strand) -> Locus {
        Locus::new("g", start, end, strand).unwrap()
    }

    #[test]
    fn forward_and_reverse_scales() {
        let fwd = LinearScale::for_locus(&locus(1000, 2000, Strand::Forward), 0.0, 100.0);
        assert_eq!(fwd.at(1000), 0.0);
        assert_eq!(fwd.at(2000), 100.0);
        assert_eq!(fwd.at(1500), 50.0);
        let rev = LinearScale::for_locus(&locus(1000, 2000, Strand::Reverse), 0.0, 100.0);
        assert_eq!(rev.at(1000), 100.0);
        assert_eq!(rev.at(2000), 0.0);
        assert!(rev.is_reversed());
        assert!((rev.invert(25.0) - 1750.0).abs() < 1e-9);
    }

    #[test]
    fn feature_width_is_never_negative() {
        let view = ViewBox::new(0.0, 10.0, 100.0, 20.0);
        for strand in [Strand::Forward, Strand::Reverse] {
            let scale = LinearScale::for_locus(&locus(0, 100, strand), 0.0, 100.0);
            for feature_strand in [Strand::Forward, Strand::Reverse] {
                let b = FeatureBox::map(&locus(20, 30, feature_strand), &scale, &view);
                assert!(b.width >= 0.0);
                assert!((b.width - 10.0).abs() < 1e-4);
                assert_eq!((b.y, b.height), (10.0, 20.0));
            }
        }
        let rev = LinearScale::for_locus(&locus(0, 100, Strand::Reverse), 0.0, 100.0);
        let b = FeatureBox::map(&locus(20, 30, Strand::Reverse), &rev, &view);
        assert!((b.x - 70.0).abs() < 1e-4);
    }

    #[test]
    fn ticks_use_round_steps() {
        assert_eq!(ticks(0.0, 10.0, 10), (0..=10).map(f64::from).collect::<Vec<_>>());
        assert_eq!(
            ticks(1003.0, 1987.0, 10),
            (11..=19).map(|i| i as f64 * 100.0).collect::<Vec<_>>()
        );
        assert_eq!(ticks(0.0, 1.0, 5), vec![0.0, 0.2, 0.4, 0.6, 0.8, 1.0]);
        assert_eq!(ticks(10.0, 0.0, 2), vec![0.0, 5.0, 10.0]);
        assert_eq!(ticks(7.0, 7.0, 10), vec![7.0]);
    }

    #[test]
    fn positions_are_grouped() {
        assert_eq!(format_position(1234567.0), "1,234,567");
        assert_eq!(format_position(-1000.0), "-1,000");
        assert_eq!(format_position(999.0), "999");
        assert_eq!(format_position(0.5), "0.5");
    }

    #[test]
    fn ruler_maps_offsets_back_to_positions() {
        let ruler = Ruler::new(&locus(1, 1000, Strand::Forward), 496.0);
        assert_eq!(ruler.width(), 500.0);
        assert_eq!(ruler.bp_per_px, 2.0);
        assert_eq!(ruler.position_at(6.0), 1);
        assert_eq!(ruler.position_at(106.0), 201);
        assert_eq!(ruler.label_anchor(100.0), "start");
        assert_eq!(ruler.label_anchor(300.0), "end");

        let ruler = Ruler::new(&locus(1, 1000, Strand::Reverse), 496.0);
        assert_eq!(ruler.position_at(106.0), 800);
    }
}
