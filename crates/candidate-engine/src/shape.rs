//! Priority-ordered structural classification. The first matching rule wins.

use common::{Curvature, Error, Regime, Result, Shape};

use crate::types::NormalizedMetrics;

pub const FFBS_MIN_EK: f64 = 0.20;
pub const FFBS_MAX_EM: f64 = 0.08;
pub const SPIKE_MIN_EM: f64 = 0.12;
pub const STEEP_MIN_EK: f64 = 0.20;
pub const MILD_MIN_EK: f64 = 0.15;

/// The subset of metrics the classifier looks at.
#[derive(Debug, Clone, Copy)]
pub struct ShapeInputs {
    pub regime: Regime,
    pub ek: f64,
    pub em: f64,
    pub squeeze: bool,
    /// Carried for completeness; no rule reads it.
    pub curvature: Curvature,
}

impl From<&NormalizedMetrics> for ShapeInputs {
    fn from(m: &NormalizedMetrics) -> Self {
        Self {
            regime: m.regime,
            ek: m.ek,
            em: m.em,
            squeeze: m.squeeze,
            curvature: m.curvature,
        }
    }
}

fn is_backward(i: &ShapeInputs) -> bool {
    i.regime == Regime::Backwardation
}

fn is_ffbs(i: &ShapeInputs) -> bool {
    i.ek >= FFBS_MIN_EK && i.em < FFBS_MAX_EM
}

fn is_spike(i: &ShapeInputs) -> bool {
    i.squeeze || i.em >= SPIKE_MIN_EM
}

fn is_steep(i: &ShapeInputs) -> bool {
    i.ek >= STEEP_MIN_EK
}

fn is_mild(i: &ShapeInputs) -> bool {
    i.ek >= MILD_MIN_EK && i.ek < STEEP_MIN_EK
}

fn is_flat(i: &ShapeInputs) -> bool {
    i.ek < MILD_MIN_EK
}

pub type ShapeRule = (Shape, fn(&ShapeInputs) -> bool);

/// Evaluated top to bottom.
pub const SHAPE_RULES: &[ShapeRule] = &[
    (Shape::Backward, is_backward),
    (Shape::Ffbs, is_ffbs),
    (Shape::Spike, is_spike),
    (Shape::Steep, is_steep),
    (Shape::Mild, is_mild),
    (Shape::Flat, is_flat),
];

pub fn classify_shape(inputs: &ShapeInputs) -> Result<Shape> {
    if !inputs.ek.is_finite() || !inputs.em.is_finite() {
        return Err(Error::InvariantViolation(format!(
            "unmapped shape: non-finite edges ek={} em={}",
            inputs.ek, inputs.em
        )));
    }
    SHAPE_RULES
        .iter()
        .find(|(_, matches)| matches(inputs))
        .map(|(shape, _)| *shape)
        .ok_or_else(|| {
            Error::InvariantViolation(format!(
                "unmapped shape: ek={} em={} regime={}",
                inputs.ek, inputs.em, inputs.regime
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(regime: Regime, ek: f64, em: f64) -> ShapeInputs {
        ShapeInputs {
            regime,
            ek,
            em,
            squeeze: false,
            curvature: Curvature::Normal,
        }
    }

    #[test]
    fn test_backward_beats_ffbs_looking_structure() {
        let shape = classify_shape(&inputs(Regime::Backwardation, 0.25, 0.01)).unwrap();
        assert_eq!(shape, Shape::Backward);
    }

    #[test]
    fn test_curvature_alone_never_spikes() {
        let mut i = inputs(Regime::Contango, 0.10, 0.05);
        i.curvature = Curvature::SpikyFront;
        assert_ne!(classify_shape(&i).unwrap(), Shape::Spike);
    }

    #[test]
    fn test_squeeze_or_micro_edge_spikes() {
        let mut i = inputs(Regime::Contango, 0.10, 0.02);
        i.squeeze = true;
        assert_eq!(classify_shape(&i).unwrap(), Shape::Spike);
        assert_eq!(classify_shape(&inputs(Regime::Flat, 0.05, 0.12)).unwrap(), Shape::Spike);
    }

    #[test]
    fn test_ffbs_beats_spike_when_micro_flat() {
        let mut i = inputs(Regime::Contango, 0.24, 0.01);
        i.squeeze = true;
        assert_eq!(classify_shape(&i).unwrap(), Shape::Ffbs);
    }

    #[test]
    fn test_ek_bands() {
        assert_eq!(classify_shape(&inputs(Regime::Contango, 0.22, 0.09)).unwrap(), Shape::Steep);
        assert_eq!(classify_shape(&inputs(Regime::Contango, 0.15, 0.09)).unwrap(), Shape::Mild);
        assert_eq!(classify_shape(&inputs(Regime::Contango, 0.1999, 0.09)).unwrap(), Shape::Mild);
        assert_eq!(classify_shape(&inputs(Regime::Flat, 0.149, 0.09)).unwrap(), Shape::Flat);
    }

    #[test]
    fn test_every_finite_input_maps_to_a_shape() {
        for regime in [Regime::Backwardation, Regime::Contango, Regime::Flat] {
            for ek in [-0.3, 0.0, 0.149, 0.15, 0.2, 0.5] {
                for em in [-0.1, 0.0, 0.079, 0.08, 0.12, 0.3] {
                    assert!(classify_shape(&inputs(regime, ek, em)).is_ok());
                }
            }
        }
    }

    #[test]
    fn test_non_finite_edges_are_unmapped() {
        let err = classify_shape(&inputs(Regime::Contango, f64::NAN, 0.0)).unwrap_err();
        assert!(err.is_invariant_violation());
    }
}
