//! Optional stylized transforms applied to the subject before compositing.

pub mod hologram;

use crate::frame::Frame;
use clap::ValueEnum;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// The closed set of effects, picked once at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum EffectKind {
    /// Pass frames through untouched
    #[default]
    None,
    /// Blue-tinted, banded, ghosted look
    Hologram,
}

/// Applies the configured effect, owning the random source some effects shade with
pub struct EffectPass {
    kind: EffectKind,
    rng: StdRng,
}

impl EffectPass {
    pub fn new(kind: EffectKind) -> Self {
        Self {
            kind,
            rng: StdRng::from_os_rng(),
        }
    }

    /// Reproducible shading
    #[cfg(test)]
    pub fn seeded(kind: EffectKind, seed: u64) -> Self {
        Self {
            kind,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn kind(&self) -> EffectKind {
        self.kind
    }

    pub fn apply(&mut self, frame: Frame) -> Frame {
        match self.kind {
            EffectKind::None => frame,
            EffectKind::Hologram => {
                let _span = tracing::debug_span!("hologram").entered();
                hologram::apply(&frame, &mut self.rng)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::ChannelOrder;

    #[test]
    fn none_is_identity() {
        let frame = Frame::uniform(16, 16, [12, 34, 56], ChannelOrder::Bgr);
        let mut pass = EffectPass::new(EffectKind::None);
        assert_eq!(pass.apply(frame.clone()), frame);
    }

    #[test]
    fn effect_names_parse_from_config() {
        assert_eq!(EffectKind::from_str("hologram", true), Ok(EffectKind::Hologram));
        assert_eq!(EffectKind::from_str("none", true), Ok(EffectKind::None));
        assert!(EffectKind::from_str("sparkles", true).is_err());
    }

    #[test]
    fn seeded_hologram_is_reproducible() {
        let frame = Frame::uniform(32, 24, [90, 160, 40], ChannelOrder::Rgb);
        let a = EffectPass::seeded(EffectKind::Hologram, 7).apply(frame.clone());
        let b = EffectPass::seeded(EffectKind::Hologram, 7).apply(frame);
        assert_eq!(a, b);
    }
}
