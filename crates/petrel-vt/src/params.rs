//! CSI/DCS parameter collection.
//!
//! Up to 16 parameters, each with up to 16 colon-separated sub-parameters.
//! A parameter's value is the decimal digits seen; 0 means "use default".
//! Excess parameters and sub-parameters are dropped after warning once per
//! process.

use smallvec::SmallVec;
use std::sync::Once;
use tracing::warn;

pub const MAX_PARAMS: usize = 16;
pub const MAX_SUBPARAMS: usize = 16;

static EXCESS_PARAMS: Once = Once::new();
static EXCESS_SUBPARAMS: Once = Once::new();

#[derive(Debug, Clone, Default)]
pub struct Param {
    pub value: u32,
    pub sub: SmallVec<[u32; 4]>,
}

/// The parameter list of the sequence currently being collected.
#[derive(Debug, Clone, Default)]
pub struct Params {
    v: SmallVec<[Param; 4]>,
}

impl Params {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.v.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.v.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.v.is_empty()
    }

    /// Handle one `param` byte: digit, `;` or `:`.
    pub fn collect(&mut self, byte: u8) {
        if self.v.is_empty() {
            self.v.push(Param::default());
        }
        match byte {
            b';' => {
                if self.v.len() >= MAX_PARAMS {
                    EXCESS_PARAMS.call_once(|| {
                        warn!(
                            max = MAX_PARAMS,
                            "escape with too many parameters (will not warn again)"
                        );
                    });
                    return;
                }
                self.v.push(Param::default());
            }
            b':' => {
                let param = match self.v.last_mut() {
                    Some(p) => p,
                    None => return,
                };
                if param.sub.len() >= MAX_SUBPARAMS {
                    EXCESS_SUBPARAMS.call_once(|| {
                        warn!(
                            max = MAX_SUBPARAMS,
                            "escape with too many sub-parameters (will not warn again)"
                        );
                    });
                    return;
                }
                param.sub.push(0);
            }
            b'0'..=b'9' => {
                let digit = u32::from(byte - b'0');
                let param = match self.v.last_mut() {
                    Some(p) => p,
                    None => return,
                };
                let slot = match param.sub.last_mut() {
                    Some(sub) => sub,
                    None => &mut param.value,
                };
                *slot = slot.saturating_mul(10).saturating_add(digit);
            }
            _ => {}
        }
    }

    /// Parameter `i`, with `default` substituted for missing or 0.
    #[must_use]
    pub fn get(&self, i: usize, default: u32) -> u32 {
        match self.v.get(i).map(|p| p.value) {
            Some(0) | None => default,
            Some(v) => v,
        }
    }

    /// Parameter `i` exactly as collected (missing = 0).
    #[must_use]
    pub fn raw(&self, i: usize) -> u32 {
        self.v.get(i).map_or(0, |p| p.value)
    }

    /// Sub-parameters of parameter `i`.
    #[must_use]
    pub fn subs(&self, i: usize) -> &[u32] {
        self.v.get(i).map_or(&[], |p| p.sub.as_slice())
    }

    #[must_use]
    pub fn iter(&self) -> impl Iterator<Item = &Param> {
        self.v.iter()
    }
}
