//! Spectral Transform Engine
//!
//! Converts fixed-size blocks of real samples into complex spectral frames and
//! back. Plans come from `rustfft` and are derived once; every processor that
//! needs a transform clones the plan (two `Arc`s) and owns its own frame and
//! scratch buffers, so the forward/inverse path never allocates.
//!
//! `rustfft` does not normalize, so `inverse` divides by N. Without that
//! division the identity round-trip would come back scaled by the block size.

use std::fmt;
use std::sync::Arc;

use rustfft::num_complex::Complex32;
use rustfft::{Fft, FftPlanner};

use crate::error::DspError;

/// Precomputed forward and inverse plans for one block size
///
/// Immutable once prepared. Clones share the same plans.
#[derive(Clone)]
pub struct TransformPlan {
    size: usize,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
}

impl TransformPlan {
    /// Derive forward and inverse plans for blocks of `size` samples
    ///
    /// Any positive size works; powers of two are fastest.
    pub fn prepare(size: usize) -> Result<Self, DspError> {
        if size == 0 {
            return Err(DspError::InvalidBlockSize(size));
        }

        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(size);
        let inverse = planner.plan_fft_inverse(size);

        Ok(Self {
            size,
            forward,
            inverse,
        })
    }

    /// Block size N this plan was derived for
    pub fn size(&self) -> usize {
        self.size
    }

    fn scratch_len(&self) -> usize {
        self.forward
            .get_inplace_scratch_len()
            .max(self.inverse.get_inplace_scratch_len())
    }
}

impl fmt::Debug for TransformPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformPlan")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Forward/inverse transform with its own frame and scratch buffers
pub struct SpectralTransform {
    plan: TransformPlan,
    /// Spectral frame, N complex bins
    frame: Vec<Complex32>,
    scratch: Vec<Complex32>,
}

impl SpectralTransform {
    /// Prepare plans and buffers for blocks of `size` samples
    pub fn prepare(size: usize) -> Result<Self, DspError> {
        Ok(Self::with_plan(TransformPlan::prepare(size)?))
    }

    /// Allocate buffers for an already prepared plan
    pub fn with_plan(plan: TransformPlan) -> Self {
        let zero = Complex32::new(0.0, 0.0);
        Self {
            frame: vec![zero; plan.size()],
            scratch: vec![zero; plan.scratch_len()],
            plan,
        }
    }

    pub fn size(&self) -> usize {
        self.plan.size()
    }

    pub fn plan(&self) -> &TransformPlan {
        &self.plan
    }

    /// Forward transform of a real block
    ///
    /// Copies up to N samples (imaginary parts zero), zero-pads a shorter
    /// block, ignores anything past N. Returns the spectral frame.
    ///
    /// # Real-time Safety
    /// No allocations. O(N log N).
    pub fn forward(&mut self, block: &[f32]) -> &mut [Complex32] {
        let copied = block.len().min(self.frame.len());
        for (bin, &sample) in self.frame.iter_mut().zip(&block[..copied]) {
            *bin = Complex32::new(sample, 0.0);
        }
        for bin in &mut self.frame[copied..] {
            *bin = Complex32::new(0.0, 0.0);
        }

        self.plan
            .forward
            .process_with_scratch(&mut self.frame, &mut self.scratch);
        &mut self.frame
    }

    /// Inverse transform of the current frame into `block`
    ///
    /// Writes the real part divided by N into the first `min(block.len(), N)`
    /// samples; the rest of `block` is left untouched.
    ///
    /// # Real-time Safety
    /// No allocations. O(N log N).
    pub fn inverse(&mut self, block: &mut [f32]) {
        self.plan
            .inverse
            .process_with_scratch(&mut self.frame, &mut self.scratch);

        let scale = 1.0 / self.frame.len() as f32;
        for (sample, bin) in block.iter_mut().zip(&self.frame) {
            *sample = bin.re * scale;
        }
    }

    /// Current spectral frame (result of the last `forward`)
    pub fn frame(&self) -> &[Complex32] {
        &self.frame
    }

    /// Release plans and buffers
    ///
    /// Dropping has the same effect; the plans themselves are freed once the
    /// last clone of the `TransformPlan` is gone.
    pub fn release(self) {}
}
