//! Downscaling and bias correction hooks, applied after interpolation.

use crate::error::Result;
use crate::options::{
    BiasCorrection, HumidityDownscaling, LongwaveDownscaling, PrecipitationDownscaling,
    PressureDownscaling, ProcessingOptions, ShortwaveDownscaling, TemperatureDownscaling,
};
use crate::product::ForcingVariable;
use crate::state::{AuxiliaryInputs, ForcingState};

/// Adjusts `final_forcings` in place after temporal interpolation.
pub trait ForcingPostProcessor {
    fn apply(&mut self, state: &mut ForcingState, auxiliary: &AuxiliaryInputs) -> Result<()>;
}

impl<P: ForcingPostProcessor + ?Sized> ForcingPostProcessor for Box<P> {
    fn apply(&mut self, state: &mut ForcingState, auxiliary: &AuxiliaryInputs) -> Result<()> {
        (**self).apply(state, auxiliary)
    }
}

/// Leaves the interpolated forcings untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl ForcingPostProcessor for PassThrough {
    fn apply(&mut self, _state: &mut ForcingState, _auxiliary: &AuxiliaryInputs) -> Result<()> {
        Ok(())
    }
}

/// One configured adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostProcessStep {
    DownscaleTemperature(TemperatureDownscaling),
    DownscalePressure(PressureDownscaling),
    DownscaleShortwave(ShortwaveDownscaling),
    DownscalePrecipitation(PrecipitationDownscaling),
    DownscaleHumidity(HumidityDownscaling),
    DownscaleLongwave(LongwaveDownscaling),
    BiasCorrect(ForcingVariable, BiasCorrection),
}

/// The adjustments configured for a product, in application order.
///
/// Temperature and pressure are downscaled before humidity, which is
/// recomputed from them. Bias correction runs on the downscaled fields.
pub fn configured_steps(options: &ProcessingOptions) -> Vec<PostProcessStep> {
    use ForcingVariable::*;

    let ds = &options.downscale;
    let bc = &options.bias_correction;
    let mut steps = Vec::new();

    if ds.temperature != TemperatureDownscaling::None {
        steps.push(PostProcessStep::DownscaleTemperature(ds.temperature));
    }
    if ds.pressure != PressureDownscaling::None {
        steps.push(PostProcessStep::DownscalePressure(ds.pressure));
    }
    if ds.shortwave != ShortwaveDownscaling::None {
        steps.push(PostProcessStep::DownscaleShortwave(ds.shortwave));
    }
    if ds.precipitation != PrecipitationDownscaling::None {
        steps.push(PostProcessStep::DownscalePrecipitation(ds.precipitation));
    }
    if ds.humidity != HumidityDownscaling::None {
        steps.push(PostProcessStep::DownscaleHumidity(ds.humidity));
    }
    if ds.longwave != LongwaveDownscaling::None {
        steps.push(PostProcessStep::DownscaleLongwave(ds.longwave));
    }

    let corrections = [
        (T2d, bc.temperature),
        (Q2d, bc.humidity),
        (U10, bc.wind),
        (V10, bc.wind),
        (Prate, bc.precipitation),
        (Swdown, bc.shortwave),
        (Lwdown, bc.longwave),
        (Psfc, bc.pressure),
    ];
    steps.extend(
        corrections
            .into_iter()
            .filter(|(_, option)| *option != BiasCorrection::None)
            .map(|(variable, option)| PostProcessStep::BiasCorrect(variable, option)),
    );

    steps
}
