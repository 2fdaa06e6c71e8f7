//! ComponentTransfer: independent per-channel lookup tables.

use super::ApplyContext;
use crate::core::buffer::PixelBuffer;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write};

/// Shape of one channel's transfer function.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferFunctionType {
    /// Pass through.
    #[default]
    Identity,
    /// Piecewise linear over `table_values`.
    Table,
    /// Step function over `table_values`.
    Discrete,
    /// `slope·C + intercept`
    Linear,
    /// `amplitude·C^exponent + offset`
    Gamma,
}

impl TransferFunctionType {
    /// Attribute value.
    pub fn name(self) -> &'static str {
        match self {
            TransferFunctionType::Identity => "identity",
            TransferFunctionType::Table => "table",
            TransferFunctionType::Discrete => "discrete",
            TransferFunctionType::Linear => "linear",
            TransferFunctionType::Gamma => "gamma",
        }
    }
}

/// One channel's transfer function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferFunction {
    /// Shape.
    #[serde(rename = "type")]
    pub function_type: TransferFunctionType,
    /// Table and Discrete values, in [0, 1].
    pub table_values: Vec<f32>,
    /// Linear slope.
    pub slope: f32,
    /// Linear intercept.
    pub intercept: f32,
    /// Gamma amplitude.
    pub amplitude: f32,
    /// Gamma exponent.
    pub exponent: f32,
    /// Gamma offset.
    pub offset: f32,
}

impl Default for TransferFunction {
    fn default() -> Self {
        Self {
            function_type: TransferFunctionType::Identity,
            table_values: Vec::new(),
            slope: 1.0,
            intercept: 0.0,
            amplitude: 1.0,
            exponent: 1.0,
            offset: 0.0,
        }
    }
}

impl TransferFunction {
    /// `slope·C + intercept`.
    pub fn linear(slope: f32, intercept: f32) -> Self {
        Self {
            function_type: TransferFunctionType::Linear,
            slope,
            intercept,
            ..Self::default()
        }
    }

    /// `amplitude·C^exponent + offset`.
    pub fn gamma(amplitude: f32, exponent: f32, offset: f32) -> Self {
        Self {
            function_type: TransferFunctionType::Gamma,
            amplitude,
            exponent,
            offset,
            ..Self::default()
        }
    }

    /// Table or Discrete over `values`.
    pub fn table(function_type: TransferFunctionType, values: Vec<f32>) -> Self {
        Self {
            function_type,
            table_values: values,
            ..Self::default()
        }
    }

    /// The function's value at zero input, in [0, 1] units.
    fn intercept_value(&self) -> f32 {
        match self.function_type {
            TransferFunctionType::Identity => 0.0,
            TransferFunctionType::Table | TransferFunctionType::Discrete => {
                self.table_values.first().copied().unwrap_or(0.0)
            }
            TransferFunctionType::Linear => self.intercept,
            TransferFunctionType::Gamma => self.offset,
        }
    }

    /// The 256-entry lookup table.
    pub fn lookup_table(&self) -> [u8; 256] {
        let mut lut = [0u8; 256];
        for (i, slot) in lut.iter_mut().enumerate() {
            *slot = i as u8;
        }

        let values = &self.table_values;
        let n = values.len();
        let store = |slot: &mut u8, value: f64| *slot = value.clamp(0.0, 255.0) as u8;
        match self.function_type {
            TransferFunctionType::Identity => {}
            TransferFunctionType::Table if n > 0 => {
                for (i, slot) in lut.iter_mut().enumerate() {
                    let c = i as f64 / 255.0;
                    let position = c * (n - 1) as f64;
                    let k = position as usize;
                    let v1 = values[k] as f64;
                    let v2 = values[(k + 1).min(n - 1)] as f64;
                    store(slot, 255.0 * (v1 + (position - k as f64) * (v2 - v1)));
                }
            }
            TransferFunctionType::Discrete if n > 0 => {
                for (i, slot) in lut.iter_mut().enumerate() {
                    let k = (((i * n) as f64 / 255.0) as usize).min(n - 1);
                    store(slot, 255.0 * values[k] as f64);
                }
            }
            TransferFunctionType::Table | TransferFunctionType::Discrete => {}
            TransferFunctionType::Linear => {
                for (i, slot) in lut.iter_mut().enumerate() {
                    store(slot, self.slope as f64 * i as f64 + 255.0 * self.intercept as f64);
                }
            }
            TransferFunctionType::Gamma => {
                for (i, slot) in lut.iter_mut().enumerate() {
                    let c = i as f64 / 255.0;
                    let value = self.amplitude as f64 * c.powf(self.exponent as f64) + self.offset as f64;
                    store(slot, 255.0 * value);
                }
            }
        }
        lut
    }

    fn write_parameters(&self, out: &mut String, channel: &str) -> fmt::Result {
        write!(out, " {channel}=\"{}", self.function_type.name())?;
        match self.function_type {
            TransferFunctionType::Identity => {}
            TransferFunctionType::Table | TransferFunctionType::Discrete => {
                write!(out, " {:?}", self.table_values)?;
            }
            TransferFunctionType::Linear => {
                write!(out, " slope={} intercept={}", self.slope, self.intercept)?;
            }
            TransferFunctionType::Gamma => write!(
                out,
                " amplitude={} exponent={} offset={}",
                self.amplitude, self.exponent, self.offset
            )?,
        }
        out.push('"');
        Ok(())
    }
}

/// ComponentTransfer parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentTransfer {
    /// Red channel.
    pub red: TransferFunction,
    /// Green channel.
    pub green: TransferFunction,
    /// Blue channel.
    pub blue: TransferFunction,
    /// Alpha channel.
    pub alpha: TransferFunction,
}

impl ComponentTransfer {
    /// Returns true when the value changed.
    pub fn set_red(&mut self, function: TransferFunction) -> bool {
        replace(&mut self.red, function)
    }

    /// Returns true when the value changed.
    pub fn set_green(&mut self, function: TransferFunction) -> bool {
        replace(&mut self.green, function)
    }

    /// Returns true when the value changed.
    pub fn set_blue(&mut self, function: TransferFunction) -> bool {
        replace(&mut self.blue, function)
    }

    /// Returns true when the value changed.
    pub fn set_alpha(&mut self, function: TransferFunction) -> bool {
        replace(&mut self.alpha, function)
    }

    pub(crate) fn affects_transparent_pixels(&self) -> bool {
        255.0 * self.alpha.intercept_value() >= 1.0
    }

    pub(crate) fn apply(&self, ctx: &ApplyContext<'_>) -> PixelBuffer {
        let mut out = ctx.input_unmultiplied(0);
        let tables = [
            self.red.lookup_table(),
            self.green.lookup_table(),
            self.blue.lookup_table(),
            self.alpha.lookup_table(),
        ];
        for pixel in out.data_mut().chunks_exact_mut(4) {
            for (channel, table) in pixel.iter_mut().zip(&tables) {
                *channel = table[*channel as usize];
            }
        }
        out
    }

    pub(crate) fn write_parameters(&self, out: &mut String) -> fmt::Result {
        self.red.write_parameters(out, "red")?;
        self.green.write_parameters(out, "green")?;
        self.blue.write_parameters(out, "blue")?;
        self.alpha.write_parameters(out, "alpha")
    }
}

fn replace(slot: &mut TransferFunction, function: TransferFunction) -> bool {
    if *slot == function {
        return false;
    }
    *slot = function;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::buffer::AlphaRepresentation;
    use crate::core::geometry::IntRect;
    use crate::effects::testing::{solid, Harness};
    use crate::effects::EffectKind;

    #[test]
    fn test_linear_slope_two() {
        let lut = TransferFunction::linear(2.0, 0.0).lookup_table();
        assert_eq!(lut[100], 200);
        assert_eq!(lut[127], 254);
        assert!(lut[128..].iter().all(|&v| v == 255));
    }

    #[test]
    fn test_table_interpolates() {
        let lut = TransferFunction::table(TransferFunctionType::Table, vec![0.0, 1.0]).lookup_table();
        assert_eq!(lut[0], 0);
        assert_eq!(lut[51], 51);
        assert_eq!(lut[255], 255);

        let inverted = TransferFunction::table(TransferFunctionType::Table, vec![1.0, 0.0]).lookup_table();
        assert_eq!(inverted[0], 255);
        assert_eq!(inverted[255], 0);
    }

    #[test]
    fn test_discrete_steps() {
        let lut = TransferFunction::table(TransferFunctionType::Discrete, vec![0.0, 0.5, 1.0]).lookup_table();
        assert_eq!(lut[0], 0);
        assert_eq!(lut[84], 0);
        assert_eq!(lut[85], 127);
        assert_eq!(lut[170], 255);
        assert_eq!(lut[255], 255);
    }

    #[test]
    fn test_empty_table_is_identity() {
        let lut = TransferFunction::table(TransferFunctionType::Table, Vec::new()).lookup_table();
        assert!(lut.iter().enumerate().all(|(i, &v)| v == i as u8));
    }

    #[test]
    fn test_gamma() {
        let lut = TransferFunction::gamma(1.0, 2.0, 0.0).lookup_table();
        assert_eq!(lut[255], 255);
        assert_eq!(lut[0], 0);
        // (128/255)^2 * 255 = 64.25
        assert_eq!(lut[128], 64);
    }

    #[test]
    fn test_affects_transparent_pixels() {
        let mut transfer = ComponentTransfer::default();
        assert!(!transfer.affects_transparent_pixels());
        assert!(transfer.set_alpha(TransferFunction::linear(1.0, 0.5)));
        assert!(transfer.affects_transparent_pixels());
        assert!(!transfer.set_alpha(TransferFunction::linear(1.0, 0.5)));
        transfer.set_alpha(TransferFunction::gamma(1.0, 1.0, 0.001));
        assert!(!transfer.affects_transparent_pixels());
    }

    #[test]
    fn test_apply_runs_on_unmultiplied() {
        let rect = IntRect::new(0, 0, 1, 1);
        let harness = Harness::new().input(rect, solid(rect, [50, 50, 50, 128], AlphaRepresentation::Premultiplied));
        let mut transfer = ComponentTransfer::default();
        transfer.set_red(TransferFunction::linear(0.0, 1.0));
        let out = harness.run(&EffectKind::ComponentTransfer(transfer), rect);
        assert_eq!(out.representation(), AlphaRepresentation::Unmultiplied);
        // 50 * 255 / 128 rounds to 100.
        assert_eq!(out.pixel(0, 0), [255, 100, 100, 128]);
    }
}
