//! Validation of user supplied codec options.
//!
//! Options arrive either as a JSON mapping (unknown keys are ignored) or through the chained
//! setters of [`OptionsBuilder`]. Both routes end in [`OptionsBuilder::build`], so a value that
//! made it into an [`Options`] has already been range checked against the engine's limits.

use brotli::enc::BrotliEncoderParams;
use serde_derive::Deserialize;

pub use crate::compression::mode::Mode;
use crate::errors::{config_error, Result};

pub const MIN_QUALITY: u32 = 0;
pub const MAX_QUALITY: u32 = 11;
pub const DEFAULT_QUALITY: u32 = 6;

pub const MIN_LGWIN: u32 = 10;
pub const MAX_LGWIN: u32 = 24;
pub const DEFAULT_LGWIN: u32 = 22;

/// 0 lets the engine pick the input block size from the quality.
pub const MIN_LGBLOCK: u32 = 16;
pub const MAX_LGBLOCK: u32 = 24;

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
enum ModeValue {
    Code(i64),
    Name(String),
}

/// Raw, possibly partial, option mapping.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct OptionsBuilder {
    quality: Option<i64>,
    mode: Option<ModeValue>,
    #[serde(alias = "windowSize")]
    lgwin: Option<i64>,
    lgblock: Option<i64>,
    size_hint: Option<i64>,
}

impl OptionsBuilder {
    pub fn new() -> OptionsBuilder {
        OptionsBuilder::default()
    }

    /// Reads a JSON object. Keys that are not recognized are ignored, a value of the wrong type
    /// is reported against its key.
    pub fn from_json(value: &serde_json::Value) -> Result<OptionsBuilder> {
        if !value.is_object() && !value.is_null() {
            return Err(config_error("options", "expected a JSON object"));
        }
        if value.is_null() {
            return Ok(OptionsBuilder::default());
        }
        serde_json::from_value(value.clone()).map_err(|e| config_error("options", e.to_string()))
    }

    pub fn quality(mut self, quality: i64) -> OptionsBuilder {
        self.quality = Some(quality);
        self
    }

    pub fn mode(mut self, mode: Mode) -> OptionsBuilder {
        self.mode = Some(ModeValue::Code(mode as i64));
        self
    }

    /// Sets the mode from its name, leaving unknown names for `build` to reject.
    pub fn mode_name(mut self, name: &str) -> OptionsBuilder {
        self.mode = Some(ModeValue::Name(name.to_string()));
        self
    }

    pub fn lgwin(mut self, lgwin: i64) -> OptionsBuilder {
        self.lgwin = Some(lgwin);
        self
    }

    pub fn lgblock(mut self, lgblock: i64) -> OptionsBuilder {
        self.lgblock = Some(lgblock);
        self
    }

    pub fn size_hint(mut self, size_hint: i64) -> OptionsBuilder {
        self.size_hint = Some(size_hint);
        self
    }

    /// Range checks every present key. The first offending key is reported together with the
    /// accepted range.
    pub fn build(&self) -> Result<Options> {
        let mut options = Options::default();

        if let Some(quality) = self.quality {
            options.quality = in_range("quality", quality, MIN_QUALITY, MAX_QUALITY)?;
        }

        if let Some(mode) = &self.mode {
            let parsed = match mode {
                ModeValue::Code(code) => u64::try_from(*code).ok().and_then(Mode::from_code),
                ModeValue::Name(name) => Mode::from_name(name),
            };
            options.mode = parsed.ok_or_else(|| {
                let got = match mode {
                    ModeValue::Code(code) => code.to_string(),
                    ModeValue::Name(name) => format!("\"{}\"", name),
                };
                config_error(
                    "mode",
                    format!("must be one of generic, text, font (or 0, 1, 2), got {}", got),
                )
            })?;
        }

        if let Some(lgwin) = self.lgwin {
            options.lgwin = in_range("lgwin", lgwin, MIN_LGWIN, MAX_LGWIN)?;
        }

        if let Some(lgblock) = self.lgblock {
            options.lgblock = if lgblock == 0 {
                0
            } else {
                in_range("lgblock", lgblock, MIN_LGBLOCK, MAX_LGBLOCK).map_err(|_| {
                    config_error(
                        "lgblock",
                        format!(
                            "must be 0 or in {}..={}, got {}",
                            MIN_LGBLOCK, MAX_LGBLOCK, lgblock
                        ),
                    )
                })?
            };
        }

        if let Some(size_hint) = self.size_hint {
            options.size_hint = usize::try_from(size_hint).map_err(|_| {
                config_error(
                    "size_hint",
                    format!("must be a non-negative integer, got {}", size_hint),
                )
            })?;
        }

        Ok(options)
    }
}

fn in_range(key: &str, value: i64, min: u32, max: u32) -> Result<u32> {
    if value < i64::from(min) || value > i64::from(max) {
        return Err(config_error(
            key,
            format!("must be in {}..={}, got {}", min, max, value),
        ));
    }
    Ok(value as u32)
}

/// Validated encoder parameters. Decompression needs none, the stream describes itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    quality: u32,
    mode: Mode,
    lgwin: u32,
    lgblock: u32,
    size_hint: usize,
}

impl Default for Options {
    fn default() -> Options {
        Options {
            quality: DEFAULT_QUALITY,
            mode: Mode::Generic,
            lgwin: DEFAULT_LGWIN,
            lgblock: 0,
            size_hint: 0,
        }
    }
}

impl Options {
    pub fn builder() -> OptionsBuilder {
        OptionsBuilder::new()
    }

    pub fn from_json(value: &serde_json::Value) -> Result<Options> {
        OptionsBuilder::from_json(value)?.build()
    }

    pub fn quality(&self) -> u32 {
        self.quality
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn lgwin(&self) -> u32 {
        self.lgwin
    }

    pub fn lgblock(&self) -> u32 {
        self.lgblock
    }

    pub fn size_hint(&self) -> usize {
        self.size_hint
    }

    pub(crate) fn to_engine_params(&self) -> BrotliEncoderParams {
        let mut params = BrotliEncoderParams::default();
        params.quality = self.quality as i32;
        params.lgwin = self.lgwin as i32;
        params.lgblock = self.lgblock as i32;
        params.mode = self.mode.to_engine();
        params.size_hint = self.size_hint;
        params
    }
}
