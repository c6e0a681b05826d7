use brotli::enc::backward_references::BrotliEncoderMode;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

#[repr(u8)]
#[derive(FromPrimitive, PartialEq, Eq, Debug, Copy, Clone, Default)]
/// Hint telling the encoder what kind of input it is about to see.
/// The discriminants are the engine's own mode codes.
pub enum Mode {
    #[default]
    Generic = 0,
    Text = 1,
    Font = 2,
}

impl Mode {
    pub fn name(&self) -> &'static str {
        match self {
            Mode::Generic => "generic",
            Mode::Text => "text",
            Mode::Font => "font",
        }
    }

    pub fn from_name(name: &str) -> Option<Mode> {
        match name.to_ascii_lowercase().as_str() {
            "generic" => Some(Mode::Generic),
            "text" => Some(Mode::Text),
            "font" => Some(Mode::Font),
            _ => None,
        }
    }

    pub fn from_code(code: u64) -> Option<Mode> {
        u8::try_from(code).ok().and_then(Mode::from_u8)
    }

    pub(crate) fn to_engine(self) -> BrotliEncoderMode {
        match self {
            Mode::Generic => BrotliEncoderMode::BROTLI_MODE_GENERIC,
            Mode::Text => BrotliEncoderMode::BROTLI_MODE_TEXT,
            Mode::Font => BrotliEncoderMode::BROTLI_MODE_FONT,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::compression::mode::Mode;

    #[test]
    fn mode_from_name() {
        assert_eq!(Mode::from_name("text"), Some(Mode::Text));
        assert_eq!(Mode::from_name("FONT"), Some(Mode::Font));
        assert_eq!(Mode::from_name("binary"), None);
    }

    #[test]
    fn mode_from_code() {
        assert_eq!(Mode::from_code(0), Some(Mode::Generic));
        assert_eq!(Mode::from_code(2), Some(Mode::Font));
        assert_eq!(Mode::from_code(3), None);
        assert_eq!(Mode::from_code(256), None);
    }

    #[test]
    fn name_round_trips() {
        for mode in [Mode::Generic, Mode::Text, Mode::Font].iter() {
            assert_eq!(Mode::from_name(mode.name()), Some(*mode));
        }
    }
}
