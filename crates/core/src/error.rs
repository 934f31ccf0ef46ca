use thiserror::Error;

#[derive(Error, Debug)]
pub enum TilingError {
    #[error("unknown tiling mode `{0}`, expected one of: enable, x_only, y_only, disable")]
    UnknownTilingMode(String),

    #[error("candle error: {0}")]
    Candle(#[from] candle_core::Error),
}

pub type Result<T> = std::result::Result<T, TilingError>;
