use serde::Deserialize;

/// Pixel convention the model was trained with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorConvention {
    /// BGR channel order, per-channel ImageNet mean subtracted, no scaling.
    #[default]
    CaffeBgr,
    /// RGB channel order scaled to `[0, 1]`.
    UnitRgb,
}
