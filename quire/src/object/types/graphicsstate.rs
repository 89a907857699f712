use super::prelude::*;

#[derive(Object, ObjectWrite, Debug, Default)]
#[pdf(Type = "ExtGState?")]
pub struct GraphicsStateParameters {
    #[pdf(key = "LW")]
    pub line_width: Option<f32>,

    #[pdf(key = "LC")]
    pub line_cap: Option<i64>,

    #[pdf(key = "LJ")]
    pub line_join: Option<i64>,

    #[pdf(key = "ML")]
    pub miter_limit: Option<f32>,

    #[pdf(key = "D")]
    pub dash_pattern: Option<Primitive>,

    #[pdf(key = "RI")]
    pub rendering_intent: Option<Name>,

    /// `[font_ref size]`.
    #[pdf(key = "Font")]
    pub font: Option<Primitive>,

    #[pdf(key = "CA")]
    pub stroke_alpha: Option<f32>,

    #[pdf(key = "ca")]
    pub fill_alpha: Option<f32>,

    #[pdf(key = "BM")]
    pub blend_mode: Option<Primitive>,

    #[pdf(key = "SMask")]
    pub smask: Option<Primitive>,

    #[pdf(key = "AIS")]
    pub alpha_is_shape: Option<bool>,

    #[pdf(key = "TK")]
    pub text_knockout: Option<bool>,

    #[pdf(other)]
    pub other: Dict,
}
