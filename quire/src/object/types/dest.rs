//! Explicit destinations: `[page /XYZ left top zoom]` and friends.

use super::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DestView {
    /// left, top, zoom; each may be null.
    Xyz {
        left: Option<f32>,
        top: Option<f32>,
        zoom: Option<f32>,
    },
    Fit,
    FitH {
        top: Option<f32>,
    },
    FitV {
        left: Option<f32>,
    },
    FitR(Rectangle),
    FitB,
    FitBH {
        top: Option<f32>,
    },
    FitBV {
        left: Option<f32>,
    },
}

/// A fully resolved destination. The page is referenced, not owned.
#[derive(Debug, Clone)]
pub struct Dest {
    pub page: Option<Ref<PagesNode>>,
    pub view: DestView,
}

fn opt_number(p: Option<&Primitive>) -> Option<f32> {
    match p {
        None | Some(Primitive::Null) => None,
        Some(p) => p.as_number().ok(),
    }
}

impl Object for Dest {
    fn from_primitive(p: Primitive, resolve: &impl Resolve) -> Result<Dest> {
        // a named destination points into the name dictionary; the caller
        // resolves those - here we only accept the explicit array (possibly
        // wrapped in a /D dictionary)
        let p = p.resolve(resolve)?;
        let arr = match p {
            Primitive::Dictionary(mut dict) => dict
                .require("Dest", "D")?
                .resolve(resolve)?
                .into_array(resolve)?,
            p => p.into_array(resolve)?,
        };
        if arr.is_empty() {
            bail!("empty destination array");
        }
        let page = match arr[0] {
            Primitive::Reference(r) => Some(Ref::new(r)),
            Primitive::Integer(_) => None, // remote destinations index pages
            ref p => err!(PdfError::UnexpectedPrimitive {
                expected: "Reference or Integer",
                found: p.get_debug_name(),
            }),
        };
        let kind = arr
            .get(1)
            .ok_or(PdfError::MissingEntry {
                typ: "Dest",
                field: "view".into(),
            })?
            .as_name()?;
        let view = match kind {
            "XYZ" => DestView::Xyz {
                left: opt_number(arr.get(2)),
                top: opt_number(arr.get(3)),
                zoom: opt_number(arr.get(4)).filter(|&z| z != 0.0),
            },
            "Fit" => DestView::Fit,
            "FitH" => DestView::FitH {
                top: opt_number(arr.get(2)),
            },
            "FitV" => DestView::FitV {
                left: opt_number(arr.get(2)),
            },
            "FitR" => {
                let rest: Vec<Primitive> = arr[2..].to_vec();
                DestView::FitR(Rectangle::from_primitive(
                    Primitive::Array(rest),
                    resolve,
                )?)
            }
            "FitB" => DestView::FitB,
            "FitBH" => DestView::FitBH {
                top: opt_number(arr.get(2)),
            },
            "FitBV" => DestView::FitBV {
                left: opt_number(arr.get(2)),
            },
            other => err!(PdfError::UnknownVariant {
                id: "DestView",
                name: other.into(),
            }),
        };
        Ok(Dest { page, view })
    }
}

impl ObjectWrite for Dest {
    fn to_primitive(&self, _: &mut impl Updater) -> Result<Primitive> {
        let mut arr = Vec::with_capacity(6);
        match self.page {
            Some(r) => arr.push(Primitive::Reference(r.get_inner())),
            None => arr.push(Primitive::Null),
        }
        let opt = |arr: &mut Vec<Primitive>, v: Option<f32>| match v {
            Some(n) => arr.push(super::number(n)),
            None => arr.push(Primitive::Null),
        };
        match self.view {
            DestView::Xyz { left, top, zoom } => {
                arr.push(Primitive::name("XYZ"));
                opt(&mut arr, left);
                opt(&mut arr, top);
                opt(&mut arr, zoom);
            }
            DestView::Fit => arr.push(Primitive::name("Fit")),
            DestView::FitH { top } => {
                arr.push(Primitive::name("FitH"));
                opt(&mut arr, top);
            }
            DestView::FitV { left } => {
                arr.push(Primitive::name("FitV"));
                opt(&mut arr, left);
            }
            DestView::FitR(r) => {
                arr.push(Primitive::name("FitR"));
                arr.push(super::number(r.left));
                arr.push(super::number(r.bottom));
                arr.push(super::number(r.right));
                arr.push(super::number(r.top));
            }
            DestView::FitB => arr.push(Primitive::name("FitB")),
            DestView::FitBH { top } => {
                arr.push(Primitive::name("FitBH"));
                opt(&mut arr, top);
            }
            DestView::FitBV { left } => {
                arr.push(Primitive::name("FitBV"));
                opt(&mut arr, left);
            }
        }
        Ok(Primitive::Array(arr))
    }
}

/// Destinations as they appear in the wild: explicit, or a name to be
/// looked up in the document's name dictionary.
#[derive(Debug, Clone)]
pub enum MaybeNamedDest {
    Explicit(Dest),
    Named(PdfString),
}

impl Object for MaybeNamedDest {
    fn from_primitive(p: Primitive, resolve: &impl Resolve) -> Result<MaybeNamedDest> {
        match p {
            Primitive::String(s) => Ok(MaybeNamedDest::Named(s)),
            Primitive::Name(n) => Ok(MaybeNamedDest::Named(PdfString::new(
                n.as_str().as_bytes().to_vec(),
            ))),
            p => Dest::from_primitive(p, resolve).map(MaybeNamedDest::Explicit),
        }
    }
}
impl ObjectWrite for MaybeNamedDest {
    fn to_primitive(&self, update: &mut impl Updater) -> Result<Primitive> {
        match self {
            MaybeNamedDest::Explicit(d) => d.to_primitive(update),
            MaybeNamedDest::Named(s) => Ok(Primitive::String(s.clone())),
        }
    }
}
