//! External objects: form and image streams.

use super::prelude::*;

#[derive(Debug)]
pub enum XObject {
    Form(Stream<FormInfo>),
    Image(Stream<ImageInfo>),
    Postscript(Stream<()>),
}

impl Object for XObject {
    fn from_primitive(p: Primitive, resolve: &impl Resolve) -> Result<XObject> {
        let raw = RawStream::from_primitive(p, resolve)?;
        raw.dict.expect("XObject", "Type", "XObject", false)?;
        let subtype = raw
            .dict
            .get("Subtype")
            .ok_or(PdfError::MissingEntry {
                typ: "XObject",
                field: "Subtype".into(),
            })?
            .as_name()?;
        Ok(match subtype {
            "Form" => XObject::Form(Stream::from_raw(strip_type(raw), resolve)?),
            "Image" => XObject::Image(Stream::from_raw(strip_type(raw), resolve)?),
            "PS" => XObject::Postscript(Stream::from_raw(strip_type(raw), resolve)?),
            other => {
                return Err(PdfError::UnknownVariant {
                    id: "XObject",
                    name: other.into(),
                })
            }
        })
    }
}

fn strip_type(mut raw: RawStream) -> RawStream {
    raw.dict.remove("Type");
    raw.dict.remove("Subtype");
    raw
}

impl ObjectWrite for XObject {
    fn to_primitive(&self, update: &mut impl Updater) -> Result<Primitive> {
        let (mut raw, subtype) = match self {
            XObject::Form(s) => (s.to_raw(update)?, "Form"),
            XObject::Image(s) => (s.to_raw(update)?, "Image"),
            XObject::Postscript(s) => (s.to_raw(update)?, "PS"),
        };
        raw.dict.insert("Type", Primitive::name("XObject"));
        raw.dict.insert("Subtype", Primitive::name(subtype));
        Ok(Primitive::Stream(raw))
    }
}

#[derive(Object, ObjectWrite, Debug, Default, Clone)]
pub struct FormInfo {
    #[pdf(key = "BBox")]
    pub bbox: Option<Rectangle>,

    #[pdf(key = "Matrix")]
    pub matrix: Vec<f32>,

    #[pdf(key = "Resources", indirect)]
    pub resources: Option<MaybeRef<Resources>>,

    #[pdf(key = "Group")]
    pub group: Option<Dict>,

    #[pdf(key = "StructParent")]
    pub struct_parent: Option<i64>,

    #[pdf(key = "StructParents")]
    pub struct_parents: Option<i64>,

    #[pdf(other)]
    pub other: Dict,
}

#[derive(Object, ObjectWrite, Debug, Default, Clone)]
pub struct ImageInfo {
    #[pdf(key = "Width")]
    pub width: i64,

    #[pdf(key = "Height")]
    pub height: i64,

    #[pdf(key = "ColorSpace")]
    pub color_space: Option<Primitive>,

    #[pdf(key = "BitsPerComponent")]
    pub bits_per_component: Option<i64>,

    #[pdf(key = "ImageMask", default = "false")]
    pub image_mask: bool,

    #[pdf(key = "SMask")]
    pub smask: Option<ObjRef>,

    #[pdf(key = "Mask")]
    pub mask: Option<Primitive>,

    #[pdf(key = "Decode")]
    pub decode: Vec<f32>,

    #[pdf(key = "Interpolate", default = "false")]
    pub interpolate: bool,

    #[pdf(key = "Intent")]
    pub intent: Option<Name>,

    #[pdf(key = "StructParent")]
    pub struct_parent: Option<i64>,

    #[pdf(other)]
    pub other: Dict,
}

impl<I> SubType<XObject> for Stream<I> {}
