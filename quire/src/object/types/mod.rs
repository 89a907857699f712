//! Typed projections over the raw graph: the document catalog and
//! everything hanging off it. Projection is lazy where it pays off
//! (annotations, fonts) and eager where the structures are small.

use std::collections::HashMap;

use crate as quire;
use crate::error::*;
use crate::object::*;
use crate::primitive::{Dict, Name, PdfString, Primitive};

mod prelude {
    pub use super::*;
    pub use crate as quire;
    pub use crate::{error::*, object::*, primitive::*};
}

macro_rules! mods {
    ($($name:ident),*) => {
        $( mod $name; )*
        $( pub use $name::*; )*
    };
}

mods!(
    annot,
    dest,
    font,
    form,
    graphicsstate,
    nametree,
    numbertree,
    outline,
    page,
    structtree,
    xobject
);

#[derive(Object, ObjectWrite, Debug)]
#[pdf(Type = "Catalog?")]
pub struct Catalog {
    #[pdf(key = "Version")]
    pub version: Option<Name>,

    #[pdf(key = "Pages")]
    pub pages: PagesRc,

    #[pdf(key = "PageLabels")]
    pub page_labels: Option<NumberTree<PageLabel>>,

    #[pdf(key = "Names")]
    pub names: Option<MaybeRef<NameDictionary>>,

    #[pdf(key = "Dests")]
    pub dests: Option<MaybeRef<Dict>>,

    #[pdf(key = "Outlines")]
    pub outlines: Option<MaybeRef<Outlines>>,

    #[pdf(key = "AcroForm")]
    pub forms: Option<MaybeRef<InteractiveForm>>,

    #[pdf(key = "Metadata")]
    pub metadata: Option<Ref<Stream<MetadataInfo>>>,

    #[pdf(key = "StructTreeRoot")]
    pub struct_tree_root: Option<MaybeRef<StructTreeRoot>>,

    #[pdf(key = "MarkInfo")]
    pub mark_info: Option<MarkInfo>,

    #[pdf(key = "OutputIntents")]
    pub output_intents: Vec<MaybeRef<OutputIntent>>,

    #[pdf(key = "Lang")]
    pub lang: Option<PdfString>,

    #[pdf(key = "OpenAction")]
    pub open_action: Option<Primitive>,

    #[pdf(other)]
    pub other: Dict,
}

/// XMP metadata stream.
#[derive(Object, ObjectWrite, Debug, Default, Clone)]
#[pdf(Type = "Metadata?")]
pub struct MetadataInfo {
    #[pdf(key = "Subtype")]
    pub subtype: Option<Name>,
}

#[derive(Object, ObjectWrite, Debug, Clone)]
pub struct MarkInfo {
    #[pdf(key = "Marked", default = "false")]
    pub marked: bool,

    #[pdf(key = "UserProperties", default = "false")]
    pub user_properties: bool,

    #[pdf(key = "Suspects", default = "false")]
    pub suspects: bool,
}

#[derive(Object, ObjectWrite, Debug, Clone)]
#[pdf(Type = "OutputIntent?")]
pub struct OutputIntent {
    #[pdf(key = "S")]
    pub subtype: Name,

    #[pdf(key = "OutputCondition")]
    pub output_condition: Option<PdfString>,

    #[pdf(key = "OutputConditionIdentifier")]
    pub output_condition_identifier: Option<PdfString>,

    #[pdf(key = "RegistryName")]
    pub registry_name: Option<PdfString>,

    #[pdf(key = "Info")]
    pub info: Option<PdfString>,

    #[pdf(key = "DestOutputProfile")]
    pub dest_output_profile: Option<Ref<Stream<()>>>,
}

/// Document information dictionary. Dates stay strings; `creation_date()`
/// and friends parse them on demand.
#[derive(Object, ObjectWrite, Debug, Default, Clone)]
pub struct InfoDict {
    #[pdf(key = "Title")]
    pub title: Option<PdfString>,

    #[pdf(key = "Author")]
    pub author: Option<PdfString>,

    #[pdf(key = "Subject")]
    pub subject: Option<PdfString>,

    #[pdf(key = "Keywords")]
    pub keywords: Option<PdfString>,

    #[pdf(key = "Creator")]
    pub creator: Option<PdfString>,

    #[pdf(key = "Producer")]
    pub producer: Option<PdfString>,

    #[pdf(key = "CreationDate")]
    pub creation_date: Option<PdfString>,

    #[pdf(key = "ModDate")]
    pub mod_date: Option<PdfString>,

    #[pdf(key = "Trapped")]
    pub trapped: Option<Name>,

    #[pdf(other)]
    pub other: Dict,
}

impl InfoDict {
    pub fn creation_date(&self) -> Option<chrono::DateTime<chrono::FixedOffset>> {
        self.creation_date
            .as_ref()
            .and_then(|s| Object::from_primitive(Primitive::String(s.clone()), &NoResolve).ok())
    }
    pub fn mod_date(&self) -> Option<chrono::DateTime<chrono::FixedOffset>> {
        self.mod_date
            .as_ref()
            .and_then(|s| Object::from_primitive(Primitive::String(s.clone()), &NoResolve).ok())
    }
}

/// Named resource maps available to a content stream.
#[derive(Object, ObjectWrite, Debug, Default)]
pub struct Resources {
    #[pdf(key = "ExtGState")]
    pub graphics_states: HashMap<Name, GraphicsStateParameters>,

    #[pdf(key = "ColorSpace")]
    pub color_spaces: HashMap<Name, Primitive>,

    #[pdf(key = "Pattern")]
    pub pattern: HashMap<Name, Primitive>,

    #[pdf(key = "Shading")]
    pub shading: HashMap<Name, Primitive>,

    #[pdf(key = "XObject")]
    pub xobjects: HashMap<Name, Ref<XObject>>,

    #[pdf(key = "Font")]
    pub fonts: HashMap<Name, Lazy<Font>>,

    #[pdf(key = "ProcSet")]
    pub proc_set: Vec<Name>,

    #[pdf(key = "Properties")]
    pub properties: HashMap<Name, MaybeRef<Dict>>,

    #[pdf(other)]
    pub other: Dict,
}

impl Resources {
    pub fn font(&self, name: &str) -> Option<&Lazy<Font>> {
        self.fonts.get(name)
    }
}

/// An axis-aligned rectangle: `[llx lly urx ury]`.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Rectangle {
    pub left: f32,
    pub bottom: f32,
    pub right: f32,
    pub top: f32,
}

impl Rectangle {
    pub fn new(left: f32, bottom: f32, right: f32, top: f32) -> Rectangle {
        Rectangle {
            left,
            bottom,
            right,
            top,
        }
    }
    pub fn width(&self) -> f32 {
        self.right - self.left
    }
    pub fn height(&self) -> f32 {
        self.top - self.bottom
    }
}

impl Object for Rectangle {
    fn from_primitive(p: Primitive, r: &impl Resolve) -> Result<Self> {
        let arr = p.into_array(r)?;
        if arr.len() != 4 {
            bail!("rectangle with {} entries", arr.len());
        }
        let mut n = [0.0; 4];
        for (slot, p) in n.iter_mut().zip(arr.iter()) {
            *slot = match p {
                Primitive::Reference(id) => r.resolve(*id)?.as_number()?,
                p => p.as_number()?,
            };
        }
        Ok(Rectangle {
            left: n[0].min(n[2]),
            bottom: n[1].min(n[3]),
            right: n[0].max(n[2]),
            top: n[1].max(n[3]),
        })
    }
}
impl ObjectWrite for Rectangle {
    fn to_primitive(&self, _: &mut impl Updater) -> Result<Primitive> {
        Ok(Primitive::Array(vec![
            number(self.left),
            number(self.bottom),
            number(self.right),
            number(self.top),
        ]))
    }
}

/// Whole-valued coordinates are written as integers, the way most
/// producers do.
pub(crate) fn number(n: f32) -> Primitive {
    if n.fract() == 0.0 && n.abs() < 1e9 {
        Primitive::Integer(n as i64)
    } else {
        Primitive::Real(n)
    }
}

/// Page label numbering style.
#[derive(Object, ObjectWrite, Debug, Clone, Copy)]
pub enum Counter {
    #[pdf(name = "D")]
    Arabic,
    #[pdf(name = "R")]
    RomanUpper,
    #[pdf(name = "r")]
    RomanLower,
    #[pdf(name = "A")]
    AlphaUpper,
    #[pdf(name = "a")]
    AlphaLower,
}

#[derive(Object, ObjectWrite, Debug, Clone)]
pub struct PageLabel {
    #[pdf(key = "S")]
    pub style: Option<Counter>,

    #[pdf(key = "P")]
    pub prefix: Option<PdfString>,

    #[pdf(key = "St")]
    pub start: Option<i64>,
}

/// The document-level name dictionary.
#[derive(Object, ObjectWrite, Debug)]
pub struct NameDictionary {
    #[pdf(key = "Dests")]
    pub dests: Option<NameTree<Primitive>>,

    #[pdf(key = "AP")]
    pub ap: Option<NameTree<Primitive>>,

    #[pdf(key = "JavaScript")]
    pub javascript: Option<NameTree<Primitive>>,

    #[pdf(key = "Pages")]
    pub pages: Option<NameTree<Primitive>>,

    #[pdf(key = "EmbeddedFiles")]
    pub embedded_files: Option<NameTree<FileSpec>>,

    #[pdf(other)]
    pub other: Dict,
}

/// A file specification, optionally with embedded content under `/EF`.
#[derive(Object, ObjectWrite, Debug, Clone)]
#[pdf(Type = "Filespec?")]
pub struct FileSpec {
    #[pdf(key = "F")]
    pub f: Option<PdfString>,

    #[pdf(key = "UF")]
    pub uf: Option<PdfString>,

    #[pdf(key = "Desc")]
    pub description: Option<PdfString>,

    #[pdf(key = "EF")]
    pub ef: Option<Files<Ref<Stream<EmbeddedFileInfo>>>>,
}

/// Platform variants of a file specification entry.
#[derive(Object, ObjectWrite, Debug, Clone)]
pub struct Files<T> {
    #[pdf(key = "F")]
    pub f: Option<T>,
    #[pdf(key = "UF")]
    pub uf: Option<T>,
    #[pdf(key = "DOS")]
    pub dos: Option<T>,
    #[pdf(key = "Mac")]
    pub mac: Option<T>,
    #[pdf(key = "Unix")]
    pub unix: Option<T>,
}

#[derive(Object, ObjectWrite, Debug, Default, Clone)]
#[pdf(Type = "EmbeddedFile?")]
pub struct EmbeddedFileInfo {
    #[pdf(key = "Subtype")]
    pub subtype: Option<Name>,

    #[pdf(key = "Params")]
    pub params: Option<EmbeddedFileParams>,
}

#[derive(Object, ObjectWrite, Debug, Default, Clone)]
pub struct EmbeddedFileParams {
    #[pdf(key = "Size")]
    pub size: Option<i64>,

    #[pdf(key = "CreationDate")]
    pub creation_date: Option<PdfString>,

    #[pdf(key = "ModDate")]
    pub mod_date: Option<PdfString>,

    #[pdf(key = "CheckSum")]
    pub checksum: Option<PdfString>,
}

/// A measure viewport on a page.
#[derive(Object, ObjectWrite, Debug, Clone)]
#[pdf(Type = "Viewport?")]
pub struct Viewport {
    #[pdf(key = "BBox")]
    pub bbox: Rectangle,

    #[pdf(key = "Name")]
    pub name: Option<PdfString>,

    #[pdf(key = "Measure")]
    pub measure: Option<Primitive>,
}
