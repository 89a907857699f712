//! Annotations and actions. Shared fields live on [`Annot`]; what remains
//! of the dictionary is projected into a per-subtype payload, with unknown
//! subtypes carried verbatim so they round-trip.

use super::prelude::*;

bitflags::bitflags! {
    /// Annotation flags (`/F`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AnnotFlags: u32 {
        const INVISIBLE = 1 << 0;
        const HIDDEN = 1 << 1;
        const PRINT = 1 << 2;
        const NO_ZOOM = 1 << 3;
        const NO_ROTATE = 1 << 4;
        const NO_VIEW = 1 << 5;
        const READ_ONLY = 1 << 6;
        const LOCKED = 1 << 7;
        const TOGGLE_NO_VIEW = 1 << 8;
        const LOCKED_CONTENTS = 1 << 9;
    }
}

#[derive(Debug)]
pub struct Annot {
    pub subtype: Name,
    pub rect: Option<Rectangle>,
    pub contents: Option<PdfString>,
    /// `/NM`, the annotation name unique on its page.
    pub name: Option<PdfString>,
    /// `/M`, last-modified date string.
    pub modified: Option<PdfString>,
    pub flags: AnnotFlags,
    /// `/AP`, the appearance dictionary.
    pub appearance: Option<Dict>,
    /// `/AS`, selecting among appearance states.
    pub appearance_state: Option<Name>,
    pub border: Option<Primitive>,
    pub color: Option<Vec<f32>>,
    pub struct_parent: Option<i64>,
    /// `/AF`, associated files.
    pub associated_files: Option<Primitive>,
    pub data: AnnotData,
}

#[derive(Debug)]
pub enum AnnotData {
    Link(LinkAnnot),
    Text(TextAnnot),
    Highlight(HighlightAnnot),
    Widget(WidgetAnnot),
    FreeText(FreeTextAnnot),
    Line(LineAnnot),
    Ink(InkAnnot),
    Stamp(StampAnnot),
    FileAttachment(FileAttachmentAnnot),
    Popup(PopupAnnot),
    Redact(RedactAnnot),
    ThreeD(ThreeDAnnot),
    Sound(SoundAnnot),
    Movie(MovieAnnot),
    Screen(ScreenAnnot),
    Projection(ProjectionAnnot),
    Watermark(WatermarkAnnot),
    TrapNet(TrapNetAnnot),
    PrinterMark(PrinterMarkAnnot),
    /// Subtypes this version does not know: kept as-is so they round-trip.
    Other(Dict),
}

impl AnnotData {
    fn from_dict(subtype: &str, dict: Dict, resolve: &impl Resolve) -> Result<AnnotData> {
        let p = Primitive::Dictionary(dict);
        Ok(match subtype {
            "Link" => AnnotData::Link(LinkAnnot::from_primitive(p, resolve)?),
            "Text" => AnnotData::Text(TextAnnot::from_primitive(p, resolve)?),
            "Highlight" => AnnotData::Highlight(HighlightAnnot::from_primitive(p, resolve)?),
            "Widget" => AnnotData::Widget(WidgetAnnot::from_primitive(p, resolve)?),
            "FreeText" => AnnotData::FreeText(FreeTextAnnot::from_primitive(p, resolve)?),
            "Line" => AnnotData::Line(LineAnnot::from_primitive(p, resolve)?),
            "Ink" => AnnotData::Ink(InkAnnot::from_primitive(p, resolve)?),
            "Stamp" => AnnotData::Stamp(StampAnnot::from_primitive(p, resolve)?),
            "FileAttachment" => {
                AnnotData::FileAttachment(FileAttachmentAnnot::from_primitive(p, resolve)?)
            }
            "Popup" => AnnotData::Popup(PopupAnnot::from_primitive(p, resolve)?),
            "Redact" => AnnotData::Redact(RedactAnnot::from_primitive(p, resolve)?),
            "3D" => AnnotData::ThreeD(ThreeDAnnot::from_primitive(p, resolve)?),
            "Sound" => AnnotData::Sound(SoundAnnot::from_primitive(p, resolve)?),
            "Movie" => AnnotData::Movie(MovieAnnot::from_primitive(p, resolve)?),
            "Screen" => AnnotData::Screen(ScreenAnnot::from_primitive(p, resolve)?),
            "Projection" => AnnotData::Projection(ProjectionAnnot::from_primitive(p, resolve)?),
            "Watermark" => AnnotData::Watermark(WatermarkAnnot::from_primitive(p, resolve)?),
            "TrapNet" => AnnotData::TrapNet(TrapNetAnnot::from_primitive(p, resolve)?),
            "PrinterMark" => {
                AnnotData::PrinterMark(PrinterMarkAnnot::from_primitive(p, resolve)?)
            }
            _ => AnnotData::Other(p.into_dictionary(resolve)?),
        })
    }

    fn to_dict(&self, update: &mut impl Updater) -> Result<Dict> {
        let p = match self {
            AnnotData::Link(a) => a.to_primitive(update)?,
            AnnotData::Text(a) => a.to_primitive(update)?,
            AnnotData::Highlight(a) => a.to_primitive(update)?,
            AnnotData::Widget(a) => a.to_primitive(update)?,
            AnnotData::FreeText(a) => a.to_primitive(update)?,
            AnnotData::Line(a) => a.to_primitive(update)?,
            AnnotData::Ink(a) => a.to_primitive(update)?,
            AnnotData::Stamp(a) => a.to_primitive(update)?,
            AnnotData::FileAttachment(a) => a.to_primitive(update)?,
            AnnotData::Popup(a) => a.to_primitive(update)?,
            AnnotData::Redact(a) => a.to_primitive(update)?,
            AnnotData::ThreeD(a) => a.to_primitive(update)?,
            AnnotData::Sound(a) => a.to_primitive(update)?,
            AnnotData::Movie(a) => a.to_primitive(update)?,
            AnnotData::Screen(a) => a.to_primitive(update)?,
            AnnotData::Projection(a) => a.to_primitive(update)?,
            AnnotData::Watermark(a) => a.to_primitive(update)?,
            AnnotData::TrapNet(a) => a.to_primitive(update)?,
            AnnotData::PrinterMark(a) => a.to_primitive(update)?,
            AnnotData::Other(d) => Primitive::Dictionary(d.clone()),
        };
        match p {
            Primitive::Dictionary(d) => Ok(d),
            _ => unreachable!(),
        }
    }
}

impl Object for Annot {
    fn from_primitive(p: Primitive, resolve: &impl Resolve) -> Result<Annot> {
        let mut dict = p.into_dictionary(resolve)?;
        dict.expect("Annot", "Type", "Annot", false)?;
        dict.remove("Type");
        let subtype = dict.require("Annot", "Subtype")?.into_name()?;
        let rect = Option::from_primitive(
            dict.remove("Rect").unwrap_or(Primitive::Null),
            resolve,
        )?;
        let contents =
            Option::from_primitive(dict.remove("Contents").unwrap_or(Primitive::Null), resolve)?;
        let name = Option::from_primitive(dict.remove("NM").unwrap_or(Primitive::Null), resolve)?;
        let modified =
            Option::from_primitive(dict.remove("M").unwrap_or(Primitive::Null), resolve)?;
        let flags = match dict.remove("F") {
            Some(p) => AnnotFlags::from_bits_truncate(p.resolve(resolve)?.as_integer()? as u32),
            None => AnnotFlags::empty(),
        };
        let appearance =
            Option::from_primitive(dict.remove("AP").unwrap_or(Primitive::Null), resolve)?;
        let appearance_state =
            Option::from_primitive(dict.remove("AS").unwrap_or(Primitive::Null), resolve)?;
        let border = dict.remove("Border");
        let color = Option::from_primitive(dict.remove("C").unwrap_or(Primitive::Null), resolve)?;
        let struct_parent =
            Option::from_primitive(dict.remove("StructParent").unwrap_or(Primitive::Null), resolve)?;
        let associated_files = dict.remove("AF");
        let data = AnnotData::from_dict(subtype.as_str(), dict, resolve)?;
        Ok(Annot {
            subtype,
            rect,
            contents,
            name,
            modified,
            flags,
            appearance,
            appearance_state,
            border,
            color,
            struct_parent,
            associated_files,
            data,
        })
    }
}

impl ObjectWrite for Annot {
    fn to_primitive(&self, update: &mut impl Updater) -> Result<Primitive> {
        let mut dict = self.data.to_dict(update)?;
        dict.insert("Type", Primitive::name("Annot"));
        dict.insert("Subtype", Primitive::Name(self.subtype.clone()));
        if let Some(rect) = self.rect {
            dict.insert("Rect", rect.to_primitive(update)?);
        }
        if let Some(ref v) = self.contents {
            dict.insert("Contents", v.clone());
        }
        if let Some(ref v) = self.name {
            dict.insert("NM", v.clone());
        }
        if let Some(ref v) = self.modified {
            dict.insert("M", v.clone());
        }
        if !self.flags.is_empty() {
            dict.insert("F", Primitive::Integer(self.flags.bits() as i64));
        }
        if let Some(ref v) = self.appearance {
            dict.insert("AP", v.clone());
        }
        if let Some(ref v) = self.appearance_state {
            dict.insert("AS", Primitive::Name(v.clone()));
        }
        if let Some(ref v) = self.border {
            dict.insert("Border", v.clone());
        }
        if let Some(ref v) = self.color {
            dict.insert(
                "C",
                Primitive::Array(v.iter().map(|&n| super::number(n)).collect()),
            );
        }
        if let Some(v) = self.struct_parent {
            dict.insert("StructParent", Primitive::Integer(v));
        }
        if let Some(ref v) = self.associated_files {
            dict.insert("AF", v.clone());
        }
        Ok(Primitive::Dictionary(dict))
    }
}

impl Annot {
    /// A link annotation jumping to a destination.
    pub fn link(rect: Rectangle, action: Action) -> Annot {
        Annot {
            subtype: Name::from("Link"),
            rect: Some(rect),
            contents: None,
            name: None,
            modified: None,
            flags: AnnotFlags::empty(),
            appearance: None,
            appearance_state: None,
            border: None,
            color: None,
            struct_parent: None,
            associated_files: None,
            data: AnnotData::Link(LinkAnnot {
                action: Some(action),
                dest: None,
                highlight_mode: None,
                other: Dict::new(),
            }),
        }
    }
}

#[derive(Object, ObjectWrite, Debug, Default)]
pub struct LinkAnnot {
    #[pdf(key = "A")]
    pub action: Option<Action>,

    #[pdf(key = "Dest")]
    pub dest: Option<Primitive>,

    #[pdf(key = "H")]
    pub highlight_mode: Option<Name>,

    #[pdf(other)]
    pub other: Dict,
}

#[derive(Object, ObjectWrite, Debug, Default)]
pub struct TextAnnot {
    #[pdf(key = "Open", default = "false")]
    pub open: bool,

    #[pdf(key = "Name")]
    pub icon: Option<Name>,

    #[pdf(key = "State")]
    pub state: Option<PdfString>,

    #[pdf(key = "StateModel")]
    pub state_model: Option<PdfString>,

    #[pdf(other)]
    pub other: Dict,
}

#[derive(Object, ObjectWrite, Debug, Default)]
pub struct HighlightAnnot {
    #[pdf(key = "QuadPoints")]
    pub quad_points: Vec<f32>,

    #[pdf(other)]
    pub other: Dict,
}

#[derive(Object, ObjectWrite, Debug, Default)]
pub struct WidgetAnnot {
    #[pdf(key = "FT")]
    pub field_type: Option<Name>,

    #[pdf(key = "A")]
    pub action: Option<Action>,

    #[pdf(key = "AA")]
    pub additional_actions: Option<Dict>,

    #[pdf(key = "MK")]
    pub appearance_characteristics: Option<Dict>,

    #[pdf(key = "Parent")]
    pub parent: Option<ObjRef>,

    #[pdf(other)]
    pub other: Dict,
}

#[derive(Object, ObjectWrite, Debug, Default)]
pub struct FreeTextAnnot {
    #[pdf(key = "DA")]
    pub default_appearance: Option<PdfString>,

    #[pdf(key = "Q", default = "0")]
    pub quadding: i64,

    #[pdf(other)]
    pub other: Dict,
}

#[derive(Object, ObjectWrite, Debug, Default)]
pub struct LineAnnot {
    #[pdf(key = "L")]
    pub line: Vec<f32>,

    #[pdf(other)]
    pub other: Dict,
}

#[derive(Object, ObjectWrite, Debug, Default)]
pub struct InkAnnot {
    #[pdf(key = "InkList")]
    pub ink_list: Option<Primitive>,

    #[pdf(other)]
    pub other: Dict,
}

#[derive(Object, ObjectWrite, Debug, Default)]
pub struct StampAnnot {
    #[pdf(key = "Name")]
    pub icon: Option<Name>,

    #[pdf(other)]
    pub other: Dict,
}

#[derive(Object, ObjectWrite, Debug, Default)]
pub struct FileAttachmentAnnot {
    #[pdf(key = "FS")]
    pub file: Option<FileSpec>,

    #[pdf(key = "Name")]
    pub icon: Option<Name>,

    #[pdf(other)]
    pub other: Dict,
}

#[derive(Object, ObjectWrite, Debug, Default)]
pub struct PopupAnnot {
    /// The parent markup annotation; a reference, never ownership.
    #[pdf(key = "Parent")]
    pub parent: Option<ObjRef>,

    #[pdf(key = "Open", default = "false")]
    pub open: bool,

    #[pdf(other)]
    pub other: Dict,
}

#[derive(Object, ObjectWrite, Debug, Default)]
pub struct RedactAnnot {
    #[pdf(key = "QuadPoints")]
    pub quad_points: Vec<f32>,

    #[pdf(key = "IC")]
    pub interior_color: Option<Vec<f32>>,

    #[pdf(key = "OverlayText")]
    pub overlay_text: Option<PdfString>,

    #[pdf(other)]
    pub other: Dict,
}

#[derive(Object, ObjectWrite, Debug, Default)]
pub struct ThreeDAnnot {
    /// The 3D artwork stream or reference dictionary.
    #[pdf(key = "3DD")]
    pub artwork: Option<Primitive>,

    #[pdf(key = "3DV")]
    pub default_view: Option<Primitive>,

    #[pdf(key = "3DA")]
    pub activation: Option<Dict>,

    #[pdf(key = "3DI", default = "true")]
    pub interactive: bool,

    #[pdf(other)]
    pub other: Dict,
}

#[derive(Object, ObjectWrite, Debug, Default)]
pub struct SoundAnnot {
    /// The sound object stream.
    #[pdf(key = "Sound")]
    pub sound: Option<ObjRef>,

    #[pdf(key = "Name")]
    pub icon: Option<Name>,

    #[pdf(other)]
    pub other: Dict,
}

#[derive(Object, ObjectWrite, Debug, Default)]
pub struct MovieAnnot {
    #[pdf(key = "T")]
    pub title: Option<PdfString>,

    #[pdf(key = "Movie")]
    pub movie: Option<Dict>,

    /// Activation: a boolean or an activation dictionary.
    #[pdf(key = "A")]
    pub activation: Option<Primitive>,

    #[pdf(other)]
    pub other: Dict,
}

#[derive(Object, ObjectWrite, Debug, Default)]
pub struct ScreenAnnot {
    #[pdf(key = "T")]
    pub title: Option<PdfString>,

    #[pdf(key = "MK")]
    pub appearance_characteristics: Option<Dict>,

    #[pdf(key = "A")]
    pub action: Option<Action>,

    #[pdf(key = "AA")]
    pub additional_actions: Option<Dict>,

    #[pdf(other)]
    pub other: Dict,
}

#[derive(Object, ObjectWrite, Debug, Default)]
pub struct ProjectionAnnot {
    #[pdf(key = "ExData")]
    pub external_data: Option<Dict>,

    #[pdf(other)]
    pub other: Dict,
}

#[derive(Object, ObjectWrite, Debug, Default)]
pub struct WatermarkAnnot {
    /// `/FixedPrint` keeps the mark at a fixed size and position when
    /// printing.
    #[pdf(key = "FixedPrint")]
    pub fixed_print: Option<Dict>,

    #[pdf(other)]
    pub other: Dict,
}

#[derive(Object, ObjectWrite, Debug, Default)]
pub struct TrapNetAnnot {
    #[pdf(key = "LastModified")]
    pub last_modified: Option<PdfString>,

    #[pdf(key = "Version")]
    pub version: Option<Primitive>,

    #[pdf(key = "AnnotStates")]
    pub annot_states: Vec<Name>,

    #[pdf(key = "FontFauxing")]
    pub font_fauxing: Option<Primitive>,

    #[pdf(other)]
    pub other: Dict,
}

#[derive(Object, ObjectWrite, Debug, Default)]
pub struct PrinterMarkAnnot {
    /// Arbitrary name identifying the kind of printer's mark.
    #[pdf(key = "MN")]
    pub mark_style: Option<Name>,

    #[pdf(other)]
    pub other: Dict,
}

/// An action, dispatched on `/S`. `/Next` chains stay raw primitives so a
/// cycle cannot recurse the projection.
#[derive(Debug, Clone)]
pub struct Action {
    pub kind: ActionKind,
    pub next: Option<Primitive>,
}

#[derive(Debug, Clone)]
pub enum ActionKind {
    GoTo {
        dest: Primitive,
    },
    GoToR {
        file: Option<FileSpec>,
        dest: Option<Primitive>,
        new_window: Option<bool>,
    },
    GoToE {
        file: Option<FileSpec>,
        dest: Option<Primitive>,
        target: Option<Dict>,
    },
    Uri {
        uri: PdfString,
        is_map: bool,
    },
    JavaScript {
        script: Primitive,
    },
    Named {
        name: Name,
    },
    Launch {
        file: Option<FileSpec>,
        new_window: Option<bool>,
    },
    SubmitForm {
        url: Option<FileSpec>,
        fields: Option<Primitive>,
        flags: i64,
    },
    ResetForm {
        fields: Option<Primitive>,
        flags: i64,
    },
    ImportData {
        file: Option<FileSpec>,
    },
    Hide {
        target: Primitive,
        hide: bool,
    },
    Sound(Dict),
    Movie(Dict),
    Thread(Dict),
    RichMediaExecute(Dict),
    GoTo3DView(Dict),
    Other {
        subtype: Name,
        dict: Dict,
    },
}

impl Object for Action {
    fn from_primitive(p: Primitive, resolve: &impl Resolve) -> Result<Action> {
        let mut dict = p.into_dictionary(resolve)?;
        dict.expect("Action", "Type", "Action", false)?;
        dict.remove("Type");
        let next = dict.remove("Next");
        let s = dict.require("Action", "S")?.into_name()?;
        let kind = match s.as_str() {
            "GoTo" => ActionKind::GoTo {
                dest: dict.require("Action", "D")?,
            },
            "GoToR" => ActionKind::GoToR {
                file: Option::from_primitive(dict.remove("F").unwrap_or(Primitive::Null), resolve)?,
                dest: dict.remove("D"),
                new_window: Option::from_primitive(
                    dict.remove("NewWindow").unwrap_or(Primitive::Null),
                    resolve,
                )?,
            },
            "GoToE" => ActionKind::GoToE {
                file: Option::from_primitive(dict.remove("F").unwrap_or(Primitive::Null), resolve)?,
                dest: dict.remove("D"),
                target: Option::from_primitive(
                    dict.remove("T").unwrap_or(Primitive::Null),
                    resolve,
                )?,
            },
            "URI" => ActionKind::Uri {
                uri: dict.require("Action", "URI")?.resolve(resolve)?.into_string()?,
                is_map: match dict.remove("IsMap") {
                    Some(p) => p.as_bool().unwrap_or(false),
                    None => false,
                },
            },
            "JavaScript" => ActionKind::JavaScript {
                script: dict.require("Action", "JS")?,
            },
            "Named" => ActionKind::Named {
                name: dict.require("Action", "N")?.into_name()?,
            },
            "Launch" => ActionKind::Launch {
                file: Option::from_primitive(dict.remove("F").unwrap_or(Primitive::Null), resolve)?,
                new_window: Option::from_primitive(
                    dict.remove("NewWindow").unwrap_or(Primitive::Null),
                    resolve,
                )?,
            },
            "SubmitForm" => ActionKind::SubmitForm {
                url: Option::from_primitive(dict.remove("F").unwrap_or(Primitive::Null), resolve)?,
                fields: dict.remove("Fields"),
                flags: match dict.remove("Flags") {
                    Some(p) => p.resolve(resolve)?.as_integer()?,
                    None => 0,
                },
            },
            "ResetForm" => ActionKind::ResetForm {
                fields: dict.remove("Fields"),
                flags: match dict.remove("Flags") {
                    Some(p) => p.resolve(resolve)?.as_integer()?,
                    None => 0,
                },
            },
            "ImportData" => ActionKind::ImportData {
                file: Option::from_primitive(dict.remove("F").unwrap_or(Primitive::Null), resolve)?,
            },
            "Hide" => ActionKind::Hide {
                target: dict.require("Action", "T")?,
                hide: match dict.remove("H") {
                    Some(p) => p.as_bool().unwrap_or(true),
                    None => true,
                },
            },
            "Sound" => ActionKind::Sound(dict.clone()),
            "Movie" => ActionKind::Movie(dict.clone()),
            "Thread" => ActionKind::Thread(dict.clone()),
            "RichMediaExecute" => ActionKind::RichMediaExecute(dict.clone()),
            "GoTo3DView" => ActionKind::GoTo3DView(dict.clone()),
            _ => ActionKind::Other {
                subtype: s.clone(),
                dict: dict.clone(),
            },
        };
        Ok(Action { kind, next })
    }
}

impl ObjectWrite for Action {
    fn to_primitive(&self, update: &mut impl Updater) -> Result<Primitive> {
        let mut dict = Dict::new();
        dict.insert("Type", Primitive::name("Action"));
        let s = match &self.kind {
            ActionKind::GoTo { dest } => {
                dict.insert("D", dest.clone());
                "GoTo"
            }
            ActionKind::GoToR {
                file,
                dest,
                new_window,
            } => {
                if let Some(f) = file {
                    dict.insert("F", f.to_primitive(update)?);
                }
                if let Some(d) = dest {
                    dict.insert("D", d.clone());
                }
                if let Some(w) = new_window {
                    dict.insert("NewWindow", Primitive::Bool(*w));
                }
                "GoToR"
            }
            ActionKind::GoToE { file, dest, target } => {
                if let Some(f) = file {
                    dict.insert("F", f.to_primitive(update)?);
                }
                if let Some(d) = dest {
                    dict.insert("D", d.clone());
                }
                if let Some(t) = target {
                    dict.insert("T", t.clone());
                }
                "GoToE"
            }
            ActionKind::Uri { uri, is_map } => {
                dict.insert("URI", uri.clone());
                if *is_map {
                    dict.insert("IsMap", Primitive::Bool(true));
                }
                "URI"
            }
            ActionKind::JavaScript { script } => {
                dict.insert("JS", script.clone());
                "JavaScript"
            }
            ActionKind::Named { name } => {
                dict.insert("N", Primitive::Name(name.clone()));
                "Named"
            }
            ActionKind::Launch { file, new_window } => {
                if let Some(f) = file {
                    dict.insert("F", f.to_primitive(update)?);
                }
                if let Some(w) = new_window {
                    dict.insert("NewWindow", Primitive::Bool(*w));
                }
                "Launch"
            }
            ActionKind::SubmitForm { url, fields, flags } => {
                if let Some(f) = url {
                    dict.insert("F", f.to_primitive(update)?);
                }
                if let Some(f) = fields {
                    dict.insert("Fields", f.clone());
                }
                if *flags != 0 {
                    dict.insert("Flags", Primitive::Integer(*flags));
                }
                "SubmitForm"
            }
            ActionKind::ResetForm { fields, flags } => {
                if let Some(f) = fields {
                    dict.insert("Fields", f.clone());
                }
                if *flags != 0 {
                    dict.insert("Flags", Primitive::Integer(*flags));
                }
                "ResetForm"
            }
            ActionKind::ImportData { file } => {
                if let Some(f) = file {
                    dict.insert("F", f.to_primitive(update)?);
                }
                "ImportData"
            }
            ActionKind::Hide { target, hide } => {
                dict.insert("T", target.clone());
                if !hide {
                    dict.insert("H", Primitive::Bool(false));
                }
                "Hide"
            }
            ActionKind::Sound(d) => {
                merge(&mut dict, d);
                "Sound"
            }
            ActionKind::Movie(d) => {
                merge(&mut dict, d);
                "Movie"
            }
            ActionKind::Thread(d) => {
                merge(&mut dict, d);
                "Thread"
            }
            ActionKind::RichMediaExecute(d) => {
                merge(&mut dict, d);
                "RichMediaExecute"
            }
            ActionKind::GoTo3DView(d) => {
                merge(&mut dict, d);
                "GoTo3DView"
            }
            ActionKind::Other { subtype, dict: d } => {
                merge(&mut dict, d);
                dict.insert("S", Primitive::Name(subtype.clone()));
                if let Some(ref next) = self.next {
                    dict.insert("Next", next.clone());
                }
                return Ok(Primitive::Dictionary(dict));
            }
        };
        dict.insert("S", Primitive::name(s));
        if let Some(ref next) = self.next {
            dict.insert("Next", next.clone());
        }
        Ok(Primitive::Dictionary(dict))
    }
}

fn merge(dst: &mut Dict, src: &Dict) {
    for (k, v) in src.iter() {
        if !dst.contains_key(k.as_str()) {
            dst.insert(k.clone(), v.clone());
        }
    }
}

impl Action {
    /// A `GoTo` jumping to the top of `page`.
    pub fn goto_page(page: ObjRef) -> Action {
        Action {
            kind: ActionKind::GoTo {
                dest: Primitive::Array(vec![
                    Primitive::Reference(page),
                    Primitive::name("Fit"),
                ]),
            },
            next: None,
        }
    }
}
