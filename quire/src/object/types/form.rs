//! Interactive forms (AcroForm).

use super::prelude::*;

#[derive(Object, ObjectWrite, Debug, Default)]
pub struct InteractiveForm {
    #[pdf(key = "Fields")]
    pub fields: Vec<Ref<FieldDictionary>>,

    #[pdf(key = "NeedAppearances", default = "false")]
    pub need_appearances: bool,

    #[pdf(key = "SigFlags", default = "0")]
    pub sig_flags: i64,

    #[pdf(key = "DA")]
    pub default_appearance: Option<PdfString>,

    #[pdf(key = "DR")]
    pub default_resources: Option<MaybeRef<Resources>>,

    #[pdf(key = "Q")]
    pub quadding: Option<i64>,

    #[pdf(key = "XFA")]
    pub xfa: Option<Primitive>,

    #[pdf(other)]
    pub other: Dict,
}

#[derive(Object, ObjectWrite, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    #[pdf(name = "Btn")]
    Button,
    #[pdf(name = "Tx")]
    Text,
    #[pdf(name = "Ch")]
    Choice,
    #[pdf(name = "Sig")]
    Signature,
}

#[derive(Object, ObjectWrite, Debug)]
pub struct FieldDictionary {
    /// Absent on fields that inherit their type from a parent.
    #[pdf(key = "FT")]
    pub field_type: Option<FieldType>,

    #[pdf(key = "Parent")]
    pub parent: Option<ObjRef>,

    #[pdf(key = "Kids")]
    pub kids: Vec<Ref<FieldDictionary>>,

    /// Partial field name.
    #[pdf(key = "T")]
    pub name: Option<PdfString>,

    #[pdf(key = "TU")]
    pub alt_name: Option<PdfString>,

    #[pdf(key = "TM")]
    pub mapping_name: Option<PdfString>,

    #[pdf(key = "Ff", default = "0")]
    pub flags: i64,

    #[pdf(key = "V")]
    pub value: Option<Primitive>,

    #[pdf(key = "DV")]
    pub default_value: Option<Primitive>,

    #[pdf(key = "DA")]
    pub default_appearance: Option<PdfString>,

    #[pdf(key = "MaxLen")]
    pub max_len: Option<i64>,

    #[pdf(key = "AA")]
    pub additional_actions: Option<Dict>,

    // widget-annotation fields when field and widget share a dictionary
    #[pdf(key = "Rect")]
    pub rect: Option<Rectangle>,

    #[pdf(key = "Subtype")]
    pub subtype: Option<Name>,

    #[pdf(other)]
    pub other: Dict,
}

impl FieldDictionary {
    /// The fully qualified name, walking parent links.
    pub fn full_name(&self, r: &impl Resolve) -> Result<String> {
        let own = match self.name {
            Some(ref t) => t.as_str()?.into_owned(),
            None => String::new(),
        };
        match self.parent {
            Some(parent) => {
                let parent: RcRef<FieldDictionary> = r.get(Ref::new(parent))?;
                let prefix = parent.full_name(r)?;
                if prefix.is_empty() {
                    Ok(own)
                } else if own.is_empty() {
                    Ok(prefix)
                } else {
                    Ok(format!("{}.{}", prefix, own))
                }
            }
            None => Ok(own),
        }
    }
}
