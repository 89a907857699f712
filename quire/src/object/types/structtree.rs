//! Logical structure (tagged PDF). Parent links are references into the
//! graph; kids stay lazy because structure trees can be huge.

use super::prelude::*;

#[derive(Object, ObjectWrite, Debug)]
#[pdf(Type = "StructTreeRoot")]
pub struct StructTreeRoot {
    #[pdf(key = "K")]
    pub children: Option<Primitive>,

    #[pdf(key = "IDTree")]
    pub id_tree: Option<NameTree<ObjRef>>,

    #[pdf(key = "ParentTree")]
    pub parent_tree: Option<NumberTree<Primitive>>,

    #[pdf(key = "ParentTreeNextKey")]
    pub parent_tree_next_key: Option<i64>,

    #[pdf(key = "RoleMap")]
    pub role_map: Option<Dict>,

    #[pdf(key = "ClassMap")]
    pub class_map: Option<Dict>,
}

impl StructTreeRoot {
    /// The root-level structure elements.
    pub fn children(&self, r: &impl Resolve) -> Result<Vec<RcRef<StructElem>>> {
        elem_refs(self.children.as_ref(), r)
    }
}

#[derive(Object, ObjectWrite, Debug)]
#[pdf(Type = "StructElem?")]
pub struct StructElem {
    /// Structure type (possibly subject to the role map).
    #[pdf(key = "S")]
    pub kind: Option<Name>,

    /// The parent element or the tree root - a reference, never owned.
    #[pdf(key = "P")]
    pub parent: Option<ObjRef>,

    #[pdf(key = "ID")]
    pub id: Option<PdfString>,

    /// Page on which some or all of the content sits.
    #[pdf(key = "Pg")]
    pub page: Option<Ref<PagesNode>>,

    /// Kids: marked-content ids, object references or child elements.
    #[pdf(key = "K")]
    pub children: Option<Primitive>,

    #[pdf(key = "T")]
    pub title: Option<PdfString>,

    #[pdf(key = "Alt")]
    pub alt: Option<PdfString>,

    #[pdf(key = "ActualText")]
    pub actual_text: Option<PdfString>,

    #[pdf(key = "Lang")]
    pub lang: Option<PdfString>,

    #[pdf(other)]
    pub other: Dict,
}

impl StructElem {
    pub fn children(&self, r: &impl Resolve) -> Result<Vec<RcRef<StructElem>>> {
        elem_refs(self.children.as_ref(), r)
    }
}

/// `/K` may be a reference, an array mixing references and marked-content
/// integers, or absent. Yields only the element references.
fn elem_refs(k: Option<&Primitive>, r: &impl Resolve) -> Result<Vec<RcRef<StructElem>>> {
    let mut out = Vec::new();
    match k {
        None => {}
        Some(&Primitive::Reference(id)) => out.push(r.get(Ref::new(id))?),
        Some(Primitive::Array(items)) => {
            for item in items {
                if let Primitive::Reference(id) = *item {
                    // marked-content references resolve to dictionaries
                    // without /S; skip them
                    if let Ok(elem) = r.get(Ref::new(id)) {
                        out.push(elem);
                    }
                }
            }
        }
        Some(_) => {}
    }
    Ok(out)
}
