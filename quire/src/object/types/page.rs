use super::prelude::*;
use crate::content::Content;

/// Interior node or leaf of the page tree.
#[derive(Debug)]
pub enum PagesNode {
    Tree(PageTree),
    Leaf(Page),
}

impl Object for PagesNode {
    fn from_primitive(p: Primitive, resolve: &impl Resolve) -> Result<PagesNode> {
        let dict = p.into_dictionary(resolve)?;
        match dict.get("Type").and_then(|p| p.as_name().ok()) {
            Some("Pages") => Ok(PagesNode::Tree(PageTree::from_primitive(
                Primitive::Dictionary(dict),
                resolve,
            )?)),
            Some("Page") => Ok(PagesNode::Leaf(Page::from_primitive(
                Primitive::Dictionary(dict),
                resolve,
            )?)),
            Some(other) => Err(PdfError::WrongDictionaryType {
                expected: "Page or Pages".into(),
                found: other.into(),
            }),
            None => Err(PdfError::MissingEntry {
                typ: "PagesNode",
                field: "Type".into(),
            }),
        }
    }
}
impl ObjectWrite for PagesNode {
    fn to_primitive(&self, update: &mut impl Updater) -> Result<Primitive> {
        match self {
            PagesNode::Tree(t) => t.to_primitive(update),
            PagesNode::Leaf(l) => l.to_primitive(update),
        }
    }
}

/// A leaf wrapped in its reference.
#[derive(Debug, Clone)]
pub struct PageRc(pub(crate) RcRef<PagesNode>);
impl std::ops::Deref for PageRc {
    type Target = Page;
    fn deref(&self) -> &Page {
        match *self.0 {
            PagesNode::Leaf(ref page) => page,
            _ => unreachable!(),
        }
    }
}
impl PageRc {
    pub fn create(page: Page, update: &mut impl Updater) -> Result<PageRc> {
        Ok(PageRc(update.create(PagesNode::Leaf(page))?))
    }
    pub fn update(page: Page, old: &PageRc, update: &mut impl Updater) -> Result<PageRc> {
        update
            .update(old.get_ref(), PagesNode::Leaf(page))
            .map(PageRc)
    }
    pub fn get_ref(&self) -> ObjRef {
        self.0.get_ref().get_inner()
    }
}
impl Object for PageRc {
    fn from_primitive(p: Primitive, resolve: &impl Resolve) -> Result<PageRc> {
        let node = t!(RcRef::from_primitive(p, resolve));
        match *node {
            PagesNode::Tree(_) => Err(PdfError::WrongDictionaryType {
                expected: "Page".into(),
                found: "Pages".into(),
            }),
            PagesNode::Leaf(_) => Ok(PageRc(node)),
        }
    }
}
impl ObjectWrite for PageRc {
    fn to_primitive(&self, update: &mut impl Updater) -> Result<Primitive> {
        self.0.to_primitive(update)
    }
}

/// An interior node wrapped in its reference.
#[derive(Debug, Clone)]
pub struct PagesRc(RcRef<PagesNode>);
impl std::ops::Deref for PagesRc {
    type Target = PageTree;
    fn deref(&self) -> &PageTree {
        match *self.0 {
            PagesNode::Tree(ref tree) => tree,
            _ => unreachable!(),
        }
    }
}
impl PagesRc {
    pub fn create(tree: PageTree, update: &mut impl Updater) -> Result<PagesRc> {
        Ok(PagesRc(update.create(PagesNode::Tree(tree))?))
    }
    pub fn get_ref(&self) -> ObjRef {
        self.0.get_ref().get_inner()
    }
}
impl Object for PagesRc {
    fn from_primitive(p: Primitive, resolve: &impl Resolve) -> Result<PagesRc> {
        let node = t!(RcRef::from_primitive(p, resolve));
        match *node {
            PagesNode::Leaf(_) => Err(PdfError::WrongDictionaryType {
                expected: "Pages".into(),
                found: "Page".into(),
            }),
            PagesNode::Tree(_) => Ok(PagesRc(node)),
        }
    }
}
impl ObjectWrite for PagesRc {
    fn to_primitive(&self, update: &mut impl Updater) -> Result<Primitive> {
        self.0.to_primitive(update)
    }
}

#[derive(Object, ObjectWrite, Debug)]
#[pdf(Type = "Pages")]
pub struct PageTree {
    #[pdf(key = "Parent")]
    pub parent: Option<PagesRc>,

    #[pdf(key = "Kids")]
    pub kids: Vec<Ref<PagesNode>>,

    #[pdf(key = "Count")]
    pub count: i64,

    // inheritable attributes
    #[pdf(key = "Resources", indirect)]
    pub resources: Option<MaybeRef<Resources>>,

    #[pdf(key = "MediaBox")]
    pub media_box: Option<Rectangle>,

    #[pdf(key = "CropBox")]
    pub crop_box: Option<Rectangle>,

    #[pdf(key = "Rotate")]
    pub rotate: Option<i64>,
}

impl PageTree {
    pub fn root() -> PageTree {
        PageTree {
            parent: None,
            kids: Vec::new(),
            count: 0,
            resources: None,
            media_box: None,
            crop_box: None,
            rotate: None,
        }
    }

    /// The `n`th leaf under this node, counting across subtrees.
    pub fn page(&self, resolve: &impl Resolve, n: u32) -> Result<PageRc> {
        if n as i64 >= self.count {
            return Err(PdfError::PageOutOfBounds {
                page_nr: n,
                max: self.count as u32,
            });
        }
        let mut remaining = n as i64;
        for &kid in &self.kids {
            let node = resolve.get(kid)?;
            match *node {
                PagesNode::Tree(ref tree) => {
                    if remaining < tree.count {
                        return tree.page(resolve, remaining as u32);
                    }
                    remaining -= tree.count;
                }
                PagesNode::Leaf(_) => {
                    if remaining == 0 {
                        return Ok(PageRc(node));
                    }
                    remaining -= 1;
                }
            }
        }
        Err(PdfError::PageNotFound { page_nr: n })
    }
}

#[derive(Object, ObjectWrite, Debug, Clone)]
#[pdf(Type = "Page?")]
pub struct Page {
    #[pdf(key = "Parent")]
    pub parent: PagesRc,

    #[pdf(key = "Resources", indirect)]
    pub resources: Option<MaybeRef<Resources>>,

    #[pdf(key = "MediaBox")]
    pub media_box: Option<Rectangle>,

    #[pdf(key = "CropBox")]
    pub crop_box: Option<Rectangle>,

    #[pdf(key = "TrimBox")]
    pub trim_box: Option<Rectangle>,

    #[pdf(key = "BleedBox")]
    pub bleed_box: Option<Rectangle>,

    #[pdf(key = "ArtBox")]
    pub art_box: Option<Rectangle>,

    #[pdf(key = "Contents")]
    pub contents: Option<Content>,

    #[pdf(key = "Rotate")]
    pub rotate: Option<i64>,

    #[pdf(key = "UserUnit")]
    pub user_unit: Option<f32>,

    #[pdf(key = "Annots")]
    pub annotations: Lazy<Vec<MaybeRef<Annot>>>,

    #[pdf(key = "Trans")]
    pub transition: Option<Dict>,

    #[pdf(key = "VP")]
    pub viewports: Option<Primitive>,

    #[pdf(key = "Metadata")]
    pub metadata: Option<Primitive>,

    #[pdf(key = "StructParents")]
    pub struct_parents: Option<i64>,

    #[pdf(other)]
    pub other: Dict,
}

fn inherit<'a, T: 'a, F>(mut parent: &'a PageTree, f: F) -> Option<T>
where
    F: Fn(&'a PageTree) -> Option<T>,
{
    loop {
        match (&parent.parent, f(parent)) {
            (_, Some(t)) => return Some(t),
            (Some(p), None) => parent = &**p,
            (None, None) => return None,
        }
    }
}

impl Page {
    pub fn new(parent: PagesRc) -> Page {
        Page {
            parent,
            resources: None,
            media_box: None,
            crop_box: None,
            trim_box: None,
            bleed_box: None,
            art_box: None,
            contents: None,
            rotate: None,
            user_unit: None,
            annotations: Default::default(),
            transition: None,
            viewports: None,
            metadata: None,
            struct_parents: None,
            other: Dict::new(),
        }
    }

    /// MediaBox, inherited through the tree when absent here.
    pub fn media_box(&self) -> Result<Rectangle> {
        self.media_box
            .or_else(|| inherit(&self.parent, |t| t.media_box))
            .ok_or(PdfError::MissingEntry {
                typ: "Page",
                field: "MediaBox".into(),
            })
    }

    pub fn crop_box(&self) -> Result<Rectangle> {
        match self
            .crop_box
            .or_else(|| inherit(&self.parent, |t| t.crop_box))
        {
            Some(b) => Ok(b),
            None => self.media_box(),
        }
    }

    pub fn rotate(&self) -> i64 {
        self.rotate
            .or_else(|| inherit(&self.parent, |t| t.rotate))
            .unwrap_or(0)
    }

    pub fn resources(&self) -> Result<&MaybeRef<Resources>> {
        self.resources
            .as_ref()
            .or_else(|| inherit(&self.parent, |t| t.resources.as_ref()))
            .ok_or(PdfError::MissingEntry {
                typ: "Page",
                field: "Resources".into(),
            })
    }
}
impl SubType<PagesNode> for Page {}
