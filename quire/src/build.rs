//! Builders for assembling documents from scratch - enough surface for
//! pipelines (and the test suite) to author pages, fonts and annotations
//! without touching primitives directly.

use crate::content::{Content, Op};
use crate::error::*;
use crate::file::{File, LoadOptions, Storage};
use crate::object::types::*;
use crate::object::*;
use crate::primitive::{Dict, Name, PdfString, Primitive};

#[derive(Default)]
pub struct PageBuilder {
    pub content: Option<Content>,
    pub media_box: Option<Rectangle>,
    pub crop_box: Option<Rectangle>,
    pub trim_box: Option<Rectangle>,
    pub rotate: Option<i64>,
    pub resources: Resources,
    pub annotations: Vec<Annot>,
}

impl PageBuilder {
    pub fn from_content(content: Content) -> PageBuilder {
        PageBuilder {
            content: Some(content),
            ..PageBuilder::default()
        }
    }

    pub fn size(&mut self, width: f32, height: f32) -> &mut Self {
        self.media_box = Some(Rectangle::new(0., 0., width, height));
        self
    }

    pub fn media_box(&mut self, rect: Rectangle) -> &mut Self {
        self.media_box = Some(rect);
        self
    }

    /// Register one of the standard 14 fonts under `name`.
    pub fn standard_font(&mut self, name: &str, base_font: &str) -> &mut Self {
        let mut dict = Dict::new();
        dict.insert("Type", Primitive::name("Font"));
        dict.insert("Subtype", Primitive::name("Type1"));
        dict.insert("BaseFont", Primitive::name(base_font));
        self.resources
            .fonts
            .insert(Name::from(name), Lazy::from(Primitive::Dictionary(dict)));
        self
    }

    pub fn annotation(&mut self, annot: Annot) -> &mut Self {
        self.annotations.push(annot);
        self
    }
}

pub struct CatalogBuilder {
    pages: Vec<PageBuilder>,
}

impl CatalogBuilder {
    pub fn from_pages(pages: Vec<PageBuilder>) -> CatalogBuilder {
        CatalogBuilder { pages }
    }

    pub fn build(self, update: &mut impl Updater) -> Result<Catalog> {
        let kid_promises: Vec<PromisedRef<PagesNode>> =
            self.pages.iter().map(|_| update.promise()).collect();
        let kids: Vec<Ref<PagesNode>> = kid_promises.iter().map(|p| p.get_ref()).collect();

        let tree = PagesRc::create(
            PageTree {
                parent: None,
                count: kids.len() as i64,
                kids,
                resources: None,
                media_box: None,
                crop_box: None,
                rotate: None,
            },
            update,
        )?;

        for (builder, promise) in self.pages.into_iter().zip(kid_promises) {
            let mut page = Page::new(tree.clone());
            page.media_box = builder.media_box;
            page.crop_box = builder.crop_box;
            page.trim_box = builder.trim_box;
            page.rotate = builder.rotate;
            page.contents = builder.content;
            page.resources = Some(MaybeRef::Direct(std::rc::Rc::new(builder.resources)));
            if !builder.annotations.is_empty() {
                let annots = Primitive::array::<Annot, _, _, _>(
                    builder.annotations.iter(),
                    update,
                )?;
                page.annotations = Lazy::from(annots);
            }
            update.fulfill(promise, PagesNode::Leaf(page))?;
        }

        Ok(Catalog {
            version: None,
            pages: tree,
            page_labels: None,
            names: None,
            dests: None,
            outlines: None,
            forms: None,
            metadata: None,
            struct_tree_root: None,
            mark_info: None,
            output_intents: Vec::new(),
            lang: None,
            open_action: None,
            other: Dict::new(),
        })
    }

    /// Assemble a complete in-memory document.
    pub fn build_file(self, options: LoadOptions) -> Result<File<Vec<u8>>> {
        let mut storage = Storage::empty(options);
        let catalog = self.build(&mut storage)?;
        File::from_catalog(storage, catalog)
    }
}

/// A text-showing content program: `BT /font size Tf x y Td (text) Tj ET`.
pub fn text_content(font: &str, size: f32, x: f32, y: f32, text: &str) -> Content {
    Content::from_ops(vec![
        Op::new("BT", vec![]),
        Op::new(
            "Tf",
            vec![Primitive::name(font), Primitive::Integer(size as i64)],
        ),
        Op::new(
            "Td",
            vec![
                Primitive::Integer(x as i64),
                Primitive::Integer(y as i64),
            ],
        ),
        Op::new(
            "Tj",
            vec![Primitive::String(PdfString::new(text.as_bytes().to_vec()))],
        ),
        Op::new("ET", vec![]),
    ])
}
