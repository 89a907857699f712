//! Document outline (bookmarks). Siblings and parents are references;
//! nothing here owns its neighbours.

use super::prelude::*;

#[derive(Object, ObjectWrite, Debug, Default)]
#[pdf(Type = "Outlines?")]
pub struct Outlines {
    #[pdf(key = "Count", default = "0")]
    pub count: i64,

    #[pdf(key = "First")]
    pub first: Option<Ref<OutlineItem>>,

    #[pdf(key = "Last")]
    pub last: Option<Ref<OutlineItem>>,
}

#[derive(Object, ObjectWrite, Debug)]
pub struct OutlineItem {
    #[pdf(key = "Title")]
    pub title: Option<PdfString>,

    #[pdf(key = "Prev")]
    pub prev: Option<Ref<OutlineItem>>,

    #[pdf(key = "Next")]
    pub next: Option<Ref<OutlineItem>>,

    #[pdf(key = "First")]
    pub first: Option<Ref<OutlineItem>>,

    #[pdf(key = "Last")]
    pub last: Option<Ref<OutlineItem>>,

    #[pdf(key = "Parent")]
    pub parent: Option<ObjRef>,

    #[pdf(key = "Count")]
    pub count: Option<i64>,

    #[pdf(key = "Dest")]
    pub dest: Option<Primitive>,

    #[pdf(key = "A")]
    pub action: Option<Action>,

    #[pdf(key = "SE")]
    pub structure_element: Option<ObjRef>,

    #[pdf(key = "C")]
    pub color: Option<Vec<f32>>,

    #[pdf(key = "F", default = "0")]
    pub flags: i64,

    #[pdf(other)]
    pub other: Dict,
}

impl OutlineItem {
    /// Walk this item's siblings, left to right.
    pub fn siblings<'a>(
        &self,
        r: &'a impl Resolve,
    ) -> impl Iterator<Item = Result<RcRef<OutlineItem>>> + 'a {
        let mut next = self.next;
        std::iter::from_fn(move || {
            let link = next?;
            match r.get(link) {
                Ok(item) => {
                    next = item.next;
                    Some(Ok(item))
                }
                Err(e) => {
                    next = None;
                    Some(Err(e))
                }
            }
        })
    }
}
