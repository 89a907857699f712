//! Type-erased slot for the typed object cache.

use crate::error::*;
use std::any::{Any as StdAny, TypeId};
use std::rc::Rc;

#[derive(Clone)]
pub struct Any(Rc<dyn StdAny>);

impl Any {
    pub fn new<T: StdAny>(rc: Rc<T>) -> Any {
        Any(rc as Rc<dyn StdAny>)
    }
    pub fn downcast<T: StdAny>(self) -> Result<Rc<T>> {
        self.0.downcast::<T>().map_err(|_| PdfError::Other {
            msg: format!("cached object is not a {}", std::any::type_name::<T>()),
        })
    }
    pub fn is<T: StdAny>(&self) -> bool {
        (*self.0).type_id() == TypeId::of::<T>()
    }
}
