//! Name trees: sorted string-keyed maps spread over a tree of nodes.

use super::prelude::*;

#[derive(Debug)]
pub enum NameTreeNode<T> {
    /// Kids of an intermediate node.
    Intermediate(Vec<Ref<NameTree<T>>>),
    /// Sorted `(key, value)` pairs of a leaf.
    Leaf(Vec<(PdfString, T)>),
}

#[derive(Debug)]
pub struct NameTree<T> {
    pub limits: Option<(PdfString, PdfString)>,
    pub node: NameTreeNode<T>,
}

impl<T: Object + std::fmt::Debug> NameTree<T> {
    /// Visit every `(key, value)` pair in order.
    pub fn walk(&self, r: &impl Resolve, callback: &mut dyn FnMut(&PdfString, &T)) -> Result<()> {
        match self.node {
            NameTreeNode::Leaf(ref items) => {
                for (name, value) in items {
                    callback(name, value);
                }
            }
            NameTreeNode::Intermediate(ref kids) => {
                for &kid in kids {
                    r.get(kid)?.walk(r, callback)?;
                }
            }
        }
        Ok(())
    }

    /// Binary-search style lookup descending through limits.
    pub fn lookup(&self, r: &impl Resolve, key: &[u8]) -> Result<Option<T>>
    where
        T: Clone,
    {
        match self.node {
            NameTreeNode::Leaf(ref items) => Ok(items
                .iter()
                .find(|(name, _)| name.as_bytes() == key)
                .map(|(_, value)| value.clone())),
            NameTreeNode::Intermediate(ref kids) => {
                for &kid in kids {
                    let node = r.get(kid)?;
                    if let Some((ref low, ref high)) = node.limits {
                        if key < low.as_bytes() || key > high.as_bytes() {
                            continue;
                        }
                    }
                    if let Some(found) = node.lookup(r, key)? {
                        return Ok(Some(found));
                    }
                }
                Ok(None)
            }
        }
    }

    /// A single-leaf tree from sorted pairs.
    pub fn from_pairs(mut pairs: Vec<(PdfString, T)>) -> NameTree<T> {
        pairs.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
        NameTree {
            limits: None,
            node: NameTreeNode::Leaf(pairs),
        }
    }
}

impl<T: Object + std::fmt::Debug> Object for NameTree<T> {
    fn from_primitive(p: Primitive, resolve: &impl Resolve) -> Result<Self> {
        let mut dict = p.into_dictionary(resolve)?;

        let limits = match dict.remove("Limits") {
            Some(p) => {
                let arr = p.resolve(resolve)?.into_array(resolve)?;
                if arr.len() != 2 {
                    bail!("/Limits is not a two-element array");
                }
                Some((
                    arr[0].clone().resolve(resolve)?.into_string()?,
                    arr[1].clone().resolve(resolve)?.into_string()?,
                ))
            }
            None => None,
        };

        let kids = dict.remove("Kids");
        let names = dict.remove("Names");
        match (kids, names) {
            (Some(kids), _) => {
                let kids = kids
                    .resolve(resolve)?
                    .into_array(resolve)?
                    .into_iter()
                    .map(|p| Ref::from_primitive(p, resolve))
                    .collect::<Result<Vec<_>>>()?;
                Ok(NameTree {
                    limits,
                    node: NameTreeNode::Intermediate(kids),
                })
            }
            (None, Some(names)) => {
                let names = names.resolve(resolve)?.into_array(resolve)?;
                let mut items = Vec::with_capacity(names.len() / 2);
                for pair in names.chunks(2) {
                    match pair {
                        [key, value] => items.push((
                            key.clone().resolve(resolve)?.into_string()?,
                            T::from_primitive(value.clone(), resolve)?,
                        )),
                        _ => bail!("/Names with an odd number of elements"),
                    }
                }
                Ok(NameTree {
                    limits,
                    node: NameTreeNode::Leaf(items),
                })
            }
            (None, None) => Err(PdfError::MissingEntry {
                typ: "NameTree",
                field: "Kids or Names".into(),
            }),
        }
    }
}

impl<T: ObjectWrite> ObjectWrite for NameTree<T> {
    fn to_primitive(&self, update: &mut impl Updater) -> Result<Primitive> {
        let mut dict = Dict::new();
        if let Some((ref low, ref high)) = self.limits {
            dict.insert(
                "Limits",
                Primitive::Array(vec![
                    Primitive::String(low.clone()),
                    Primitive::String(high.clone()),
                ]),
            );
        }
        match self.node {
            NameTreeNode::Leaf(ref items) => {
                let mut names = Vec::with_capacity(items.len() * 2);
                for (key, value) in items {
                    names.push(Primitive::String(key.clone()));
                    names.push(value.to_primitive(update)?);
                }
                dict.insert("Names", Primitive::Array(names));
            }
            NameTreeNode::Intermediate(ref kids) => {
                let kids = kids
                    .iter()
                    .map(|r| Ok(Primitive::Reference(r.get_inner())))
                    .collect::<Result<Vec<_>>>()?;
                dict.insert("Kids", Primitive::Array(kids));
            }
        }
        Ok(Primitive::Dictionary(dict))
    }
}
