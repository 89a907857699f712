//! Number trees: like name trees, keyed by integers. Page labels live in
//! one.

use super::prelude::*;

#[derive(Debug)]
pub enum NumberTreeNode<T> {
    Intermediate(Vec<Ref<NumberTree<T>>>),
    Leaf(Vec<(i64, T)>),
}

#[derive(Debug)]
pub struct NumberTree<T> {
    pub limits: Option<(i64, i64)>,
    pub node: NumberTreeNode<T>,
}

impl<T: Object + std::fmt::Debug> NumberTree<T> {
    pub fn walk(&self, r: &impl Resolve, callback: &mut dyn FnMut(i64, &T)) -> Result<()> {
        match self.node {
            NumberTreeNode::Leaf(ref items) => {
                for (key, value) in items {
                    callback(*key, value);
                }
            }
            NumberTreeNode::Intermediate(ref kids) => {
                for &kid in kids {
                    r.get(kid)?.walk(r, callback)?;
                }
            }
        }
        Ok(())
    }

    pub fn lookup(&self, r: &impl Resolve, key: i64) -> Result<Option<T>>
    where
        T: Clone,
    {
        match self.node {
            NumberTreeNode::Leaf(ref items) => Ok(items
                .iter()
                .find(|&&(k, _)| k == key)
                .map(|(_, value)| value.clone())),
            NumberTreeNode::Intermediate(ref kids) => {
                for &kid in kids {
                    let node = r.get(kid)?;
                    if let Some((low, high)) = node.limits {
                        if key < low || key > high {
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

    pub fn from_pairs(mut pairs: Vec<(i64, T)>) -> NumberTree<T> {
        pairs.sort_by_key(|&(k, _)| k);
        NumberTree {
            limits: None,
            node: NumberTreeNode::Leaf(pairs),
        }
    }
}

impl<T: Object + std::fmt::Debug> Object for NumberTree<T> {
    fn from_primitive(p: Primitive, resolve: &impl Resolve) -> Result<Self> {
        let mut dict = p.into_dictionary(resolve)?;

        let limits = match dict.remove("Limits") {
            Some(p) => {
                let arr = p.resolve(resolve)?.into_array(resolve)?;
                if arr.len() != 2 {
                    bail!("/Limits is not a two-element array");
                }
                Some((arr[0].as_integer()?, arr[1].as_integer()?))
            }
            None => None,
        };

        let kids = dict.remove("Kids");
        let nums = dict.remove("Nums");
        match (kids, nums) {
            (Some(kids), _) => {
                let kids = kids
                    .resolve(resolve)?
                    .into_array(resolve)?
                    .into_iter()
                    .map(|p| Ref::from_primitive(p, resolve))
                    .collect::<Result<Vec<_>>>()?;
                Ok(NumberTree {
                    limits,
                    node: NumberTreeNode::Intermediate(kids),
                })
            }
            (None, Some(nums)) => {
                let nums = nums.resolve(resolve)?.into_array(resolve)?;
                let mut items = Vec::with_capacity(nums.len() / 2);
                for pair in nums.chunks(2) {
                    match pair {
                        [key, value] => items.push((
                            key.clone().resolve(resolve)?.as_integer()?,
                            T::from_primitive(value.clone(), resolve)?,
                        )),
                        _ => bail!("/Nums with an odd number of elements"),
                    }
                }
                Ok(NumberTree {
                    limits,
                    node: NumberTreeNode::Leaf(items),
                })
            }
            (None, None) => Err(PdfError::MissingEntry {
                typ: "NumberTree",
                field: "Kids or Nums".into(),
            }),
        }
    }
}

impl<T: ObjectWrite> ObjectWrite for NumberTree<T> {
    fn to_primitive(&self, update: &mut impl Updater) -> Result<Primitive> {
        let mut dict = Dict::new();
        if let Some((low, high)) = self.limits {
            dict.insert(
                "Limits",
                Primitive::Array(vec![Primitive::Integer(low), Primitive::Integer(high)]),
            );
        }
        match self.node {
            NumberTreeNode::Leaf(ref items) => {
                let mut nums = Vec::with_capacity(items.len() * 2);
                for (key, value) in items {
                    nums.push(Primitive::Integer(*key));
                    nums.push(value.to_primitive(update)?);
                }
                dict.insert("Nums", Primitive::Array(nums));
            }
            NumberTreeNode::Intermediate(ref kids) => {
                let kids = kids
                    .iter()
                    .map(|r| Primitive::Reference(r.get_inner()))
                    .collect();
                dict.insert("Kids", Primitive::Array(kids));
            }
        }
        Ok(Primitive::Dictionary(dict))
    }
}
