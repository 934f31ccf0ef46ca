//! Traversal of a network's layer tree.
//!
//! Networks expose their direct children through [`LayerTree`]; the
//! [`conv_layers`] iterator walks the tree depth-first, pre-order, and yields
//! every [`TileableConv2d`] it finds. Children are listed lazily, one branch at
//! a time, as the iterator advances.

use crate::conv::TileableConv2d;

/// Mutable handle to one direct child of a network node.
pub enum LayerMut<'a> {
    Conv(&'a mut TileableConv2d),
    Branch(&'a mut dyn LayerTree),
}

/// A network node whose children can be enumerated.
///
/// Implementors list children in their natural order (the order they are
/// applied in `forward`). Leaves that hold no convolution may be omitted.
pub trait LayerTree {
    fn layers_mut(&mut self) -> Vec<LayerMut<'_>>;
}

impl<T: LayerTree> LayerTree for Vec<T> {
    fn layers_mut(&mut self) -> Vec<LayerMut<'_>> {
        self.iter_mut()
            .map(|child| LayerMut::Branch(child as &mut dyn LayerTree))
            .collect()
    }
}

/// Single-pass iterator over the convolution layers of a tree.
pub struct ConvLayers<'a> {
    stack: Vec<std::vec::IntoIter<LayerMut<'a>>>,
}

impl<'a> Iterator for ConvLayers<'a> {
    type Item = &'a mut TileableConv2d;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let next = self.stack.last_mut()?.next();
            match next {
                Some(LayerMut::Conv(conv)) => return Some(conv),
                Some(LayerMut::Branch(branch)) => {
                    let children = branch.layers_mut();
                    self.stack.push(children.into_iter());
                }
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

/// Walk `root` and yield each convolution layer in traversal order.
pub fn conv_layers<T: LayerTree + ?Sized>(root: &mut T) -> ConvLayers<'_> {
    ConvLayers {
        stack: vec![root.layers_mut().into_iter()],
    }
}
