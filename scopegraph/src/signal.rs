// Copyright 2025 the Scopegraph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Signals: typed payloads and their runtime type tags.
//!
//! A signal is a plain value type. Its only obligation is to describe its
//! *lineage*: the chain of signal categories it belongs to, most specific
//! first. A `MouseDown` is also a `PointerDown`, a `PointerSignal`, and an
//! `InputSignal`. The relation is expressed by embedding: the derived type
//! stores its base as a field, and [`Signal::project_mut`] walks down that
//! chain of fields to hand a handler exactly the category it declared.
//!
//! Implement [`Signal`] with the [`signal!`](crate::signal!) macro rather than by hand.

use core::any::{Any, TypeId};
use core::fmt;
use core::hash::{Hash, Hasher};

use smallvec::SmallVec;

use crate::types::NodeId;

/// Runtime tag of a signal type.
///
/// Equality and hashing only consider the [`TypeId`]; the name is carried for
/// diagnostics.
#[derive(Copy, Clone)]
pub struct SignalKey {
    id: TypeId,
    name: &'static str,
}

impl SignalKey {
    /// The key of signal type `S`.
    pub fn of<S: Signal>() -> Self {
        Self {
            id: TypeId::of::<S>(),
            name: core::any::type_name::<S>(),
        }
    }

    /// The type identifier of the tagged signal type.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The fully qualified type name of the tagged signal type.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for SignalKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for SignalKey {}

impl Hash for SignalKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for SignalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Category chain of a signal, most specific first.
pub type Lineage = SmallVec<[SignalKey; 6]>;

/// A typed payload routed through a [`Graph`](crate::Graph).
pub trait Signal: Any {
    /// Append the key of this type followed by the keys of its bases.
    fn lineage_into(out: &mut Lineage)
    where
        Self: Sized;

    /// The lineage of this value's concrete type.
    fn lineage(&self) -> Lineage;

    /// Borrow the embedded category `ty` of this signal, if it belongs to it.
    ///
    /// Returns `self` for the concrete type and the embedded base field for
    /// any ancestor category.
    fn project_mut(&mut self, ty: TypeId) -> Option<&mut dyn Any>;
}

/// The lineage of signal type `S`.
pub fn lineage_of<S: Signal>() -> Lineage {
    let mut out = Lineage::new();
    S::lineage_into(&mut out);
    out
}

/// Implement [`Signal`] for a type.
///
/// A root category is declared with just the type. A derived category names
/// its base category and the field the base is embedded in; the macro then
/// also implements `Deref`/`DerefMut` to the base so base fields read naturally.
///
/// ```
/// use scopegraph::{Signal, SignalKey, signal};
///
/// #[derive(Debug, Default)]
/// struct Input {
///     processed: bool,
/// }
///
/// #[derive(Debug, Default)]
/// struct Click {
///     input: Input,
///     x: f64,
/// }
///
/// signal!(Input);
/// signal!(Click: Input = input);
///
/// let mut click = Click::default();
/// click.processed = true;
/// assert_eq!(click.lineage().as_slice(), &[SignalKey::of::<Click>(), SignalKey::of::<Input>()]);
/// ```
#[macro_export]
macro_rules! signal {
    ($ty:ty : $base:ty = $field:ident) => {
        impl $crate::Signal for $ty {
            fn lineage_into(out: &mut $crate::Lineage) {
                out.push($crate::SignalKey::of::<Self>());
                <$base as $crate::Signal>::lineage_into(out);
            }

            fn lineage(&self) -> $crate::Lineage {
                $crate::lineage_of::<Self>()
            }

            fn project_mut(
                &mut self,
                ty: ::core::any::TypeId,
            ) -> ::core::option::Option<&mut dyn ::core::any::Any> {
                if ty == ::core::any::TypeId::of::<Self>() {
                    ::core::option::Option::Some(self)
                } else {
                    <$base as $crate::Signal>::project_mut(&mut self.$field, ty)
                }
            }
        }

        impl ::core::ops::Deref for $ty {
            type Target = $base;

            fn deref(&self) -> &$base {
                &self.$field
            }
        }

        impl ::core::ops::DerefMut for $ty {
            fn deref_mut(&mut self) -> &mut $base {
                &mut self.$field
            }
        }
    };
    ($ty:ty) => {
        impl $crate::Signal for $ty {
            fn lineage_into(out: &mut $crate::Lineage) {
                out.push($crate::SignalKey::of::<Self>());
            }

            fn lineage(&self) -> $crate::Lineage {
                $crate::lineage_of::<Self>()
            }

            fn project_mut(
                &mut self,
                ty: ::core::any::TypeId,
            ) -> ::core::option::Option<&mut dyn ::core::any::Any> {
                if ty == ::core::any::TypeId::of::<Self>() {
                    ::core::option::Option::Some(self)
                } else {
                    ::core::option::Option::None
                }
            }
        }
    };
}

/// Sent upward from a node right after it was inserted into the graph.
///
/// Scopes that cache facts about their subtree (for example a content
/// bounding box) declare `AcceptsInner<AgentAdded>` to invalidate them.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AgentAdded {
    /// The freshly inserted node.
    pub node: NodeId,
}

signal!(AgentAdded);

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Base {
        hits: u32,
    }

    #[derive(Debug, Default)]
    struct Middle {
        base: Base,
        flag: bool,
    }

    #[derive(Debug, Default)]
    struct Leaf {
        middle: Middle,
    }

    signal!(Base);
    signal!(Middle: Base = base);
    signal!(Leaf: Middle = middle);

    #[test]
    fn lineage_is_most_specific_first() {
        let keys = lineage_of::<Leaf>();
        assert_eq!(
            keys.as_slice(),
            &[
                SignalKey::of::<Leaf>(),
                SignalKey::of::<Middle>(),
                SignalKey::of::<Base>(),
            ]
        );
        assert_eq!(Leaf::default().lineage(), keys);
    }

    #[test]
    fn projection_reaches_embedded_bases() {
        let mut leaf = Leaf::default();
        let base = leaf
            .project_mut(TypeId::of::<Base>())
            .and_then(|b| b.downcast_mut::<Base>())
            .unwrap();
        base.hits += 1;
        let middle = leaf
            .project_mut(TypeId::of::<Middle>())
            .and_then(|m| m.downcast_mut::<Middle>())
            .unwrap();
        middle.flag = true;

        assert_eq!(leaf.hits, 1);
        assert!(leaf.flag);
        assert!(leaf.project_mut(TypeId::of::<AgentAdded>()).is_none());
    }

    #[test]
    fn keys_compare_by_type_only() {
        assert_eq!(SignalKey::of::<Base>(), SignalKey::of::<Base>());
        assert_ne!(SignalKey::of::<Base>(), SignalKey::of::<Middle>());
        assert!(SignalKey::of::<Leaf>().name().ends_with("Leaf"));
    }
}
