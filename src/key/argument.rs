use chrono::{DateTime, Utc};
use ordered_float::OrderedFloat;
use std::collections::{BTreeMap, HashMap};
use std::time::SystemTime;

/// Value model for the arguments of a cached call.
///
/// Keys are derived from the structure of these values, never from the
/// identity of whatever the caller passed in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Argument {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(OrderedFloat<f64>),
    Text(String),
    Bytes(Vec<u8>),
    Timestamp(DateTime<Utc>),
    Seq(Vec<Argument>),
    Map(BTreeMap<Argument, Argument>),
}

/// Conversion of a single call argument into an [`Argument`].
pub trait ToArgument {
    fn to_argument(&self) -> Argument;
}

impl ToArgument for Argument {
    fn to_argument(&self) -> Argument {
        self.clone()
    }
}

impl<T: ToArgument + ?Sized> ToArgument for &T {
    fn to_argument(&self) -> Argument {
        (**self).to_argument()
    }
}

impl ToArgument for str {
    fn to_argument(&self) -> Argument {
        Argument::Text(self.to_owned())
    }
}

impl ToArgument for String {
    fn to_argument(&self) -> Argument {
        Argument::Text(self.clone())
    }
}

impl ToArgument for char {
    fn to_argument(&self) -> Argument {
        Argument::Text(self.to_string())
    }
}

impl ToArgument for bool {
    fn to_argument(&self) -> Argument {
        Argument::Bool(*self)
    }
}

macro_rules! signed_argument {
    ($($t:ty),*) => {$(
        impl ToArgument for $t {
            fn to_argument(&self) -> Argument {
                Argument::Int(i64::from(*self))
            }
        }
    )*};
}

macro_rules! unsigned_argument {
    ($($t:ty),*) => {$(
        impl ToArgument for $t {
            fn to_argument(&self) -> Argument {
                Argument::UInt(u64::from(*self))
            }
        }
    )*};
}

signed_argument!(i8, i16, i32, i64);
unsigned_argument!(u8, u16, u32, u64);

impl ToArgument for isize {
    fn to_argument(&self) -> Argument {
        Argument::Int(i64::try_from(*self).unwrap_or(i64::MAX))
    }
}

impl ToArgument for usize {
    fn to_argument(&self) -> Argument {
        Argument::UInt(crate::utils::num::usize_to_u64(*self))
    }
}

impl ToArgument for f32 {
    fn to_argument(&self) -> Argument {
        Argument::Float(OrderedFloat(f64::from(*self)))
    }
}

impl ToArgument for f64 {
    fn to_argument(&self) -> Argument {
        Argument::Float(OrderedFloat(*self))
    }
}

impl ToArgument for DateTime<Utc> {
    fn to_argument(&self) -> Argument {
        Argument::Timestamp(*self)
    }
}

impl ToArgument for SystemTime {
    fn to_argument(&self) -> Argument {
        Argument::Timestamp(DateTime::<Utc>::from(*self))
    }
}

impl<T: ToArgument> ToArgument for Option<T> {
    fn to_argument(&self) -> Argument {
        match self {
            Some(v) => v.to_argument(),
            None => Argument::Null,
        }
    }
}

impl<T: ToArgument> ToArgument for [T] {
    fn to_argument(&self) -> Argument {
        Argument::Seq(self.iter().map(ToArgument::to_argument).collect())
    }
}

impl<T: ToArgument> ToArgument for Vec<T> {
    fn to_argument(&self) -> Argument {
        self.as_slice().to_argument()
    }
}

impl<K: ToArgument, V: ToArgument> ToArgument for BTreeMap<K, V> {
    fn to_argument(&self) -> Argument {
        Argument::Map(self.iter().map(|(k, v)| (k.to_argument(), v.to_argument())).collect())
    }
}

// Collected into a BTreeMap so iteration order of the source map is irrelevant.
impl<K: ToArgument, V: ToArgument, S> ToArgument for HashMap<K, V, S> {
    fn to_argument(&self) -> Argument {
        Argument::Map(self.iter().map(|(k, v)| (k.to_argument(), v.to_argument())).collect())
    }
}

/// The full, ordered argument list of a call.
pub trait Arguments {
    fn to_arguments(&self) -> Vec<Argument>;
}

impl Arguments for () {
    fn to_arguments(&self) -> Vec<Argument> {
        Vec::new()
    }
}

impl Arguments for [Argument] {
    fn to_arguments(&self) -> Vec<Argument> {
        self.to_vec()
    }
}

impl Arguments for Vec<Argument> {
    fn to_arguments(&self) -> Vec<Argument> {
        self.clone()
    }
}

macro_rules! tuple_arguments {
    ($($name:ident),+) => {
        impl<$($name: ToArgument),+> Arguments for ($($name,)+) {
            #[allow(non_snake_case)]
            fn to_arguments(&self) -> Vec<Argument> {
                let ($($name,)+) = self;
                vec![$($name.to_argument()),+]
            }
        }
    };
}

tuple_arguments!(A);
tuple_arguments!(A, B);
tuple_arguments!(A, B, C);
tuple_arguments!(A, B, C, D);
tuple_arguments!(A, B, C, D, E);
tuple_arguments!(A, B, C, D, E, F);
tuple_arguments!(A, B, C, D, E, F, G);
tuple_arguments!(A, B, C, D, E, F, G, H);

/// Builds a `Vec<Argument>` from heterogeneous expressions.
///
/// ```
/// let args = callcache::args!["arg0", 100, 2.5];
/// assert_eq!(args.len(), 3);
/// ```
#[macro_export]
macro_rules! args {
    () => { ::std::vec::Vec::<$crate::key::Argument>::new() };
    ($($arg:expr),+ $(,)?) => {
        vec![$($crate::key::ToArgument::to_argument(&$arg)),+]
    };
}
