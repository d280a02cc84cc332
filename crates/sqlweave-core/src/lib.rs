mod error;
pub use error::{Error, ErrorKind};

pub mod codec;
pub mod driver;
pub mod meta;
pub mod path;
pub mod settings;
pub mod ty;
pub mod value;

pub use codec::{Codec, CodecRegistry};
pub use driver::Connection;
pub use meta::{Navigator, Shape, ShapeRegistry};
pub use settings::Settings;
pub use ty::{DbType, Type};
pub use value::Value;

/// A Result type alias that uses sqlweave's [`Error`] type.
pub type Result<T, E = Error> = core::result::Result<T, E>;
