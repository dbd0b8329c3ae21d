//! # VarStore Codec
//!
//! Value model and record key codec for VarStore.
//!
//! This crate provides:
//! - [`Value`], the tagged union stored for every variable
//! - [`encode_key`] / [`decode_variable`], the composite record key codec
//! - [`Scope`], the scripting runtime's variable scopes mapped onto scope ids
//!
//! ## Usage
//!
//! ```
//! use varstore_codec::{encode_key, decode_variable, Value};
//!
//! assert_eq!(encode_key("coins", None), "coins");
//! assert_eq!(encode_key("coins", Some("123")), "coins_123");
//! assert_eq!(decode_variable("coins_123"), "coins");
//!
//! let value = Value::from_json_str(r#"{"level": 3}"#).unwrap();
//! assert_eq!(value.get("level"), Some(&Value::Integer(3)));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod key;
mod value;

pub use error::{CodecError, CodecResult};
pub use key::{decode_variable, encode_key, Scope, SCOPE_SEPARATOR};
pub use value::Value;
