#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub use cj_json as json;
pub use cj_reflect as reflect;
pub use cj_utils as utils;
