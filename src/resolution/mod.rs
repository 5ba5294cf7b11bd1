/// Path resolution and value conversion.
///
/// Turns the symbolic paths inside annotation values into targets in the
/// object map, walking each path with rules chosen by the kind of element
/// reached so far.
mod path_resolver;
mod value_parser;

pub use path_resolver::{
    combine_path, parent_path, strip_collection, PathResolution, PathResolver,
};
pub use value_parser::ValueParser;
