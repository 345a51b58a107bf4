use std::{ffi::OsStr, os::unix::ffi::OsStrExt};

use crate::utils::{OPAQUE_WHITEOUT_MARKER, WHITEOUT_META_PREFIX, WHITEOUT_PREFIX};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// What a layer entry's file name means to the compositor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whiteout<'a> {
    /// An ordinary entry.
    None,

    /// `.wh..wh..opq`: the parent directory hides everything from lower layers.
    Opaque,

    /// `.wh.<name>`: removes the sibling `<name>`.
    Remove(&'a OsStr),

    /// Other `.wh..wh.` names, which are AUFS bookkeeping.
    Meta,

    /// `.wh.` followed by a name that cannot be a sibling, such as `..`.
    Invalid,
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Classifies a file name found in a layer.
pub fn classify(name: &OsStr) -> Whiteout<'_> {
    let bytes = name.as_bytes();

    if bytes == OPAQUE_WHITEOUT_MARKER.as_bytes() {
        return Whiteout::Opaque;
    }

    if bytes.starts_with(WHITEOUT_META_PREFIX.as_bytes()) {
        return Whiteout::Meta;
    }

    match bytes.strip_prefix(WHITEOUT_PREFIX.as_bytes()) {
        None => Whiteout::None,
        Some(b"") | Some(b".") | Some(b"..") => Whiteout::Invalid,
        Some(target) if target.contains(&b'/') => Whiteout::Invalid,
        Some(target) => Whiteout::Remove(OsStr::from_bytes(target)),
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
