//! Type and method descriptor helpers.
//!
//! Descriptors use the familiar `(IJLpkg/Name;[D)V` grammar. Only the sizes needed for slot and
//! stack bookkeeping are extracted; no type hierarchy is modelled.

use crate::result::{Error, Result};

/// Parsed shape of a method descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodShape {
    /// Slots occupied by the arguments (receiver excluded).
    pub arg_slots: u16,
    /// Slots pushed by the return value (0 for `V`).
    pub return_slots: u16,
}

/// Returns true if `desc` looks like a method descriptor.
#[inline]
pub fn is_method(desc: &str) -> bool {
    desc.starts_with('(')
}

/// Slot width of a field type descriptor (2 for `J`/`D`, 1 otherwise).
pub fn field_width(desc: &str) -> Result<u16> {
    let (width, rest) = parse_field(desc, desc)?;
    if !rest.is_empty() {
        return Err(Error::InvalidDescriptor(desc.to_string()));
    }
    Ok(width)
}

/// Parses a method descriptor into argument and return slot counts.
pub fn method_shape(desc: &str) -> Result<MethodShape> {
    let mut rest = desc
        .strip_prefix('(')
        .ok_or_else(|| Error::InvalidDescriptor(desc.to_string()))?;
    let mut arg_slots = 0u16;
    loop {
        if let Some(tail) = rest.strip_prefix(')') {
            rest = tail;
            break;
        }
        let (width, tail) = parse_field(rest, desc)?;
        arg_slots += width;
        rest = tail;
    }
    let return_slots = if rest == "V" {
        0
    } else {
        let (width, tail) = parse_field(rest, desc)?;
        if !tail.is_empty() {
            return Err(Error::InvalidDescriptor(desc.to_string()));
        }
        width
    };
    Ok(MethodShape {
        arg_slots,
        return_slots,
    })
}

/// Rewrites every class name inside a descriptor through `map`.
///
/// Works for both field and method descriptors; characters outside `L...;` are copied verbatim.
pub fn map_classes(desc: &str, map: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(desc.len());
    let mut rest = desc;
    while let Some(start) = rest.find('L') {
        out.push_str(&rest[..=start]);
        let tail = &rest[start + 1..];
        match tail.find(';') {
            Some(end) => {
                let name = &tail[..end];
                match map(name) {
                    Some(mapped) => out.push_str(&mapped),
                    None => out.push_str(name),
                }
                out.push(';');
                rest = &tail[end + 1..];
            }
            None => {
                rest = tail;
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

fn parse_field<'a>(input: &'a str, whole: &str) -> Result<(u16, &'a str)> {
    let invalid = || Error::InvalidDescriptor(whole.to_string());
    let mut chars = input.char_indices();
    let (_, first) = chars.next().ok_or_else(invalid)?;
    match first {
        'B' | 'C' | 'F' | 'I' | 'S' | 'Z' => Ok((1, &input[1..])),
        'J' | 'D' => Ok((2, &input[1..])),
        'L' => {
            let end = input.find(';').ok_or_else(invalid)?;
            if end == 1 {
                return Err(invalid());
            }
            Ok((1, &input[end + 1..]))
        }
        '[' => {
            let (_, rest) = parse_field(&input[1..], whole)?;
            Ok((1, rest))
        }
        _ => Err(invalid()),
    }
}
