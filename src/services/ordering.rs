//! Index arithmetic shared by the server-side reorder and the client-side
//! optimistic reorder, so both sides always agree on the resulting order.
//!
//! Moves use insertion-point semantics: `target` names the slot *before*
//! which the item lands, so `target == len` appends.

use super::ServiceError;

/// Checks a move request against a list of `len` items.
pub fn validate_move(len: usize, source: usize, target: usize) -> Result<(), ServiceError> {
    if source >= len || target > len {
        return Err(ServiceError::invalid("Invalid index"));
    }
    Ok(())
}

/// Clamps raw drag indices into range; `None` for an empty list.
pub fn clamp_move(len: usize, source: i64, target: i64) -> Option<(usize, usize)> {
    if len == 0 {
        return None;
    }
    let source = source.clamp(0, len as i64 - 1) as usize;
    let target = target.clamp(0, len as i64) as usize;
    Some((source, target))
}

/// True when moving `source` to `target` leaves the list unchanged.
pub fn is_noop(source: usize, target: usize) -> bool {
    target == source || target == source + 1
}

/// Index the moved item ends up at after removal and reinsertion.
pub fn resolved_index(source: usize, target: usize) -> usize {
    if source < target {
        target - 1
    } else {
        target
    }
}

/// Moves the element at `source` in front of the element at `target`.
///
/// Callers validate first; out-of-range indices are a no-op.
pub fn move_item<T>(items: &mut Vec<T>, source: usize, target: usize) {
    if validate_move(items.len(), source, target).is_err() || is_noop(source, target) {
        return;
    }
    let moved = items.remove(source);
    items.insert(resolved_index(source, target), moved);
}
